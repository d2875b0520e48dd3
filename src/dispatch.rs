//! Command dispatch - user actions to outbound MSC commands
//!
//! Every action is validated against the configured bounds first. A valid
//! action compiles into exactly one [`OutboundCommand`], or into nothing when
//! the link is down or a relative fader move has no baseline to start from.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{compile, ConsoleDialect, ExecKey};
use crate::config::BoundsConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::state::ExecutorTable;
use crate::transmitter::{OutboundCommand, Transmitter};

/// How a fader action interprets its percent value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaderMode {
    #[default]
    Set,
    #[serde(alias = "inc")]
    Increase,
    #[serde(alias = "dec")]
    Decrease,
}

/// User-issued action, as received from the host UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Goto {
        cue: String,
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default)]
        fade: Option<f64>,
    },
    Pause {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
    },
    Resume {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
    },
    Fader {
        percent: f64,
        #[serde(default)]
        mode: FaderMode,
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default)]
        fade: Option<f64>,
    },
    Fire {
        #[serde(rename = "macro")]
        macro_number: i64,
    },
    Off {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Goto { .. } => "goto",
            Action::Pause { .. } => "pause",
            Action::Resume { .. } => "resume",
            Action::Fader { .. } => "fader",
            Action::Fire { .. } => "fire",
            Action::Off { .. } => "off",
        }
    }
}

/// What happened to a valid action
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Handed to the transmitter
    Sent(OutboundCommand),
    /// No transmitter bound, nothing sent
    LinkUnavailable,
    /// Relative fader move on an executor whose position is still unknown
    NoFaderBaseline(ExecKey),
}

/// Compiles validated actions against the executor table
pub struct CommandDispatcher<'a> {
    table: &'a ExecutorTable,
    dialect: ConsoleDialect,
    bounds: &'a BoundsConfig,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(table: &'a ExecutorTable, dialect: ConsoleDialect, bounds: &'a BoundsConfig) -> Self {
        Self {
            table,
            dialect,
            bounds,
        }
    }

    /// Validate `action` and send it through `transmitter`
    ///
    /// Validation failures are returned even when the link is down. A failing
    /// transmitter yields [`BridgeError::TransportFault`].
    pub fn dispatch(
        &self,
        action: &Action,
        transmitter: Option<&dyn Transmitter>,
    ) -> BridgeResult<DispatchOutcome> {
        self.validate(action)?;

        let Some(transmitter) = transmitter else {
            debug!(action = action.name(), "No transmitter bound, dropping action");
            return Ok(DispatchOutcome::LinkUnavailable);
        };

        let command = match self.compile(action)? {
            Compiled::Command(command) => command,
            Compiled::Skipped(outcome) => return Ok(outcome),
        };

        command
            .send_via(transmitter)
            .map_err(|e| BridgeError::TransportFault(format!("{:#}", e)))?;

        debug!(transmitter = transmitter.name(), "Sent {}", command);
        Ok(DispatchOutcome::Sent(command))
    }

    /// Check every option of `action` against the configured bounds
    pub fn validate(&self, action: &Action) -> BridgeResult<()> {
        match action {
            Action::Goto {
                cue,
                exec,
                page,
                fade,
            } => {
                validate_cue(cue)?;
                self.validate_address(*exec, *page)?;
                self.validate_fade(*fade)
            }
            Action::Pause { exec, page }
            | Action::Resume { exec, page }
            | Action::Off { exec, page } => self.validate_address(*exec, *page),
            Action::Fader {
                percent,
                exec,
                page,
                fade,
                ..
            } => {
                if !percent.is_finite() || !(0.0..=100.0).contains(percent) {
                    return Err(BridgeError::bad_parameter(
                        "percent",
                        percent,
                        "must be within 0..=100",
                    ));
                }
                self.validate_address(*exec, *page)?;
                self.validate_fade(*fade)
            }
            Action::Fire { macro_number } => self.macro_byte(*macro_number).map(|_| ()),
        }
    }

    fn validate_address(&self, exec: i64, page: Option<i64>) -> BridgeResult<()> {
        if !self.bounds.executor.contains(exec) {
            return Err(BridgeError::bad_parameter(
                "exec",
                exec,
                format!("must be within {}", self.bounds.executor),
            ));
        }
        if let Some(page) = page {
            if !self.bounds.page.contains(page) {
                return Err(BridgeError::bad_parameter(
                    "page",
                    page,
                    format!("must be within {}", self.bounds.page),
                ));
            }
        }
        Ok(())
    }

    fn validate_fade(&self, fade: Option<f64>) -> BridgeResult<()> {
        match fade {
            Some(fade) if !fade.is_finite() || fade < 0.0 || fade > self.bounds.fade_max => {
                Err(BridgeError::bad_parameter(
                    "fade",
                    fade,
                    format!("must be within 0..={}", self.bounds.fade_max),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Macro number as sent on the wire, within the configured bounds
    fn macro_byte(&self, macro_number: i64) -> BridgeResult<u8> {
        let range = self.bounds.macro_number;
        u8::try_from(macro_number)
            .ok()
            .filter(|_| range.contains(macro_number))
            .ok_or_else(|| {
                BridgeError::bad_parameter("macro", macro_number, format!("must be within {}", range))
            })
    }

    fn key(&self, exec: i64, page: Option<i64>) -> ExecKey {
        compile(exec, page, self.dialect, false)
    }

    /// Resolve a validated action into the command to send
    fn compile(&self, action: &Action) -> BridgeResult<Compiled> {
        let command = match action {
            Action::Goto {
                cue,
                exec,
                page,
                fade,
            } => OutboundCommand::Goto {
                cue: cue.clone(),
                exec: self.key(*exec, *page),
                fade: *fade,
            },
            Action::Pause { exec, page } => OutboundCommand::Pause {
                exec: self.key(*exec, *page),
            },
            Action::Resume { exec, page } => OutboundCommand::Resume {
                exec: self.key(*exec, *page),
            },
            Action::Fader {
                percent,
                mode,
                exec,
                page,
                fade,
            } => {
                let key = self.key(*exec, *page);
                let percent = match mode {
                    FaderMode::Set => *percent,
                    FaderMode::Increase | FaderMode::Decrease => {
                        let Some(current) = self.table.get(&key).fader else {
                            debug!(exec = %key, "Fader position unknown, skipping relative move");
                            return Ok(Compiled::Skipped(DispatchOutcome::NoFaderBaseline(key)));
                        };
                        let delta = if *mode == FaderMode::Increase {
                            *percent
                        } else {
                            -*percent
                        };
                        (f64::from(current) + delta).clamp(0.0, 100.0)
                    }
                };
                OutboundCommand::Fader {
                    percent,
                    exec: key,
                    fade: *fade,
                }
            }
            Action::Fire { macro_number } => OutboundCommand::Fire {
                macro_number: self.macro_byte(*macro_number)?,
            },
            Action::Off { exec, page } => OutboundCommand::Off {
                exec: self.key(*exec, *page),
            },
        };
        Ok(Compiled::Command(command))
    }
}

enum Compiled {
    Command(OutboundCommand),
    Skipped(DispatchOutcome),
}

/// Cue numbers: integer part without leading zeros, up to three decimals
pub fn validate_cue(cue: &str) -> BridgeResult<()> {
    let invalid = || BridgeError::bad_parameter("cue", cue, "expected a cue number like 12 or 12.5");

    let (integer, fraction) = match cue.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (cue, None),
    };

    let integer_ok = !integer.is_empty()
        && integer.bytes().all(|b| b.is_ascii_digit())
        && (integer == "0" || !integer.starts_with('0'));
    let fraction_ok = fraction.map_or(true, |f| {
        (1..=3).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit())
    });

    if integer_ok && fraction_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}
