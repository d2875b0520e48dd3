//! Outbound MSC transmitters
//!
//! The bridge never frames MSC bytes itself. It hands fully resolved commands
//! to a [`Transmitter`], which owns the socket and the wire encoding.

use anyhow::Result;
use serde::Serialize;

use crate::address::ExecKey;

pub mod console;
pub mod recording;

pub use console::ConsoleTransmitter;
pub use recording::RecordingTransmitter;

/// Outbound link to the console
///
/// Calls are fire-and-forget: an `Ok` means the message left, not that the
/// console acted on it. An `Err` is a transport fault and takes the link down.
pub trait Transmitter: Send + Sync {
    /// Transmitter name used in logs
    fn name(&self) -> &str;

    fn goto(&self, cue: &str, exec: &ExecKey, fade: Option<f64>) -> Result<()>;

    fn pause(&self, exec: &ExecKey) -> Result<()>;

    fn resume(&self, exec: &ExecKey) -> Result<()>;

    /// Move a fader to an absolute position in percent
    fn fader(&self, percent: f64, exec: &ExecKey, fade: Option<f64>) -> Result<()>;

    fn fire(&self, macro_number: u8) -> Result<()>;

    fn off(&self, exec: &ExecKey) -> Result<()>;
}

/// A single resolved outbound call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum OutboundCommand {
    Goto {
        cue: String,
        exec: ExecKey,
        fade: Option<f64>,
    },
    Pause {
        exec: ExecKey,
    },
    Resume {
        exec: ExecKey,
    },
    Fader {
        percent: f64,
        exec: ExecKey,
        fade: Option<f64>,
    },
    Fire {
        macro_number: u8,
    },
    Off {
        exec: ExecKey,
    },
}

impl OutboundCommand {
    /// Hand the command to `transmitter`
    pub fn send_via(&self, transmitter: &dyn Transmitter) -> Result<()> {
        match self {
            OutboundCommand::Goto { cue, exec, fade } => transmitter.goto(cue, exec, *fade),
            OutboundCommand::Pause { exec } => transmitter.pause(exec),
            OutboundCommand::Resume { exec } => transmitter.resume(exec),
            OutboundCommand::Fader {
                percent,
                exec,
                fade,
            } => transmitter.fader(*percent, exec, *fade),
            OutboundCommand::Fire { macro_number } => transmitter.fire(*macro_number),
            OutboundCommand::Off { exec } => transmitter.off(exec),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::Goto { .. } => "goto",
            OutboundCommand::Pause { .. } => "pause",
            OutboundCommand::Resume { .. } => "resume",
            OutboundCommand::Fader { .. } => "fader",
            OutboundCommand::Fire { .. } => "fire",
            OutboundCommand::Off { .. } => "off",
        }
    }
}

impl std::fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fade = |fade: &Option<f64>| fade.map(|s| format!(" fade {}s", s)).unwrap_or_default();
        match self {
            OutboundCommand::Goto { cue, exec, fade: t } => {
                write!(f, "goto cue {} on {}{}", cue, exec, fade(t))
            }
            OutboundCommand::Pause { exec } => write!(f, "pause {}", exec),
            OutboundCommand::Resume { exec } => write!(f, "resume {}", exec),
            OutboundCommand::Fader {
                percent,
                exec,
                fade: t,
            } => write!(f, "fader {} to {}%{}", exec, percent, fade(t)),
            OutboundCommand::Fire { macro_number } => write!(f, "fire macro {}", macro_number),
            OutboundCommand::Off { exec } => write!(f, "off {}", exec),
        }
    }
}
