//! Command-line interface and REPL
//!
//! The REPL stands in for the host: it triggers actions, feeds inbound events
//! as if they came from the receiver, and registers feedback predicates.

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use msc_bridge::dispatch::{Action, FaderMode};
use msc_bridge::feedback::{FeedbackRequest, Operator};
use msc_bridge::ingest::{InboundEvent, InboundMessage, RawAddress, ALL_CALL_DEVICE_ID};

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Action(Action),
    Inbound(InboundMessage),
    /// Evaluate now and keep watching
    Feedback(FeedbackRequest),
    Variables,
    Status,
    Help,
    Exit,
}

pub const HELP: &str = "\
actions:
  goto <cue> <exec>[.<page>] [fade]
  pause|resume|off <exec>[.<page>]
  fader <percent> <exec>[.<page>] [set|inc|dec] [fade]
  fire <macro>
inbound (as received from the console):
  rx goto <exec>.<page> [cue] [dev=<id>]
  rx pause|resume|off <exec>.<page> [dev=<id>]
  rx fader <exec>.<page> <percent> [dev=<id>]
feedback:
  fb active|paused <exec>[.<page>] [true|false]
  fb cue <exec>[.<page>] <cue>
  fb fader <exec>[.<page>] <op> <value>
other:
  vars, status, help, exit";

/// Read lines until `exit` or EOF, forwarding parsed commands
///
/// Blocking, run it on a dedicated thread.
pub fn run_repl(commands: mpsc::UnboundedSender<ReplCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("msc> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match parse_line(&line) {
                    Ok(Some(command)) => {
                        let exit = command == ReplCommand::Exit;
                        if commands.send(command).is_err() || exit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{} {:#}", "error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                let _ = commands.send(ReplCommand::Exit);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Parse one REPL line, `None` for blank lines
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match verb {
        "goto" => {
            let [cue, target, rest @ ..] = args else {
                bail!("usage: goto <cue> <exec>[.<page>] [fade]");
            };
            let (exec, page) = parse_target(target)?;
            ReplCommand::Action(Action::Goto {
                cue: cue.to_string(),
                exec,
                page,
                fade: parse_optional_number(rest.first())?,
            })
        }
        "pause" | "resume" | "off" => {
            let [target] = args else {
                bail!("usage: {} <exec>[.<page>]", verb);
            };
            let (exec, page) = parse_target(target)?;
            ReplCommand::Action(match verb {
                "pause" => Action::Pause { exec, page },
                "resume" => Action::Resume { exec, page },
                _ => Action::Off { exec, page },
            })
        }
        "fader" => {
            let [percent, target, rest @ ..] = args else {
                bail!("usage: fader <percent> <exec>[.<page>] [set|inc|dec] [fade]");
            };
            let (exec, page) = parse_target(target)?;
            let (mode, fade) = match rest {
                [] => (FaderMode::Set, None),
                [mode] if mode.parse::<f64>().is_err() => (parse_mode(mode)?, None),
                [fade] => (FaderMode::Set, parse_optional_number(Some(fade))?),
                [mode, fade, ..] => (parse_mode(mode)?, parse_optional_number(Some(fade))?),
            };
            ReplCommand::Action(Action::Fader {
                percent: parse_number(percent, "percent")?,
                mode,
                exec,
                page,
                fade,
            })
        }
        "fire" => {
            let [macro_number] = args else {
                bail!("usage: fire <macro>");
            };
            ReplCommand::Action(Action::Fire {
                macro_number: macro_number
                    .parse()
                    .with_context(|| format!("invalid macro '{}'", macro_number))?,
            })
        }
        "rx" => ReplCommand::Inbound(parse_inbound(args)?),
        "fb" => ReplCommand::Feedback(parse_feedback(args)?),
        "vars" => ReplCommand::Variables,
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "exit" | "quit" => ReplCommand::Exit,
        other => bail!("unknown command '{}', try 'help'", other),
    };

    Ok(Some(command))
}

fn parse_inbound(args: &[&str]) -> Result<InboundMessage> {
    let mut device_id = ALL_CALL_DEVICE_ID;
    let mut words = Vec::with_capacity(args.len());
    for word in args {
        match word.strip_prefix("dev=") {
            Some(id) => device_id = parse_device_id(id)?,
            None => words.push(*word),
        }
    }

    let [event, target, rest @ ..] = words.as_slice() else {
        bail!("usage: rx <goto|pause|resume|fader|off> <exec>.<page> [value]");
    };
    let address = parse_raw_address(target)?;

    let event = match (*event, rest) {
        ("goto", []) => InboundEvent::Goto { address, cue: None },
        ("goto", [cue]) => InboundEvent::Goto {
            address,
            cue: Some(parse_number(cue, "cue")?),
        },
        ("pause", []) => InboundEvent::Pause { address },
        ("resume", []) => InboundEvent::Resume { address },
        ("off", []) => InboundEvent::Off { address },
        ("fader", [percent]) => InboundEvent::Fader {
            address,
            percent: parse_number(percent, "percent")?,
        },
        (event, _) => bail!("invalid inbound '{}' event", event),
    };

    Ok(InboundMessage { device_id, event })
}

fn parse_feedback(args: &[&str]) -> Result<FeedbackRequest> {
    let [kind, target, rest @ ..] = args else {
        bail!("usage: fb <active|paused|cue|fader> <exec>[.<page>] ...");
    };
    let (exec, page) = parse_target(target)?;

    let request = match (*kind, rest) {
        ("active", _) => FeedbackRequest::Active {
            exec,
            page,
            active: parse_flag(rest.first())?,
        },
        ("paused", _) => FeedbackRequest::Paused {
            exec,
            page,
            paused: parse_flag(rest.first())?,
        },
        ("cue", [cue]) => FeedbackRequest::Cue {
            exec,
            page,
            cue: cue.to_string(),
        },
        ("fader", [operator, value]) => FeedbackRequest::Fader {
            exec,
            page,
            operator: operator.parse::<Operator>()?,
            fader: parse_number(value, "fader")?,
        },
        (kind, _) => bail!("invalid '{}' feedback", kind),
    };

    Ok(request)
}

/// `<exec>` or `<exec>.<page>`
fn parse_target(target: &str) -> Result<(i64, Option<i64>)> {
    let invalid = || anyhow!("invalid executor '{}', expected <exec>[.<page>]", target);

    match target.split_once('.') {
        Some((exec, page)) => Ok((
            exec.parse().map_err(|_| invalid())?,
            Some(page.parse().map_err(|_| invalid())?),
        )),
        None => Ok((target.parse().map_err(|_| invalid())?, None)),
    }
}

/// Decoded wire address, the page defaults to 1
fn parse_raw_address(target: &str) -> Result<RawAddress> {
    let invalid = || anyhow!("invalid address '{}', expected <exec>.<page>", target);

    let (executor, page) = match target.split_once('.') {
        Some((exec, page)) => (exec, page),
        None => (target, "1"),
    };
    Ok(RawAddress::new(
        executor.parse().map_err(|_| invalid())?,
        page.parse().map_err(|_| invalid())?,
    ))
}

fn parse_device_id(id: &str) -> Result<u8> {
    let parsed = match id.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => id.parse(),
    };
    parsed.with_context(|| format!("invalid device id '{}'", id))
}

fn parse_mode(mode: &str) -> Result<FaderMode> {
    match mode {
        "set" => Ok(FaderMode::Set),
        "inc" | "increase" => Ok(FaderMode::Increase),
        "dec" | "decrease" => Ok(FaderMode::Decrease),
        other => bail!("invalid fader mode '{}', expected set, inc or dec", other),
    }
}

fn parse_flag(word: Option<&&str>) -> Result<bool> {
    match word.copied() {
        None | Some("true") | Some("on") => Ok(true),
        Some("false") | Some("off") => Ok(false),
        Some(other) => bail!("invalid flag '{}', expected true or false", other),
    }
}

fn parse_number(word: &str, field: &str) -> Result<f64> {
    word.parse()
        .with_context(|| format!("invalid {} '{}'", field, word))
}

fn parse_optional_number(word: Option<&&str>) -> Result<Option<f64>> {
    word.map(|w| parse_number(w, "fade")).transpose()
}
