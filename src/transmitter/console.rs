//! Console transmitter - logs every outbound command instead of sending it

use super::{OutboundCommand, Transmitter};
use crate::address::ExecKey;
use crate::config::TransmitterConfig;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// ConsoleTransmitter logs all outbound commands
///
/// Useful for rehearsing actions without a console on the network, and for
/// checking how user input is compiled into executor addresses.
pub struct ConsoleTransmitter {
    name: String,
    destination: String,
    sent: AtomicU64,
}

impl ConsoleTransmitter {
    pub fn new(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Build from the transmitter section of the configuration
    pub fn from_config(config: &TransmitterConfig) -> Self {
        let host = match config.port {
            Some(port) => format!("{}:{}", config.address, port),
            None => config.address.clone(),
        };
        let destination = format!("{} dev {:#04x}", host, config.target_device_id());
        Self::new("console", destination)
    }

    /// Number of commands logged so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn log(&self, command: OutboundCommand) -> Result<()> {
        let count = self.sent.fetch_add(1, Ordering::Relaxed) + 1;

        info!(
            "📤 [{}] {} → {} [#{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.destination,
            command,
            count
        );
        debug!(
            transmitter = %self.name,
            command = command.name(),
            payload = ?command,
            sent = count,
            "ConsoleTransmitter send"
        );

        Ok(())
    }
}

impl Transmitter for ConsoleTransmitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn goto(&self, cue: &str, exec: &ExecKey, fade: Option<f64>) -> Result<()> {
        self.log(OutboundCommand::Goto {
            cue: cue.to_string(),
            exec: exec.clone(),
            fade,
        })
    }

    fn pause(&self, exec: &ExecKey) -> Result<()> {
        self.log(OutboundCommand::Pause { exec: exec.clone() })
    }

    fn resume(&self, exec: &ExecKey) -> Result<()> {
        self.log(OutboundCommand::Resume { exec: exec.clone() })
    }

    fn fader(&self, percent: f64, exec: &ExecKey, fade: Option<f64>) -> Result<()> {
        self.log(OutboundCommand::Fader {
            percent,
            exec: exec.clone(),
            fade,
        })
    }

    fn fire(&self, macro_number: u8) -> Result<()> {
        self.log(OutboundCommand::Fire { macro_number })
    }

    fn off(&self, exec: &ExecKey) -> Result<()> {
        self.log(OutboundCommand::Off { exec: exec.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_transmitter_counts() {
        let tx = ConsoleTransmitter::new("test", "127.0.0.1:6004");
        assert_eq!(tx.name(), "test");
        assert_eq!(tx.sent_count(), 0);

        let exec = ExecKey::new(1, 5);
        tx.goto("12.5", &exec, Some(2.0)).unwrap();
        tx.fader(50.0, &exec, None).unwrap();
        tx.fire(3).unwrap();

        assert_eq!(tx.sent_count(), 3);
    }

    #[test]
    fn test_from_config_destination() {
        let mut config = TransmitterConfig::default();
        config.port = Some(6004);
        let tx = ConsoleTransmitter::from_config(&config);
        assert_eq!(tx.destination, "255.255.255.255:6004 dev 0x7f");
    }
}
