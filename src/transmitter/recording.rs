//! Recording transmitter - keeps every outbound command in memory
//!
//! Used to assert on what the dispatcher sent, and to simulate transport
//! faults with [`RecordingTransmitter::fail_next`].

use super::{OutboundCommand, Transmitter};
use crate::address::ExecKey;
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RecordingTransmitter {
    sent: Arc<Mutex<Vec<OutboundCommand>>>,
    fault: Arc<Mutex<Option<String>>>,
}

impl RecordingTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands sent so far, oldest first
    pub fn sent(&self) -> Vec<OutboundCommand> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Make the next send fail with a socket error
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fault.lock() = Some(reason.into());
    }

    fn record(&self, command: OutboundCommand) -> Result<()> {
        if let Some(reason) = self.fault.lock().take() {
            return Err(anyhow!(reason));
        }
        self.sent.lock().push(command);
        Ok(())
    }
}

impl Transmitter for RecordingTransmitter {
    fn name(&self) -> &str {
        "recording"
    }

    fn goto(&self, cue: &str, exec: &ExecKey, fade: Option<f64>) -> Result<()> {
        self.record(OutboundCommand::Goto {
            cue: cue.to_string(),
            exec: exec.clone(),
            fade,
        })
    }

    fn pause(&self, exec: &ExecKey) -> Result<()> {
        self.record(OutboundCommand::Pause { exec: exec.clone() })
    }

    fn resume(&self, exec: &ExecKey) -> Result<()> {
        self.record(OutboundCommand::Resume { exec: exec.clone() })
    }

    fn fader(&self, percent: f64, exec: &ExecKey, fade: Option<f64>) -> Result<()> {
        self.record(OutboundCommand::Fader {
            percent,
            exec: exec.clone(),
            fade,
        })
    }

    fn fire(&self, macro_number: u8) -> Result<()> {
        self.record(OutboundCommand::Fire { macro_number })
    }

    fn off(&self, exec: &ExecKey) -> Result<()> {
        self.record(OutboundCommand::Off { exec: exec.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let tx = RecordingTransmitter::new();
        let exec = ExecKey::new(1, 2);

        OutboundCommand::Pause { exec: exec.clone() }.send_via(&tx).unwrap();
        tx.off(&exec).unwrap();

        assert_eq!(
            tx.sent(),
            vec![
                OutboundCommand::Pause { exec: exec.clone() },
                OutboundCommand::Off { exec },
            ]
        );

        tx.clear();
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_fail_next_only_once() {
        let tx = RecordingTransmitter::new();
        tx.fail_next("socket closed");

        assert!(tx.fire(1).is_err());
        assert!(tx.fire(2).is_ok());
        assert_eq!(tx.sent(), vec![OutboundCommand::Fire { macro_number: 2 }]);
    }
}
