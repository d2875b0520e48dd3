//! Event ingestion - inbound MSC events to executor state
//!
//! The protocol decoder hands over events with an already resolved executor
//! address. Each event updates exactly one table entry and reports which
//! feedback classes have to be re-evaluated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::address::ExecKey;
use crate::config::ReceiverConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::state::{ExecutorState, ExecutorTable, FeedbackClass, VariableUpdate};

/// MSC device id every receiver listens to
pub const ALL_CALL_DEVICE_ID: u8 = 0x7F;

/// Group addresses start right after the individual device ids (0x70 = group 1)
pub const GROUP_DEVICE_ID_BASE: u8 = 0x6F;

/// Executor address as decoded from the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawAddress {
    pub executor: u32,
    pub page: u32,
}

impl RawAddress {
    pub fn new(executor: u32, page: u32) -> Self {
        Self { executor, page }
    }

    /// Table key, the decoder already disambiguated the page
    pub fn key(&self) -> ExecKey {
        ExecKey::new(self.page, self.executor)
    }
}

/// Parsed inbound command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum InboundEvent {
    Goto {
        address: RawAddress,
        #[serde(default)]
        cue: Option<f64>,
    },
    Pause {
        address: RawAddress,
    },
    Resume {
        address: RawAddress,
    },
    Fader {
        address: RawAddress,
        percent: f64,
    },
    Off {
        address: RawAddress,
    },
}

impl InboundEvent {
    pub fn address(&self) -> RawAddress {
        match self {
            InboundEvent::Goto { address, .. }
            | InboundEvent::Pause { address }
            | InboundEvent::Resume { address }
            | InboundEvent::Fader { address, .. }
            | InboundEvent::Off { address } => *address,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Goto { .. } => "goto",
            InboundEvent::Pause { .. } => "pause",
            InboundEvent::Resume { .. } => "resume",
            InboundEvent::Fader { .. } => "fader",
            InboundEvent::Off { .. } => "off",
        }
    }
}

/// Inbound event together with the MSC device id it was addressed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub device_id: u8,
    pub event: InboundEvent,
}

impl InboundMessage {
    /// Message addressed to everyone
    pub fn broadcast(event: InboundEvent) -> Self {
        Self {
            device_id: ALL_CALL_DEVICE_ID,
            event,
        }
    }
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub key: ExecKey,
    /// Feedback classes that became stale
    pub affected: BTreeSet<FeedbackClass>,
    /// New variable values, only for executors with a variable binding
    pub variables: Vec<VariableUpdate>,
}

/// Decides whether an inbound message is meant for us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverFilter {
    device_id: u8,
    group_id: u8,
}

impl ReceiverFilter {
    pub fn new(device_id: u8, group_id: u8) -> Self {
        Self {
            device_id,
            group_id,
        }
    }

    pub fn from_config(config: &ReceiverConfig) -> Self {
        Self::new(config.device_id, config.group_id)
    }

    /// Our own id, our group's address, or all-call
    pub fn accepts(&self, device_id: u8) -> bool {
        device_id == ALL_CALL_DEVICE_ID
            || device_id == self.device_id
            || device_id == GROUP_DEVICE_ID_BASE.saturating_add(self.group_id)
    }

    /// Reject messages for other devices as a protocol warning
    pub fn check(&self, message: &InboundMessage) -> BridgeResult<()> {
        if self.accepts(message.device_id) {
            Ok(())
        } else {
            Err(BridgeError::ProtocolWarning(format!(
                "{} for device {:#04x} ignored (device {}, group {})",
                message.event.name(),
                message.device_id,
                self.device_id,
                self.group_id
            )))
        }
    }
}

/// Applies inbound events to the executor table
pub struct EventIngestor<'a> {
    table: &'a ExecutorTable,
}

impl<'a> EventIngestor<'a> {
    pub fn new(table: &'a ExecutorTable) -> Self {
        Self { table }
    }

    /// Apply `event` and report what changed
    ///
    /// The whole update runs under the table lock, so a concurrent feedback
    /// evaluation never sees a half-applied event.
    pub fn ingest(&self, event: &InboundEvent) -> IngestReport {
        let key = event.address().key();

        self.table.update(&key, |state| {
            let affected = apply(state, event);
            let state: &ExecutorState = state;
            let variables = if state.has_variable_binding {
                affected
                    .iter()
                    .map(|class| VariableUpdate::from_state(state, *class))
                    .collect()
            } else {
                Vec::new()
            };

            trace!(exec = %key, event = event.name(), ?state, "Event applied");
            debug!(
                exec = %key,
                event = event.name(),
                affected = ?affected,
                variables = variables.len(),
                "Ingested inbound event"
            );

            IngestReport {
                key: key.clone(),
                affected,
                variables,
            }
        })
    }
}

/// Executor state transition for one event
fn apply(state: &mut ExecutorState, event: &InboundEvent) -> BTreeSet<FeedbackClass> {
    use FeedbackClass::*;

    match event {
        InboundEvent::Goto { cue, .. } => {
            state.active = Some(true);
            state.paused = Some(false);
            state.cue = *cue;
            [Active, Paused, Cue].into()
        }
        InboundEvent::Pause { .. } => {
            state.paused = Some(true);
            [Paused].into()
        }
        InboundEvent::Resume { .. } => {
            state.paused = Some(false);
            [Paused].into()
        }
        InboundEvent::Fader { percent, .. } => {
            state.fader = Some(round_percent(*percent));
            [Fader].into()
        }
        InboundEvent::Off { .. } => {
            // An executor that is off is neither paused nor up
            state.active = Some(false);
            state.paused = Some(false);
            state.fader = Some(0);
            [Active, Paused, Fader].into()
        }
    }
}

fn round_percent(percent: f64) -> u8 {
    // NaN saturates to 0
    percent.round().clamp(0.0, 100.0) as u8
}
