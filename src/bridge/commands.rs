//! Commands and events of the bridge actor
//!
//! Host-facing work is split the same way as everywhere else in the actor:
//! fire-and-forget commands for the inbound hot path, and request-response
//! commands (oneshot channel) for anything the caller has to wait for.

use std::sync::Arc;
use tokio::sync::oneshot;

use crate::address::ConsoleDialect;
use crate::config::AppConfig;
use crate::dispatch::{Action, DispatchOutcome};
use crate::error::BridgeResult;
use crate::feedback::FeedbackRequest;
use crate::ingest::{InboundMessage, IngestReport};
use crate::state::{ExecutorState, VariableDefinition, VariableUpdate};
use crate::status::{LinkSide, LinkStatus};
use crate::transmitter::Transmitter;

/// Commands for the bridge actor
pub enum BridgeCommand {
    // -------------------------------------------------------------------------
    // Hot path commands (no response - fire and forget)
    // -------------------------------------------------------------------------
    /// Inbound message from the receiver
    Ingest { message: InboundMessage },

    /// Bind an outbound link
    AttachTransmitter { transmitter: Arc<dyn Transmitter> },

    /// Receiver socket is listening
    AttachReceiver,

    /// Socket error on one side
    TransportFault { side: LinkSide, reason: String },

    // -------------------------------------------------------------------------
    // Request-response commands (require oneshot channel)
    // -------------------------------------------------------------------------
    /// Validate and send an action
    Dispatch {
        action: Action,
        response: oneshot::Sender<BridgeResult<DispatchOutcome>>,
    },

    /// Evaluate feedback predicates, one answer per request
    Evaluate {
        requests: Vec<FeedbackRequest>,
        response: oneshot::Sender<Vec<bool>>,
    },

    /// Replace the configuration, optionally binding a new transmitter
    Reconfigure {
        config: Box<AppConfig>,
        transmitter: Option<Arc<dyn Transmitter>>,
        response: oneshot::Sender<anyhow::Result<Vec<VariableDefinition>>>,
    },

    /// Variable declarations for the tracked executors
    VariableDefinitions {
        response: oneshot::Sender<Vec<VariableDefinition>>,
    },

    /// Current state of the bridge
    Snapshot {
        response: oneshot::Sender<BridgeSnapshot>,
    },

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Close the links and stop the actor
    Shutdown,
}

impl BridgeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::Ingest { .. } => "ingest",
            BridgeCommand::AttachTransmitter { .. } => "attach_transmitter",
            BridgeCommand::AttachReceiver => "attach_receiver",
            BridgeCommand::TransportFault { .. } => "transport_fault",
            BridgeCommand::Dispatch { .. } => "dispatch",
            BridgeCommand::Evaluate { .. } => "evaluate",
            BridgeCommand::Reconfigure { .. } => "reconfigure",
            BridgeCommand::VariableDefinitions { .. } => "variable_definitions",
            BridgeCommand::Snapshot { .. } => "snapshot",
            BridgeCommand::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Debug for BridgeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeCommand::Ingest { message } => f
                .debug_struct("Ingest")
                .field("message", message)
                .finish(),
            BridgeCommand::AttachTransmitter { transmitter } => f
                .debug_struct("AttachTransmitter")
                .field("transmitter", &transmitter.name())
                .finish(),
            BridgeCommand::TransportFault { side, reason } => f
                .debug_struct("TransportFault")
                .field("side", side)
                .field("reason", reason)
                .finish(),
            BridgeCommand::Dispatch { action, .. } => f
                .debug_struct("Dispatch")
                .field("action", action)
                .finish_non_exhaustive(),
            BridgeCommand::Evaluate { requests, .. } => f
                .debug_struct("Evaluate")
                .field("requests", requests)
                .finish_non_exhaustive(),
            BridgeCommand::Reconfigure { transmitter, .. } => f
                .debug_struct("Reconfigure")
                .field("transmitter", &transmitter.as_ref().map(|t| t.name()))
                .finish_non_exhaustive(),
            other => f.write_str(other.name()),
        }
    }
}

/// Notifications pushed from the actor to the host
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// An inbound event was applied
    Ingested(IngestReport),
    /// An inbound message was skipped
    Warning(String),
    /// Instance status changed
    Status(LinkStatus),
}

/// Point-in-time view of the bridge
#[derive(Debug, Clone)]
pub struct BridgeSnapshot {
    pub status: LinkStatus,
    pub dialect: ConsoleDialect,
    pub has_transmitter: bool,
    /// Known executors, ordered by key
    pub executors: Vec<ExecutorState>,
    /// Values of the tracked executor variables
    pub variables: Vec<VariableUpdate>,
}
