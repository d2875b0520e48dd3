//! Bridge - single owner of the executor state of one running instance
//!
//! The Bridge ties together:
//! - the executor table and the tracked executor variable bindings
//! - outbound dispatch through the bound transmitter
//! - inbound ingestion with device/group filtering
//! - feedback evaluation against cached state
//! - link status and reconfiguration

mod actor;
mod commands;
mod handle;

pub use actor::BridgeActor;
pub use commands::{BridgeCommand, BridgeEvent, BridgeSnapshot};
pub use handle::BridgeHandle;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{ConsoleDialect, ExecKey};
use crate::config::AppConfig;
use crate::dispatch::{Action, CommandDispatcher, DispatchOutcome};
use crate::error::{BridgeError, BridgeResult};
use crate::feedback::{FeedbackEvaluator, FeedbackRequest};
use crate::ingest::{EventIngestor, InboundMessage, IngestReport, ReceiverFilter};
use crate::state::{ExecutorTable, FeedbackClass, VariableDefinition, VariableUpdate};
use crate::status::{LinkMonitor, LinkSide, LinkStatus, StatusCallback};
use crate::transmitter::Transmitter;

/// Executor state and dispatch engine of one instance
pub struct Bridge {
    config: AppConfig,
    table: ExecutorTable,
    /// Tracked executors, in configuration order
    tracked: Vec<ExecKey>,
    transmitter: Option<Arc<dyn Transmitter>>,
    filter: ReceiverFilter,
    link: LinkMonitor,
}

impl Bridge {
    /// Create a bridge for `config`
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut bridge = Self {
            config: AppConfig::default(),
            table: ExecutorTable::new(),
            tracked: Vec::new(),
            transmitter: None,
            filter: ReceiverFilter::from_config(&config.receiver),
            link: LinkMonitor::new(),
        };
        bridge.reconfigure(config)?;
        Ok(bridge)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dialect(&self) -> ConsoleDialect {
        self.config.dialect()
    }

    pub fn table(&self) -> &ExecutorTable {
        &self.table
    }

    pub fn tracked(&self) -> &[ExecKey] {
        &self.tracked
    }

    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn subscribe_status(&mut self, callback: StatusCallback) {
        self.link.subscribe(callback);
    }

    /// Apply a new configuration
    ///
    /// The executor table is rebuilt from scratch and the links start over, so
    /// transmitters have to be attached again afterwards.
    pub fn reconfigure(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;

        let dialect = config.dialect();
        let tracked: Vec<ExecKey> = config
            .tracked()?
            .into_iter()
            .map(|exec| exec.key(dialect))
            .collect();

        self.table.reset();
        for key in &tracked {
            self.table.bind_variable(key);
        }

        self.transmitter = None;
        self.filter = ReceiverFilter::from_config(&config.receiver);
        self.link
            .configure(config.transmitter.port.is_some(), config.receiver.enabled);

        info!(
            dialect = %dialect,
            tracked = tracked.len(),
            "Bridge configured"
        );

        self.tracked = tracked;
        self.config = config;
        Ok(())
    }

    /// Bind the outbound link
    pub fn attach_transmitter(&mut self, transmitter: Arc<dyn Transmitter>) {
        info!("Transmitter '{}' attached", transmitter.name());
        self.transmitter = Some(transmitter);
        self.link.mark_ready(LinkSide::Transmitter);
    }

    /// The receiver side reported ready
    pub fn attach_receiver(&mut self) {
        self.link.mark_ready(LinkSide::Receiver);
    }

    pub fn has_transmitter(&self) -> bool {
        self.transmitter.is_some()
    }

    /// Tear down `side` after a socket error, keeping the last known state
    pub fn transport_fault(&mut self, side: LinkSide, reason: impl Into<String>) {
        if side == LinkSide::Transmitter {
            self.transmitter = None;
        }
        self.link.fault(side, reason);
    }

    /// Validate and send a user action
    pub fn dispatch(&mut self, action: &Action) -> BridgeResult<DispatchOutcome> {
        let transmitter = self.transmitter.clone();
        let dispatcher = CommandDispatcher::new(&self.table, self.dialect(), &self.config.bounds);

        match dispatcher.dispatch(action, transmitter.as_deref()) {
            Err(BridgeError::TransportFault(reason)) => {
                self.transport_fault(LinkSide::Transmitter, reason.clone());
                Err(BridgeError::TransportFault(reason))
            }
            Err(e) => {
                debug!(action = action.name(), "Rejected action: {}", e);
                Err(e)
            }
            outcome => outcome,
        }
    }

    /// Apply an inbound message
    ///
    /// Messages addressed to other devices are skipped with a
    /// [`BridgeError::ProtocolWarning`]; nothing else can fail here.
    pub fn ingest(&mut self, message: &InboundMessage) -> BridgeResult<IngestReport> {
        if let Err(e) = self.filter.check(message) {
            warn!("{}", e);
            return Err(e);
        }

        Ok(EventIngestor::new(&self.table).ingest(&message.event))
    }

    pub fn evaluate(&self, request: &FeedbackRequest) -> bool {
        FeedbackEvaluator::new(&self.table, self.dialect(), &self.config.bounds).evaluate(request)
    }

    /// Host variable declarations for every tracked executor
    pub fn variable_definitions(&self) -> Vec<VariableDefinition> {
        self.tracked
            .iter()
            .flat_map(VariableDefinition::for_executor)
            .collect()
    }

    /// Current values of every tracked executor variable
    pub fn variable_values(&self) -> Vec<VariableUpdate> {
        self.tracked
            .iter()
            .flat_map(|key| {
                let state = self.table.get(key);
                FeedbackClass::all()
                    .iter()
                    .map(move |class| VariableUpdate::from_state(&state, *class))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            status: self.status(),
            dialect: self.dialect(),
            has_transmitter: self.has_transmitter(),
            executors: self.table.snapshot(),
            variables: self.variable_values(),
        }
    }

    /// Close both links, the table stays as it is
    pub fn close(&mut self) {
        self.transmitter = None;
        self.link.close();
    }
}

#[cfg(test)]
mod tests;
