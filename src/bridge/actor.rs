//! BridgeActor - sequential owner of a [`Bridge`]
//!
//! Every action, inbound event, evaluation and reconfiguration goes through one
//! command channel, so they are applied strictly in arrival order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::commands::{BridgeCommand, BridgeEvent};
use super::handle::BridgeHandle;
use super::Bridge;
use crate::error::BridgeError;

/// Actor running a [`Bridge`] on a tokio task
pub struct BridgeActor {
    bridge: Bridge,
    command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    /// Inbound events applied so far
    ingest_count: u64,
}

impl BridgeActor {
    /// Spawn the actor for `bridge`
    ///
    /// Returns the handle and the stream of events the host should react to
    /// (variable updates, feedback refreshes, status changes).
    pub fn spawn(mut bridge: Bridge) -> (BridgeHandle, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let status_tx = event_tx.clone();
        bridge.subscribe_status(Arc::new(move |status| {
            let _ = status_tx.send(BridgeEvent::Status(status));
        }));

        let actor = BridgeActor {
            bridge,
            command_rx: cmd_rx,
            events: event_tx,
            ingest_count: 0,
        };

        tokio::spawn(actor.run());

        info!("BridgeActor spawned");

        (BridgeHandle::new(cmd_tx), event_rx)
    }

    async fn run(mut self) {
        debug!("BridgeActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                // Hot path commands (no response)
                BridgeCommand::Ingest { message } => match self.bridge.ingest(&message) {
                    Ok(report) => {
                        self.ingest_count += 1;
                        let _ = self.events.send(BridgeEvent::Ingested(report));
                    }
                    Err(BridgeError::ProtocolWarning(warning)) => {
                        let _ = self.events.send(BridgeEvent::Warning(warning));
                    }
                    Err(e) => debug!("Ingest failed: {}", e),
                },
                BridgeCommand::AttachTransmitter { transmitter } => {
                    self.bridge.attach_transmitter(transmitter);
                }
                BridgeCommand::AttachReceiver => {
                    self.bridge.attach_receiver();
                }
                BridgeCommand::TransportFault { side, reason } => {
                    self.bridge.transport_fault(side, reason);
                }

                // Request-response commands
                BridgeCommand::Dispatch { action, response } => {
                    let result = self.bridge.dispatch(&action);
                    let _ = response.send(result);
                }
                BridgeCommand::Evaluate { requests, response } => {
                    let results = requests
                        .iter()
                        .map(|request| self.bridge.evaluate(request))
                        .collect();
                    let _ = response.send(results);
                }
                BridgeCommand::Reconfigure {
                    config,
                    transmitter,
                    response,
                } => {
                    let result = self.bridge.reconfigure(*config).map(|()| {
                        if let Some(transmitter) = transmitter {
                            self.bridge.attach_transmitter(transmitter);
                        }
                        self.bridge.variable_definitions()
                    });
                    let _ = response.send(result);
                }
                BridgeCommand::VariableDefinitions { response } => {
                    let _ = response.send(self.bridge.variable_definitions());
                }
                BridgeCommand::Snapshot { response } => {
                    let _ = response.send(self.bridge.snapshot());
                }

                // Lifecycle commands
                BridgeCommand::Shutdown => {
                    info!("BridgeActor received shutdown command");
                    break;
                }
            }
        }

        self.bridge.close();

        info!(
            ingest_count = self.ingest_count,
            "BridgeActor run loop terminated"
        );
    }
}
