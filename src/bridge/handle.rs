//! BridgeHandle - public API of the bridge actor
//!
//! Fire-and-forget methods for inbound traffic and link notifications, async
//! methods with oneshot channels for everything that answers.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::commands::{BridgeCommand, BridgeSnapshot};
use crate::config::AppConfig;
use crate::dispatch::{Action, DispatchOutcome};
use crate::error::{BridgeError, BridgeResult};
use crate::feedback::FeedbackRequest;
use crate::ingest::InboundMessage;
use crate::state::VariableDefinition;
use crate::status::LinkSide;
use crate::transmitter::Transmitter;

/// Handle for interacting with the bridge actor
#[derive(Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<BridgeCommand>) -> Self {
        Self { cmd_tx }
    }

    // =========================================================================
    // Hot path methods (fire-and-forget, no await)
    // =========================================================================

    /// Hand an inbound message to the bridge
    pub fn ingest(&self, message: InboundMessage) {
        let _ = self.cmd_tx.send(BridgeCommand::Ingest { message });
    }

    pub fn attach_transmitter(&self, transmitter: Arc<dyn Transmitter>) {
        let _ = self
            .cmd_tx
            .send(BridgeCommand::AttachTransmitter { transmitter });
    }

    pub fn attach_receiver(&self) {
        let _ = self.cmd_tx.send(BridgeCommand::AttachReceiver);
    }

    /// Report a socket error on `side`
    pub fn transport_fault(&self, side: LinkSide, reason: impl Into<String>) {
        let _ = self.cmd_tx.send(BridgeCommand::TransportFault {
            side,
            reason: reason.into(),
        });
    }

    // =========================================================================
    // Query methods (async with response)
    // =========================================================================

    /// Validate and send a user action
    ///
    /// A stopped actor behaves like an unbound link.
    pub async fn dispatch(&self, action: Action) -> BridgeResult<DispatchOutcome> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = BridgeCommand::Dispatch {
            action,
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return Err(BridgeError::LinkUnavailable);
        }

        response_rx.await.unwrap_or(Err(BridgeError::LinkUnavailable))
    }

    /// Evaluate one feedback predicate
    pub async fn evaluate(&self, request: FeedbackRequest) -> bool {
        self.evaluate_many(vec![request])
            .await
            .first()
            .copied()
            .unwrap_or(false)
    }

    /// Evaluate a batch of predicates against the same state
    pub async fn evaluate_many(&self, requests: Vec<FeedbackRequest>) -> Vec<bool> {
        let count = requests.len();
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = BridgeCommand::Evaluate {
            requests,
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return vec![false; count];
        }

        response_rx.await.unwrap_or_else(|_| vec![false; count])
    }

    /// Apply a new configuration and bind `transmitter` once it is in place
    ///
    /// Returns the variable declarations of the new tracked executor list.
    pub async fn reconfigure(
        &self,
        config: AppConfig,
        transmitter: Option<Arc<dyn Transmitter>>,
    ) -> anyhow::Result<Vec<VariableDefinition>> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = BridgeCommand::Reconfigure {
            config: Box::new(config),
            transmitter,
            response: response_tx,
        };

        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("Bridge actor stopped"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Bridge actor stopped"))?
    }

    pub async fn variable_definitions(&self) -> Vec<VariableDefinition> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(BridgeCommand::VariableDefinitions {
                response: response_tx,
            })
            .is_err()
        {
            return Vec::new();
        }

        response_rx.await.unwrap_or_default()
    }

    pub async fn snapshot(&self) -> Option<BridgeSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = BridgeCommand::Snapshot {
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok()
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    /// Stop the actor, closing both links
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(BridgeCommand::Shutdown);
    }

    /// Whether the actor is still accepting commands
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Bridge, BridgeActor, BridgeEvent};
    use crate::ingest::{InboundEvent, RawAddress};
    use crate::state::FeedbackClass;
    use crate::status::LinkStatus;
    use crate::transmitter::{OutboundCommand, RecordingTransmitter};

    fn make_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.transmitter.port = Some(6004);
        config.tracked_executors = "5".to_string();
        config
    }

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<BridgeHandle>();
    }

    #[tokio::test]
    async fn test_is_alive_when_channel_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = BridgeHandle::new(tx);
        assert!(!handle.is_alive());
        assert_eq!(
            handle.dispatch(Action::Fire { macro_number: 1 }).await,
            Err(BridgeError::LinkUnavailable)
        );
        assert!(!handle.evaluate(FeedbackRequest::Active {
            exec: 1,
            page: None,
            active: true
        })
        .await);
    }

    #[tokio::test]
    async fn test_extreme_feedback_addresses_keep_actor_running() {
        let mut config = make_test_config();
        config.console.dialect = crate::address::ConsoleDialect::Gma;
        let (handle, _events) = BridgeActor::spawn(Bridge::new(config).unwrap());

        let results = handle
            .evaluate_many(vec![
                FeedbackRequest::Active {
                    exec: i64::MIN,
                    page: None,
                    active: false,
                },
                FeedbackRequest::Paused {
                    exec: i64::MAX,
                    page: Some(i64::MAX),
                    paused: false,
                },
            ])
            .await;
        assert_eq!(results, vec![false, false]);

        assert!(handle.is_alive());
        let snapshot = handle.snapshot().await.unwrap();
        // Only the tracked executor is in the table
        assert_eq!(snapshot.executors.len(), 1);
        assert_eq!(
            handle.dispatch(Action::Fire { macro_number: 300 }).await,
            Err(BridgeError::bad_parameter("macro", 300, "must be within 1..=255"))
        );

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_ingest_then_evaluate_in_order() {
        let bridge = Bridge::new(make_test_config()).unwrap();
        let (handle, mut events) = BridgeActor::spawn(bridge);

        handle.ingest(InboundMessage::broadcast(InboundEvent::Goto {
            address: RawAddress::new(5, 1),
            cue: Some(12.5),
        }));

        // Queued behind the ingest, so it sees the new state
        assert!(
            handle
                .evaluate(FeedbackRequest::Cue {
                    exec: 5,
                    page: Some(1),
                    cue: "12.5".into()
                })
                .await
        );

        let report = loop {
            match events.recv().await {
                Some(BridgeEvent::Ingested(report)) => break report,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        };
        assert!(report.affected.contains(&FeedbackClass::Cue));
        assert_eq!(report.variables.len(), 3);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_and_status_events() {
        let bridge = Bridge::new(make_test_config()).unwrap();
        let (handle, mut events) = BridgeActor::spawn(bridge);
        let tx = RecordingTransmitter::new();

        handle.attach_transmitter(Arc::new(tx.clone()));
        let outcome = handle
            .dispatch(Action::Off {
                exec: 5,
                page: None,
            })
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Sent(_)));
        assert_eq!(
            tx.sent(),
            vec![OutboundCommand::Off {
                exec: crate::address::ExecKey::new(1, 5)
            }]
        );
        assert_eq!(
            events.recv().await,
            Some(BridgeEvent::Status(LinkStatus::Ok))
        );

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.has_transmitter);
        assert_eq!(snapshot.status, LinkStatus::Ok);
        assert_eq!(snapshot.variables.len(), 4);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_reconfigure_returns_new_variables() {
        let bridge = Bridge::new(make_test_config()).unwrap();
        let (handle, _events) = BridgeActor::spawn(bridge);

        let mut config = make_test_config();
        config.tracked_executors = "1,2".to_string();
        let definitions = handle
            .reconfigure(config, Some(Arc::new(RecordingTransmitter::new())))
            .await
            .unwrap();
        assert_eq!(definitions.len(), 8);

        let mut bad = make_test_config();
        bad.transmitter.port = Some(80);
        assert!(handle.reconfigure(bad, None).await.is_err());

        // The failed attempt left the previous configuration in place
        assert_eq!(handle.variable_definitions().await.len(), 8);
        assert!(handle.snapshot().await.unwrap().has_transmitter);

        handle.shutdown();
    }
}
