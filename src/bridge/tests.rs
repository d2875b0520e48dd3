//! Tests for the Bridge

use super::*;
use crate::dispatch::FaderMode;
use crate::ingest::{InboundEvent, RawAddress};
use crate::transmitter::{OutboundCommand, RecordingTransmitter};
use serde_json::json;

fn make_test_config(tracked: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.transmitter.port = Some(6004);
    config.receiver.port = Some(6005);
    config.receiver.enabled = true;
    config.tracked_executors = tracked.to_string();
    config
}

fn message(event: InboundEvent) -> InboundMessage {
    InboundMessage::broadcast(event)
}

#[test]
fn test_new_binds_tracked_executors() {
    let bridge = Bridge::new(make_test_config("5,7.2")).unwrap();

    assert_eq!(
        bridge.tracked(),
        &[ExecKey::new(1, 5), ExecKey::new(2, 7)]
    );
    assert!(bridge.table().get(&ExecKey::new(2, 7)).has_variable_binding);
    assert_eq!(bridge.variable_definitions().len(), 8);
    assert_eq!(bridge.status(), LinkStatus::Initializing);
}

#[test]
fn test_new_rejects_invalid_config() {
    assert!(Bridge::new(make_test_config("nope")).is_err());
}

#[test]
fn test_dispatch_without_transmitter_is_noop() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();
    assert_eq!(
        bridge.dispatch(&Action::Fire { macro_number: 1 }).unwrap(),
        DispatchOutcome::LinkUnavailable
    );
}

#[test]
fn test_relative_fader_uses_ingested_position() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();
    let tx = RecordingTransmitter::new();
    bridge.attach_transmitter(Arc::new(tx.clone()));

    bridge
        .ingest(&message(InboundEvent::Fader {
            address: RawAddress::new(5, 1),
            percent: 95.0,
        }))
        .unwrap();

    bridge
        .dispatch(&Action::Fader {
            percent: 10.0,
            mode: FaderMode::Increase,
            exec: 5,
            page: Some(1),
            fade: None,
        })
        .unwrap();

    assert_eq!(
        tx.sent(),
        vec![OutboundCommand::Fader {
            percent: 100.0,
            exec: ExecKey::new(1, 5),
            fade: None
        }]
    );
}

#[test]
fn test_transport_fault_keeps_state() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();
    let tx = RecordingTransmitter::new();
    bridge.attach_transmitter(Arc::new(tx.clone()));
    bridge.attach_receiver();
    assert_eq!(bridge.status(), LinkStatus::Ok);

    bridge
        .ingest(&message(InboundEvent::Goto {
            address: RawAddress::new(5, 1),
            cue: Some(2.0),
        }))
        .unwrap();

    tx.fail_next("connection reset");
    let err = bridge.dispatch(&Action::Pause { exec: 5, page: None }).unwrap_err();
    assert!(matches!(err, BridgeError::TransportFault(_)));
    assert!(!bridge.has_transmitter());
    assert!(matches!(bridge.status(), LinkStatus::Error(_)));

    // Evaluation still answers from the cached state
    assert!(bridge.evaluate(&FeedbackRequest::Active {
        exec: 5,
        page: Some(1),
        active: true
    }));

    // Further actions are silent no-ops until a transmitter is back
    assert_eq!(
        bridge.dispatch(&Action::Pause { exec: 5, page: None }).unwrap(),
        DispatchOutcome::LinkUnavailable
    );
}

#[test]
fn test_foreign_device_is_protocol_warning() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();

    let result = bridge.ingest(&InboundMessage {
        device_id: 42,
        event: InboundEvent::Off {
            address: RawAddress::new(5, 1),
        },
    });

    assert!(matches!(result, Err(BridgeError::ProtocolWarning(_))));
    assert!(bridge.table().is_empty());
}

#[test]
fn test_reconfigure_resets_table() {
    let mut bridge = Bridge::new(make_test_config("5")).unwrap();
    bridge.attach_transmitter(Arc::new(RecordingTransmitter::new()));
    bridge
        .ingest(&message(InboundEvent::Pause {
            address: RawAddress::new(9, 1),
        }))
        .unwrap();
    assert_eq!(bridge.table().len(), 2);

    bridge.reconfigure(make_test_config("6")).unwrap();

    assert_eq!(bridge.table().len(), 1);
    assert!(bridge.table().get(&ExecKey::new(1, 6)).has_variable_binding);
    assert!(!bridge.table().get(&ExecKey::new(1, 5)).has_variable_binding);
    assert!(!bridge.has_transmitter());
}

#[test]
fn test_failed_reconfigure_keeps_previous_state() {
    let mut bridge = Bridge::new(make_test_config("5")).unwrap();
    bridge
        .ingest(&message(InboundEvent::Pause {
            address: RawAddress::new(5, 1),
        }))
        .unwrap();

    assert!(bridge.reconfigure(make_test_config("x")).is_err());
    assert_eq!(bridge.tracked(), &[ExecKey::new(1, 5)]);
    assert_eq!(bridge.table().get(&ExecKey::new(1, 5)).paused, Some(true));
}

#[test]
fn test_variable_values() {
    let mut bridge = Bridge::new(make_test_config("5")).unwrap();
    bridge
        .ingest(&message(InboundEvent::Fader {
            address: RawAddress::new(5, 1),
            percent: 12.2,
        }))
        .unwrap();

    let values = bridge.variable_values();
    assert_eq!(values.len(), 4);
    assert_eq!(values[0].name, "1.5_active");
    assert_eq!(values[0].value, serde_json::Value::Null);
    assert_eq!(values[3].name, "1.5_fader");
    assert_eq!(values[3].value, json!(12));
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

fn fader_feedback(operator: crate::feedback::Operator, value: f64) -> FeedbackRequest {
    FeedbackRequest::Fader {
        exec: 5,
        page: Some(1),
        operator,
        fader: value,
    }
}

fn bridge_with_recorder(tracked: &str) -> (Bridge, RecordingTransmitter) {
    let mut bridge = Bridge::new(make_test_config(tracked)).unwrap();
    let tx = RecordingTransmitter::new();
    bridge.attach_transmitter(Arc::new(tx.clone()));
    (bridge, tx)
}

#[test]
fn test_relative_fader_without_baseline_sends_nothing() {
    let (mut bridge, tx) = bridge_with_recorder("");

    let outcome = bridge
        .dispatch(&Action::Fader {
            percent: 10.0,
            mode: FaderMode::Increase,
            exec: 5,
            page: Some(1),
            fade: None,
        })
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::NoFaderBaseline(ExecKey::new(1, 5)));
    assert!(tx.sent().is_empty());
}

#[test]
fn test_relative_fader_decrease_clamps_to_zero() {
    let (mut bridge, tx) = bridge_with_recorder("");
    bridge
        .ingest(&message(InboundEvent::Fader {
            address: RawAddress::new(5, 1),
            percent: 5.0,
        }))
        .unwrap();

    bridge
        .dispatch(&Action::Fader {
            percent: 10.0,
            mode: FaderMode::Decrease,
            exec: 5,
            page: None,
            fade: Some(1.5),
        })
        .unwrap();

    assert_eq!(
        tx.sent(),
        vec![OutboundCommand::Fader {
            percent: 0.0,
            exec: ExecKey::new(1, 5),
            fade: Some(1.5)
        }]
    );
}

#[test]
fn test_goto_cue_feedback() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();
    bridge
        .ingest(&message(InboundEvent::Goto {
            address: RawAddress::new(5, 1),
            cue: Some(12.5),
        }))
        .unwrap();

    let cue = |cue: &str| FeedbackRequest::Cue {
        exec: 5,
        page: Some(1),
        cue: cue.to_string(),
    };
    assert!(bridge.evaluate(&cue("12.5")));
    assert!(!bridge.evaluate(&cue("12")));
}

#[test]
fn test_rounded_fader_feedback() {
    use crate::feedback::Operator;

    let mut bridge = Bridge::new(make_test_config("")).unwrap();
    bridge
        .ingest(&message(InboundEvent::Fader {
            address: RawAddress::new(5, 1),
            percent: 47.6,
        }))
        .unwrap();

    assert_eq!(bridge.table().get(&ExecKey::new(1, 5)).fader, Some(48));
    assert!(bridge.evaluate(&fader_feedback(Operator::Ge, 48.0)));
    assert!(!bridge.evaluate(&fader_feedback(Operator::Gt, 48.0)));
}

#[test]
fn test_off_after_goto_and_fader() {
    use crate::feedback::Operator;

    let mut bridge = Bridge::new(make_test_config("5")).unwrap();
    let address = RawAddress::new(5, 1);

    bridge
        .ingest(&message(InboundEvent::Goto {
            address,
            cue: Some(4.0),
        }))
        .unwrap();
    bridge
        .ingest(&message(InboundEvent::Pause { address }))
        .unwrap();
    bridge
        .ingest(&message(InboundEvent::Fader {
            address,
            percent: 80.0,
        }))
        .unwrap();

    let active = FeedbackRequest::Active {
        exec: 5,
        page: Some(1),
        active: true,
    };
    assert!(bridge.evaluate(&active));

    let report = bridge.ingest(&message(InboundEvent::Off { address })).unwrap();

    // Off means inactive, not paused and fader down
    assert!(!bridge.evaluate(&active));
    assert!(bridge.evaluate(&FeedbackRequest::Paused {
        exec: 5,
        page: Some(1),
        paused: false
    }));
    assert!(bridge.evaluate(&fader_feedback(Operator::Eq, 0.0)));
    assert!(active.needs_refresh(&report.affected));
    assert!(!FeedbackRequest::Cue {
        exec: 5,
        page: Some(1),
        cue: "4".into()
    }
    .needs_refresh(&report.affected));

    assert_eq!(
        report.variables,
        vec![
            VariableUpdate {
                name: "1.5_active".into(),
                value: json!(false)
            },
            VariableUpdate {
                name: "1.5_paused".into(),
                value: json!(false)
            },
            VariableUpdate {
                name: "1.5_fader".into(),
                value: json!(0)
            },
        ]
    );
}

#[test]
fn test_gma_dialect_end_to_end() {
    let mut config = make_test_config("6");
    config.console.dialect = ConsoleDialect::Gma;
    let mut bridge = Bridge::new(config).unwrap();
    let tx = RecordingTransmitter::new();
    bridge.attach_transmitter(Arc::new(tx.clone()));

    // Console executor 6 is wire executor 5
    assert_eq!(bridge.tracked(), &[ExecKey::new(1, 5)]);

    bridge.dispatch(&Action::Pause { exec: 6, page: None }).unwrap();
    assert_eq!(
        tx.sent(),
        vec![OutboundCommand::Pause {
            exec: ExecKey::new(1, 5)
        }]
    );

    bridge
        .ingest(&message(InboundEvent::Pause {
            address: RawAddress::new(5, 1),
        }))
        .unwrap();
    assert!(bridge.evaluate(&FeedbackRequest::Paused {
        exec: 6,
        page: Some(1),
        paused: true
    }));
}

#[test]
fn test_bad_parameter_reported_with_link_down() {
    let mut bridge = Bridge::new(make_test_config("")).unwrap();

    let err = bridge
        .dispatch(&Action::Goto {
            cue: "01".into(),
            exec: 5,
            page: None,
            fade: None,
        })
        .unwrap_err();
    assert!(err.is_bad_parameter());

    let err = bridge.dispatch(&Action::Fire { macro_number: 0 }).unwrap_err();
    assert!(err.is_bad_parameter());
}

#[test]
fn test_executor_zero_top_level_on_dispatch() {
    let (mut bridge, tx) = bridge_with_recorder("");

    bridge.dispatch(&Action::Off { exec: 0, page: Some(3) }).unwrap();
    assert_eq!(
        tx.sent(),
        vec![OutboundCommand::Off {
            exec: ExecKey::new(0, 0)
        }]
    );
}
