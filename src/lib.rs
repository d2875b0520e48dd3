//! MSC Bridge - MIDI Show Control executor state bridge
//!
//! Turns control-surface actions into MSC commands for a lighting console and
//! mirrors the console's executor state from inbound MSC traffic, so button
//! feedback and host variables follow what the console is actually doing.

pub mod address;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod ingest;
pub mod state;
pub mod status;
pub mod transmitter;

pub use bridge::{Bridge, BridgeActor, BridgeEvent, BridgeHandle};
pub use error::{BridgeError, BridgeResult};
