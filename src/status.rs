//! Instance link status
//!
//! Tracks the transmitter and receiver sides of the MSC link and folds them
//! into one instance-level status that the host can show.

use std::sync::Arc;
use tracing::{error, info};

/// Instance-level status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// No link configured or links closed
    Unknown,
    /// At least one configured side is not ready yet
    Initializing,
    /// Every configured side is ready
    Ok,
    /// A side went down after a transport fault
    Error(String),
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Unknown => write!(f, "unknown"),
            LinkStatus::Initializing => write!(f, "initializing"),
            LinkStatus::Ok => write!(f, "ok"),
            LinkStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// One direction of the MSC link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Transmitter,
    Receiver,
}

impl std::fmt::Display for LinkSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkSide::Transmitter => write!(f, "transmitter"),
            LinkSide::Receiver => write!(f, "receiver"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideState {
    Absent,
    Pending,
    Ready,
}

/// Type alias for status change callbacks
pub type StatusCallback = Arc<dyn Fn(LinkStatus) + Send + Sync>;

/// Folds per-side readiness into a [`LinkStatus`] and notifies subscribers on change
pub struct LinkMonitor {
    transmitter: SideState,
    receiver: SideState,
    fault: Option<String>,
    current: LinkStatus,
    callbacks: Vec<StatusCallback>,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self {
            transmitter: SideState::Absent,
            receiver: SideState::Absent,
            fault: None,
            current: LinkStatus::Unknown,
            callbacks: Vec::new(),
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.current.clone()
    }

    pub fn subscribe(&mut self, callback: StatusCallback) {
        self.callbacks.push(callback);
    }

    /// Start over with the given sides pending
    pub fn configure(&mut self, transmitter: bool, receiver: bool) {
        let pending = |on: bool| if on { SideState::Pending } else { SideState::Absent };
        self.transmitter = pending(transmitter);
        self.receiver = pending(receiver);
        self.fault = None;
        self.update();
    }

    pub fn mark_ready(&mut self, side: LinkSide) {
        *self.side_mut(side) = SideState::Ready;
        self.update();
    }

    /// A side failed and has been torn down
    pub fn fault(&mut self, side: LinkSide, reason: impl Into<String>) {
        let reason = reason.into();
        error!("MSC {} fault: {}", side, reason);
        *self.side_mut(side) = SideState::Absent;
        self.fault = Some(format!("{}: {}", side, reason));
        self.update();
    }

    /// Close both sides
    pub fn close(&mut self) {
        self.transmitter = SideState::Absent;
        self.receiver = SideState::Absent;
        self.fault = None;
        self.update();
    }

    fn side_mut(&mut self, side: LinkSide) -> &mut SideState {
        match side {
            LinkSide::Transmitter => &mut self.transmitter,
            LinkSide::Receiver => &mut self.receiver,
        }
    }

    fn compute(&self) -> LinkStatus {
        if let Some(reason) = &self.fault {
            return LinkStatus::Error(reason.clone());
        }

        let sides = [self.transmitter, self.receiver];
        if sides.iter().all(|s| *s == SideState::Absent) {
            LinkStatus::Unknown
        } else if sides.contains(&SideState::Pending) {
            LinkStatus::Initializing
        } else {
            LinkStatus::Ok
        }
    }

    fn update(&mut self) {
        let status = self.compute();
        if status == self.current {
            return;
        }

        info!("Link status: {} → {}", self.current, status);
        self.current = status.clone();
        for callback in &self.callbacks {
            callback(status.clone());
        }
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
