//! Error taxonomy for the executor bridge
//!
//! Validation failures are reported to the caller immediately. Link and
//! transport problems are instance-level conditions: they are logged and turned
//! into status changes instead of bubbling through feedback evaluation.

use thiserror::Error;

/// Errors surfaced by bridge operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// An action option is outside its declared numeric or format bounds
    #[error("bad parameter '{field}' = {value}: {reason}")]
    BadParameter {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// No transmitter or receiver is currently bound
    #[error("link unavailable")]
    LinkUnavailable,

    /// Non-fatal inbound decode issue (message outside our device/group scope, ...)
    #[error("protocol warning: {0}")]
    ProtocolWarning(String),

    /// Underlying socket failure, the link has to be reinitialized
    #[error("transport fault: {0}")]
    TransportFault(String),
}

impl BridgeError {
    pub fn bad_parameter(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        BridgeError::BadParameter {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error should be shown to the user as a configuration error
    pub fn is_bad_parameter(&self) -> bool {
        matches!(self, BridgeError::BadParameter { .. })
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
