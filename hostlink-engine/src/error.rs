//! Engine error types.

use hostlink_protocol::{ErrorReason, ProtocolError};
use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport is closed")]
    TransportClosed,

    #[error("application not found: {0}")]
    AppNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("exit refused: {0}")]
    ExitRefused(String),
}

impl EngineError {
    /// Maps this error to the numeric reason carried in an error response.
    pub fn wire_reason(&self) -> ErrorReason {
        match self {
            EngineError::AppNotFound(_) => ErrorReason::NotFound,
            EngineError::InvalidArgs(_) | EngineError::Protocol(_) => ErrorReason::Args,
            EngineError::Io(_) | EngineError::TransportClosed | EngineError::ExitRefused(_) => {
                ErrorReason::Internal
            }
        }
    }
}
