//! Protocol error types and on-wire error reason codes.

use thiserror::Error;

/// Errors surfaced by the framing layer.
///
/// Note that a failed decode is not an error: corrupt or partial frames are
/// handled inside [`crate::ReceiveAccumulator`] by discarding and
/// resynchronizing, so only caller mistakes and capacity limits appear here.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("accumulator full: {len} buffered + {incoming} incoming exceeds capacity {capacity}")]
    BufferFull {
        len: usize,
        incoming: usize,
        capacity: usize,
    },

    #[error("unknown error reason code: {0}")]
    UnknownReason(u8),

    #[error("not a built-in command id: {0:#04x}")]
    NotBuiltin(u8),
}

/// Numeric reason codes carried in error response frames.
///
/// These values are part of the wire contract and must remain stable.
/// Zero is reserved so an error frame never carries an all-zero reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorReason {
    /// Malformed or unsupported request arguments.
    Args = 1,
    /// The referenced application or index does not exist.
    NotFound = 2,
    /// The device failed internally while servicing the request.
    Internal = 3,
}

impl From<ErrorReason> for u8 {
    fn from(reason: ErrorReason) -> u8 {
        reason as u8
    }
}

impl TryFrom<u8> for ErrorReason {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErrorReason::Args),
            2 => Ok(ErrorReason::NotFound),
            3 => Ok(ErrorReason::Internal),
            _ => Err(ProtocolError::UnknownReason(value)),
        }
    }
}
