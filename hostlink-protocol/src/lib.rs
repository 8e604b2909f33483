//! # hostlink-protocol
//!
//! Wire protocol core for hostlink, the command/response link between an
//! embedded device and its external controller.
//!
//! This crate provides:
//! - Binary framing with a sync magic, length prefix and CRC-16/ARC trailer
//! - A receive accumulator that resynchronizes across garbage and partial reads
//! - The decoded [`Message`] model and the built-in command id space
//! - Protocol error types and on-wire error reason codes

pub mod accum;
pub mod crc;
pub mod error;
pub mod frame;
pub mod message;

pub use accum::ReceiveAccumulator;
pub use error::{ErrorReason, ProtocolError};
pub use frame::{DecodeOutcome, FrameCodec, FrameFlags, FRAME_OVERHEAD};
pub use message::{BuiltinCommand, Message, CMD_APP_MAX};

/// Protocol version carried in the low bits of the flags byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default frame synchronization magic.
pub const DEFAULT_MAGIC: u32 = 0xBBAC_CAAA;

/// Maximum body size accepted in a single frame (8 KiB).
///
/// The link is a serial-class byte stream; a length field claiming more
/// than this is treated as line noise rather than a frame to wait for.
pub const MAX_BODY_SIZE: usize = 8 * 1024;
