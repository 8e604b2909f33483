//! Receive-side accumulator.
//!
//! Decouples "bytes arrived from the transport" from "one complete frame
//! produced". Every [`ReceiveAccumulator::try_decode`] call either yields a
//! message or strictly shrinks (or holds) the buffer, so garbage on the
//! wire can never grow it without bound.

use crate::frame::{DecodeOutcome, FrameCodec};
use crate::message::Message;
use crate::{ProtocolError, MAX_BODY_SIZE};
use bytes::{Buf, BytesMut};

/// Default accumulator capacity (16 KiB).
///
/// Any single valid frame, maximal body and error code included, fits with
/// room for trailing bytes of the next one.
pub const DEFAULT_CAPACITY: usize = 2 * MAX_BODY_SIZE;

/// Fixed-capacity byte accumulator with frame resynchronization.
#[derive(Debug)]
pub struct ReceiveAccumulator {
    codec: FrameCodec,
    buf: BytesMut,
    capacity: usize,
}

impl ReceiveAccumulator {
    /// Creates an accumulator with the default codec and the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self::with_codec(FrameCodec::default(), capacity)
    }

    /// Creates an accumulator decoding with a specific codec (custom magic).
    pub fn with_codec(codec: FrameCodec, capacity: usize) -> Self {
        Self {
            codec,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends newly received bytes.
    ///
    /// Fails with [`ProtocolError::BufferFull`] if the append would exceed
    /// capacity; nothing is appended in that case.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if self.buf.len() + bytes.len() > self.capacity {
            return Err(ProtocolError::BufferFull {
                len: self.buf.len(),
                incoming: bytes.len(),
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Attempts one decode over the current contents.
    ///
    /// On success the frame's span (including any garbage prefix) is
    /// removed from the buffer. When the decoder reports discardable
    /// garbage, that prefix is removed and `None` is returned. An
    /// incomplete frame leaves the buffer untouched.
    pub fn try_decode(&mut self) -> Option<Message> {
        match self.codec.decode_at(&self.buf) {
            DecodeOutcome::Frame { message, consumed } => {
                self.buf.advance(consumed);
                Some(message)
            }
            DecodeOutcome::NoFrame { discard } => {
                self.buf.advance(discard.min(self.buf.len()));
                None
            }
            DecodeOutcome::Incomplete => None,
        }
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for ReceiveAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
