//! Transport seam over the physical byte link.
//!
//! The engine never touches a serial port directly; it consumes anything
//! implementing [`Transport`]. A [`LoopbackTransport`] pair is provided for
//! tests and in-process embedders.

use crate::error::EngineError;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// How long a [`Transport::read`] may wait for bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// Drain whatever is immediately available, never wait.
    NonBlocking,
    /// Wait up to the given duration for the first byte.
    Bounded(Duration),
    /// Wait indefinitely for the first byte.
    Blocking,
}

/// A byte source/sink the protocol engine is built on.
///
/// Implementations are exclusively owned by one loop thread; nothing here
/// is required to be reentrant.
pub trait Transport: Send {
    fn open(&mut self) -> Result<(), EngineError>;

    fn close(&mut self) -> Result<(), EngineError>;

    fn is_open(&self) -> bool;

    /// Reads up to `max_len` bytes. An empty result means the timeout
    /// elapsed with nothing available; it is not an error.
    fn read(&mut self, max_len: usize, timeout: ReadTimeout) -> Result<Vec<u8>, EngineError>;

    /// Writes `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, EngineError>;
}

/// In-process transport over a pair of bounded channels.
///
/// [`LoopbackTransport::pair`] returns two connected ends; what one end
/// writes, the other reads. Chunks larger than a read's `max_len` are
/// carried over to subsequent reads, mimicking a serial FIFO.
#[derive(Debug)]
pub struct LoopbackTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    open: bool,
}

impl LoopbackTransport {
    /// Creates two connected transport ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        (
            Self {
                tx: a_tx,
                rx: b_rx,
                pending: VecDeque::new(),
                open: true,
            },
            Self {
                tx: b_tx,
                rx: a_rx,
                pending: VecDeque::new(),
                open: true,
            },
        )
    }

    fn take_pending(&mut self, max_len: usize) -> Vec<u8> {
        let n = max_len.min(self.pending.len());
        self.pending.drain(..n).collect()
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self) -> Result<(), EngineError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self, max_len: usize, timeout: ReadTimeout) -> Result<Vec<u8>, EngineError> {
        if !self.open {
            return Err(EngineError::TransportClosed);
        }
        if !self.pending.is_empty() {
            return Ok(self.take_pending(max_len));
        }

        let chunk = match timeout {
            ReadTimeout::NonBlocking => match self.rx.try_recv() {
                Ok(chunk) => chunk,
                Err(TryRecvError::Empty) => return Ok(Vec::new()),
                Err(TryRecvError::Disconnected) => return Err(EngineError::TransportClosed),
            },
            ReadTimeout::Bounded(limit) => match self.rx.recv_timeout(limit) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::TransportClosed),
            },
            ReadTimeout::Blocking => self
                .rx
                .recv()
                .map_err(|_| EngineError::TransportClosed)?,
        };

        self.pending.extend(chunk);
        Ok(self.take_pending(max_len))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, EngineError> {
        if !self.open {
            return Err(EngineError::TransportClosed);
        }
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| EngineError::TransportClosed)?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_roundtrip() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write(b"hello").unwrap();
        let read = b.read(64, ReadTimeout::NonBlocking).unwrap();
        assert_eq!(read, b"hello");
    }

    #[test]
    fn test_nonblocking_empty() {
        let (_a, mut b) = LoopbackTransport::pair();
        let read = b.read(64, ReadTimeout::NonBlocking).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_bounded_timeout_elapses() {
        let (_a, mut b) = LoopbackTransport::pair();
        let read = b
            .read(64, ReadTimeout::Bounded(Duration::from_millis(10)))
            .unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_small_reads_carry_over() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write(b"0123456789").unwrap();

        let first = b.read(4, ReadTimeout::NonBlocking).unwrap();
        let second = b.read(4, ReadTimeout::NonBlocking).unwrap();
        let third = b.read(4, ReadTimeout::NonBlocking).unwrap();
        assert_eq!(first, b"0123");
        assert_eq!(second, b"4567");
        assert_eq!(third, b"89");
    }

    #[test]
    fn test_closed_end_rejects_io() {
        let (mut a, _b) = LoopbackTransport::pair();
        a.close().unwrap();
        assert!(!a.is_open());
        assert!(matches!(
            a.read(16, ReadTimeout::NonBlocking),
            Err(EngineError::TransportClosed)
        ));
        assert!(matches!(
            a.write(b"x"),
            Err(EngineError::TransportClosed)
        ));

        a.open().unwrap();
        assert!(a.is_open());
        a.write(b"ok").unwrap();
    }

    #[test]
    fn test_peer_drop_is_closed() {
        let (a, mut b) = LoopbackTransport::pair();
        drop(a);
        assert!(matches!(
            b.read(16, ReadTimeout::NonBlocking),
            Err(EngineError::TransportClosed)
        ));
    }
}
