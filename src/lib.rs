//! # hostlink
//!
//! A point-to-point, length-framed binary command/response protocol for
//! talking to an embedded device over a serial-class byte link.
//!
//! The facade re-exports the two workspace crates:
//! - [`protocol`]: framing, CRC, the receive accumulator and the message model
//! - [`engine`]: dispatcher, poll loop, transport and registry seams, config
//!
//! ## Quick start
//!
//! ```
//! use hostlink::engine::{
//!     AppDescriptor, EngineConfig, LoopbackTransport, MessageDispatcher, PollLoop,
//!     StaticRegistry,
//! };
//! use hostlink::protocol::FrameCodec;
//! use parking_lot::Mutex;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Mutex::new(StaticRegistry::new(vec![AppDescriptor::new(
//!     "launcher", "Launcher", "Home screen", "/apps/launcher",
//! )])));
//! let exit_flag = Arc::new(AtomicBool::new(false));
//! let dispatcher = MessageDispatcher::new(FrameCodec::default(), registry, exit_flag);
//!
//! let (device_end, _controller_end) = LoopbackTransport::pair();
//! let poll = PollLoop::spawn(dispatcher, device_end, EngineConfig::default());
//! poll.stop();
//! ```

pub use hostlink_engine as engine;
pub use hostlink_protocol as protocol;
