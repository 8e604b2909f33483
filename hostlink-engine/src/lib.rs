//! # hostlink-engine
//!
//! Device-side engine for the hostlink protocol.
//!
//! This crate provides:
//! - The [`Transport`] seam over the physical byte link (serial or otherwise)
//! - The [`AppRegistry`] collaborator seam for the application lifecycle
//! - [`MessageDispatcher`], which answers the built-in command set
//! - [`PollLoop`], a single owner thread that reads, decodes, dispatches
//!   and auto-answers anything left unhandled
//! - Layered YAML/env configuration
//!
//! The engine is deliberately single-threaded per link: one thread owns the
//! accumulator, dispatcher and transport, and everyone else talks to it
//! through the cancellation token and the shared exit flag.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod poll;
pub mod registry;
pub mod transport;

pub use config::EngineConfig;
pub use dispatch::MessageDispatcher;
pub use error::EngineError;
pub use poll::PollLoop;
pub use registry::{AppDescriptor, AppRegistry, StaticRegistry};
pub use transport::{LoopbackTransport, ReadTimeout, Transport};
