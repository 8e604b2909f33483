//! Background poll loop.
//!
//! One thread exclusively owns the transport, accumulator and dispatcher.
//! It reads bounded chunks, drains decoded messages through the dispatcher
//! and answers anything left unhandled with a generic error, so a remote
//! controller never blocks forever waiting for a reply. Polling starts fast
//! for the first seconds of life (an early "give me this link" request is
//! serviced promptly) and then relaxes to reduce CPU usage.

use crate::config::EngineConfig;
use crate::dispatch::MessageDispatcher;
use crate::transport::{ReadTimeout, Transport};
use hostlink_protocol::{ErrorReason, Message, ReceiveAccumulator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Callback offered every request the dispatcher left unanswered.
///
/// Return `true` to claim the message (e.g. a forwarded Key/Touch event the
/// embedding application consumed); unclaimed messages get the generic
/// "unsupported command" error reply.
pub type UnhandledHook = Box<dyn FnMut(&mut Message) -> bool + Send>;

/// Handle to the background poll thread.
///
/// Dropping the handle also stops and joins the thread; the transport is
/// only touched again by whoever receives it back after the join.
pub struct PollLoop {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    /// Spawns the loop thread.
    pub fn spawn<T: Transport + 'static>(
        dispatcher: MessageDispatcher,
        transport: T,
        config: EngineConfig,
    ) -> Self {
        Self::spawn_with_hook(dispatcher, transport, config, None)
    }

    /// Spawns the loop thread with an unhandled-message hook.
    pub fn spawn_with_hook<T: Transport + 'static>(
        dispatcher: MessageDispatcher,
        transport: T,
        config: EngineConfig,
        hook: Option<UnhandledHook>,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let token = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("hostlink-poll".into())
            .spawn(move || run(dispatcher, transport, config, token, hook))
            .expect("failed to spawn poll thread");

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// The cancellation flag; setting it stops the loop at the next
    /// iteration boundary.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Signals cancellation and joins the loop thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: Transport>(
    dispatcher: MessageDispatcher,
    mut transport: T,
    config: EngineConfig,
    cancel: Arc<AtomicBool>,
    mut hook: Option<UnhandledHook>,
) {
    let codec = *dispatcher.codec();
    let mut accum = ReceiveAccumulator::with_codec(codec, config.accumulator_capacity);
    let started = Instant::now();
    info!(magic = %format_args!("{:#010x}", codec.magic()), "poll loop started");

    while !cancel.load(Ordering::Acquire) {
        let timeout = if started.elapsed() < config.fast_window() {
            config.fast_poll()
        } else {
            config.slow_poll()
        };

        match transport.read(config.read_chunk, ReadTimeout::Bounded(timeout)) {
            Ok(bytes) if !bytes.is_empty() => {
                if let Err(err) = accum.push(&bytes) {
                    warn!(error = %err, "receive buffer overflow, dropping buffered bytes");
                    accum.clear();
                    if accum.push(&bytes).is_err() {
                        warn!(len = bytes.len(), "read chunk exceeds accumulator capacity");
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "transport read failed");
                thread::sleep(timeout);
                continue;
            }
        }

        // Drain everything decodable. A None that shrank the buffer was
        // discarded garbage; keep scanning for the frame behind it.
        loop {
            let before = accum.len();
            match accum.try_decode() {
                Some(mut msg) => handle_message(&dispatcher, &mut transport, &mut hook, &mut msg),
                None => {
                    if accum.len() == before {
                        break;
                    }
                }
            }
        }
    }

    info!("poll loop stopped");
}

fn handle_message<T: Transport>(
    dispatcher: &MessageDispatcher,
    transport: &mut T,
    hook: &mut Option<UnhandledHook>,
    msg: &mut Message,
) {
    if msg.is_response() {
        debug!(cmd = msg.cmd(), report = msg.is_report(), "dropping unsolicited response");
        return;
    }

    if let Err(err) = dispatcher.dispatch(msg, transport) {
        warn!(cmd = msg.cmd(), error = %err, "dispatch failed");
    }
    if msg.was_replied() {
        return;
    }

    if let Some(hook) = hook.as_mut() {
        if hook(msg) {
            debug!(cmd = msg.cmd(), "message claimed by embedding hook");
            return;
        }
    }

    let codec = dispatcher.codec();
    match codec.encode_resp_err(msg.cmd(), ErrorReason::Args, "unsupported command") {
        Ok(frame) => {
            if let Err(err) = transport.write(&frame) {
                warn!(cmd = msg.cmd(), error = %err, "failed to send fallback error");
            } else {
                msg.mark_replied();
            }
        }
        Err(err) => warn!(error = %err, "failed to encode fallback error"),
    }
}
