//! Built-in command dispatch.
//!
//! Turns a decoded request into zero or one reply. The closed built-in set
//! (AppList, StartApp, ExitApp, CurAppInfo, AppInfo) is answered here using
//! the registry collaborator; SetReport, Key, Touch and every unrecognized
//! id are left untouched for the embedding application or the poll loop's
//! generic fallback. Responses and reports given as input are ignored.

use crate::error::EngineError;
use crate::registry::AppRegistry;
use crate::transport::Transport;
use hostlink_protocol::{BuiltinCommand, FrameCodec, Message};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared handle to the registry collaborator.
pub type SharedRegistry = Arc<Mutex<dyn AppRegistry>>;

/// Device-side dispatcher for the built-in command table.
pub struct MessageDispatcher {
    codec: FrameCodec,
    registry: SharedRegistry,
    exit_flag: Arc<AtomicBool>,
}

impl MessageDispatcher {
    /// Creates a dispatcher.
    ///
    /// `exit_flag` is the process-wide "please shut down" flag set when the
    /// controller sends ExitApp and the registry accepts it.
    pub fn new(codec: FrameCodec, registry: SharedRegistry, exit_flag: Arc<AtomicBool>) -> Self {
        Self {
            codec,
            registry,
            exit_flag,
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit_flag)
    }

    /// Dispatches one decoded message.
    ///
    /// When a built-in command is recognized and answered (ok or error),
    /// the reply is written through `transport` and the message is marked
    /// replied. Transport write failures propagate; everything else is
    /// answered on the wire rather than raised.
    pub fn dispatch(
        &self,
        msg: &mut Message,
        transport: &mut dyn Transport,
    ) -> Result<(), EngineError> {
        if msg.is_response() {
            debug!(cmd = msg.cmd(), report = msg.is_report(), "ignoring inbound response");
            return Ok(());
        }

        let outcome = match msg.builtin() {
            Some(BuiltinCommand::AppList) => self.handle_app_list(),
            Some(BuiltinCommand::StartApp) => self.handle_start_app(msg.body()),
            Some(BuiltinCommand::ExitApp) => self.handle_exit_app(),
            Some(BuiltinCommand::CurAppInfo) => self.handle_cur_app_info(),
            Some(BuiltinCommand::AppInfo) => self.handle_app_info(msg.body()),
            // Input events and report toggles belong to the embedding app.
            Some(BuiltinCommand::SetReport)
            | Some(BuiltinCommand::Key)
            | Some(BuiltinCommand::Touch)
            | None => return Ok(()),
        };

        let frame = match outcome {
            Ok(body) => self.codec.encode_resp_ok(msg.cmd(), &body)?,
            Err(err) => {
                debug!(cmd = msg.cmd(), error = %err, "built-in command failed");
                self.codec
                    .encode_resp_err(msg.cmd(), err.wire_reason(), &err.to_string())?
            }
        };
        transport.write(&frame)?;
        msg.mark_replied();
        Ok(())
    }

    /// AppList: count byte, then each id NUL-terminated.
    fn handle_app_list(&self) -> Result<Vec<u8>, EngineError> {
        let apps = self.registry.lock().list_apps();
        let count = apps.len().min(u8::MAX as usize);

        let mut body = vec![count as u8];
        for app in apps.iter().take(count) {
            push_cstr(&mut body, &app.id);
        }
        Ok(body)
    }

    /// StartApp: index byte (0xFF = use id string) + id [+ start argument],
    /// both NUL-terminated.
    fn handle_start_app(&self, body: &[u8]) -> Result<Vec<u8>, EngineError> {
        let (index, rest) = body
            .split_first()
            .ok_or_else(|| EngineError::InvalidArgs("missing index byte".into()))?;
        let tokens = parse_cstrs(rest)?;
        if tokens.is_empty() || tokens.len() > 2 {
            return Err(EngineError::InvalidArgs(format!(
                "expected 1 or 2 strings, got {}",
                tokens.len()
            )));
        }

        let id = if *index == 0xFF {
            if tokens[0].is_empty() {
                return Err(EngineError::InvalidArgs("empty app id".into()));
            }
            tokens[0].clone()
        } else {
            let apps = self.registry.lock().list_apps();
            apps.get(*index as usize)
                .map(|app| app.id.clone())
                .ok_or_else(|| EngineError::AppNotFound(format!("index {}", index)))?
        };
        let start_arg = tokens.get(1).map(String::as_str);

        self.registry.lock().switch_app(&id, start_arg)?;
        Ok(Vec::new())
    }

    /// ExitApp: empty body; sets the shared exit flag on success.
    fn handle_exit_app(&self) -> Result<Vec<u8>, EngineError> {
        self.registry.lock().request_exit()?;
        self.exit_flag.store(true, Ordering::Release);
        Ok(Vec::new())
    }

    /// CurAppInfo: index byte (0xFF if the current id is not in the
    /// registry or sits beyond the one-byte index range) + NUL-terminated
    /// current id.
    fn handle_cur_app_info(&self) -> Result<Vec<u8>, EngineError> {
        let registry = self.registry.lock();
        let current = registry.current_app_id();
        let index = registry
            .list_apps()
            .iter()
            .position(|app| app.id == current)
            .map_or(0xFF, index_byte);

        let mut body = vec![index];
        push_cstr(&mut body, &current);
        Ok(body)
    }

    /// AppInfo: index byte (0xFF = resolve by the id string that follows);
    /// replies index + id + name + description, all NUL-terminated.
    ///
    /// Unresolvable apps answer with an argument error, not NotFound: the
    /// query itself named something that does not exist.
    fn handle_app_info(&self, body: &[u8]) -> Result<Vec<u8>, EngineError> {
        let (index, rest) = body
            .split_first()
            .ok_or_else(|| EngineError::InvalidArgs("missing index byte".into()))?;
        let apps = self.registry.lock().list_apps();

        let position = if *index == 0xFF {
            let tokens = parse_cstrs(rest)?;
            let id = match tokens.as_slice() {
                [id] if !id.is_empty() => id,
                _ => return Err(EngineError::InvalidArgs("expected one app id".into())),
            };
            apps.iter()
                .position(|app| &app.id == id)
                .ok_or_else(|| EngineError::InvalidArgs(format!("unknown app id: {}", id)))?
        } else {
            let i = *index as usize;
            if i >= apps.len() {
                return Err(EngineError::InvalidArgs(format!(
                    "app index out of range: {}",
                    index
                )));
            }
            i
        };

        let app = &apps[position];
        let mut body = vec![index_byte(position)];
        push_cstr(&mut body, &app.id);
        push_cstr(&mut body, &app.name);
        push_cstr(&mut body, &app.description);
        Ok(body)
    }
}

/// Registry positions at or above 0xFF cannot be addressed by a one-byte
/// index; they are reported as the 0xFF sentinel, never clamped onto a
/// real index.
fn index_byte(position: usize) -> u8 {
    if position < 0xFF {
        position as u8
    } else {
        0xFF
    }
}

fn push_cstr(body: &mut Vec<u8>, s: &str) {
    body.extend_from_slice(s.as_bytes());
    body.push(0);
}

/// Parses a run of NUL-terminated strings.
///
/// Empty input yields no tokens; non-empty input must end with a NUL.
fn parse_cstrs(data: &[u8]) -> Result<Vec<String>, EngineError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let Some((&0, inner)) = data.split_last() else {
        return Err(EngineError::InvalidArgs("unterminated string".into()));
    };
    inner
        .split(|&b| b == 0)
        .map(|token| {
            String::from_utf8(token.to_vec())
                .map_err(|_| EngineError::InvalidArgs("invalid UTF-8 in string".into()))
        })
        .collect()
}
