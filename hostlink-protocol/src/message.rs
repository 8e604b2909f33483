//! Decoded message model and the built-in command id space.

use crate::error::ProtocolError;
use crate::frame::FrameFlags;
use bytes::Bytes;

/// First command id reserved for built-ins.
///
/// Application-defined commands must use ids below this boundary; ids at or
/// above it belong to the device's built-in dispatch table.
pub const CMD_APP_MAX: u8 = 0xC8;

/// Built-in command ids answered (or deliberately passed through) by the
/// device-side dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BuiltinCommand {
    /// Toggle unsolicited report emission; consumed by the embedding app.
    SetReport = 0xF8,
    /// List installed applications.
    AppList = 0xF9,
    /// Start an application by index or id.
    StartApp = 0xFA,
    /// Ask the current application to exit.
    ExitApp = 0xFB,
    /// Query the currently running application.
    CurAppInfo = 0xFC,
    /// Query metadata for one application.
    AppInfo = 0xFD,
    /// Forwarded key event; consumed by the embedding app.
    Key = 0xFE,
    /// Forwarded touch event; consumed by the embedding app.
    Touch = 0xFF,
}

impl TryFrom<u8> for BuiltinCommand {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xF8 => Ok(BuiltinCommand::SetReport),
            0xF9 => Ok(BuiltinCommand::AppList),
            0xFA => Ok(BuiltinCommand::StartApp),
            0xFB => Ok(BuiltinCommand::ExitApp),
            0xFC => Ok(BuiltinCommand::CurAppInfo),
            0xFD => Ok(BuiltinCommand::AppInfo),
            0xFE => Ok(BuiltinCommand::Key),
            0xFF => Ok(BuiltinCommand::Touch),
            other => Err(ProtocolError::NotBuiltin(other)),
        }
    }
}

/// Returns whether `cmd` falls in the reserved built-in id range.
pub fn is_builtin_cmd(cmd: u8) -> bool {
    cmd >= CMD_APP_MAX
}

/// A decoded frame.
///
/// Created fresh on every successful decode. The body is an owned buffer
/// and may be replaced wholesale with [`Message::set_body`]. The replied
/// marker records whether the dispatcher already answered this message, so
/// a surrounding loop never double-answers it.
#[derive(Debug, Clone)]
pub struct Message {
    version: u8,
    flags: FrameFlags,
    cmd: u8,
    body: Bytes,
    error_code: Option<u8>,
    replied: bool,
}

impl Message {
    pub(crate) fn new(flags: FrameFlags, cmd: u8, body: Bytes, error_code: Option<u8>) -> Self {
        Self {
            version: flags.version(),
            flags,
            cmd,
            body,
            error_code,
            replied: false,
        }
    }

    /// Protocol version carried in the frame's flags byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Raw command id.
    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    /// The built-in command this message addresses, if any.
    pub fn builtin(&self) -> Option<BuiltinCommand> {
        BuiltinCommand::try_from(self.cmd).ok()
    }

    pub fn is_request(&self) -> bool {
        !self.flags.is_response()
    }

    pub fn is_response(&self) -> bool {
        self.flags.is_response()
    }

    pub fn is_report(&self) -> bool {
        self.flags.is_report()
    }

    /// For responses: whether the peer reported success.
    pub fn resp_ok(&self) -> bool {
        self.flags.resp_ok()
    }

    /// Message payload. For error responses this starts with the reason byte.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces the payload.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// The error reason byte of an error response, if present.
    pub fn error_code(&self) -> Option<u8> {
        self.error_code
    }

    /// Marks this message as already answered on the wire.
    pub fn mark_replied(&mut self) {
        self.replied = true;
    }

    /// Whether a reply for this message has already been sent.
    pub fn was_replied(&self) -> bool {
        self.replied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roundtrip() {
        for cmd in 0xF8u8..=0xFF {
            let builtin = BuiltinCommand::try_from(cmd).unwrap();
            assert_eq!(builtin as u8, cmd);
        }
    }

    #[test]
    fn test_non_builtin_rejected() {
        assert!(BuiltinCommand::try_from(0x01).is_err());
        assert!(BuiltinCommand::try_from(0xC8).is_err());
        assert!(BuiltinCommand::try_from(0xF7).is_err());
    }

    #[test]
    fn test_builtin_boundary() {
        assert!(!is_builtin_cmd(0x00));
        assert!(!is_builtin_cmd(0xC7));
        assert!(is_builtin_cmd(0xC8));
        assert!(is_builtin_cmd(0xFF));
    }

    #[test]
    fn test_replied_marker() {
        let mut msg = Message::new(FrameFlags::request(), 0x01, Bytes::new(), None);
        assert!(!msg.was_replied());
        msg.mark_replied();
        assert!(msg.was_replied());
    }

    #[test]
    fn test_set_body_replaces() {
        let mut msg = Message::new(FrameFlags::request(), 0x01, Bytes::from_static(b"old"), None);
        msg.set_body(&b"new body"[..]);
        assert_eq!(msg.body(), b"new body");
    }
}
