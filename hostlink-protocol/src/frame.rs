//! Binary frame format for the hostlink wire protocol.
//!
//! Frame layout (all multi-byte integers little-endian):
//!
//! ```text
//! +--------+--------+---------------+-----+------------+--------+--------+
//! | magic  | length | flags_version | cmd | [err_code] | body   | crc16  |
//! | 4 bytes| 4 bytes| 1 byte        | 1 B | 0/1 byte   | n bytes| 2 bytes|
//! +--------+--------+---------------+-----+------------+--------+--------+
//! ```
//!
//! `length` counts every byte after the length field itself:
//! flags + cmd (+ err_code) + body + crc. The CRC-16/ARC trailer covers
//! every preceding byte of the frame starting at the magic.
//!
//! Decoding tolerates arbitrary leading garbage: the decoder scans for the
//! magic anywhere in the input and reports how many bytes the caller may
//! safely discard when no frame is found, so a receiver resynchronizes
//! after noise or a corrupt frame without resetting the link.

use crate::crc::checksum;
use crate::error::{ErrorReason, ProtocolError};
use crate::message::Message;
use crate::{DEFAULT_MAGIC, MAX_BODY_SIZE, PROTOCOL_VERSION};
use bytes::{BufMut, Bytes, BytesMut};

/// Fixed per-frame overhead: magic(4) + length(4) + flags(1) + cmd(1) + crc(2).
pub const FRAME_OVERHEAD: usize = 12;

/// Smallest possible value of the length field: flags + cmd + crc.
const MIN_DATA_LEN: usize = 4;

/// Largest accepted value of the length field:
/// flags + cmd + err_code + body + crc.
const MAX_DATA_LEN: usize = MAX_BODY_SIZE + 5;

/// The flags/version byte of a frame.
///
/// Bit 7: response; bit 6: response-ok (meaningful only with bit 7);
/// bit 5: report; bits 1-0: protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub const RESPONSE: u8 = 1 << 7;
    pub const RESP_OK: u8 = 1 << 6;
    pub const REPORT: u8 = 1 << 5;
    pub const VERSION_MASK: u8 = 0x03;

    /// Flags for a request frame.
    pub fn request() -> Self {
        Self(PROTOCOL_VERSION)
    }

    /// Flags for a successful response.
    pub fn response_ok() -> Self {
        Self(Self::RESPONSE | Self::RESP_OK | PROTOCOL_VERSION)
    }

    /// Flags for an error response.
    pub fn response_err() -> Self {
        Self(Self::RESPONSE | PROTOCOL_VERSION)
    }

    /// Flags for an unsolicited report.
    pub fn report() -> Self {
        Self(Self::RESPONSE | Self::RESP_OK | Self::REPORT | PROTOCOL_VERSION)
    }

    /// Validates a raw flags byte. The embedded version must match
    /// [`PROTOCOL_VERSION`].
    pub fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        let version = bits & Self::VERSION_MASK;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    pub fn resp_ok(&self) -> bool {
        self.is_response() && self.0 & Self::RESP_OK != 0
    }

    pub fn is_report(&self) -> bool {
        self.0 & Self::REPORT != 0
    }

    pub fn version(&self) -> u8 {
        self.0 & Self::VERSION_MASK
    }
}

/// Result of one decode attempt over a byte buffer.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// A complete, checksum-valid frame was decoded. `consumed` is the
    /// number of leading bytes (garbage prefix included) now accounted for.
    Frame { message: Message, consumed: usize },
    /// No frame can start within the first `discard` bytes; the caller may
    /// drop them. Covers leading noise, corrupt frames being skipped, and
    /// frames carrying an unsupported version.
    NoFrame { discard: usize },
    /// The buffer may hold the beginning of a frame; more bytes are needed.
    Incomplete,
}

/// Stateless encoder/decoder for hostlink frames.
///
/// The sync magic is held per instance, so two links with different magics
/// can coexist in one process.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    magic: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            magic: DEFAULT_MAGIC,
        }
    }
}

impl FrameCodec {
    /// Creates a codec with a non-default sync magic.
    pub fn with_magic(magic: u32) -> Self {
        Self { magic }
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    /// Encodes one frame.
    ///
    /// The error-code byte, when present, is written between `cmd` and the
    /// body and is counted by the length field.
    pub fn encode(
        &self,
        cmd: u8,
        flags: FrameFlags,
        body: &[u8],
        error_code: Option<u8>,
    ) -> Result<BytesMut, ProtocolError> {
        if body.len() > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge {
                size: body.len(),
                max: MAX_BODY_SIZE,
            });
        }

        let data_len = MIN_DATA_LEN + usize::from(error_code.is_some()) + body.len();
        let mut buf = BytesMut::with_capacity(8 + data_len);

        buf.put_u32_le(self.magic);
        buf.put_u32_le(data_len as u32);
        buf.put_u8(flags.bits());
        buf.put_u8(cmd);
        if let Some(code) = error_code {
            buf.put_u8(code);
        }
        buf.put_slice(body);

        let crc = checksum(&buf);
        buf.put_u16_le(crc);

        Ok(buf)
    }

    /// Encodes a request frame.
    pub fn encode_request(&self, cmd: u8, body: &[u8]) -> Result<BytesMut, ProtocolError> {
        self.encode(cmd, FrameFlags::request(), body, None)
    }

    /// Encodes a successful response.
    pub fn encode_resp_ok(&self, cmd: u8, body: &[u8]) -> Result<BytesMut, ProtocolError> {
        self.encode(cmd, FrameFlags::response_ok(), body, None)
    }

    /// Encodes an unsolicited report.
    pub fn encode_report(&self, cmd: u8, body: &[u8]) -> Result<BytesMut, ProtocolError> {
        self.encode(cmd, FrameFlags::report(), body, None)
    }

    /// Encodes an error response carrying a reason code and a short
    /// human-readable message.
    pub fn encode_resp_err(
        &self,
        cmd: u8,
        reason: ErrorReason,
        message: &str,
    ) -> Result<BytesMut, ProtocolError> {
        self.encode(
            cmd,
            FrameFlags::response_err(),
            message.as_bytes(),
            Some(reason.into()),
        )
    }

    /// Attempts to decode one frame from `buf`.
    ///
    /// Scans for the magic anywhere in the buffer. A frame is produced only
    /// once its full declared extent is present and the trailing CRC
    /// matches; otherwise the outcome says whether to wait for more bytes
    /// or how much prefix is safe to discard.
    pub fn decode_at(&self, buf: &[u8]) -> DecodeOutcome {
        let len = buf.len();
        if len < FRAME_OVERHEAD {
            return DecodeOutcome::Incomplete;
        }

        let magic = self.magic.to_le_bytes();
        let start = match buf.windows(4).position(|w| w == magic) {
            Some(i) => i,
            // Keep the last 3 bytes: they might be a split magic.
            None => return DecodeOutcome::NoFrame { discard: len - 3 },
        };

        if len - start < FRAME_OVERHEAD {
            return DecodeOutcome::Incomplete;
        }

        let data_len = u32::from_le_bytes([
            buf[start + 4],
            buf[start + 5],
            buf[start + 6],
            buf[start + 7],
        ]) as usize;

        // A length field this frame could never legally carry means the
        // magic was noise. Skip past it rather than waiting forever for
        // bytes that will not come.
        if !(MIN_DATA_LEN..=MAX_DATA_LEN).contains(&data_len) {
            return DecodeOutcome::NoFrame { discard: start + 4 };
        }

        if data_len > len - start - 8 {
            return DecodeOutcome::Incomplete;
        }

        let crc_pos = start + 6 + data_len;
        let expected = u16::from_le_bytes([buf[crc_pos], buf[crc_pos + 1]]);
        let actual = checksum(&buf[start..crc_pos]);
        let frame_end = (start + 8 + data_len).min(len);
        if actual != expected {
            // Consume the whole suspect frame so the same bad bytes are
            // never rescanned, clamped to what is actually buffered.
            return DecodeOutcome::NoFrame { discard: frame_end };
        }

        let flags = match FrameFlags::from_bits(buf[start + 8]) {
            Ok(flags) => flags,
            Err(_) => return DecodeOutcome::NoFrame { discard: frame_end },
        };
        let cmd = buf[start + 9];
        let body = Bytes::copy_from_slice(&buf[start + 10..crc_pos]);
        let error_code = if flags.is_response() && !flags.resp_ok() {
            body.first().copied()
        } else {
            None
        };

        DecodeOutcome::Frame {
            message: Message::new(flags, cmd, body, error_code),
            consumed: frame_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_one(codec: &FrameCodec, buf: &[u8]) -> Message {
        match codec.decode_at(buf) {
            DecodeOutcome::Frame { message, consumed } => {
                assert_eq!(consumed, buf.len());
                message
            }
            other => panic!("expected a frame, got {:?}", other),
        }
    }

    #[test]
    fn test_request_roundtrip() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_request(0x01, b"ping").unwrap();

        let msg = decode_one(&codec, &encoded);
        assert_eq!(msg.cmd(), 0x01);
        assert!(msg.is_request());
        assert!(!msg.is_response());
        assert!(!msg.is_report());
        assert_eq!(msg.body(), b"ping");
        assert_eq!(msg.version(), PROTOCOL_VERSION);
    }

    #[test]
    fn test_resp_ok_roundtrip() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_resp_ok(0x42, b"result").unwrap();

        let msg = decode_one(&codec, &encoded);
        assert!(msg.is_response());
        assert!(msg.resp_ok());
        assert!(!msg.is_report());
        assert_eq!(msg.body(), b"result");
    }

    #[test]
    fn test_report_roundtrip() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_report(0x10, b"telemetry").unwrap();

        let msg = decode_one(&codec, &encoded);
        assert!(msg.is_response());
        assert!(msg.resp_ok());
        assert!(msg.is_report());
        assert_eq!(msg.body(), b"telemetry");
    }

    #[test]
    fn test_resp_err_body_carries_reason() {
        let codec = FrameCodec::default();
        let encoded = codec
            .encode_resp_err(0xFA, ErrorReason::Args, "bad")
            .unwrap();

        let msg = decode_one(&codec, &encoded);
        assert!(msg.is_response());
        assert!(!msg.resp_ok());
        assert_eq!(msg.error_code(), Some(ErrorReason::Args.into()));
        // The reason byte leads the body, followed by the message text.
        assert_eq!(msg.body()[0], u8::from(ErrorReason::Args));
        assert_eq!(&msg.body()[1..], b"bad");
    }

    #[test]
    fn test_length_field_counts_error_code() {
        let codec = FrameCodec::default();

        let ok = codec.encode_resp_ok(0x01, b"xy").unwrap();
        let err = codec.encode_resp_err(0x01, ErrorReason::Args, "xy").unwrap();

        let ok_len = u32::from_le_bytes(ok[4..8].try_into().unwrap());
        let err_len = u32::from_le_bytes(err[4..8].try_into().unwrap());
        assert_eq!(ok_len, 2 + 4);
        assert_eq!(err_len, 2 + 5);
    }

    #[test]
    fn test_empty_body() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_resp_ok(0xFB, &[]).unwrap();
        assert_eq!(encoded.len(), FRAME_OVERHEAD);

        let msg = decode_one(&codec, &encoded);
        assert!(msg.body().is_empty());
    }

    #[test]
    fn test_body_too_large() {
        let codec = FrameCodec::default();
        let body = vec![0u8; MAX_BODY_SIZE + 1];
        let result = codec.encode_request(0x01, &body);
        assert!(matches!(result, Err(ProtocolError::BodyTooLarge { .. })));
    }

    #[test]
    fn test_short_buffer_is_incomplete() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_request(0x01, b"ping").unwrap();
        for cut in 0..FRAME_OVERHEAD {
            assert!(matches!(
                codec.decode_at(&encoded[..cut]),
                DecodeOutcome::Incomplete
            ));
        }
    }

    #[test]
    fn test_truncated_body_is_incomplete() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_request(0x01, b"a longer body here").unwrap();
        for cut in FRAME_OVERHEAD..encoded.len() {
            assert!(matches!(
                codec.decode_at(&encoded[..cut]),
                DecodeOutcome::Incomplete
            ));
        }
    }

    #[test]
    fn test_no_magic_discards_all_but_tail() {
        let codec = FrameCodec::default();
        let noise = [0x55u8; 32];
        match codec.decode_at(&noise) {
            DecodeOutcome::NoFrame { discard } => assert_eq!(discard, 29),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_noise_prefix_resync() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_request(0x07, b"payload").unwrap();
        // None of these bytes can start the magic.
        let mut stream = vec![0x11, 0x22, 0x33, 0x44, 0x55];
        stream.extend_from_slice(&encoded);

        match codec.decode_at(&stream) {
            DecodeOutcome::Frame { message, consumed } => {
                assert_eq!(consumed, stream.len());
                assert_eq!(message.cmd(), 0x07);
                assert_eq!(message.body(), b"payload");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_crc_mismatch_skips_whole_frame() {
        let codec = FrameCodec::default();
        let mut encoded = codec.encode_request(0x01, b"ping").unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        match codec.decode_at(&encoded) {
            DecodeOutcome::NoFrame { discard } => assert_eq!(discard, encoded.len()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_single_bit_flip_never_decodes() {
        let codec = FrameCodec::default();
        let encoded = codec.encode_request(0x2A, b"data").unwrap();

        for byte in 0..encoded.len() {
            for bit in 0..8 {
                let mut corrupted = encoded.to_vec();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !matches!(codec.decode_at(&corrupted), DecodeOutcome::Frame { .. }),
                    "bit {} of byte {} slipped through",
                    bit,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_version_mismatch_discarded() {
        let codec = FrameCodec::default();
        // Hand-build a frame whose flags carry version 2 but whose CRC is valid.
        let mut buf = BytesMut::new();
        buf.put_u32_le(DEFAULT_MAGIC);
        buf.put_u32_le(4);
        buf.put_u8(0x02); // request, version 2
        buf.put_u8(0x01);
        let crc = checksum(&buf);
        buf.put_u16_le(crc);

        match codec.decode_at(&buf) {
            DecodeOutcome::NoFrame { discard } => assert_eq!(discard, buf.len()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_absurd_length_skips_magic() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u32_le(DEFAULT_MAGIC);
        buf.put_u32_le(0xFFFF_FFFF);
        buf.put_slice(&[0u8; 8]);

        match codec.decode_at(&buf) {
            DecodeOutcome::NoFrame { discard } => assert_eq!(discard, 4),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_custom_magic() {
        let codec = FrameCodec::with_magic(0xDEAD_BEEF);
        let encoded = codec.encode_request(0x05, b"x").unwrap();
        assert_eq!(&encoded[..4], &0xDEAD_BEEFu32.to_le_bytes());

        let msg = decode_one(&codec, &encoded);
        assert_eq!(msg.cmd(), 0x05);

        // The default codec must not recognize it.
        assert!(!matches!(
            FrameCodec::default().decode_at(&encoded),
            DecodeOutcome::Frame { .. }
        ));
    }

    #[test]
    fn test_two_frames_back_to_back() {
        let codec = FrameCodec::default();
        let mut stream = codec.encode_request(0x01, b"first").unwrap().to_vec();
        let first_len = stream.len();
        stream.extend_from_slice(&codec.encode_request(0x02, b"second").unwrap());

        match codec.decode_at(&stream) {
            DecodeOutcome::Frame { message, consumed } => {
                assert_eq!(message.cmd(), 0x01);
                assert_eq!(consumed, first_len);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(cmd in 0u8..=255, body in proptest::collection::vec(any::<u8>(), 0..512)) {
            let codec = FrameCodec::default();
            let encoded = codec.encode_request(cmd, &body).unwrap();
            match codec.decode_at(&encoded) {
                DecodeOutcome::Frame { message, consumed } => {
                    prop_assert_eq!(consumed, encoded.len());
                    prop_assert_eq!(message.cmd(), cmd);
                    prop_assert!(message.is_request());
                    prop_assert_eq!(message.body(), &body[..]);
                }
                other => prop_assert!(false, "unexpected outcome: {:?}", other),
            }
        }

        #[test]
        fn prop_split_point_never_yields_early(
            body in proptest::collection::vec(any::<u8>(), 1..128),
            split_frac in 0.0f64..1.0,
        ) {
            let codec = FrameCodec::default();
            let encoded = codec.encode_request(0x33, &body).unwrap();
            let split = ((encoded.len() - 1) as f64 * split_frac) as usize;
            let decoded_early = matches!(
                codec.decode_at(&encoded[..split]),
                DecodeOutcome::Frame { .. }
            );
            prop_assert!(!decoded_early, "decoded a frame from a truncated buffer");
        }
    }
}
