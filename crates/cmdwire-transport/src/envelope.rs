//! Message envelope for byte-stream sockets.
//!
//! A Unix domain socket has no message boundaries, while the command layer
//! expects discrete text and binary messages. Each message is prefixed with:
//!
//! ```text
//! ┌──────────────┬───────────┬──────────┬─────────────────┐
//! │ Magic (2B)   │ Length    │ Kind     │ Body            │
//! │ 0x43 0x57    │ (4B LE)   │ (2B LE)  │ (Length bytes)  │
//! │ "CW"         │           │ 1 / 2    │                 │
//! └──────────────┴───────────┴──────────┴─────────────────┘
//! ```
//!
//! Text bodies are UTF-8; binary bodies are a [`BinaryBlob`](crate::BinaryBlob).

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::message::{BinaryBlob, Message};

/// Envelope header: magic (2) + length (4) + kind (2) = 8 bytes.
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Magic bytes: "CW" (0x43 0x57).
pub const MAGIC: [u8; 2] = [0x43, 0x57];

/// Body is UTF-8 command text.
pub const KIND_TEXT: u16 = 1;

/// Body is a tagged binary blob.
pub const KIND_BINARY: u16 = 2;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Settings for enveloped stream transports.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Maximum body size in bytes, both directions. Default: 16 MiB.
    pub max_message_size: usize,
    /// Read timeout applied to the socket.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the socket.
    pub write_timeout: Option<Duration>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Write one envelope (header + body) into `dst`.
pub fn encode_envelope(kind: u16, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(TransportError::MessageTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(ENVELOPE_HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(body.len() as u32);
    dst.put_u16_le(kind);
    dst.put_slice(body);
    Ok(())
}

/// Take one complete message off the front of `src`.
///
/// Returns `Ok(None)` while the buffer holds less than a full envelope; the
/// buffer is left untouched in that case.
pub fn decode_envelope(src: &mut BytesMut, max_message: usize) -> Result<Option<Message>> {
    if src.len() < ENVELOPE_HEADER_SIZE {
        return Ok(None);
    }
    if src[..2] != MAGIC {
        return Err(TransportError::InvalidMagic);
    }

    let mut header = &src[2..ENVELOPE_HEADER_SIZE];
    let body_len = header.get_u32_le() as usize;
    let kind = header.get_u16_le();

    if body_len > max_message {
        return Err(TransportError::MessageTooLarge {
            size: body_len,
            max: max_message,
        });
    }
    if src.len() < ENVELOPE_HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(ENVELOPE_HEADER_SIZE);
    let body = src.split_to(body_len).freeze();
    into_message(kind, body).map(Some)
}

fn into_message(kind: u16, body: Bytes) -> Result<Message> {
    match kind {
        KIND_TEXT => String::from_utf8(body.to_vec())
            .map(Message::Text)
            .map_err(|_| TransportError::InvalidText),
        KIND_BINARY => BinaryBlob::decode(body).map(Message::Binary),
        other => Err(TransportError::UnknownKind(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::encode_blob;

    #[test]
    fn text_envelope_decodes_to_text_message() {
        let mut buf = BytesMut::new();
        encode_envelope(KIND_TEXT, b"1,2;", &mut buf).unwrap();
        assert_eq!(buf.len(), ENVELOPE_HEADER_SIZE + 4);

        let msg = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::text("1,2;"));
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_envelope_decodes_to_blob() {
        let mut body = BytesMut::new();
        encode_blob(42, b"\x00\x01;,/", &mut body);
        let mut buf = BytesMut::new();
        encode_envelope(KIND_BINARY, &body, &mut buf).unwrap();

        let msg = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        let Message::Binary(blob) = msg else {
            panic!("expected binary message");
        };
        assert_eq!(blob.tag, 42);
        assert_eq!(blob.payload.as_ref(), b"\x00\x01;,/");
    }

    #[test]
    fn partial_header_waits() {
        let mut buf = BytesMut::from(&MAGIC[..]);
        assert!(decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn partial_body_waits() {
        let mut buf = BytesMut::new();
        encode_envelope(KIND_TEXT, b"7,hello;", &mut buf).unwrap();
        buf.truncate(ENVELOPE_HEADER_SIZE + 3);
        assert!(decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = BytesMut::from(&[0u8; ENVELOPE_HEADER_SIZE][..]);
        let err = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap_err();
        assert!(matches!(err, TransportError::InvalidMagic));
    }

    #[test]
    fn oversized_body_rejected_from_header_alone() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024);
        buf.put_u16_le(KIND_TEXT);
        let err = decode_envelope(&mut buf, 16).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MessageTooLarge { size: 1024, max: 16 }
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut buf = BytesMut::new();
        encode_envelope(9, b"", &mut buf).unwrap();
        let err = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap_err();
        assert!(matches!(err, TransportError::UnknownKind(9)));
    }

    #[test]
    fn invalid_utf8_text_rejected() {
        let mut buf = BytesMut::new();
        encode_envelope(KIND_TEXT, &[0xFF, 0xFE], &mut buf).unwrap();
        let err = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap_err();
        assert!(matches!(err, TransportError::InvalidText));
    }

    #[test]
    fn back_to_back_envelopes() {
        let mut buf = BytesMut::new();
        encode_envelope(KIND_TEXT, b"1;", &mut buf).unwrap();
        encode_envelope(KIND_TEXT, b"2;", &mut buf).unwrap();

        let first = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap();
        let second = decode_envelope(&mut buf, DEFAULT_MAX_MESSAGE).unwrap();
        assert_eq!(first, Some(Message::text("1;")));
        assert_eq!(second, Some(Message::text("2;")));
        assert!(buf.is_empty());
    }
}
