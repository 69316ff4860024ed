use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Size of the little-endian type tag leading every binary blob.
pub const BLOB_TAG_SIZE: usize = 4;

/// An out-of-band binary transfer: a type tag agreed on by both ends plus an
/// opaque payload. Blobs bypass the command escaping rules entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBlob {
    pub tag: i32,
    pub payload: Bytes,
}

impl BinaryBlob {
    pub fn new(tag: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Append the wire form (`tag` as 4 bytes LE, then the payload) to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_blob(self.tag, &self.payload, dst);
    }

    /// Parse a blob from a complete binary message.
    pub fn decode(mut src: Bytes) -> Result<Self> {
        if src.len() < BLOB_TAG_SIZE {
            return Err(TransportError::ShortBinary { len: src.len() });
        }
        let tag = src.get_i32_le();
        Ok(Self { tag, payload: src })
    }

    pub fn wire_size(&self) -> usize {
        BLOB_TAG_SIZE + self.payload.len()
    }
}

pub(crate) fn encode_blob(tag: i32, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(BLOB_TAG_SIZE + payload.len());
    dst.put_i32_le(tag);
    dst.put_slice(payload);
}

/// One message delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A chunk of command text. Carries zero, one, or many commands, possibly
    /// partial ones.
    Text(String),
    /// A tagged binary blob.
    Binary(BinaryBlob),
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}
