//! Async framing of commands over byte streams.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Command;
use crate::error::{ProtocolError, Result};
use crate::escape::{scan_for_terminator, Scan};
use crate::framer::{RawFrame, DEFAULT_MAX_FRAME_LEN};

/// `tokio_util` codec for command frames over a byte stream.
///
/// Decoding follows the same terminator and escape rules as
/// [`StreamFramer`](crate::StreamFramer). Unlike the framer, an oversized or
/// non-UTF-8 frame is returned as an error; the stream should be dropped
/// after one.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    max_frame_len: usize,
    scanned: usize,
}

impl CommandCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            scanned: 0,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CommandCodec {
    type Item = RawFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        match scan_for_terminator(src, self.scanned) {
            Scan::Terminator(end) => {
                self.scanned = 0;
                let frame = src.split_to(end + 1);
                if frame.len() > self.max_frame_len {
                    return Err(ProtocolError::FrameTooLarge {
                        size: frame.len(),
                        max: self.max_frame_len,
                    });
                }
                let text =
                    String::from_utf8(frame.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Some(RawFrame::new(text)))
            }
            Scan::Incomplete { resume } => {
                if src.len() > self.max_frame_len {
                    let size = src.len();
                    src.clear();
                    self.scanned = 0;
                    return Err(ProtocolError::FrameTooLarge {
                        size,
                        max: self.max_frame_len,
                    });
                }
                self.scanned = resume;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.iter().all(u8::is_ascii_whitespace) {
            src.clear();
            self.scanned = 0;
            return Ok(None);
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "unterminated command at end of stream",
        )
        .into())
    }
}

impl Encoder<&Command> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Command, dst: &mut BytesMut) -> Result<()> {
        let wire = item.to_wire();
        dst.reserve(wire.len());
        dst.put_slice(wire.as_bytes());
        Ok(())
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&Command>::encode(self, &item, dst)
    }
}
