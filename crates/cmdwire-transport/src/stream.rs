use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::sync::Mutex;

use bytes::BytesMut;
use tracing::trace;

use crate::envelope::{
    decode_envelope, encode_envelope, EnvelopeConfig, KIND_BINARY, KIND_TEXT,
};
use crate::error::{Result, TransportError};
use crate::message::{encode_blob, Message};
use crate::traits::{MessageSink, MessageSource};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Sends enveloped messages over any `Write` stream.
///
/// The writer sits behind a mutex so the sink can be shared; each message is
/// encoded and written while the lock is held.
pub struct StreamSink<W> {
    inner: Mutex<SinkState<W>>,
    max_message_size: usize,
}

impl<W> fmt::Debug for StreamSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

struct SinkState<W> {
    writer: W,
    buf: BytesMut,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, &EnvelopeConfig::default())
    }

    pub fn with_config(writer: W, config: &EnvelopeConfig) -> Self {
        Self {
            inner: Mutex::new(SinkState {
                writer,
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            }),
            max_message_size: config.max_message_size,
        }
    }

    /// Consume the sink and return the inner stream.
    pub fn into_inner(self) -> W {
        let state = self
            .inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.writer
    }

    fn send_envelope(&self, kind: u16, body: &[u8]) -> Result<()> {
        if body.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: self.max_message_size,
            });
        }

        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let SinkState { writer, buf } = &mut *state;
        buf.clear();
        encode_envelope(kind, body, buf)?;
        write_all_retrying(writer, &buf[..])?;
        trace!(kind, size = body.len(), "message sent");
        Ok(())
    }
}

impl<W: Write + Send> MessageSink for StreamSink<W> {
    fn send_text(&self, text: &str) -> Result<()> {
        self.send_envelope(KIND_TEXT, text.as_bytes())
    }

    fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()> {
        let mut body = BytesMut::new();
        encode_blob(tag, payload, &mut body);
        self.send_envelope(KIND_BINARY, &body)
    }
}

fn write_all_retrying<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < data.len() {
        match writer.write(&data[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => return Err(TransportError::TimedOut),
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => return Err(TransportError::TimedOut),
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

// Socket timeouts surface as WouldBlock on Unix and TimedOut elsewhere.
fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Receives enveloped messages from any `Read` stream.
///
/// Partial reads are buffered internally; `recv` only returns whole messages.
pub struct StreamSource<R> {
    reader: R,
    buf: BytesMut,
    max_message_size: usize,
}

impl<R> fmt::Debug for StreamSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("buffered", &self.buf.len())
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, &EnvelopeConfig::default())
    }

    pub fn with_config(reader: R, config: &EnvelopeConfig) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_message_size: config.max_message_size,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> MessageSource for StreamSource<R> {
    fn recv(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = decode_envelope(&mut self.buf, self.max_message_size)? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.reader.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(TransportError::TimedOut),
                Err(err) => return Err(TransportError::Io(err)),
            };

            if read == 0 {
                return Err(TransportError::Closed);
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }
}
