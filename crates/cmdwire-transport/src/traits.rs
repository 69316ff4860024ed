use std::sync::Arc;

use crate::error::Result;
use crate::message::Message;

/// The sending half of a connection.
///
/// Implementations must serialize concurrent sends so that one message is
/// fully written before the next begins; callers may share a sink across
/// threads and send while another thread is processing inbound text.
pub trait MessageSink: Send + Sync {
    /// Send a text message.
    fn send_text(&self, text: &str) -> Result<()>;

    /// Send a binary message: `tag` as 4 bytes little-endian, then `payload`.
    fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()>;
}

/// The receiving half of a connection.
pub trait MessageSource {
    /// Block until the next message arrives.
    ///
    /// Returns `Err(TransportError::Closed)` once the peer has gone away.
    fn recv(&mut self) -> Result<Message>;
}

impl<T: MessageSink + ?Sized> MessageSink for Arc<T> {
    fn send_text(&self, text: &str) -> Result<()> {
        (**self).send_text(text)
    }

    fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()> {
        (**self).send_binary(tag, payload)
    }
}

impl<T: MessageSink + ?Sized> MessageSink for Box<T> {
    fn send_text(&self, text: &str) -> Result<()> {
        (**self).send_text(text)
    }

    fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()> {
        (**self).send_binary(tag, payload)
    }
}

impl<T: MessageSource + ?Sized> MessageSource for Box<T> {
    fn recv(&mut self) -> Result<Message> {
        (**self).recv()
    }
}
