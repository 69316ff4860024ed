//! In-process transport: two connected endpoints over `std::sync::mpsc`.
//!
//! Useful for tests and for embedding a device simulator in the same process
//! as its host.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::message::{BinaryBlob, Message};
use crate::traits::{MessageSink, MessageSource};

/// Sending half of an in-memory endpoint.
#[derive(Debug, Clone)]
pub struct MemorySink {
    tx: Sender<Message>,
}

/// Receiving half of an in-memory endpoint.
#[derive(Debug)]
pub struct MemorySource {
    rx: Receiver<Message>,
}

/// One side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryEndpoint {
    pub sink: MemorySink,
    pub source: MemorySource,
}

impl MemoryEndpoint {
    pub fn into_parts(self) -> (MemorySink, MemorySource) {
        (self.sink, self.source)
    }
}

/// Create two connected endpoints. What one side sends, the other receives.
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        MemoryEndpoint {
            sink: MemorySink { tx: a_tx },
            source: MemorySource { rx: a_rx },
        },
        MemoryEndpoint {
            sink: MemorySink { tx: b_tx },
            source: MemorySource { rx: b_rx },
        },
    )
}

impl MemorySink {
    fn deliver(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

impl MessageSink for MemorySink {
    fn send_text(&self, text: &str) -> Result<()> {
        self.deliver(Message::text(text))
    }

    fn send_binary(&self, tag: i32, payload: &[u8]) -> Result<()> {
        self.deliver(Message::Binary(BinaryBlob::new(
            tag,
            Bytes::copy_from_slice(payload),
        )))
    }
}

impl MemorySource {
    /// Wait at most `timeout` for the next message.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Message> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TransportError::TimedOut,
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })
    }

    /// Return the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl MessageSource for MemorySource {
    fn recv(&mut self) -> Result<Message> {
        self.rx.recv().map_err(|_| TransportError::Closed)
    }
}
