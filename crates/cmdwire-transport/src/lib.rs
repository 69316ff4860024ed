//! Message transports for cmdwire.
//!
//! The command protocol runs over any channel that delivers text messages
//! (and, optionally, tagged binary blobs). This crate defines that contract
//! and ships two implementations:
//! - Unix domain sockets, with an 8-byte envelope restoring message boundaries
//! - An in-memory pair for tests and embedding
//!
//! Message boundaries carry no protocol meaning. A single text message may hold
//! several commands, or a fraction of one.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod message;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use envelope::{EnvelopeConfig, ENVELOPE_HEADER_SIZE};
pub use error::{Result, TransportError};
pub use message::{BinaryBlob, Message, BLOB_TAG_SIZE};
pub use stream::{StreamSink, StreamSource};
pub use traits::{MessageSink, MessageSource};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
