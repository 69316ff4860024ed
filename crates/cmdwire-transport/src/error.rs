use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// No message arrived within the requested time.
    #[error("timed out waiting for a message")]
    TimedOut,

    /// The envelope header contains an invalid magic number.
    #[error("invalid envelope magic (expected 0x4357 \"CW\")")]
    InvalidMagic,

    /// The envelope announces a message kind this side does not know.
    #[error("unknown message kind {0}")]
    UnknownKind(u16),

    /// A message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A text message was not valid UTF-8.
    #[error("text message is not valid UTF-8")]
    InvalidText,

    /// A binary message is shorter than its 4-byte tag.
    #[error("binary message too short for its tag ({len} bytes)")]
    ShortBinary { len: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;
