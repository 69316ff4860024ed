use std::fmt;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cmdwire_transport::TransportError),

    /// Framing or argument encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] cmdwire_protocol::ProtocolError),

    /// An application handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl SessionError {
    pub fn handler(message: impl fmt::Display) -> Self {
        SessionError::Handler(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
