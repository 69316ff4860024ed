//! Escape-aware delimited commands between a host and a device.
//!
//! A command is an integer id followed by comma-separated arguments and a
//! semicolon: `7,LED_green.png,1;`. Reserved characters inside an argument
//! are escaped with `/`.
//!
//! # Crate Structure
//!
//! - [`transport`]: message transports (Unix domain sockets, in-memory pair)
//! - [`protocol`]: escaping, framing, typed argument encoding and reading
//! - [`session`]: id-keyed dispatch and per-connection sessions (behind the
//!   `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use cmdwire_transport::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use cmdwire_protocol::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use cmdwire_session::*;
}
