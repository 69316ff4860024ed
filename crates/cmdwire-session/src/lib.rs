//! Command dispatch and per-connection sessions.
//!
//! A [`Dispatcher`] maps command ids to handlers and is built once at setup.
//! Each connection gets its own [`Session`], which owns the framing state for
//! that stream and shares the dispatcher read-only.

pub mod ack;
pub mod dispatch;
pub mod error;
pub mod session;

#[cfg(unix)]
pub mod connector;
#[cfg(unix)]
pub mod listener;

pub use ack::AckTracker;
pub use dispatch::{DispatchOutcome, Dispatcher, Handler};
pub use error::{Result, SessionError};
pub use session::{
    BinaryHandler, Connection, InboundReport, Outbound, Session, SessionConfig, SessionStats,
};

#[cfg(unix)]
pub use connector::{connect, connect_with_config};
#[cfg(unix)]
pub use listener::SessionListener;
