//! The cmdwire command protocol.
//!
//! Commands travel as delimited text:
//!
//! ```text
//! <command id>[,<arg>]*;
//! ```
//!
//! - `,` separates arguments
//! - `;` terminates a command
//! - `/` escapes the next character, so any of the three can appear inside a value
//!
//! The stream carrying the text has no boundaries the protocol can rely on.
//! [`StreamFramer`] reassembles complete frames from arbitrary chunks,
//! [`ReceivedCommand`] reads their arguments back in order, and [`Command`]
//! builds outgoing frames from typed values.

pub mod arg;
pub mod command;
pub mod error;
pub mod escape;
pub mod framer;
pub mod received;

#[cfg(feature = "async")]
pub mod codec;

pub use arg::{Arg, DeviceVersion, Encoding};
pub use command::{AckRequest, Command};
pub use error::{ProtocolError, Result};
pub use escape::{
    escape, split, strip_terminator, unescape, SplitOptions, COMMAND_SEPARATOR, ESCAPE_CHAR,
    FIELD_SEPARATOR,
};
pub use framer::{FramerConfig, RawFrame, StreamFramer, DEFAULT_MAX_FRAME_LEN};
pub use received::ReceivedCommand;

#[cfg(feature = "async")]
pub use codec::CommandCodec;
