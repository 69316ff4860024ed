use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;

use cmdwire_transport::{StreamSource, UnixDomainSocket};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::session::{Connection, Outbound, Session, SessionConfig};

/// Connect to a listening socket and wrap the stream in a client session.
pub fn connect(
    path: impl AsRef<Path>,
    dispatcher: Arc<Dispatcher<Outbound>>,
) -> Result<Connection<StreamSource<UnixStream>>> {
    connect_with_config(path, dispatcher, SessionConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(
    path: impl AsRef<Path>,
    dispatcher: Arc<Dispatcher<Outbound>>,
    config: SessionConfig,
) -> Result<Connection<StreamSource<UnixStream>>> {
    let (sink, source) = UnixDomainSocket::connect_with_config(path, &config.envelope)?;
    let session = Session::with_config("client", dispatcher, sink, config);
    Ok(Connection { session, source })
}
