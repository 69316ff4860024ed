use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cmdwire_transport::{StreamSource, UnixDomainSocket};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::session::{Connection, Outbound, Session, SessionConfig};

/// Accepts connections and gives each its own [`Session`] over a shared
/// dispatcher.
pub struct SessionListener {
    socket: UnixDomainSocket,
    dispatcher: Arc<Dispatcher<Outbound>>,
    config: SessionConfig,
    next_session_id: AtomicU64,
}

impl SessionListener {
    /// Bind to a Unix domain socket path.
    pub fn bind(path: impl AsRef<Path>, dispatcher: Arc<Dispatcher<Outbound>>) -> Result<Self> {
        Self::bind_with_config(path, dispatcher, SessionConfig::default())
    }

    pub fn bind_with_config(
        path: impl AsRef<Path>,
        dispatcher: Arc<Dispatcher<Outbound>>,
        config: SessionConfig,
    ) -> Result<Self> {
        let socket = UnixDomainSocket::bind_with_config(path, config.envelope.clone())?;
        Ok(Self {
            socket,
            dispatcher,
            config,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Accept the next connection (blocking). Sessions are named
    /// `session-1`, `session-2`, ...
    pub fn accept(&self) -> Result<Connection<StreamSource<UnixStream>>> {
        let (sink, source) = self.socket.accept()?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::with_config(
            format!("session-{id}"),
            Arc::clone(&self.dispatcher),
            sink,
            self.config.clone(),
        );
        Ok(Connection { session, source })
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<Outbound>> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    use cmdwire_protocol::{Command, ReceivedCommand};
    use cmdwire_transport::{Message, MessageSink, MessageSource};

    use super::*;
    use crate::connector::connect;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/cmdw-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("listener.sock")
    }

    fn echo_dispatcher() -> Arc<Dispatcher<Outbound>> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(5, |out: &Outbound, cmd: &mut ReceivedCommand| {
            let text = cmd.read_string();
            out.send(&Command::new(6).arg(text)?)
        });
        Arc::new(dispatcher)
    }

    #[test]
    fn accepted_session_answers_client() {
        let sock_path = make_sock_path("answer");
        let listener = SessionListener::bind(&sock_path, echo_dispatcher())
            .expect("listener should bind");

        let server = thread::spawn(move || {
            let conn = listener.accept().expect("listener should accept");
            assert_eq!(conn.session.id(), "session-1");
            conn.run().expect("session should end cleanly")
        });

        let (sink, mut source) = cmdwire_transport::UnixDomainSocket::connect(&sock_path)
            .expect("client should connect");
        sink.send_text("5,a/;b").expect("send");
        sink.send_text(";").expect("send");
        match source.recv().expect("reply") {
            Message::Text(text) => assert_eq!(text, "6,a/;b;"),
            other => panic!("unexpected message: {other:?}"),
        }
        drop(sink);
        drop(source);

        let stats = server.join().expect("server thread should finish");
        assert_eq!(stats.inbound.handled, 1);
        assert_eq!(stats.text_messages, 2);

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn sessions_are_numbered_per_connection() {
        let sock_path = make_sock_path("multi");
        let listener = SessionListener::bind(&sock_path, echo_dispatcher())
            .expect("listener should bind");

        let server = thread::spawn(move || {
            let first = listener.accept().expect("first accept should succeed");
            let second = listener.accept().expect("second accept should succeed");
            (first.session.id().to_string(), second.session.id().to_string())
        });

        let _c1 = connect(&sock_path, Arc::new(Dispatcher::new())).expect("first client");
        let _c2 = connect(&sock_path, Arc::new(Dispatcher::new())).expect("second client");
        let (first, second) = server.join().expect("server thread should finish");
        assert_eq!(first, "session-1");
        assert_eq!(second, "session-2");

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn client_session_dispatches_replies() {
        let sock_path = make_sock_path("client");
        let listener = SessionListener::bind(&sock_path, echo_dispatcher())
            .expect("listener should bind");

        let server = thread::spawn(move || {
            let conn = listener.accept().expect("listener should accept");
            conn.run().expect("session should end cleanly")
        });

        let (tx, rx) = std::sync::mpsc::channel();
        let mut client_dispatcher = Dispatcher::new();
        client_dispatcher.register(6, move |_: &Outbound, cmd: &mut ReceivedCommand| {
            let _ = tx.send(cmd.read_string());
            Ok(())
        });

        let conn = connect(&sock_path, Arc::new(client_dispatcher)).expect("client should connect");
        conn.session
            .outbound()
            .send(&Command::new(5).arg("hello, device").expect("arg"))
            .expect("send");

        let (mut session, mut source) = conn.into_parts();
        let message = source.recv().expect("reply");
        session.on_message(message);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).expect("handler ran"),
            "hello, device"
        );

        drop(session);
        drop(source);
        server.join().expect("server thread should finish");

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
