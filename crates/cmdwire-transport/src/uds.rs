use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::envelope::EnvelopeConfig;
use crate::error::{Result, TransportError};
use crate::stream::{StreamSink, StreamSource};

/// Sink/source pair sharing one connected Unix stream.
pub type UnixHalves = (StreamSink<UnixStream>, StreamSource<UnixStream>);

/// Unix domain socket listener speaking the cmdwire envelope.
///
/// The socket file is removed on drop, unless something else has replaced it
/// at the same path in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: Option<(u64, u64)>,
    config: EnvelopeConfig,
}

impl UnixDomainSocket {
    /// Permission mode applied to created socket files.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen at `path`, replacing a stale socket file if present.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_config(path, EnvelopeConfig::default())
    }

    pub fn bind_with_config(path: impl AsRef<Path>, config: EnvelopeConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(existing) = std::fs::symlink_metadata(&path) {
            if !existing.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");
        Ok(Self {
            listener,
            identity: Some((created.dev(), created.ino())),
            path,
            config,
        })
    }

    /// Accept the next connection (blocking) and split it into halves.
    pub fn accept(&self) -> Result<UnixHalves> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        split(stream, &self.config)
    }

    /// Connect to a listening socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<UnixHalves> {
        Self::connect_with_config(path, &EnvelopeConfig::default())
    }

    pub fn connect_with_config(path: impl AsRef<Path>, config: &EnvelopeConfig) -> Result<UnixHalves> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        split(stream, config)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Apply timeouts and split a connected stream into a sink and a source.
pub fn split(stream: UnixStream, config: &EnvelopeConfig) -> Result<UnixHalves> {
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;
    let reader = stream.try_clone()?;
    Ok((
        StreamSink::with_config(stream, config),
        StreamSource::with_config(reader, config),
    ))
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((dev, ino)) = self.identity else {
            return;
        };
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_socket() && meta.dev() == dev && meta.ino() == ino => {
                debug!(path = ?self.path, "removing socket file");
                let _ = std::fs::remove_file(&self.path);
            }
            Ok(_) => debug!(path = ?self.path, "socket path replaced; leaving it alone"),
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BinaryBlob, Message};
    use crate::traits::{MessageSink, MessageSource};

    fn scratch_socket(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!("/tmp/cmdw-uds-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("scratch dir");
        dir.join("device.sock")
    }

    fn cleanup(sock: &Path) {
        if let Some(dir) = sock.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn host_and_device_exchange_text_and_blobs() {
        let sock = scratch_socket("exchange");
        let device = UnixDomainSocket::bind(&sock).expect("bind");
        assert_eq!(device.path(), sock.as_path());

        let host_path = sock.clone();
        let host = std::thread::spawn(move || {
            let (sink, mut source) = UnixDomainSocket::connect(&host_path).expect("connect");
            sink.send_text("1,hello;").expect("send text");
            let reply = source.recv().expect("reply");
            let blob = source.recv().expect("blob");
            (reply, blob)
        });

        let (sink, mut source) = device.accept().expect("accept");
        assert_eq!(source.recv().expect("recv"), Message::text("1,hello;"));
        sink.send_text("2,world;").expect("send reply");
        sink.send_binary(8, b";,/").expect("send blob");

        let (reply, blob) = host.join().expect("host thread");
        assert_eq!(reply, Message::text("2,world;"));
        assert_eq!(blob, Message::Binary(BinaryBlob::new(8, &b";,/"[..])));

        drop(device);
        assert!(!sock.exists(), "socket file should go away with the listener");
        cleanup(&sock);
    }

    #[test]
    fn socket_file_is_private_and_rebindable() {
        let sock = scratch_socket("rebind");
        let first = UnixDomainSocket::bind(&sock).expect("first bind");
        let mode = std::fs::metadata(&sock).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, UnixDomainSocket::DEFAULT_SOCKET_MODE);

        // A leftover socket file from a crashed process is replaced.
        std::mem::forget(first);
        let second = UnixDomainSocket::bind(&sock).expect("rebind over stale socket");
        drop(second);
        cleanup(&sock);
    }

    #[test]
    fn overlong_path_is_rejected_before_bind() {
        let path = PathBuf::from(format!("/tmp/{}.sock", "d".repeat(UnixDomainSocket::MAX_PATH_LEN)));
        let err = UnixDomainSocket::bind(&path).err().expect("should fail");
        assert!(matches!(err, TransportError::PathTooLong { len, .. } if len == path.as_os_str().len()));
    }

    #[test]
    fn non_socket_file_is_left_alone() {
        let sock = scratch_socket("plainfile");
        std::fs::write(&sock, b"device log").expect("write");

        let err = UnixDomainSocket::bind(&sock).err().expect("should fail");
        assert!(matches!(err, TransportError::Bind { .. }));
        assert_eq!(std::fs::read(&sock).expect("read"), b"device log");
        cleanup(&sock);
    }

    #[test]
    fn connecting_without_listener_fails() {
        let sock = scratch_socket("absent");
        let err = UnixDomainSocket::connect(&sock).err().expect("should fail");
        assert!(matches!(err, TransportError::Connect { ref path, .. } if path == &sock));
        cleanup(&sock);
    }

    #[test]
    fn split_applies_read_timeout_and_reports_hangup() {
        let (near, far) = UnixStream::pair().expect("pair");
        let config = EnvelopeConfig {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..EnvelopeConfig::default()
        };
        let (_sink, mut source) = split(far, &config).expect("split");
        assert!(matches!(source.recv(), Err(TransportError::TimedOut)));

        drop(near);
        assert!(matches!(source.recv(), Err(TransportError::Closed)));
    }
}
