use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::MuxStream;

/// Unix domain socket transport.
///
/// One peer binds a filesystem-path socket and accepts, the other
/// connects. Both ends receive a [`SocketStream`] usable as the session's
/// byte link. The socket file is removed again on drop.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket, it is removed first
    /// (stale socket cleanup). Existing non-socket files are never removed.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            cleanup_on_drop: true,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SocketStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!("accepted connection");
        SocketStream::new(stream).map_err(TransportError::Accept)
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<SocketStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        SocketStream::new(stream).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// A connected Unix socket usable as a session byte link.
///
/// The underlying stream is switched to non-blocking mode so `read` can
/// honor the never-block contract of [`MuxStream`]; `write` retries until
/// the kernel accepts the whole buffer.
pub struct SocketStream {
    inner: UnixStream,
}

impl SocketStream {
    fn new(inner: UnixStream) -> std::io::Result<Self> {
        inner.set_nonblocking(true)?;
        Ok(Self { inner })
    }
}

impl MuxStream for SocketStream {
    fn bytes_available(&self) -> std::io::Result<usize> {
        let mut count: libc::c_int = 0;
        // SAFETY: FIONREAD writes a c_int through the provided pointer, and
        // the fd is an open socket descriptor owned by `self.inner`.
        let rc = unsafe { libc::ioctl(self.inner.as_raw_fd(), libc::FIONREAD, &mut count) };
        if rc == -1 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(count as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match Read::read(&mut self.inner, buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match Write::write(&mut self.inner, &buf[offset..]) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(offset)
    }
}

impl std::fmt::Debug for SocketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketStream")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "smp-stream-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("link.sock")
    }

    fn connected_pair(tag: &str) -> (SocketStream, SocketStream, PathBuf) {
        let path = temp_sock_path(tag);
        let listener = UnixDomainSocket::bind(&path).expect("bind should succeed");

        let path_clone = path.clone();
        let connector =
            std::thread::spawn(move || UnixDomainSocket::connect(&path_clone).unwrap());
        let accepted = listener.accept().expect("accept should succeed");
        let connected = connector.join().expect("connector thread should finish");

        drop(listener);
        (accepted, connected, path)
    }

    #[test]
    fn bind_accept_connect_roundtrip() {
        let (mut server, mut client, path) = connected_pair("roundtrip");

        assert_eq!(client.write(b"hello").unwrap(), 5);

        // Non-blocking read may need a moment for the bytes to land.
        let mut buf = [0u8; 5];
        let mut got = 0;
        for _ in 0..100 {
            got += server.read(&mut buf[got..]).unwrap();
            if got == 5 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(&buf, b"hello");

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn bytes_available_reports_buffered_count() {
        let (server, mut client, path) = connected_pair("available");

        client.write(&[0xAA; 7]).unwrap();
        let mut avail = 0;
        for _ in 0..100 {
            avail = server.bytes_available().unwrap();
            if avail == 7 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(avail, 7);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn read_on_empty_socket_returns_zero() {
        let (mut server, _client, path) = connected_pair("empty");

        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).unwrap(), 0);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn bind_rejects_overlong_path() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixDomainSocket::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let path = temp_sock_path("nonsock");
        std::fs::write(&path, b"regular-file").unwrap();

        let result = UnixDomainSocket::bind(&path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn socket_file_cleaned_up_on_drop() {
        let path = temp_sock_path("cleanup");
        let listener = UnixDomainSocket::bind(&path).unwrap();
        assert!(path.exists());

        drop(listener);
        assert!(!path.exists());

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
