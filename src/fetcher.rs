//! Snapshot fetching from the stats endpoint.
//!
//! The stats server writes a single JSON document as soon as a client
//! connects and closes the connection afterwards. There is no request and no
//! length framing, so a fetch is: connect, read until EOF, decode.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, instrument};

use crate::endpoint::EndpointAddress;
use crate::error::AgentError;

/// Size of a single read from the stats socket.
const READ_CHUNK: usize = 8 * 1024;

/// Opens a fresh connection to `endpoint`, reads until the peer closes and
/// returns the payload decoded as UTF-8 (invalid sequences are replaced).
///
/// `timeout` bounds connect plus read. The connection is owned by this call
/// and closed before it returns, whatever the outcome.
#[instrument(skip_all, fields(endpoint = %endpoint))]
pub async fn fetch(
    endpoint: &EndpointAddress,
    timeout: Option<Duration>,
) -> Result<String, AgentError> {
    let bytes = match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch_bytes(endpoint))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "stats read timed out"))
            .and_then(|res| res),
        None => fetch_bytes(endpoint).await,
    }
    .map_err(|e| AgentError::connection(endpoint, e))?;

    debug!("Read {} bytes from stats endpoint", bytes.len());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn fetch_bytes(endpoint: &EndpointAddress) -> io::Result<Vec<u8>> {
    match endpoint {
        EndpointAddress::Tcp { host, port } => {
            let mut stream = TcpStream::connect((host.as_str(), *port)).await?;
            read_until_close(&mut stream).await
        }
        EndpointAddress::Unix(path) => {
            let mut stream = UnixStream::connect(path).await?;
            read_until_close(&mut stream).await
        }
        EndpointAddress::AbstractUnix(name) => {
            let mut stream = connect_abstract(name)?;
            read_until_close(&mut stream).await
        }
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    let stream = StdUnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract unix sockets are only available on Linux",
    ))
}

/// Reads until a read returns zero bytes. Interrupted reads are retried.
async fn read_until_close<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return Ok(buf),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, UnixListener};

    /// Reader that fails with EINTR once before yielding its data.
    struct InterruptOnce {
        interrupted: bool,
        data: &'static [u8],
    }

    impl AsyncRead for InterruptOnce {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if !self.interrupted {
                self.interrupted = true;
                return Poll::Ready(Err(io::ErrorKind::Interrupted.into()));
            }
            let n = self.data.len().min(buf.remaining());
            buf.put_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_retries_interrupted() {
        let mut reader = InterruptOnce {
            interrupted: false,
            data: b"{\"workers\":[]}",
        };
        let bytes = read_until_close(&mut reader).await.unwrap();
        assert_eq!(bytes, b"{\"workers\":[]}");
    }

    #[tokio::test]
    async fn test_fetch_tcp_reads_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"{\"version\":").await.unwrap();
            sock.write_all(b"\"2.0\"}").await.unwrap();
        });

        let endpoint = EndpointAddress::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let text = fetch(&endpoint, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(text, "{\"version\":\"2.0\"}");
    }

    #[tokio::test]
    async fn test_fetch_replaces_invalid_utf8() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[b'o', b'k', 0xff, b'!']).await.unwrap();
        });

        let endpoint = EndpointAddress::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let text = fetch(&endpoint, None).await.unwrap();
        assert_eq!(text, "ok\u{fffd}!");
    }

    #[tokio::test]
    async fn test_fetch_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"{\"workers\":[]}").await.unwrap();
        });

        let text = fetch(&EndpointAddress::Unix(path), None).await.unwrap();
        assert_eq!(text, "{\"workers\":[]}");
    }

    #[tokio::test]
    async fn test_fetch_refused_is_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = EndpointAddress::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let err = fetch(&endpoint, Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ConnectionError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_missing_unix_socket_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = EndpointAddress::Unix(dir.path().join("absent.sock"));
        let err = fetch(&endpoint, None).await.unwrap_err();
        assert!(matches!(err, AgentError::ConnectionError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let endpoint = EndpointAddress::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let err = fetch(&endpoint, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        match err {
            AgentError::ConnectionError { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::TimedOut)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_fetch_abstract_socket() {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};

        let name = format!("uwsgi-stats-agent-test-{}", std::process::id());
        let addr = SocketAddr::from_abstract_name(name.as_bytes()).unwrap();
        let std_listener = StdUnixListener::bind_addr(&addr).unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let listener = UnixListener::from_std(std_listener).unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"{\"workers\":[]}").await.unwrap();
        });

        let text = fetch(&EndpointAddress::AbstractUnix(name), None)
            .await
            .unwrap();
        assert_eq!(text, "{\"workers\":[]}");
    }
}
