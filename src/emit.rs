//! Output sinks for rendered metric lines.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Byte sink behind [`Emitter::Stdout`].
pub type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where metric lines go.
pub enum Emitter {
    /// Each line is written to stdout (or a stand-in writer) and flushed
    /// immediately.
    Stdout(LineWriter),
    /// Each line is sent as one datagram, best effort: failed sends are
    /// logged and never retried.
    Udp { socket: UdpSocket, dest: SocketAddr },
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emitter::Stdout(_) => f.write_str("Stdout"),
            Emitter::Udp { dest, .. } => f.debug_struct("Udp").field("dest", dest).finish(),
        }
    }
}

impl Emitter {
    pub fn stdout() -> Self {
        Self::writer(tokio::io::stdout())
    }

    /// Line sink over an arbitrary async writer, with stdout semantics.
    pub fn writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Emitter::Stdout(Box::new(writer))
    }

    /// Resolves `dest` (`host:port`, DNS allowed) and binds an ephemeral
    /// local socket of the matching address family.
    pub async fn udp(dest: &str) -> Result<Self, AgentError> {
        let dest = tokio::net::lookup_host(dest)
            .await
            .map_err(|e| {
                AgentError::InvalidConfig(format!(
                    "cannot resolve UDP destination '{}': {}",
                    dest, e
                ))
            })?
            .next()
            .ok_or_else(|| {
                AgentError::InvalidConfig(format!("UDP destination '{}' has no address", dest))
            })?;

        let local: SocketAddr = if dest.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        debug!(
            "UDP emitter bound to {:?}, sending to {}",
            socket.local_addr().ok(),
            dest
        );

        Ok(Emitter::Udp { socket, dest })
    }

    /// Delivers one line.
    ///
    /// A closed stdout pipe becomes `OutputClosed`. UDP send failures are
    /// logged and the line is dropped.
    pub async fn emit(&mut self, line: &str) -> Result<(), AgentError> {
        match self {
            Emitter::Stdout(out) => {
                let written = async {
                    out.write_all(line.as_bytes()).await?;
                    out.flush().await
                }
                .await;
                match written {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        Err(AgentError::OutputClosed)
                    }
                    Err(e) => Err(AgentError::Io(e)),
                }
            }
            Emitter::Udp { socket, dest } => {
                if let Err(e) = socket.send_to(line.as_bytes(), *dest).await {
                    warn!("Dropped metric datagram to {}: {}", dest, e);
                }
                Ok(())
            }
        }
    }
}
