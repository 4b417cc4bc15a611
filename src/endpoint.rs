//! Stats endpoint address resolution.
//!
//! The stats server address is a single string whose shape selects the
//! transport:
//! - `@name` is an abstract-namespace Unix socket,
//! - anything containing `:` is TCP `host:port` (`:1717` means localhost),
//! - everything else is a filesystem Unix socket path.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AgentError;

/// Prefix marking an abstract-namespace Unix socket.
pub const ABSTRACT_PREFIX: char = '@';

/// Host used when a TCP address omits it.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Resolved stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
    AbstractUnix(String),
}

impl EndpointAddress {
    /// Resolves an address string. Performs no I/O.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let addr = raw.trim();
        if addr.is_empty() {
            return Err(AgentError::InvalidAddress(raw.to_string()));
        }

        if let Some(name) = addr.strip_prefix(ABSTRACT_PREFIX) {
            if name.is_empty() {
                return Err(AgentError::InvalidAddress(raw.to_string()));
            }
            return Ok(EndpointAddress::AbstractUnix(name.to_string()));
        }

        if let Some((host, port)) = addr.rsplit_once(':') {
            let port: u16 = port
                .parse()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| AgentError::InvalidAddress(raw.to_string()))?;

            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            let host = if host.is_empty() {
                DEFAULT_TCP_HOST.to_string()
            } else {
                host.to_string()
            };
            return Ok(EndpointAddress::Tcp { host, port });
        }

        Ok(EndpointAddress::Unix(PathBuf::from(addr)))
    }
}

impl FromStr for EndpointAddress {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAddress::Tcp { host, port } if host.contains(':') => {
                write!(f, "[{}]:{}", host, port)
            }
            EndpointAddress::Tcp { host, port } => write!(f, "{}:{}", host, port),
            EndpointAddress::Unix(path) => write!(f, "{}", path.display()),
            EndpointAddress::AbstractUnix(name) => write!(f, "{}{}", ABSTRACT_PREFIX, name),
        }
    }
}
