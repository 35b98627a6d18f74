//! Transport addresses.
//!
//! Endpoints travel inside channel headers (a redirect names the endpoint to
//! re-resolve), so they have a stable textual form:
//!
//! ```text
//! unix:/run/docwire/feed.sock
//! tcp:127.0.0.1:7400
//! ```
//!
//! A bare path without a scheme is treated as a Unix socket path.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const UNIX_SCHEME: &str = "unix:";
const TCP_SCHEME: &str = "tcp:";

/// Address of a listening docwire peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// `host:port` TCP address, resolved at connect time.
    Tcp(String),
}

impl Endpoint {
    /// Unix socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    /// TCP endpoint.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp(addr.into())
    }

    /// Short transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unix(_) => "unix",
            Self::Tcp(_) => "tcp",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
            Self::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }

        if let Some(path) = s.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = s.strip_prefix(TCP_SCHEME) {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }

        if s.contains("://") {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Self::Unix(PathBuf::from(s)))
    }
}
