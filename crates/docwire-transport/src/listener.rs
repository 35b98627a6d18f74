use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::WireStream;
use crate::tcp::TcpSocket;

/// A listening socket of either transport kind.
pub enum WireListener {
    #[cfg(unix)]
    Unix(crate::uds::UnixDomainSocket),
    Tcp(TcpSocket),
}

impl WireListener {
    /// Bind a listener for `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(crate::uds::UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(crate::error::TransportError::Unsupported(
                endpoint.to_string(),
            )),
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpSocket::bind(addr)?)),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<WireStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
            Self::Tcp(socket) => socket.accept(),
        }
    }

    /// The endpoint peers should connect to. For TCP this reports the bound
    /// port, not the requested one.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Self::Tcp(socket) => Endpoint::Tcp(socket.local_addr().to_string()),
        }
    }
}

/// Connect to `endpoint`. `timeout` applies to TCP connection setup; Unix
/// socket connects complete or fail immediately.
pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<WireStream> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => crate::uds::UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => {
            let _ = timeout;
            Err(crate::error::TransportError::Unsupported(
                endpoint.to_string(),
            ))
        }
        Endpoint::Tcp(addr) => TcpSocket::connect(addr, timeout),
    }
}
