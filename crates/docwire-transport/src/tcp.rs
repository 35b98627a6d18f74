use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// Listening TCP socket.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on `addr` (`host:port`, port 0 picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let bind_err = |source: std::io::Error| TransportError::Bind {
            endpoint: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(%local_addr, "listening on tcp socket");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<WireStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(WireStream::from_tcp(stream))
    }

    /// Connect to `addr`, trying each resolved address until one succeeds.
    ///
    /// `timeout` bounds each individual connection attempt.
    pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<WireStream> {
        let connect_err = |source: std::io::Error| TransportError::Connect {
            endpoint: addr.to_string(),
            source,
        };

        let mut last_err = None;
        for candidate in addr.to_socket_addrs().map_err(connect_err)? {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%candidate, "connected to tcp socket");
                    return Ok(WireStream::from_tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        })))
    }

    /// Address actually bound (useful after binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
