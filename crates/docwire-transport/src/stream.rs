use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected byte stream that a channel frames documents over.
///
/// Implements `Read + Write`. The channel layer switches the stream to
/// non-blocking mode once the handshake completes so that document reads
/// never park the calling thread.
pub struct WireStream {
    inner: WireStreamInner,
}

enum WireStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for WireStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.read(buf),
            WireStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.write(buf),
            WireStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.flush(),
            WireStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl WireStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: WireStreamInner::Unix(stream),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: WireStreamInner::Tcp(stream),
        }
    }

    /// A connected pair of in-process streams, for tests and loopback use.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.set_read_timeout(timeout)?,
            WireStreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.set_write_timeout(timeout)?,
            WireStreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Switch the stream between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking)?,
            WireStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            WireStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
        }
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        let res = match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            WireStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        };
        match res {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            WireStreamInner::Unix(_) => "unix",
            WireStreamInner::Tcp(_) => "tcp",
        }
    }

    /// Get the credentials of a Unix-socket peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            WireStreamInner::Unix(stream) => stream.as_raw_fd(),
            WireStreamInner::Tcp(_) => return None,
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this stream.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl std::fmt::Debug for WireStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
