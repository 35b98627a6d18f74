//! Byte-stream transports for docwire channels.
//!
//! A channel frames documents over any bidirectional byte stream. This crate
//! supplies the two concrete carriers the rest of the workspace uses:
//! - Unix domain sockets (Linux/macOS)
//! - TCP sockets
//!
//! Both are exposed through one [`WireStream`] type and one [`WireListener`]
//! type, addressed by an [`Endpoint`].

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, WireListener};
pub use stream::WireStream;
pub use tcp::TcpSocket;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
