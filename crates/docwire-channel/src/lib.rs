//! Document channels over sockets.
//!
//! A channel carries a framed document stream over a transport. Opening
//! one negotiates a [`ChannelHeader`]: `Ok` opens the channel, `Error`
//! reaches the caller as [`ChannelError::Rejected`], and `Redirect` is
//! followed to another endpoint without the caller seeing it. Open
//! channels offer non-blocking reads, fresh or coalescing write sessions,
//! and heartbeat documents for liveness monitoring.

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;
pub mod handshake;
pub mod header;
pub mod listener;

pub use channel::{Channel, ChannelWriteSession, TEST_MESSAGE};
pub use config::{
    ChannelConfig, HandshakeConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_REDIRECTS,
    DEFAULT_PROTOCOL, DEFAULT_PROTOCOL_VERSION,
};
pub use connector::{connect, connect_with_config};
pub use error::{ChannelError, Result};
pub use handshake::{handshake_client, handshake_server, Hello};
pub use header::{ChannelHeader, ChannelState};
pub use listener::{AcceptAll, Accepted, ChannelListener, HeaderPolicy};
