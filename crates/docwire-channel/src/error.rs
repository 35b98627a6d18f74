use std::time::Duration;

use crate::header::ChannelState;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] docwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] docwire_frame::FrameError),

    /// Value encoding or decoding error.
    #[error("wire error: {0}")]
    Wire(#[from] docwire_value::WireError),

    /// The handshake exchange was malformed or incompatible.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer answered the handshake with an error header.
    #[error("channel rejected by peer: {0}")]
    Rejected(String),

    /// Redirects did not settle within the configured limit.
    #[error("too many redirects (limit {limit}, last target {last})")]
    TooManyRedirects { limit: usize, last: String },

    /// The handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The peer went away during the handshake.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The operation needs an open channel.
    #[error("channel is {0}")]
    NotOpen(ChannelState),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
