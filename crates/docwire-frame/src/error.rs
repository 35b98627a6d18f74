use std::time::Duration;

use docwire_value::WireError;

/// Errors that can occur during document framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame header is still marked not-complete.
    ///
    /// On a socket this means the peer sent a header it never finished; on
    /// an in-memory stream it is reported only once the completion deadline
    /// has passed (see [`FrameError::UnrecoverableTimeout`]).
    #[error("frame not complete (writer {writer_id:#x})")]
    NotComplete { writer_id: u32 },

    /// A frame stayed not-complete past the completion deadline.
    #[error("unrecoverable timeout waiting for document {index} to complete (writer {writer_id:?})")]
    UnrecoverableTimeout { index: u64, writer_id: Option<u32> },

    /// The stream contents are inconsistent.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Another write session is open on this stream.
    #[error("stream already has an open write session")]
    WriterBusy,

    /// The header layout cannot be built from the requested bit widths.
    #[error("invalid header layout: {0}")]
    InvalidLayout(String),

    /// Encoding or decoding a document's events failed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped draining a non-blocking stream for longer than the
    /// write timeout. Part of the frame may already be on the wire, so the
    /// stream must not be written to again.
    #[error("write timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn from_transport(err: docwire_transport::TransportError) -> FrameError {
    use docwire_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
