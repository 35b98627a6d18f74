/// Errors raised by method writers, readers and dispatch tables.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Frame-level error from the underlying stream.
    #[error("frame error: {0}")]
    Frame(#[from] docwire_frame::FrameError),

    /// Value encoding or decoding error.
    #[error("wire error: {0}")]
    Wire(#[from] docwire_value::WireError),

    /// Two handlers were registered for the same method.
    #[error("method {0} registered twice")]
    DuplicateMethod(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
