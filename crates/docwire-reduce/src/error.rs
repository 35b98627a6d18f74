use docwire_frame::FrameError;
use docwire_value::WireError;

/// Errors raised while extracting or folding documents.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// Reading from the document source failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A document's value could not be read as the extracted type.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// An extractor rejected the document.
    #[error("extraction failed: {0}")]
    Extract(String),
}

pub type Result<T> = std::result::Result<T, ReduceError>;
