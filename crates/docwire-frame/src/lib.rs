//! Document framing for docwire streams.
//!
//! Every document is preceded by a 4-byte little-endian header word:
//! - bit 31: not-complete (header reserved, payload not yet committed)
//! - bit 30: metadata document
//! - bits 0-29: payload length, or a masked writer id while not complete
//!
//! Readers never observe a partial document: an open header means "wait",
//! and one that stays open past the completion deadline is an explicit
//! [`FrameError::UnrecoverableTimeout`].

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod document;
pub mod error;
pub mod header;
pub mod pauser;
pub mod reader;
pub mod stream;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::DocumentCodec;
pub use codec::{
    decode_frame, encode_frame, peek_header, Frame, FrameConfig, DEFAULT_COMPLETION_TIMEOUT,
    DEFAULT_MAX_PAYLOAD,
};
pub use document::{
    Checkpoint, DocumentBuf, DocumentQueue, DocumentSink, DocumentSource, ReadSession,
};
pub use error::{FrameError, Result};
pub use header::{FrameHeader, HeaderLayout, HEADER_SIZE, META_DATA, NOT_COMPLETE};
pub use pauser::{BackoffPauser, FixedPauser, PauseStage, Pauser};
pub use reader::FrameReader;
pub use stream::{DocumentStream, DocumentWriter, Tailer, WriteSession};
pub use writer::FrameWriter;
