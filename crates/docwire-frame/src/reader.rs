use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use docwire_transport::WireStream;
use docwire_value::Wire;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::document::ReadSession;
use crate::error::{from_transport, FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    frames_read: u64,
    partial_since: Option<Instant>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            frames_read: 0,
            partial_since: None,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(frame);
            }

            match self.fill() {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Return the next frame if one is available without waiting.
    ///
    /// The stream should be non-blocking or carry a read timeout; a
    /// `WouldBlock` or `TimedOut` read yields `Ok(None)`. Bytes of a frame
    /// that stays partial beyond the completion deadline are reported as
    /// [`FrameError::UnrecoverableTimeout`].
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        self.poll_frame_at(Instant::now())
    }

    pub fn poll_frame_at(&mut self, now: Instant) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(Some(frame));
            }

            match self.fill() {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return self.check_partial(now).map(|()| None);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Read the next frame as a document session (blocking).
    pub fn read_document(&mut self, wire: &Arc<dyn Wire>) -> Result<ReadSession> {
        let index = self.frames_read;
        let frame = self.read_frame()?;
        Ok(ReadSession::new(index, frame.meta_data, frame.payload, Arc::clone(wire)))
    }

    /// Non-blocking variant of [`FrameReader::read_document`].
    pub fn poll_document(&mut self, wire: &Arc<dyn Wire>) -> Result<Option<ReadSession>> {
        let index = self.frames_read;
        Ok(self
            .poll_frame()?
            .map(|frame| ReadSession::new(index, frame.meta_data, frame.payload, Arc::clone(wire))))
    }

    /// Frames returned so far; also the index of the next one.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Bytes buffered toward the next frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn decode_buffered(&mut self) -> Result<Option<Frame>> {
        let frame = decode_frame(&mut self.buf, self.config.max_payload_size, self.config.layout)?;
        if frame.is_some() {
            self.frames_read += 1;
            self.partial_since = None;
        }
        Ok(frame)
    }

    fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = self.inner.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    fn check_partial(&mut self, now: Instant) -> Result<()> {
        if self.buf.is_empty() {
            self.partial_since = None;
            return Ok(());
        }
        let since = *self.partial_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.config.completion_timeout {
            tracing::warn!(
                index = self.frames_read,
                buffered = self.buf.len(),
                "frame stayed partial past the completion deadline"
            );
            return Err(FrameError::UnrecoverableTimeout {
                index: self.frames_read,
                writer_id: None,
            });
        }
        Ok(())
    }
}

impl FrameReader<WireStream> {
    /// Create a frame reader for `WireStream` and apply read timeout from config.
    pub fn with_config_stream(inner: WireStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(from_transport)?;
        Ok(Self::with_config(inner, config))
    }
}

impl<T> std::fmt::Debug for FrameReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buf.len())
            .field("frames_read", &self.frames_read)
            .finish_non_exhaustive()
    }
}
