use std::borrow::BorrowMut;
use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use docwire_transport::WireStream;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::document::DocumentBuf;
use crate::error::{from_transport, FrameError, Result};
use crate::pauser::{BackoffPauser, Pauser};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// A frame is encoded in full before the first byte is written, so a peer
/// never observes a reserved-but-unfinished header on a socket.
///
/// On a non-blocking stream a full send buffer is waited out with a
/// [`BackoffPauser`], bounded by [`FrameConfig::write_timeout`].
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            frames_written: 0,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.meta_data, frame.payload.as_ref())
    }

    /// Frame and send the events collected in `doc`.
    pub fn send_document<B>(&mut self, meta_data: bool, doc: &DocumentBuf<B>) -> Result<()>
    where
        B: BorrowMut<BytesMut>,
    {
        self.send(meta_data, doc.payload())
    }

    /// Encode and send a payload.
    pub fn send(&mut self, meta_data: bool, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(meta_data, payload, self.config.layout, &mut self.buf)?;

        let mut wait = WriteWait::new(self.config.write_timeout);
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    wait.progressed();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => wait.pause()?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.frames_written += 1;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let mut wait = WriteWait::new(self.config.write_timeout);
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => wait.pause()?,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Bound on how long a send waits for a stalled non-blocking stream.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.config.write_timeout = timeout;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<WireStream> {
    /// Create a frame writer for `WireStream` and apply write timeout from config.
    pub fn with_config_stream(inner: WireStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(from_transport)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Backoff for a stream that cannot take more bytes yet.
struct WriteWait {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    pauser: BackoffPauser,
}

impl WriteWait {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            deadline: None,
            pauser: BackoffPauser::default(),
        }
    }

    /// The deadline runs from the first stall and restarts on progress.
    fn pause(&mut self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            let deadline = *self.deadline.get_or_insert_with(|| Instant::now() + timeout);
            if Instant::now() >= deadline {
                return Err(FrameError::WriteTimeout { timeout });
            }
        }
        self.pauser.pause();
        Ok(())
    }

    fn progressed(&mut self) {
        self.deadline = None;
        self.pauser.reset();
    }
}

impl<T> std::fmt::Debug for FrameWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;
    use docwire_value::WireType;

    use super::*;
    use crate::codec::{decode_frame, Frame};
    use crate::header::HeaderLayout;

    fn decode_all(bytes: &[u8]) -> Vec<Frame> {
        let mut wire = BytesMut::from(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX, HeaderLayout::default()).unwrap()
        {
            frames.push(frame);
        }
        assert!(wire.is_empty());
        frames
    }

    #[test]
    fn write_multiple_frames() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = FrameWriter::new(cursor);

        writer.send(true, b"one").unwrap();
        writer.send(false, b"two").unwrap();
        writer.write_frame(&Frame::data("three")).unwrap();
        assert_eq!(writer.frames_written(), 3);

        let frames = decode_all(&writer.into_inner().into_inner());
        assert_eq!(
            frames,
            vec![Frame::meta("one"), Frame::data("two"), Frame::data("three")]
        );
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(false, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert_eq!(writer.frames_written(), 0);
    }

    #[test]
    fn send_document_frames_the_payload() {
        let wire = WireType::Binary.wire();
        let mut doc = DocumentBuf::new(wire);
        doc.write("n", &1i64).unwrap();

        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_document(false, &doc).unwrap();

        let frames = decode_all(&writer.into_inner().into_inner());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), doc.payload());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(false, b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[test]
    fn retries_interrupted_and_would_block() {
        for kind in [ErrorKind::Interrupted, ErrorKind::WouldBlock] {
            let mut writer = FrameWriter::new(FailOnceWriter::new(kind));
            writer.send(false, b"retry").unwrap();

            let inner = writer.into_inner();
            assert!(!inner.data.is_empty(), "{kind:?}");
        }
    }

    #[test]
    fn stalled_stream_times_out_instead_of_spinning() {
        let timeout = std::time::Duration::from_millis(50);
        let cfg = FrameConfig::default().with_write_timeout(Some(timeout));
        let mut writer = FrameWriter::with_config(StalledWriter::default(), cfg);

        let started = Instant::now();
        let err = writer.send(false, b"never drained").unwrap_err();
        assert!(matches!(err, FrameError::WriteTimeout { timeout: t } if t == timeout));
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(writer.frames_written(), 0);
        // Backoff sleeps between attempts rather than retrying in a tight loop.
        assert!(writer.get_ref().attempts < 10_000, "{}", writer.get_ref().attempts);
    }

    #[test]
    fn slow_drain_completes_within_timeout() {
        let cfg = FrameConfig::default()
            .with_write_timeout(Some(std::time::Duration::from_millis(200)));
        let mut writer = FrameWriter::with_config(TrickleWriter::default(), cfg);

        writer.send(true, b"one byte at a time").unwrap();
        let frames = decode_all(&writer.into_inner().data);
        assert_eq!(frames, vec![Frame::meta("one byte at a time")]);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(false, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_wire_stream() {
        let (left, _right) = WireStream::pair().unwrap();
        let cfg = FrameConfig::default()
            .with_write_timeout(Some(std::time::Duration::from_millis(10)));
        assert!(FrameWriter::with_config_stream(left, cfg).is_ok());
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first write and the first flush with `kind`.
    struct FailOnceWriter {
        write_error: Option<ErrorKind>,
        flush_error: Option<ErrorKind>,
        data: Vec<u8>,
    }

    impl FailOnceWriter {
        fn new(kind: ErrorKind) -> Self {
            Self {
                write_error: Some(kind),
                flush_error: Some(kind),
                data: Vec::new(),
            }
        }
    }

    impl Write for FailOnceWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.write_error.take() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            match self.flush_error.take() {
                Some(kind) => Err(std::io::Error::from(kind)),
                None => Ok(()),
            }
        }
    }

    /// Never accepts a byte, like a socket whose peer stopped reading.
    #[derive(Default)]
    struct StalledWriter {
        attempts: usize,
    }

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Alternates between a full buffer and accepting a single byte.
    #[derive(Default)]
    struct TrickleWriter {
        blocked: bool,
        data: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.blocked = !self.blocked;
            if self.blocked {
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
