//! In-memory document stream with one writer and many tailers.
//!
//! The stream is a single growable byte log of framed documents. A write
//! session reserves a not-complete header stamped with the writer id as soon
//! as it begins; the payload is staged in a pooled buffer and appended, with
//! the header patched, in one step when the session ends. Tailers that reach
//! an open header wait for it, and give up with
//! [`FrameError::UnrecoverableTimeout`] if it stays open past the configured
//! completion deadline.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use docwire_value::{Event, Pool, PoolConfig, Pooled, Wire};
use parking_lot::RwLock;

use crate::codec::{peek_header, FrameConfig};
use crate::document::{DocumentBuf, DocumentSink, DocumentSource, ReadSession};
use crate::error::{FrameError, Result};
use crate::header::{FrameHeader, HEADER_SIZE};

#[derive(Debug, Default)]
struct Log {
    bytes: BytesMut,
    /// Byte offset of every document header, complete or not.
    offsets: Vec<usize>,
}

#[derive(Debug)]
struct Shared {
    log: RwLock<Log>,
    writing: AtomicBool,
    next_writer_id: AtomicU32,
    wire: Arc<dyn Wire>,
    config: FrameConfig,
    buffers: Pool<BytesMut>,
}

/// A shared, append-only stream of framed documents.
///
/// Cloning is cheap; clones refer to the same stream.
#[derive(Debug, Clone)]
pub struct DocumentStream {
    shared: Arc<Shared>,
}

impl DocumentStream {
    pub fn new(wire: Arc<dyn Wire>) -> Self {
        Self::with_config(wire, FrameConfig::default())
    }

    pub fn with_config(wire: Arc<dyn Wire>, config: FrameConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                log: RwLock::new(Log::default()),
                writing: AtomicBool::new(false),
                next_writer_id: AtomicU32::new(1),
                wire,
                config,
                buffers: Pool::new(PoolConfig::default().with_capacity(4), BytesMut::new),
            }),
        }
    }

    /// Obtain a writer handle with its own writer id.
    ///
    /// Ids are never 0. They are unique until the layout's writer-id bits
    /// run out, after which they repeat from 1; a narrow layout makes
    /// stuck-writer reports ambiguous.
    pub fn acquire_writer(&self) -> DocumentWriter {
        let layout = self.shared.config.layout;
        let writer_id = loop {
            let id = self.shared.next_writer_id.fetch_add(1, Ordering::Relaxed);
            let masked = layout.mask_writer_id(id);
            if masked != 0 {
                break masked;
            }
        };
        DocumentWriter {
            shared: Arc::clone(&self.shared),
            writer_id,
        }
    }

    /// Create a read cursor positioned at the first document.
    pub fn tailer(&self) -> Tailer {
        Tailer {
            shared: Arc::clone(&self.shared),
            position: 0,
            index: 0,
            waiting_since: None,
        }
    }

    /// Number of documents started on the stream, including an open one.
    pub fn document_count(&self) -> usize {
        self.shared.log.read().offsets.len()
    }

    /// Total bytes in the stream.
    pub fn len(&self) -> usize {
        self.shared.log.read().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.log.read().bytes.is_empty()
    }

    pub fn wire(&self) -> &Arc<dyn Wire> {
        &self.shared.wire
    }

    pub fn config(&self) -> &FrameConfig {
        &self.shared.config
    }
}

/// Write handle onto a [`DocumentStream`].
#[derive(Debug)]
pub struct DocumentWriter {
    shared: Arc<Shared>,
    writer_id: u32,
}

impl DocumentWriter {
    /// Open a document, reserving its not-complete header.
    ///
    /// Fails with [`FrameError::WriterBusy`] while another session is open
    /// on the same stream.
    pub fn begin_document(&self, meta_data: bool) -> Result<WriteSession<'_>> {
        if self
            .shared
            .writing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FrameError::WriterBusy);
        }

        let (header_at, index) = {
            let mut log = self.shared.log.write();
            let header_at = log.bytes.len();
            let word = FrameHeader::NotComplete {
                meta_data,
                writer_id: self.writer_id,
            }
            .encode(self.shared.config.layout);
            log.bytes.extend_from_slice(&word.to_le_bytes());
            log.offsets.push(header_at);
            (header_at, log.offsets.len() as u64 - 1)
        };
        tracing::trace!(index, meta_data, writer_id = self.writer_id, "document opened");

        Ok(WriteSession {
            shared: &*self.shared,
            doc: DocumentBuf::with_buffer(
                Arc::clone(&self.shared.wire),
                self.shared.buffers.acquire(),
            ),
            meta_data,
            header_at,
            index,
            open: true,
        })
    }

    pub fn writer_id(&self) -> u32 {
        self.writer_id
    }
}

impl DocumentSink for DocumentWriter {
    fn write_document(&mut self, meta_data: bool, events: &[Event]) -> Result<()> {
        let mut session = self.begin_document(meta_data)?;
        let written = events.iter().try_for_each(|event| {
            session
                .write_event(event.key.clone(), &event.value)
                .map(|_| ())
        });
        match written {
            Ok(()) => session.end(),
            Err(err) => {
                session.discard();
                Err(err)
            }
        }
    }
}

/// An open document on a [`DocumentStream`].
///
/// Dropping the session commits it, as [`WriteSession::end`] does.
/// [`WriteSession::discard`] removes the reserved header instead.
#[derive(Debug)]
pub struct WriteSession<'a> {
    shared: &'a Shared,
    doc: DocumentBuf<Pooled<'a, BytesMut>>,
    meta_data: bool,
    header_at: usize,
    index: u64,
    open: bool,
}

impl WriteSession<'_> {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_meta_data(&self) -> bool {
        self.meta_data
    }

    /// Commit the payload and patch the header.
    pub fn end(mut self) -> Result<()> {
        self.commit()
    }

    /// Roll the stream back to before this document.
    pub fn discard(mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.rollback();
        self.shared.writing.store(false, Ordering::Release);
        tracing::debug!(index = self.index, "document discarded");
    }

    fn rollback(&self) {
        let mut log = self.shared.log.write();
        log.bytes.truncate(self.header_at);
        log.offsets.pop();
    }

    fn commit(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let result = self.append();
        if result.is_err() {
            self.rollback();
        }
        self.shared.writing.store(false, Ordering::Release);
        result
    }

    fn append(&self) -> Result<()> {
        let payload = self.doc.payload();
        if payload.len() > self.shared.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.shared.config.max_payload_size,
            });
        }
        let word = FrameHeader::complete(self.meta_data, payload.len())?
            .encode(self.shared.config.layout);

        let mut log = self.shared.log.write();
        log.bytes.extend_from_slice(payload);
        log.bytes[self.header_at..self.header_at + HEADER_SIZE]
            .copy_from_slice(&word.to_le_bytes());
        tracing::trace!(
            index = self.index,
            meta_data = self.meta_data,
            len = payload.len(),
            "document committed"
        );
        Ok(())
    }
}

impl<'a> Deref for WriteSession<'a> {
    type Target = DocumentBuf<Pooled<'a, BytesMut>>;

    fn deref(&self) -> &Self::Target {
        &self.doc
    }
}

impl DerefMut for WriteSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.doc
    }
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.commit() {
            tracing::warn!(index = self.index, error = %err, "document dropped during commit");
        }
    }
}

/// An independent read cursor over a [`DocumentStream`].
#[derive(Debug)]
pub struct Tailer {
    shared: Arc<Shared>,
    position: usize,
    index: u64,
    waiting_since: Option<Instant>,
}

impl Tailer {
    /// Index of the next document this tailer will return.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Move back to the first document.
    pub fn to_start(&mut self) -> &mut Self {
        self.position = 0;
        self.index = 0;
        self.waiting_since = None;
        self
    }

    /// Move past every complete document.
    ///
    /// An open document at the end of the stream is not skipped; it is
    /// returned once committed.
    pub fn to_end(&mut self) -> &mut Self {
        let log = self.shared.log.read();
        let layout = self.shared.config.layout;
        let (position, index) = match log.offsets.last() {
            Some(&last) => match peek_header(&log.bytes[last..], layout) {
                Some(FrameHeader::NotComplete { .. }) => (last, log.offsets.len() - 1),
                _ => (log.bytes.len(), log.offsets.len()),
            },
            None => (0, 0),
        };
        drop(log);
        self.position = position;
        self.index = index as u64;
        self.waiting_since = None;
        self
    }

    /// Same as [`DocumentSource::begin_read_document`], with an explicit
    /// clock for the completion deadline.
    pub fn begin_read_document_at(&mut self, now: Instant) -> Result<Option<ReadSession>> {
        let log = self.shared.log.read();
        let layout = self.shared.config.layout;
        let Some(header) = peek_header(log.bytes.get(self.position..).unwrap_or(&[]), layout)
        else {
            self.waiting_since = None;
            return Ok(None);
        };

        let (meta_data, len) = match header {
            FrameHeader::Complete { meta_data, len } => (meta_data, len as usize),
            FrameHeader::NotComplete { writer_id, .. } => {
                let since = *self.waiting_since.get_or_insert(now);
                if now.saturating_duration_since(since) >= self.shared.config.completion_timeout {
                    tracing::warn!(
                        index = self.index,
                        writer_id,
                        "document stuck in not-complete state"
                    );
                    return Err(FrameError::UnrecoverableTimeout {
                        index: self.index,
                        writer_id: Some(writer_id),
                    });
                }
                return Ok(None);
            }
        };
        self.waiting_since = None;

        let start = self.position + HEADER_SIZE;
        let end = start + len;
        if end > log.bytes.len() {
            return Err(FrameError::Corrupt(format!(
                "document {} claims {len} bytes past the end of the stream",
                self.index
            )));
        }
        let payload = Bytes::copy_from_slice(&log.bytes[start..end]);
        drop(log);

        let session = ReadSession::new(self.index, meta_data, payload, Arc::clone(&self.shared.wire));
        self.position = end;
        self.index += 1;
        Ok(Some(session))
    }
}

impl DocumentSource for Tailer {
    fn begin_read_document(&mut self) -> Result<Option<ReadSession>> {
        self.begin_read_document_at(Instant::now())
    }
}
