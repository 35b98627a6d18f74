use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use docwire_frame::{
    Checkpoint, DocumentBuf, DocumentSink, DocumentSource, FrameError, FrameReader, FrameWriter,
    ReadSession,
};
use docwire_transport::{Endpoint, WireStream};
use docwire_value::{Event, EventKey, Value, Wire, WireType};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::header::{ChannelHeader, ChannelState};

/// Event key of heartbeat documents.
pub const TEST_MESSAGE: &str = "testMessage";

struct Pending {
    meta_data: bool,
    doc: DocumentBuf,
}

/// A negotiated, open document channel.
///
/// Reads never block: [`Channel::reading_document`] returns `Ok(None)` when
/// nothing complete has arrived and the caller should back off. Heartbeat
/// documents from the peer are consumed here and never surface as reads.
///
/// Documents are indexed from 0 in arrival order. The handshake and
/// heartbeats take no index.
pub struct Channel {
    endpoint: Endpoint,
    header: ChannelHeader,
    state: ChannelState,
    reader: FrameReader<WireStream>,
    writer: FrameWriter<WireStream>,
    wire: Arc<dyn Wire>,
    config: ChannelConfig,
    pending: Option<Pending>,
    documents_read: u64,
    frames_before_open: u64,
    opened_at: Instant,
    last_test_message: Option<i64>,
    last_test_message_at: Option<Instant>,
    last_received_test_message: Option<i64>,
}

impl Channel {
    /// Switch a negotiated connection to its runtime settings.
    pub(crate) fn open(
        endpoint: Endpoint,
        mut reader: FrameReader<WireStream>,
        mut writer: FrameWriter<WireStream>,
        header: ChannelHeader,
        config: ChannelConfig,
    ) -> Result<Self> {
        // Handshake ran under a tighter payload budget.
        reader.set_max_payload_size(config.frame.max_payload_size);
        writer.set_max_payload_size(config.frame.max_payload_size);
        writer.set_write_timeout(config.frame.write_timeout);
        writer.get_ref().set_write_timeout(config.frame.write_timeout)?;
        reader.get_ref().set_read_timeout(None)?;
        // Both halves share one socket, so sends become non-blocking too and
        // wait out a full buffer within the write timeout.
        reader.get_ref().set_nonblocking(true)?;
        let frames_before_open = writer.frames_written();

        tracing::debug!(%endpoint, wire = %config.wire_type, "channel open");
        Ok(Self {
            endpoint,
            header,
            state: ChannelState::Open,
            reader,
            writer,
            wire: config.wire_type.wire(),
            config,
            pending: None,
            documents_read: 0,
            frames_before_open,
            opened_at: Instant::now(),
            last_test_message: None,
            last_test_message_at: None,
            last_received_test_message: None,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Header this channel was negotiated with.
    pub fn header(&self) -> &ChannelHeader {
        &self.header
    }

    /// Endpoint the channel settled on, after any redirects.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn wire_type(&self) -> WireType {
        self.config.wire_type
    }

    pub fn wire(&self) -> &Arc<dyn Wire> {
        &self.wire
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Whether a coalesced document is waiting for [`Channel::flush`].
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Begin a read session if a complete document has arrived.
    pub fn reading_document(&mut self) -> Result<Option<ReadSession>> {
        self.ensure_open()?;
        Ok(self.poll_document()?)
    }

    /// Begin a write session on a fresh buffer. Ending it sends the
    /// document at once, after any pending coalesced document.
    pub fn writing_document(&mut self, meta_data: bool) -> Result<ChannelWriteSession<'_>> {
        self.ensure_open()?;
        self.flush()?;
        let doc = DocumentBuf::new(Arc::clone(&self.wire));
        Ok(ChannelWriteSession::new(self, doc, meta_data, false))
    }

    /// Begin a write session that appends to the pending unflushed document
    /// of the same kind, if there is one. Ending it keeps the document
    /// pending; [`Channel::flush`] sends it.
    pub fn acquire_writing_document(
        &mut self,
        meta_data: bool,
    ) -> Result<ChannelWriteSession<'_>> {
        self.ensure_open()?;
        let doc = match self.pending.take() {
            Some(pending) if pending.meta_data == meta_data => pending.doc,
            Some(pending) => {
                self.send(pending.meta_data, &pending.doc)?;
                DocumentBuf::new(Arc::clone(&self.wire))
            }
            None => DocumentBuf::new(Arc::clone(&self.wire)),
        };
        Ok(ChannelWriteSession::new(self, doc, meta_data, true))
    }

    /// Send the pending coalesced document, if any.
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.flush_pending()?)
    }

    /// Send a heartbeat carrying `now`, a monotonic timestamp.
    pub fn test_message(&mut self, now: i64) -> Result<()> {
        self.ensure_open()?;
        self.flush()?;
        let mut doc = DocumentBuf::new(Arc::clone(&self.wire));
        doc.write_event(TEST_MESSAGE, &Value::Int64(now))?;
        self.send(true, &doc)?;
        self.last_test_message = Some(now);
        self.last_test_message_at = Some(Instant::now());
        tracing::trace!(now, "heartbeat sent");
        Ok(())
    }

    /// Send a heartbeat if the configured interval has elapsed since the
    /// last one. The timestamp is nanoseconds since the channel opened.
    pub fn heartbeat(&mut self, now: Instant) -> Result<bool> {
        if !self.heartbeat_due(now) {
            return Ok(false);
        }
        let stamp = now.saturating_duration_since(self.opened_at).as_nanos();
        self.test_message(i64::try_from(stamp).unwrap_or(i64::MAX))?;
        self.last_test_message_at = Some(now);
        Ok(true)
    }

    pub fn heartbeat_due(&self, now: Instant) -> bool {
        self.last_test_message_at.is_none_or(|at| {
            now.saturating_duration_since(at) >= self.config.heartbeat_interval
        })
    }

    /// Timestamp of the most recent heartbeat sent.
    pub fn last_test_message(&self) -> Option<i64> {
        self.last_test_message
    }

    /// Timestamp of the most recent heartbeat received.
    pub fn last_received_test_message(&self) -> Option<i64> {
        self.last_received_test_message
    }

    /// Documents sent since the channel opened, heartbeats included.
    pub fn documents_written(&self) -> u64 {
        self.writer.frames_written() - self.frames_before_open
    }

    /// Documents handed to the application so far; also the index of the
    /// next one.
    pub fn documents_read(&self) -> u64 {
        self.documents_read
    }

    /// Flush what is pending and shut the connection down.
    ///
    /// Write sessions borrow the channel, so none can be open here; a
    /// pending coalesced document is sent, never left half-written.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }
        let flushed = self.flush_pending();
        if let Err(err) = self.writer.get_ref().shutdown() {
            tracing::debug!(error = %err, "socket shutdown on close");
        }
        self.state = ChannelState::Closed;
        tracing::debug!(endpoint = %self.endpoint, "channel closed");
        Ok(flushed?)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ChannelState::Open => Ok(()),
            other => Err(ChannelError::NotOpen(other)),
        }
    }

    fn poll_document(&mut self) -> docwire_frame::Result<Option<ReadSession>> {
        if self.state != ChannelState::Open {
            return Err(FrameError::ConnectionClosed);
        }
        loop {
            let frame = match self.reader.poll_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(None),
                Err(err) => {
                    self.fail(&err);
                    return Err(err);
                }
            };
            let session = ReadSession::new(
                self.documents_read,
                frame.meta_data,
                frame.payload,
                Arc::clone(&self.wire),
            );
            if session.is_meta_data() {
                if let Some(stamp) = heartbeat_stamp(&session) {
                    self.last_received_test_message = Some(stamp);
                    tracing::trace!(stamp, "heartbeat received");
                    continue;
                }
            }
            self.documents_read += 1;
            return Ok(Some(session));
        }
    }

    fn flush_pending(&mut self) -> docwire_frame::Result<()> {
        if let Some(pending) = self.pending.take() {
            self.send(pending.meta_data, &pending.doc)?;
        }
        Ok(())
    }

    fn send(&mut self, meta_data: bool, doc: &DocumentBuf) -> docwire_frame::Result<()> {
        if let Err(err) = self.writer.send_document(meta_data, doc) {
            self.fail(&err);
            return Err(err);
        }
        tracing::trace!(meta_data, events = doc.events(), len = doc.len(), "document sent");
        Ok(())
    }

    fn fail(&mut self, err: &FrameError) {
        if self.state == ChannelState::Open {
            self.state = ChannelState::Closed;
            self.pending = None;
            tracing::warn!(endpoint = %self.endpoint, error = %err, "channel failed");
        }
    }
}

fn heartbeat_stamp(session: &ReadSession) -> Option<i64> {
    session
        .find(&EventKey::name(TEST_MESSAGE))
        .ok()
        .flatten()
        .and_then(|value| value.as_i64())
}

impl DocumentSource for Channel {
    fn begin_read_document(&mut self) -> docwire_frame::Result<Option<ReadSession>> {
        self.poll_document()
    }
}

impl DocumentSink for Channel {
    fn write_document(&mut self, meta_data: bool, events: &[Event]) -> docwire_frame::Result<()> {
        if self.state != ChannelState::Open {
            return Err(FrameError::ConnectionClosed);
        }
        let mut doc = DocumentBuf::new(Arc::clone(&self.wire));
        for event in events {
            doc.write_event(event.key.clone(), &event.value)?;
        }
        self.flush_pending()?;
        self.send(meta_data, &doc)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(endpoint = %self.endpoint, error = %err, "pending document lost on drop");
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("wire", &self.config.wire_type)
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

/// An open document on a [`Channel`].
///
/// Dropping the session ends it, as [`ChannelWriteSession::end`] does;
/// [`ChannelWriteSession::discard`] drops the events written through it.
pub struct ChannelWriteSession<'a> {
    channel: &'a mut Channel,
    doc: DocumentBuf,
    start: Checkpoint,
    meta_data: bool,
    coalesce: bool,
    open: bool,
}

impl<'a> ChannelWriteSession<'a> {
    fn new(channel: &'a mut Channel, doc: DocumentBuf, meta_data: bool, coalesce: bool) -> Self {
        Self {
            channel,
            start: doc.checkpoint(),
            doc,
            meta_data,
            coalesce,
            open: true,
        }
    }
}

impl ChannelWriteSession<'_> {
    pub fn is_meta_data(&self) -> bool {
        self.meta_data
    }

    /// Whether ending this session leaves the document pending.
    pub fn is_coalescing(&self) -> bool {
        self.coalesce
    }

    pub fn end(mut self) -> Result<()> {
        self.finish(false)
    }

    pub fn discard(mut self) {
        if let Err(err) = self.finish(true) {
            tracing::debug!(error = %err, "discard");
        }
    }

    fn finish(&mut self, discard: bool) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if discard {
            self.doc.rollback(self.start);
        }
        let doc = std::mem::replace(
            &mut self.doc,
            DocumentBuf::new(Arc::clone(&self.channel.wire)),
        );

        if self.coalesce {
            if !doc.is_empty() {
                self.channel.pending = Some(Pending {
                    meta_data: self.meta_data,
                    doc,
                });
            }
            return Ok(());
        }
        if discard {
            return Ok(());
        }
        self.channel.send(self.meta_data, &doc)?;
        Ok(())
    }
}

impl Deref for ChannelWriteSession<'_> {
    type Target = DocumentBuf;

    fn deref(&self) -> &DocumentBuf {
        &self.doc
    }
}

impl DerefMut for ChannelWriteSession<'_> {
    fn deref_mut(&mut self) -> &mut DocumentBuf {
        &mut self.doc
    }
}

impl Drop for ChannelWriteSession<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.finish(false) {
            tracing::warn!(error = %err, "document dropped while sending");
        }
    }
}

impl fmt::Debug for ChannelWriteSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWriteSession")
            .field("meta_data", &self.meta_data)
            .field("coalesce", &self.coalesce)
            .field("doc", &self.doc)
            .finish()
    }
}
