//! Document payload builders and read sessions.

use std::borrow::{Borrow, BorrowMut};
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use docwire_value::{Event, EventKey, ToValue, Value, ValueOut, Wire};

use crate::error::Result;

/// Accumulates encoded events for one document.
///
/// `B` is the backing buffer: an owned `BytesMut`, or a pooled one lent by
/// a stream for the life of a write session.
pub struct DocumentBuf<B = BytesMut> {
    wire: Arc<dyn Wire>,
    payload: B,
    events: usize,
}

impl DocumentBuf {
    pub fn new(wire: Arc<dyn Wire>) -> Self {
        Self::with_buffer(wire, BytesMut::new())
    }
}

impl<B: BorrowMut<BytesMut>> DocumentBuf<B> {
    /// Use `payload` as the backing buffer. Existing contents are cleared.
    pub fn with_buffer(wire: Arc<dyn Wire>, mut payload: B) -> Self {
        let buf: &mut BytesMut = payload.borrow_mut();
        buf.clear();
        Self {
            wire,
            payload,
            events: 0,
        }
    }

    /// Append one event.
    pub fn write_event(&mut self, key: impl Into<EventKey>, value: &Value) -> Result<&mut Self> {
        self.wire
            .encode_event(&key.into(), value, self.payload.borrow_mut())?;
        self.events += 1;
        Ok(self)
    }

    /// Append one event from anything with a [`ToValue`] mapping.
    pub fn write<T: ToValue + ?Sized>(
        &mut self,
        key: impl Into<EventKey>,
        value: &T,
    ) -> Result<&mut Self> {
        self.write_event(key, &value.to_value())
    }

    /// Append one event whose value is built through a [`ValueOut`].
    pub fn event(
        &mut self,
        key: impl Into<EventKey>,
        fill: impl FnOnce(ValueOut<'_>),
    ) -> Result<&mut Self> {
        let mut value = Value::Null;
        fill(ValueOut::new(&mut value));
        self.write_event(key, &value)
    }

    pub fn payload(&self) -> &[u8] {
        self.buf()
    }

    /// Number of events written so far.
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    pub fn len(&self) -> usize {
        self.buf().len()
    }

    pub fn clear(&mut self) {
        self.buf_mut().clear();
        self.events = 0;
    }

    pub fn wire(&self) -> &Arc<dyn Wire> {
        &self.wire
    }

    /// Remember the current end of the document.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.buf().len(),
            events: self.events,
        }
    }

    /// Drop every event written after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        if checkpoint.len <= self.buf().len() {
            self.buf_mut().truncate(checkpoint.len);
            self.events = checkpoint.events;
        }
    }

    fn buf(&self) -> &BytesMut {
        self.payload.borrow()
    }

    fn buf_mut(&mut self) -> &mut BytesMut {
        self.payload.borrow_mut()
    }
}

/// A position inside a [`DocumentBuf`], see [`DocumentBuf::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    len: usize,
    events: usize,
}

impl<B> fmt::Debug for DocumentBuf<B>
where
    B: BorrowMut<BytesMut>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBuf")
            .field("wire", &self.wire.wire_type())
            .field("events", &self.events)
            .field("len", &self.buf().len())
            .finish()
    }
}

/// One complete document handed to a reader.
///
/// Event access is bounded by the framed payload; decoding can never run
/// into the next document.
#[derive(Clone)]
pub struct ReadSession {
    index: u64,
    meta_data: bool,
    payload: Bytes,
    cursor: Bytes,
    wire: Arc<dyn Wire>,
}

impl ReadSession {
    pub fn new(index: u64, meta_data: bool, payload: Bytes, wire: Arc<dyn Wire>) -> Self {
        Self {
            index,
            meta_data,
            cursor: payload.clone(),
            payload,
            wire,
        }
    }

    /// Logical position of this document in its stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_meta_data(&self) -> bool {
        self.meta_data
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn wire(&self) -> &Arc<dyn Wire> {
        &self.wire
    }

    /// Decode the next event, or `None` at the end of the document.
    pub fn read_event(&mut self) -> Result<Option<Event>> {
        Ok(self.wire.decode_event(&mut self.cursor)?)
    }

    /// Rewind the event cursor to the start of the document.
    pub fn rewind(&mut self) {
        self.cursor = self.payload.clone();
    }

    /// Decode every event in the document.
    pub fn events(&self) -> Result<Vec<Event>> {
        let mut cursor = self.payload.clone();
        let mut events = Vec::new();
        while let Some(event) = self.wire.decode_event(&mut cursor)? {
            events.push(event);
        }
        Ok(events)
    }

    /// Value of the first event with `key`.
    pub fn find(&self, key: &EventKey) -> Result<Option<Value>> {
        let mut cursor = self.payload.clone();
        while let Some(event) = self.wire.decode_event(&mut cursor)? {
            if &event.key == key {
                return Ok(Some(event.value));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ReadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSession")
            .field("index", &self.index)
            .field("meta_data", &self.meta_data)
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Anything that yields complete documents in order.
///
/// `begin_read_document` never blocks: `Ok(None)` means nothing complete is
/// available yet and the caller should back off and retry.
pub trait DocumentSource {
    fn begin_read_document(&mut self) -> Result<Option<ReadSession>>;
}

impl<S: DocumentSource + ?Sized> DocumentSource for &mut S {
    fn begin_read_document(&mut self) -> Result<Option<ReadSession>> {
        (**self).begin_read_document()
    }
}

/// Anything that accepts whole documents.
pub trait DocumentSink {
    /// Frame `events` as one document.
    fn write_document(&mut self, meta_data: bool, events: &[Event]) -> Result<()>;
}

impl<S: DocumentSink + ?Sized> DocumentSink for &mut S {
    fn write_document(&mut self, meta_data: bool, events: &[Event]) -> Result<()> {
        (**self).write_document(meta_data, events)
    }
}

/// A fixed, replayable list of documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentQueue {
    sessions: std::collections::VecDeque<ReadSession>,
}

impl DocumentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, session: ReadSession) {
        self.sessions.push_back(session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl FromIterator<ReadSession> for DocumentQueue {
    fn from_iter<I: IntoIterator<Item = ReadSession>>(iter: I) -> Self {
        Self {
            sessions: iter.into_iter().collect(),
        }
    }
}

impl DocumentSource for DocumentQueue {
    fn begin_read_document(&mut self) -> Result<Option<ReadSession>> {
        Ok(self.sessions.pop_front())
    }
}
