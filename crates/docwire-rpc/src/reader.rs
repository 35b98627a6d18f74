use std::sync::Arc;

use docwire_frame::{DocumentSource, ReadSession};
use docwire_value::Event;

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::error::Result;

type UnknownHook = Box<dyn FnMut(&Event) + Send>;
type MetaHook = Box<dyn FnMut(&ReadSession) + Send>;

/// Counters kept by a [`MethodReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Documents consumed, metadata included.
    pub documents: u64,
    pub invoked: u64,
    pub unknown: u64,
    /// Events dropped because they could not be decoded or applied.
    pub failed: u64,
}

/// Receiver side of an interface: reads documents from a source and
/// invokes the matching handlers on a target.
pub struct MethodReader<S, T> {
    source: S,
    dispatcher: Arc<Dispatcher<T>>,
    on_unknown: Option<UnknownHook>,
    on_meta: Option<MetaHook>,
    stats: ReaderStats,
}

impl<S: DocumentSource, T> MethodReader<S, T> {
    pub fn new(source: S, dispatcher: impl Into<Arc<Dispatcher<T>>>) -> Self {
        Self {
            source,
            dispatcher: dispatcher.into(),
            on_unknown: None,
            on_meta: None,
            stats: ReaderStats::default(),
        }
    }

    /// Called with every event no method matches.
    pub fn with_unknown_hook(mut self, hook: impl FnMut(&Event) + Send + 'static) -> Self {
        self.on_unknown = Some(Box::new(hook));
        self
    }

    /// Called with every metadata document instead of skipping it silently.
    pub fn with_meta_hook(mut self, hook: impl FnMut(&ReadSession) + Send + 'static) -> Self {
        self.on_meta = Some(Box::new(hook));
        self
    }

    /// Consume one document and dispatch its events to `target`.
    ///
    /// Returns `Ok(false)` when the source had nothing complete to offer.
    /// Unknown events and events that fail to decode are logged and
    /// skipped; the document still counts as consumed. Only errors from the
    /// source itself are returned.
    pub fn read_one(&mut self, target: &mut T) -> Result<bool> {
        let Some(mut session) = self.source.begin_read_document()? else {
            return Ok(false);
        };
        self.stats.documents += 1;

        if session.is_meta_data() {
            tracing::trace!(index = session.index(), "metadata document");
            if let Some(hook) = self.on_meta.as_mut() {
                hook(&session);
            }
            return Ok(true);
        }

        loop {
            match session.read_event() {
                Ok(Some(event)) => self.dispatch(target, session.index(), &event),
                Ok(None) => break,
                Err(err) => {
                    self.stats.failed += 1;
                    tracing::warn!(
                        index = session.index(),
                        error = %err,
                        "undecodable event, skipping rest of document"
                    );
                    break;
                }
            }
        }
        Ok(true)
    }

    /// Read until the source is empty or `limit` documents were consumed.
    /// Returns the number consumed.
    pub fn drain(&mut self, target: &mut T, limit: usize) -> Result<usize> {
        let mut consumed = 0;
        while consumed < limit && self.read_one(target)? {
            consumed += 1;
        }
        Ok(consumed)
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<T>> {
        &self.dispatcher
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn dispatch(&mut self, target: &mut T, index: u64, event: &Event) {
        match self.dispatcher.dispatch(target, event) {
            Ok(Dispatched::Invoked(method)) => {
                self.stats.invoked += 1;
                tracing::trace!(index, %method, "method invoked");
            }
            Ok(Dispatched::Unknown) => {
                self.stats.unknown += 1;
                tracing::warn!(index, key = %event.key, "no method for event");
                if let Some(hook) = self.on_unknown.as_mut() {
                    hook(event);
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                tracing::warn!(index, key = %event.key, error = %err, "method call dropped");
            }
        }
    }
}

impl<S, T> std::fmt::Debug for MethodReader<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodReader")
            .field("dispatcher", &self.dispatcher)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use docwire_frame::{DocumentStream, FrameError};
    use docwire_value::{
        marshallable_value, EventKey, Marshallable, ObjectIn, ObjectOut, Value, WireType,
    };
    use proptest::prelude::*;

    use super::*;
    use crate::error::DispatchError;
    use crate::key::MethodKey;
    use crate::writer::MethodWriter;

    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        symbol: String,
        qty: i32,
    }

    impl Marshallable for Order {
        const TYPE_NAME: &'static str = "Order";

        fn write_fields(&self, out: &mut ObjectOut) {
            out.write("symbol", &self.symbol).write("qty", &self.qty);
        }

        fn read_fields(input: &ObjectIn<'_>) -> docwire_value::Result<Self> {
            Ok(Self {
                symbol: input.read("symbol")?,
                qty: input.read("qty")?,
            })
        }
    }

    marshallable_value!(Order);

    #[derive(Debug, Default)]
    struct Desk {
        said: Vec<String>,
        orders: Vec<Order>,
        moves: Vec<(i64, f64)>,
        resets: usize,
    }

    fn say() -> MethodKey {
        MethodKey::new("say")
    }

    fn place() -> MethodKey {
        MethodKey::new("place").with_id(10)
    }

    fn shift() -> MethodKey {
        MethodKey::new("shift")
    }

    fn reset() -> MethodKey {
        MethodKey::new("reset")
    }

    fn desk_table() -> Dispatcher<Desk> {
        Dispatcher::new()
            .on(say(), |d: &mut Desk, text: String| d.said.push(text))
            .unwrap()
            .on(place(), |d: &mut Desk, order: Order| d.orders.push(order))
            .unwrap()
            .on(shift(), |d: &mut Desk, by: i64, scale: f64| {
                d.moves.push((by, scale))
            })
            .unwrap()
            .on(reset(), |d: &mut Desk| d.resets += 1)
            .unwrap()
    }

    /// Caller-side proxy, the way an interface forwards to its writer.
    struct DeskProxy<S> {
        writer: MethodWriter<S>,
    }

    impl<S: docwire_frame::DocumentSink> DeskProxy<S> {
        fn say(&mut self, text: &str) -> Result<()> {
            self.writer.call(&say(), (text,))
        }

        fn place(&mut self, order: &Order) -> Result<()> {
            self.writer.call(&place(), (order,))
        }

        fn shift(&mut self, by: i64, scale: f64) -> Result<()> {
            self.writer.call(&shift(), (by, scale))
        }

        fn reset(&mut self) -> Result<()> {
            self.writer.call(&reset(), ())
        }
    }

    #[test]
    fn calls_arrive_in_order_with_their_arguments() {
        for wire_type in [WireType::Binary, WireType::Json] {
            let stream = DocumentStream::new(wire_type.wire());
            let mut proxy = DeskProxy {
                writer: MethodWriter::new(stream.acquire_writer()),
            };
            let order = Order {
                symbol: "EURUSD".into(),
                qty: 3,
            };
            proxy.say("hello").unwrap();
            proxy.place(&order).unwrap();
            proxy.shift(-2, 0.5).unwrap();
            proxy.reset().unwrap();

            let mut reader = MethodReader::new(stream.tailer(), desk_table());
            let mut desk = Desk::default();
            assert_eq!(reader.drain(&mut desk, usize::MAX).unwrap(), 4, "{wire_type}");

            assert_eq!(desk.said, vec!["hello"]);
            assert_eq!(desk.orders, vec![order]);
            assert_eq!(desk.moves, vec![(-2, 0.5)]);
            assert_eq!(desk.resets, 1);
            assert_eq!(reader.stats().invoked, 4);
            assert!(!reader.read_one(&mut desk).unwrap());
        }
    }

    #[test]
    fn unknown_method_is_consumed_and_reported() {
        let stream = DocumentStream::new(WireType::Binary.wire());
        let mut writer = MethodWriter::new(stream.acquire_writer());
        writer
            .call(&MethodKey::new("unknownMethod"), ("ignored",))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let mut reader = MethodReader::new(stream.tailer(), desk_table())
            .with_unknown_hook(move |event| hook_seen.lock().unwrap().push(event.key.clone()));
        let mut desk = Desk::default();

        assert!(reader.read_one(&mut desk).unwrap());
        assert!(desk.said.is_empty() && desk.orders.is_empty() && desk.resets == 0);
        assert_eq!(*seen.lock().unwrap(), vec![EventKey::name("unknownMethod")]);
        assert_eq!(reader.stats().unknown, 1);
        assert!(!reader.read_one(&mut desk).unwrap());
    }

    #[test]
    fn bad_arguments_are_skipped() {
        let stream = DocumentStream::new(WireType::Binary.wire());
        let mut writer = MethodWriter::new(stream.acquire_writer());
        writer.call(&say(), (42i64,)).unwrap();
        writer.call(&say(), ("after",)).unwrap();

        let mut reader = MethodReader::new(stream.tailer(), desk_table());
        let mut desk = Desk::default();
        assert_eq!(reader.drain(&mut desk, 10).unwrap(), 2);
        assert_eq!(desk.said, vec!["after"]);
        assert_eq!(reader.stats().failed, 1);
    }

    #[test]
    fn metadata_is_skipped_or_hooked() {
        let stream = DocumentStream::new(WireType::Binary.wire());
        let mut writer = MethodWriter::new(stream.acquire_writer());
        writer
            .write_meta(&[Event::new("header", Value::from("v1"))])
            .unwrap();
        writer.call(&reset(), ()).unwrap();

        let metas = Arc::new(Mutex::new(0usize));
        let hook_metas = Arc::clone(&metas);
        let mut reader = MethodReader::new(stream.tailer(), desk_table())
            .with_meta_hook(move |session| {
                assert!(session.is_meta_data());
                *hook_metas.lock().unwrap() += 1;
            });
        let mut desk = Desk::default();

        assert!(reader.read_one(&mut desk).unwrap());
        assert_eq!(desk.resets, 0);
        assert!(reader.read_one(&mut desk).unwrap());
        assert_eq!(desk.resets, 1);
        assert_eq!(*metas.lock().unwrap(), 1);
        assert_eq!(reader.stats().documents, 2);
    }

    #[test]
    fn drain_respects_limit() {
        let stream = DocumentStream::new(WireType::Binary.wire());
        let mut writer = MethodWriter::new(stream.acquire_writer());
        for _ in 0..5 {
            writer.call(&reset(), ()).unwrap();
        }
        let mut reader = MethodReader::new(stream.tailer(), desk_table());
        let mut desk = Desk::default();
        assert_eq!(reader.drain(&mut desk, 3).unwrap(), 3);
        assert_eq!(reader.drain(&mut desk, 3).unwrap(), 2);
        assert_eq!(desk.resets, 5);
    }

    #[test]
    fn source_errors_propagate() {
        struct Broken;

        impl DocumentSource for Broken {
            fn begin_read_document(&mut self) -> docwire_frame::Result<Option<ReadSession>> {
                Err(FrameError::Corrupt("bad header".into()))
            }
        }

        let mut reader = MethodReader::new(Broken, desk_table());
        let err = reader.read_one(&mut Desk::default()).unwrap_err();
        assert!(matches!(err, DispatchError::Frame(FrameError::Corrupt(_))));
    }

    proptest! {
        #[test]
        fn dispatched_arguments_match_the_call(
            symbol in "\\PC{0,24}",
            qty in any::<i32>(),
            by in any::<i64>(),
            scale in -1.0e12f64..1.0e12,
            json in any::<bool>(),
        ) {
            let wire_type = if json { WireType::Json } else { WireType::Binary };
            let stream = DocumentStream::new(wire_type.wire());
            let mut proxy = DeskProxy {
                writer: MethodWriter::new(stream.acquire_writer()),
            };
            let order = Order { symbol: symbol.clone(), qty };
            proxy.say(&symbol).unwrap();
            proxy.place(&order).unwrap();
            proxy.shift(by, scale).unwrap();

            let mut reader = MethodReader::new(stream.tailer(), desk_table());
            let mut desk = Desk::default();
            prop_assert_eq!(reader.drain(&mut desk, usize::MAX).unwrap(), 3);
            prop_assert_eq!(desk.said, vec![symbol]);
            prop_assert_eq!(desk.orders, vec![order]);
            prop_assert_eq!(desk.moves, vec![(by, scale)]);
        }
    }
}
