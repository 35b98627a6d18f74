//! A live fold over a document sequence.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use docwire_frame::{DocumentSource, ReadSession};
use tracing::{debug, warn};

use crate::collector::Collector;
use crate::error::Result;
use crate::extractor::{DoubleExtractor, Extractor, LongExtractor};
use crate::sentinel::{double_to_option, long_to_option};

type BoxedExtractor<T> = Box<dyn Fn(&ReadSession, u64) -> Result<Option<T>> + Send + Sync>;

/// Counters for one [`Reduction`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReductionStats {
    /// Values folded into the accumulator.
    pub folded: u64,
    /// Documents whose extractor yielded nothing.
    pub skipped: u64,
    /// Documents whose extractor failed.
    pub failed: u64,
}

/// Folds extracted values into a shared accumulator `A` and exposes the
/// finished view `R`.
///
/// Every method takes `&self`; wrap the reduction in an `Arc` to feed it
/// from a live reader and a catch-up [`accept`](Self::accept) at once.
pub struct Reduction<A: Send + Sync, T, R> {
    extractor: BoxedExtractor<T>,
    collector: Box<dyn Collector<T, Acc = A, Out = R>>,
    accumulator: A,
    last_index: AtomicI64,
    folded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl<A: Send + Sync, T, R> Reduction<A, T, R> {
    pub fn new<E, C>(extractor: E, collector: C) -> Self
    where
        A: 'static,
        T: 'static,
        R: 'static,
        E: Extractor<T> + 'static,
        C: Collector<T, Acc = A, Out = R> + 'static,
    {
        let extractor: BoxedExtractor<T> =
            Box::new(move |session: &ReadSession, index: u64| extractor.extract(session, index));
        Self::from_parts(extractor, Box::new(collector))
    }

    fn from_parts(
        extractor: BoxedExtractor<T>,
        collector: Box<dyn Collector<T, Acc = A, Out = R>>,
    ) -> Self {
        Self {
            extractor,
            accumulator: collector.supply(),
            collector,
            last_index: AtomicI64::new(-1),
            folded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Fold one document. Returns `true` when a value reached the
    /// accumulator.
    ///
    /// Extraction errors are logged and the document is skipped.
    pub fn on_excerpt(&self, session: &ReadSession) -> bool {
        let index = session.index();
        self.last_index
            .fetch_max(i64::try_from(index).unwrap_or(i64::MAX), Ordering::AcqRel);

        match (self.extractor)(session, index) {
            Ok(Some(value)) => {
                self.collector.accumulate(&self.accumulator, value);
                self.folded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(None) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(err) => {
                warn!(index, error = %err, "extraction failed; document skipped");
                self.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Drain `source`, folding every document.
    ///
    /// Returns the last logical index seen, or -1 if the source had nothing.
    /// Errors from the source itself propagate.
    pub fn accept(&self, source: &mut impl DocumentSource) -> Result<i64> {
        let mut last = -1i64;
        let mut documents = 0u64;
        while let Some(session) = source.begin_read_document()? {
            self.on_excerpt(&session);
            last = i64::try_from(session.index()).unwrap_or(i64::MAX);
            documents += 1;
        }
        debug!(documents, last_index = last, "reduction caught up");
        Ok(last)
    }

    /// The finished view of everything folded so far.
    ///
    /// Computed on each call, so it reflects folds made after any earlier
    /// call.
    pub fn reduction(&self) -> R {
        self.collector.finish(&self.accumulator)
    }

    pub fn accumulator(&self) -> &A {
        &self.accumulator
    }

    /// Highest index passed to [`on_excerpt`](Self::on_excerpt), or -1.
    pub fn last_index(&self) -> i64 {
        self.last_index.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ReductionStats {
        ReductionStats {
            folded: self.folded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl<A: Send + Sync, R> Reduction<A, i64, R> {
    /// Reduce over a long extractor; [`NO_LONG`](crate::NO_LONG) is skipped.
    pub fn of_long<E, C>(extractor: E, collector: C) -> Self
    where
        E: LongExtractor + 'static,
        A: 'static,
        R: 'static,
        C: Collector<i64, Acc = A, Out = R> + 'static,
    {
        let extractor: BoxedExtractor<i64> =
            Box::new(move |session: &ReadSession, index: u64| -> Result<Option<_>> {
                Ok(long_to_option(extractor.extract_long(session, index)?))
            });
        Self::from_parts(extractor, Box::new(collector))
    }
}

impl<A: Send + Sync, R> Reduction<A, f64, R> {
    /// Reduce over a double extractor; [`NO_DOUBLE`](crate::NO_DOUBLE) is
    /// skipped.
    pub fn of_double<E, C>(extractor: E, collector: C) -> Self
    where
        E: DoubleExtractor + 'static,
        A: 'static,
        R: 'static,
        C: Collector<f64, Acc = A, Out = R> + 'static,
    {
        let extractor: BoxedExtractor<f64> =
            Box::new(move |session: &ReadSession, index: u64| -> Result<Option<_>> {
                Ok(double_to_option(extractor.extract_double(session, index)?))
            });
        Self::from_parts(extractor, Box::new(collector))
    }
}

impl<A: Send + Sync, T, R> fmt::Debug for Reduction<A, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reduction")
            .field("last_index", &self.last_index())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use docwire_frame::{DocumentQueue, DocumentSink, DocumentStream, FrameError};
    use docwire_value::{Event, Value, WireType};

    use super::*;
    use crate::collector::{
        counting, counting_distinct, exclusive, latest, reducing_double, reducing_long, to_list,
    };
    use crate::extractor::{double_field, field, long_field};
    use crate::sentinel::NO_LONG;

    fn stream_of(values: &[Value]) -> DocumentStream {
        let stream = DocumentStream::new(WireType::Binary.wire());
        let mut writer = stream.acquire_writer();
        for value in values {
            writer
                .write_document(false, &[Event::new("text", value.clone())])
                .unwrap();
        }
        stream
    }

    fn assert_shareable<T: Send + Sync>(_: &T) {}

    #[test]
    fn every_collector_yields_a_shareable_reduction() {
        assert_shareable(&Reduction::new(field::<String>("text"), to_list()));
        assert_shareable(&Reduction::new(field::<String>("text"), latest()));
        assert_shareable(&Reduction::new(field::<String>("text"), counting_distinct()));
        assert_shareable(&Reduction::new(field::<String>("text"), counting()));
        assert_shareable(&Reduction::of_long(long_field("n"), reducing_long(0, |a, b| a + b)));
        assert_shareable(&Reduction::of_double(
            double_field("x"),
            reducing_double(0.0, |a, b| a + b),
        ));
        assert_shareable(&Reduction::of_long(
            long_field("n"),
            exclusive(
                Vec::new,
                |acc: &mut Vec<i64>, v: i64| acc.push(v),
                |acc: &Vec<i64>| acc.len(),
            ),
        ));
    }

    #[test]
    fn hello_world_list() {
        let stream = stream_of(&[Value::from("Hello"), Value::from("World")]);
        let reduction = Reduction::new(field::<String>("text"), to_list());

        let last = reduction.accept(&mut stream.tailer()).unwrap();

        assert_eq!(last, 1);
        assert_eq!(reduction.reduction(), vec!["Hello".to_string(), "World".to_string()]);
        assert_eq!(reduction.last_index(), 1);
    }

    #[test]
    fn empty_source_accepts_to_minus_one() {
        let stream = stream_of(&[]);
        let mut tailer = stream.tailer();
        assert!(tailer.begin_read_document().unwrap().is_none());

        let reduction = Reduction::new(field::<String>("text"), counting());
        assert_eq!(reduction.accept(&mut tailer).unwrap(), -1);
        assert_eq!(reduction.reduction(), 0);
        assert_eq!(reduction.last_index(), -1);
    }

    #[test]
    fn sentinel_documents_are_not_folded() {
        let stream = stream_of(&[
            Value::Int64(5),
            Value::Null,
            Value::Int64(7),
            Value::Int64(NO_LONG),
            Value::Int64(-2),
        ]);
        let reduction = Reduction::of_long(long_field("text"), reducing_long(0, |a, b| a + b));

        assert_eq!(reduction.accept(&mut stream.tailer()).unwrap(), 4);
        assert_eq!(reduction.reduction(), 10);
        assert_eq!(
            reduction.stats(),
            ReductionStats {
                folded: 3,
                skipped: 2,
                failed: 0
            }
        );
    }

    #[test]
    fn folds_in_document_order() {
        let stream = stream_of(&[Value::Int64(1), Value::Int64(2), Value::Int64(3)]);
        let reduction = Reduction::of_long(
            long_field("text"),
            exclusive(Vec::new, |acc: &mut Vec<i64>, v: i64| acc.push(v), |acc: &Vec<i64>| acc.clone()),
        );
        reduction.accept(&mut stream.tailer()).unwrap();
        assert_eq!(reduction.reduction(), vec![1, 2, 3]);
    }

    #[test]
    fn bad_documents_are_skipped() {
        let stream = stream_of(&[Value::Float64(1.5), Value::from("oops"), Value::Float64(2.0)]);
        let reduction =
            Reduction::of_double(double_field("text"), reducing_double(0.0, |a, b| a + b));

        assert_eq!(reduction.accept(&mut stream.tailer()).unwrap(), 2);
        assert_eq!(reduction.reduction(), 3.5);
        assert_eq!(reduction.stats().failed, 1);
    }

    #[test]
    fn reduction_is_a_live_view() {
        let stream = stream_of(&[Value::from("a")]);
        let reduction = Reduction::new(field::<String>("text"), latest());
        let mut tailer = stream.tailer();

        reduction.accept(&mut tailer).unwrap();
        assert_eq!(reduction.reduction().as_deref(), Some("a"));

        stream
            .acquire_writer()
            .write_document(false, &[Event::new("text", "b")])
            .unwrap();
        assert_eq!(reduction.accept(&mut tailer).unwrap(), 1);
        assert_eq!(reduction.reduction().as_deref(), Some("b"));

        // Nothing new since the last call.
        assert_eq!(reduction.accept(&mut tailer).unwrap(), -1);
        assert_eq!(reduction.last_index(), 1);
    }

    #[test]
    fn replay_then_live_from_threads() {
        let values: Vec<Value> = (0..200).map(|i| Value::Int64(i % 17)).collect();
        let stream = stream_of(&values);
        let sessions: Vec<ReadSession> = {
            let mut tailer = stream.tailer();
            std::iter::from_fn(|| tailer.begin_read_document().unwrap()).collect()
        };

        let reduction = Arc::new(Reduction::of_long(long_field("text"), counting_distinct()));
        let (first, second) = sessions.split_at(100);
        let live: DocumentQueue = second.iter().cloned().collect();
        let catch_up: DocumentQueue = first.iter().cloned().collect();

        let handles: Vec<_> = [catch_up, live]
            .into_iter()
            .map(|mut queue| {
                let reduction = Arc::clone(&reduction);
                thread::spawn(move || reduction.accept(&mut queue).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(reduction.reduction(), 17);
        assert_eq!(reduction.stats().folded, 200);
        assert_eq!(reduction.last_index(), 199);
    }

    #[test]
    fn source_errors_propagate() {
        struct Broken;
        impl DocumentSource for Broken {
            fn begin_read_document(&mut self) -> docwire_frame::Result<Option<ReadSession>> {
                Err(FrameError::Corrupt("torn header".into()))
            }
        }

        let reduction = Reduction::new(field::<i64>("text"), counting());
        assert!(reduction.accept(&mut Broken).is_err());
    }
}
