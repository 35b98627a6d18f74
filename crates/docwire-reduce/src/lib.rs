//! Streaming reductions over document sources.
//!
//! A [`Reduction`] pairs an extractor (document to value) with a
//! [`Collector`] (values to aggregate). It can be replayed over any
//! [`DocumentSource`](docwire_frame::DocumentSource) with
//! [`Reduction::accept`] and then fed live documents with
//! [`Reduction::on_excerpt`].
//!
//! ```
//! use docwire_frame::{DocumentSink, DocumentStream};
//! use docwire_reduce::{field, to_list, Reduction};
//! use docwire_value::{Event, WireType};
//!
//! let stream = DocumentStream::new(WireType::Json.wire());
//! let mut writer = stream.acquire_writer();
//! writer.write_document(false, &[Event::new("text", "Hello")]).unwrap();
//! writer.write_document(false, &[Event::new("text", "World")]).unwrap();
//!
//! let words = Reduction::new(field::<String>("text"), to_list());
//! assert_eq!(words.accept(&mut stream.tailer()).unwrap(), 1);
//! assert_eq!(words.reduction(), ["Hello", "World"]);
//! ```

pub mod collector;
pub mod error;
pub mod extractor;
pub mod reduction;
pub mod sentinel;

pub use collector::{
    counting, counting_distinct, exclusive, latest, reducing_double, reducing_long, to_list,
    Collector, Counting, CountingDistinct, Exclusive, Latest, ReducingDouble, ReducingLong,
    ToList,
};
pub use error::{ReduceError, Result};
pub use extractor::{
    data_only, document_index, double_field, field, first_value, long_field, DoubleExtractor,
    Extractor, LongExtractor,
};
pub use reduction::{Reduction, ReductionStats};
pub use sentinel::{is_no_double, is_no_long, NO_DOUBLE, NO_LONG};
