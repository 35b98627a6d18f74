//! Typed method dispatch over docwire document streams.
//!
//! A caller-side [`MethodWriter`] turns each interface call into one data
//! document holding one event: the method name (or numeric id) as the key,
//! the arguments as the value. A [`MethodReader`] pulls documents from any
//! [`DocumentSource`](docwire_frame::DocumentSource) and routes each event
//! through a [`Dispatcher`], the interface's method table, to a target.
//!
//! ```
//! use docwire_frame::DocumentStream;
//! use docwire_rpc::{Dispatcher, MethodKey, MethodReader, MethodWriter};
//! use docwire_value::WireType;
//!
//! let stream = DocumentStream::new(WireType::Binary.wire());
//! let mut writer = MethodWriter::new(stream.acquire_writer());
//! writer.call(&MethodKey::new("say"), ("Hello",)).unwrap();
//!
//! let table = Dispatcher::new()
//!     .on("say", |said: &mut Vec<String>, text: String| said.push(text))
//!     .unwrap();
//! let mut reader = MethodReader::new(stream.tailer(), table);
//! let mut said = Vec::new();
//! assert!(reader.read_one(&mut said).unwrap());
//! assert_eq!(said, ["Hello"]);
//! ```

pub mod args;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod reader;
pub mod writer;

pub use args::{FromArgs, MethodArgs, POSITIONAL_FIELDS};
pub use dispatcher::{Dispatched, Dispatcher, Handler};
pub use error::{DispatchError, Result};
pub use key::MethodKey;
pub use reader::{MethodReader, ReaderStats};
pub use writer::MethodWriter;
