//! Encoding-agnostic value model for docwire documents.
//!
//! Everything written into a document is a [`Value`]: a scalar, text, raw
//! bytes, a named object with ordered fields, or a sequence. A [`Wire`]
//! renders values as bytes; two wires ship here:
//!
//! - [`BinaryWire`]: compact tagged binary with exact numerics
//! - [`JsonWire`]: one JSON object per event, human readable
//!
//! Readers go through [`ValueIn`], which checks the expected discriminant
//! instead of coercing, and writers through [`ValueOut`], which makes one
//! call per element for objects and sequences regardless of the wire.

pub mod binary;
pub mod convert;
pub mod error;
pub mod json;
pub mod pool;
pub mod registry;
pub mod value;
pub mod value_in;
pub mod value_out;
pub mod wire;

pub use binary::BinaryWire;
pub use convert::{FromValue, Marshallable, ToValue};
pub use error::{Result, WireError};
pub use json::JsonWire;
pub use pool::{scratch, Pool, PoolConfig, PoolMode, Pooled, Recycle};
pub use registry::AliasRegistry;
pub use value::{Object, Value, ValueKind};
pub use value_in::{ObjectIn, SequenceIn, ValueIn};
pub use value_out::{ObjectOut, SequenceOut, ValueOut};
pub use wire::{Event, EventKey, Wire, WireType};
