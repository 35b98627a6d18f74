//! Typed read access to a decoded value.
//!
//! Callers state what they expect (`int32`, `text`, `object`, ...). A
//! mismatch is [`WireError::IllegalState`]; the only implicit conversions are
//! integer widening, checked integer narrowing, integer to `float64` when
//! exact, and `float64` to `float32` when exact.

use bytes::Bytes;

use crate::convert::{FromValue, Marshallable};
use crate::error::{Result, WireError};
use crate::value::{Object, Value, ValueKind};

/// Largest integer magnitude a `f64` represents exactly.
const MAX_EXACT_F64_INT: i64 = 1 << 53;

/// Borrowed reader over one value.
#[derive(Debug, Clone, Copy)]
pub struct ValueIn<'a> {
    value: &'a Value,
}

impl<'a> ValueIn<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// The underlying value, unchecked.
    pub fn raw(&self) -> &'a Value {
        self.value
    }

    pub fn bool(&self) -> Result<bool> {
        match self.value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn int64(&self) -> Result<i64> {
        self.value.as_i64().ok_or_else(|| mismatch("int64", self.value))
    }

    pub fn int32(&self) -> Result<i32> {
        narrow(self.int64_for("int32")?, "int32")
    }

    pub fn int16(&self) -> Result<i16> {
        narrow(self.int64_for("int16")?, "int16")
    }

    pub fn int8(&self) -> Result<i8> {
        narrow(self.int64_for("int8")?, "int8")
    }

    pub fn float64(&self) -> Result<f64> {
        match *self.value {
            Value::Float64(v) => Ok(v),
            Value::Float32(v) => Ok(f64::from(v)),
            ref other => match other.as_i64() {
                Some(v) if (-MAX_EXACT_F64_INT..=MAX_EXACT_F64_INT).contains(&v) => Ok(v as f64),
                Some(v) => Err(WireError::Narrowing {
                    value: v.to_string(),
                    target: "float64",
                }),
                None => Err(mismatch("float64", other)),
            },
        }
    }

    pub fn float32(&self) -> Result<f32> {
        match *self.value {
            Value::Float32(v) => Ok(v),
            Value::Float64(v) if v.is_nan() || f64::from(v as f32) == v => Ok(v as f32),
            Value::Float64(v) => Err(WireError::Narrowing {
                value: v.to_string(),
                target: "float32",
            }),
            ref other => Err(mismatch("float32", other)),
        }
    }

    pub fn text(&self) -> Result<&'a str> {
        match self.value {
            Value::Text(text) => Ok(text),
            other => Err(mismatch("text", other)),
        }
    }

    pub fn bytes(&self) -> Result<&'a Bytes> {
        match self.value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(mismatch("bytes", other)),
        }
    }

    pub fn object(&self) -> Result<ObjectIn<'a>> {
        match self.value {
            Value::Object(object) => Ok(ObjectIn { object }),
            other => Err(mismatch("object", other)),
        }
    }

    pub fn sequence(&self) -> Result<SequenceIn<'a>> {
        match self.value {
            Value::Sequence(items) => Ok(SequenceIn {
                items: items.iter(),
            }),
            other => Err(mismatch("sequence", other)),
        }
    }

    /// Decode into any [`FromValue`] type.
    pub fn read<T: FromValue>(&self) -> Result<T> {
        T::from_value(*self)
    }

    /// Decode an object carrying `T`'s field schema.
    pub fn marshallable<T: Marshallable>(&self) -> Result<T> {
        let object = self.object()?;
        T::read_fields(&object)
    }

    fn int64_for(&self, target: &'static str) -> Result<i64> {
        self.value.as_i64().ok_or_else(|| mismatch(target, self.value))
    }
}

/// Reader over an object's fields.
#[derive(Debug, Clone, Copy)]
pub struct ObjectIn<'a> {
    object: &'a Object,
}

impl<'a> ObjectIn<'a> {
    pub fn type_name(&self) -> &'a str {
        self.object.type_name()
    }

    /// Required field; missing is [`WireError::MissingField`].
    pub fn field(&self, name: &str) -> Result<ValueIn<'a>> {
        self.object
            .get(name)
            .map(ValueIn::new)
            .ok_or_else(|| WireError::MissingField {
                type_name: self.object.type_name().to_string(),
                field: name.to_string(),
            })
    }

    /// Optional field; absent and explicit null both read as `None`.
    pub fn optional_field(&self, name: &str) -> Option<ValueIn<'a>> {
        self.object
            .get(name)
            .filter(|value| !value.is_null())
            .map(ValueIn::new)
    }

    /// Shorthand for `field(name)?.read()`.
    pub fn read<T: FromValue>(&self, name: &str) -> Result<T> {
        self.field(name)?.read()
    }

    /// Fields in written order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, ValueIn<'a>)> + 'a {
        self.object
            .fields()
            .iter()
            .map(|(name, value)| (name.as_str(), ValueIn::new(value)))
    }

    pub fn len(&self) -> usize {
        self.object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_empty()
    }
}

/// Cursor over a sequence: `has_next` / `next_value`, or plain iteration.
#[derive(Debug, Clone)]
pub struct SequenceIn<'a> {
    items: std::slice::Iter<'a, Value>,
}

impl<'a> SequenceIn<'a> {
    pub fn has_next(&self) -> bool {
        self.items.len() > 0
    }

    /// Next element, or [`WireError::SequenceExhausted`].
    pub fn next_value(&mut self) -> Result<ValueIn<'a>> {
        self.items
            .next()
            .map(ValueIn::new)
            .ok_or(WireError::SequenceExhausted)
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl<'a> Iterator for SequenceIn<'a> {
    type Item = ValueIn<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(ValueIn::new)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for SequenceIn<'_> {}

fn mismatch(expected: &'static str, found: &Value) -> WireError {
    WireError::IllegalState {
        expected,
        found: found.kind(),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, target: &'static str) -> Result<T> {
    T::try_from(value).map_err(|_| WireError::Narrowing {
        value: value.to_string(),
        target,
    })
}
