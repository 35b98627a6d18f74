use std::fmt;

use bytes::Bytes;

/// A self-describing value as carried in a document event.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Bytes),
    Object(Object),
    Sequence(Vec<Value>),
}

/// Discriminant of a [`Value`], used for read-side expectations and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Bytes,
    Object,
    Sequence,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Object => "object",
            Self::Sequence => "sequence",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named object: a type tag followed by ordered fields.
///
/// Field names need not be unique; lookups return the first match. An empty
/// type name denotes an untyped map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn set_type_name(&mut self, type_name: String) {
        self.type_name = type_name;
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<(String, Value)> {
        &mut self.fields
    }

    /// First field named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Object(_) => ValueKind::Object,
            Self::Sequence(_) => ValueKind::Sequence,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Any integer variant widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Semantic equality across wires.
    ///
    /// Integer widths are ignored, a `float32` matches a `float64` that
    /// rounds to it, and NaN matches NaN. Everything else compares
    /// structurally.
    pub fn equivalent(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return a == b;
        }
        match (self, other) {
            (Self::Float32(a), Self::Float32(b)) => float_eq(f64::from(*a), f64::from(*b)),
            (Self::Float64(a), Self::Float64(b)) => float_eq(*a, *b),
            (Self::Float32(a), Self::Float64(b)) | (Self::Float64(b), Self::Float32(a)) => {
                float_eq(f64::from(*a), f64::from(*b as f32))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a
                        .fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((na, va), (nb, vb))| na == nb && va.equivalent(vb))
            }
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            _ => self == other,
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    Bytes => Bytes,
    Object => Object,
    Vec<Value> => Sequence,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_lookup_is_first_match() {
        let obj = Object::new("Pair")
            .with_field("a", 1i64)
            .with_field("a", 2i64)
            .with_field("b", "x");
        assert_eq!(obj.get("a"), Some(&Value::Int64(1)));
        assert_eq!(obj.get("b"), Some(&Value::Text("x".into())));
        assert_eq!(obj.get("c"), None);
        assert_eq!(obj.len(), 3);
    }

    #[test]
    fn equivalence_ignores_integer_width() {
        assert!(Value::Int8(7).equivalent(&Value::Int64(7)));
        assert!(!Value::Int32(7).equivalent(&Value::Int64(8)));
        assert!(!Value::Int32(1).equivalent(&Value::Float64(1.0)));
    }

    #[test]
    fn equivalence_rounds_float32() {
        let widened = f64::from(0.1f32);
        assert!(Value::Float32(0.1).equivalent(&Value::Float64(widened)));
        assert!(Value::Float32(0.1).equivalent(&Value::Float64(0.1)));
        assert!(Value::Float64(f64::NAN).equivalent(&Value::Float64(f64::NAN)));
        assert!(!Value::Float64(0.1).equivalent(&Value::Float64(0.2)));
    }

    #[test]
    fn equivalence_recurses() {
        let a = Value::Sequence(vec![
            Value::Int16(1),
            Value::Object(Object::new("T").with_field("x", Value::Int8(3))),
        ]);
        let b = Value::Sequence(vec![
            Value::Int64(1),
            Value::Object(Object::new("T").with_field("x", Value::Int64(3))),
        ]);
        assert!(a.equivalent(&b));

        let renamed = Value::Sequence(vec![
            Value::Int64(1),
            Value::Object(Object::new("U").with_field("x", Value::Int64(3))),
        ]);
        assert!(!a.equivalent(&renamed));
    }

    #[test]
    fn kinds_classify() {
        assert!(Value::Int16(0).kind().is_integer());
        assert!(Value::Float32(0.0).kind().is_float());
        assert_eq!(Value::from("t").kind(), ValueKind::Text);
        assert_eq!(Value::from(()).kind().to_string(), "null");
    }
}
