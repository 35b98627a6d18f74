//! Typed mappings between Rust values and [`Value`].

use bytes::Bytes;

use crate::error::Result;
use crate::value::Value;
use crate::value_in::{ObjectIn, ValueIn};
use crate::value_out::ObjectOut;

/// Rust type to [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// [`Value`] to Rust type, with the reader's discriminant checks.
pub trait FromValue: Sized {
    fn from_value(input: ValueIn<'_>) -> Result<Self>;
}

/// A struct with an explicit, ordered field schema.
///
/// Implementations list their fields by hand; there is no runtime
/// introspection. Use [`marshallable_value!`](crate::marshallable_value) to
/// derive [`ToValue`] / [`FromValue`] from it.
pub trait Marshallable: Sized {
    /// Type tag written ahead of the fields.
    const TYPE_NAME: &'static str;

    fn write_fields(&self, out: &mut ObjectOut);

    fn read_fields(input: &ObjectIn<'_>) -> Result<Self>;
}

/// Implement [`ToValue`] and [`FromValue`] for [`Marshallable`] types.
#[macro_export]
macro_rules! marshallable_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::ToValue for $ty {
                fn to_value(&self) -> $crate::Value {
                    let mut value = $crate::Value::Null;
                    $crate::ValueOut::new(&mut value).marshallable(self);
                    value
                }
            }

            impl $crate::FromValue for $ty {
                fn from_value(input: $crate::ValueIn<'_>) -> $crate::Result<Self> {
                    input.marshallable::<$ty>()
                }
            }
        )+
    };
}

macro_rules! scalar_mapping {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }

            impl FromValue for $ty {
                fn from_value(input: ValueIn<'_>) -> Result<Self> {
                    input.$read()
                }
            }
        )*
    };
}

scalar_mapping! {
    bool => bool,
    i8 => int8,
    i16 => int16,
    i32 => int32,
    i64 => int64,
    f32 => float32,
    f64 => float64,
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        input.text().map(str::to_string)
    }
}

impl ToValue for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Bytes {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        input.bytes().cloned()
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        Ok(input.raw().clone())
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        if input.is_null() {
            Ok(None)
        } else {
            input.read().map(Some)
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(input: ValueIn<'_>) -> Result<Self> {
        input.sequence()?.map(T::from_value).collect()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}
