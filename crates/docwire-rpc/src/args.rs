//! Mapping between method argument lists and a single event value.
//!
//! | arguments | event value                              |
//! |-----------|------------------------------------------|
//! | none      | null (no payload)                        |
//! | one       | the argument itself                      |
//! | several   | untyped object with fields `arg0..argN`  |

use docwire_value::{FromValue, Object, Result, ToValue, Value, ValueIn};

/// Field names used for positional arguments.
pub const POSITIONAL_FIELDS: [&str; 4] = ["arg0", "arg1", "arg2", "arg3"];

/// Write side: an argument tuple rendered as one event value.
pub trait MethodArgs {
    const ARITY: usize;

    fn to_payload(&self) -> Value;
}

/// Read side: an argument tuple recovered from one event value.
pub trait FromArgs: Sized {
    fn from_payload(input: ValueIn<'_>) -> Result<Self>;
}

impl MethodArgs for () {
    const ARITY: usize = 0;

    fn to_payload(&self) -> Value {
        Value::Null
    }
}

impl FromArgs for () {
    /// Any payload is accepted and ignored.
    fn from_payload(_input: ValueIn<'_>) -> Result<Self> {
        Ok(())
    }
}

impl<A: ToValue> MethodArgs for (A,) {
    const ARITY: usize = 1;

    fn to_payload(&self) -> Value {
        self.0.to_value()
    }
}

impl<A: FromValue> FromArgs for (A,) {
    fn from_payload(input: ValueIn<'_>) -> Result<Self> {
        Ok((A::from_value(input)?,))
    }
}

macro_rules! positional_args {
    ($arity:expr; $($ty:ident => $idx:tt),+) => {
        impl<$($ty: ToValue),+> MethodArgs for ($($ty,)+) {
            const ARITY: usize = $arity;

            fn to_payload(&self) -> Value {
                let mut object = Object::new("");
                $(object.push(POSITIONAL_FIELDS[$idx], self.$idx.to_value());)+
                Value::Object(object)
            }
        }

        impl<$($ty: FromValue),+> FromArgs for ($($ty,)+) {
            fn from_payload(input: ValueIn<'_>) -> Result<Self> {
                let object = input.object()?;
                Ok(($(object.read::<$ty>(POSITIONAL_FIELDS[$idx])?,)+))
            }
        }
    };
}

positional_args!(2; A => 0, B => 1);
positional_args!(3; A => 0, B => 1, C => 2);
positional_args!(4; A => 0, B => 1, C => 2, D => 3);

#[cfg(test)]
mod tests {
    use docwire_value::WireError;

    use super::*;

    #[test]
    fn no_arguments_is_null() {
        assert_eq!(().to_payload(), Value::Null);
        assert_eq!(<() as MethodArgs>::ARITY, 0);
        assert!(<()>::from_payload(ValueIn::new(&Value::Int64(3))).is_ok());
    }

    #[test]
    fn single_argument_is_the_value() {
        assert_eq!(("hi",).to_payload(), Value::Text("hi".into()));
        let (text,) = <(String,)>::from_payload(ValueIn::new(&Value::from("hi"))).unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn several_arguments_are_positional_fields() {
        let payload = (1i64, "two", 3.0f64).to_payload();
        let Value::Object(object) = &payload else {
            panic!("expected object");
        };
        assert_eq!(object.type_name(), "");
        let names: Vec<_> = object.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["arg0", "arg1", "arg2"]);

        let (a, b, c) = <(i64, String, f64)>::from_payload(ValueIn::new(&payload)).unwrap();
        assert_eq!((a, b.as_str(), c), (1, "two", 3.0));
    }

    #[test]
    fn missing_positional_field_is_reported() {
        let payload = Value::Object(Object::new("").with_field("arg0", 1i64));
        let err = <(i64, i64)>::from_payload(ValueIn::new(&payload)).unwrap_err();
        assert!(matches!(err, WireError::MissingField { ref field, .. } if field == "arg1"));
    }
}
