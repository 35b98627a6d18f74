use crate::value::ValueKind;

/// Errors raised while encoding, decoding, or reading values.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The reader expected one discriminant and found another.
    #[error("illegal state: expected {expected}, found {found}")]
    IllegalState {
        expected: &'static str,
        found: ValueKind,
    },

    /// A checked numeric narrowing would lose information.
    #[error("cannot narrow {value} to {target}")]
    Narrowing { value: String, target: &'static str },

    /// An object is missing a required field.
    #[error("missing field '{field}' in {type_name}")]
    MissingField { type_name: String, field: String },

    /// A sequence was read past its last element.
    #[error("sequence exhausted")]
    SequenceExhausted,

    /// The payload ended in the middle of a value.
    #[error("unexpected end of payload (needed {needed} more bytes)")]
    UnexpectedEof { needed: usize },

    /// An unknown type tag was found in binary input.
    #[error("invalid binary tag 0x{0:02x}")]
    InvalidTag(u8),

    /// Text bytes were not valid UTF-8.
    #[error("invalid utf-8 in text value")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Nesting exceeded the decoder's depth limit.
    #[error("value nesting deeper than {0}")]
    TooDeep(usize),

    /// The value has no representation on this wire.
    #[error("unrepresentable on {wire} wire: {reason}")]
    Unrepresentable { wire: &'static str, reason: String },

    /// Malformed JSON input.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid alias registration.
    #[error("alias registry: {0}")]
    Alias(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
