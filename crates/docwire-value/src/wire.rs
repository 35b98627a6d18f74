use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::binary::BinaryWire;
use crate::error::{Result, WireError};
use crate::json::JsonWire;
use crate::registry::AliasRegistry;
use crate::value::Value;
use crate::value_in::ValueIn;

/// Key of one event inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Name(String),
    Id(u32),
}

impl EventKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Id(_) => None,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<u32> for EventKey {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

/// A named value inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub key: EventKey,
    pub value: Value,
}

impl Event {
    pub fn new(key: impl Into<EventKey>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn value_in(&self) -> ValueIn<'_> {
        ValueIn::new(&self.value)
    }
}

/// A concrete encoding of values and events.
///
/// A document payload is a run of encoded events with no separator beyond
/// what the wire itself needs; `decode_event` returns `None` once the
/// payload is exhausted.
pub trait Wire: Send + Sync + fmt::Debug {
    fn wire_type(&self) -> WireType;

    fn encode_value(&self, value: &Value, dst: &mut BytesMut) -> Result<()>;

    fn decode_value(&self, src: &mut Bytes) -> Result<Value>;

    fn encode_event(&self, key: &EventKey, value: &Value, dst: &mut BytesMut) -> Result<()>;

    fn decode_event(&self, src: &mut Bytes) -> Result<Option<Event>>;
}

/// Selects a wire at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireType {
    #[default]
    Binary,
    Json,
}

impl WireType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }

    /// Instantiate the wire with no aliases.
    pub fn wire(self) -> Arc<dyn Wire> {
        self.wire_with(Arc::new(AliasRegistry::new()))
    }

    /// Instantiate the wire sharing `registry` for type-name aliases.
    pub fn wire_with(self, registry: Arc<AliasRegistry>) -> Arc<dyn Wire> {
        match self {
            Self::Binary => Arc::new(BinaryWire::with_registry(registry)),
            Self::Json => Arc::new(JsonWire::with_registry(registry)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WireType {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            other => Err(WireError::Unrepresentable {
                wire: "unknown",
                reason: format!("no wire named '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    fn sample_events() -> Vec<Event> {
        vec![
            Event::new("say", "hello"),
            Event::new(7u32, Value::Null),
            Event::new(
                "order",
                Object::new("Order")
                    .with_field("qty", 5i32)
                    .with_field("legs", vec![Value::from(1.5f64), Value::from(true)]),
            ),
        ]
    }

    #[test]
    fn every_wire_decodes_its_own_event_run() {
        for wire_type in [WireType::Binary, WireType::Json] {
            let wire = wire_type.wire();
            let mut buf = BytesMut::new();
            for event in sample_events() {
                wire.encode_event(&event.key, &event.value, &mut buf).unwrap();
            }

            let mut src = buf.freeze();
            let mut decoded = Vec::new();
            while let Some(event) = wire.decode_event(&mut src).unwrap() {
                decoded.push(event);
            }

            assert_eq!(decoded.len(), 3, "{wire_type}");
            for (got, want) in decoded.iter().zip(sample_events()) {
                assert_eq!(got.key, want.key, "{wire_type}");
                assert!(got.value.equivalent(&want.value), "{wire_type}: {got:?}");
            }
        }
    }

    #[test]
    fn wire_type_parses() {
        assert_eq!("JSON".parse::<WireType>().unwrap(), WireType::Json);
        assert_eq!("binary".parse::<WireType>().unwrap(), WireType::Binary);
        assert!("yaml".parse::<WireType>().is_err());
    }

    #[test]
    fn event_key_display() {
        assert_eq!(EventKey::from("ping").to_string(), "ping");
        assert_eq!(EventKey::Id(12).to_string(), "#12");
    }
}
