//! JSON Lines wire.
//!
//! Each event is one line holding a single-entry object, `{"key": value}`.
//! Numeric event ids are written as `"#<id>"`. Values that JSON cannot carry
//! natively use reserved `@` keys:
//!
//! - typed object: `{"@Type": {"field": ...}}`
//! - raw bytes: `{"@bytes": "<hex>"}`
//!
//! An object with an empty type name is written as a plain JSON object.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Number};

use crate::error::{Result, WireError};
use crate::registry::AliasRegistry;
use crate::value::{Object, Value};
use crate::wire::{Event, EventKey, Wire, WireType};

const BYTES_KEY: &str = "@bytes";
const RESERVED_PREFIX: char = '@';
const ID_PREFIX: char = '#';

/// Human-readable JSON wire.
#[derive(Debug, Clone, Default)]
pub struct JsonWire {
    registry: Arc<AliasRegistry>,
}

impl JsonWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<AliasRegistry>) -> Self {
        Self { registry }
    }

    /// Render `value` as a `serde_json` tree.
    pub fn to_json_value(&self, value: &Value) -> Result<serde_json::Value> {
        let json = match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int8(v) => serde_json::Value::from(*v),
            Value::Int16(v) => serde_json::Value::from(*v),
            Value::Int32(v) => serde_json::Value::from(*v),
            Value::Int64(v) => serde_json::Value::from(*v),
            Value::Float32(v) => finite(f64::from(*v))?,
            Value::Float64(v) => finite(*v)?,
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Bytes(raw) => single(BYTES_KEY, serde_json::Value::String(hex::encode(raw))),
            Value::Object(object) => self.object_to_json(object)?,
            Value::Sequence(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.to_json_value(item))
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(json)
    }

    /// Rebuild a [`Value`] from a `serde_json` tree.
    ///
    /// Integers come back as `Int64` and floats as `Float64`; typed readers
    /// narrow them on access.
    pub fn from_json_value(&self, json: &serde_json::Value) -> Result<Value> {
        let value = match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => number_to_value(n)?,
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::Sequence(
                items
                    .iter()
                    .map(|item| self.from_json_value(item))
                    .collect::<Result<_>>()?,
            ),
            serde_json::Value::Object(map) => self.object_from_json(map)?,
        };
        Ok(value)
    }

    fn object_to_json(&self, object: &Object) -> Result<serde_json::Value> {
        let mut seen = HashSet::with_capacity(object.len());
        let mut fields = Map::with_capacity(object.len());
        for (name, value) in object.fields() {
            if !seen.insert(name.as_str()) {
                return Err(unrepresentable(format!("duplicate field '{name}'")));
            }
            fields.insert(name.clone(), self.to_json_value(value)?);
        }

        if object.type_name().is_empty() {
            if fields.len() == 1 && fields.keys().any(|k| k.starts_with(RESERVED_PREFIX)) {
                return Err(unrepresentable(
                    "untyped object with a single '@' field is ambiguous".to_string(),
                ));
            }
            return Ok(serde_json::Value::Object(fields));
        }

        let tag = format!("{RESERVED_PREFIX}{}", self.registry.alias_for(object.type_name()));
        Ok(single(&tag, serde_json::Value::Object(fields)))
    }

    fn object_from_json(&self, map: &Map<String, serde_json::Value>) -> Result<Value> {
        if map.len() == 1 {
            if let Some((key, inner)) = map.iter().next() {
                if let Some(tag) = key.strip_prefix(RESERVED_PREFIX) {
                    return self.tagged_from_json(tag, inner);
                }
            }
        }
        let mut object = Object::new("");
        for (name, value) in map {
            object.push(name.clone(), self.from_json_value(value)?);
        }
        Ok(Value::Object(object))
    }

    fn tagged_from_json(&self, tag: &str, inner: &serde_json::Value) -> Result<Value> {
        match inner {
            serde_json::Value::String(encoded) if tag == &BYTES_KEY[1..] => {
                let raw = hex::decode(encoded)
                    .map_err(|e| unrepresentable(format!("invalid hex in @bytes: {e}")))?;
                Ok(Value::Bytes(Bytes::from(raw)))
            }
            serde_json::Value::Object(fields) => {
                let mut object = Object::new(self.registry.type_for(tag));
                for (name, value) in fields {
                    object.push(name.clone(), self.from_json_value(value)?);
                }
                Ok(Value::Object(object))
            }
            _ => Err(unrepresentable(format!(
                "reserved key '@{tag}' must wrap an object"
            ))),
        }
    }
}

impl Wire for JsonWire {
    fn wire_type(&self) -> WireType {
        WireType::Json
    }

    fn encode_value(&self, value: &Value, dst: &mut BytesMut) -> Result<()> {
        let json = self.to_json_value(value)?;
        serde_json::to_writer((&mut *dst).writer(), &json)?;
        Ok(())
    }

    fn decode_value(&self, src: &mut Bytes) -> Result<Value> {
        match next_json(src)? {
            Some(json) => self.from_json_value(&json),
            None => Err(WireError::UnexpectedEof { needed: 1 }),
        }
    }

    fn encode_event(&self, key: &EventKey, value: &Value, dst: &mut BytesMut) -> Result<()> {
        let key = match key {
            EventKey::Name(name) if name.starts_with(ID_PREFIX) => {
                return Err(unrepresentable(format!(
                    "event name '{name}' collides with the id prefix"
                )));
            }
            EventKey::Name(name) => name.clone(),
            EventKey::Id(id) => format!("{ID_PREFIX}{id}"),
        };
        let line = single(&key, self.to_json_value(value)?);
        serde_json::to_writer((&mut *dst).writer(), &line)?;
        dst.put_u8(b'\n');
        Ok(())
    }

    fn decode_event(&self, src: &mut Bytes) -> Result<Option<Event>> {
        let Some(json) = next_json(src)? else {
            return Ok(None);
        };
        let serde_json::Value::Object(map) = json else {
            return Err(unrepresentable("event line must be a JSON object".to_string()));
        };
        if map.len() != 1 {
            return Err(unrepresentable(format!(
                "event line must hold exactly one key, found {}",
                map.len()
            )));
        }
        let Some((key, value)) = map.into_iter().next() else {
            return Ok(None);
        };
        let key = match key.strip_prefix(ID_PREFIX).map(str::parse::<u32>) {
            Some(Ok(id)) => EventKey::Id(id),
            _ => EventKey::Name(key),
        };
        Ok(Some(Event {
            key,
            value: self.from_json_value(&value)?,
        }))
    }
}

/// Parse the next JSON document off `src`, skipping leading whitespace.
fn next_json(src: &mut Bytes) -> Result<Option<serde_json::Value>> {
    let skip = src
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    src.advance(skip);
    if src.is_empty() {
        return Ok(None);
    }

    let mut stream = serde_json::Deserializer::from_slice(&src[..]).into_iter::<serde_json::Value>();
    let json = match stream.next() {
        Some(parsed) => parsed?,
        None => return Ok(None),
    };
    let consumed = stream.byte_offset();
    src.advance(consumed);
    Ok(Some(json))
}

fn number_to_value(n: &Number) -> Result<Value> {
    if let Some(v) = n.as_i64() {
        return Ok(Value::Int64(v));
    }
    if n.is_u64() {
        return Err(unrepresentable(format!("integer {n} exceeds i64")));
    }
    n.as_f64()
        .map(Value::Float64)
        .ok_or_else(|| unrepresentable(format!("number {n} is not representable")))
}

fn finite(v: f64) -> Result<serde_json::Value> {
    Number::from_f64(v)
        .map(serde_json::Value::Number)
        .ok_or_else(|| unrepresentable(format!("non-finite float {v}")))
}

fn single(key: &str, value: serde_json::Value) -> serde_json::Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    serde_json::Value::Object(map)
}

fn unrepresentable(reason: String) -> WireError {
    WireError::Unrepresentable {
        wire: "json",
        reason,
    }
}
