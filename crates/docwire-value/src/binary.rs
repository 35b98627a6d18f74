//! Compact tagged binary wire.
//!
//! ```text
//! value  := tag payload
//! 0x00 null | 0x01 false | 0x02 true
//! 0x10 i8 | 0x11 i16 LE | 0x12 i32 LE | 0x13 i64 LE
//! 0x18 f32 LE | 0x19 f64 LE
//! 0x20 text  := u32 LE length, utf-8
//! 0x21 bytes := u32 LE length, raw
//! 0x30 object := text type-name, u32 LE count, count × (text name, value)
//! 0x40 sequence := u32 LE count, count × value
//!
//! event  := 0xE0 text name value | 0xE1 u32 LE id value
//! ```

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::registry::AliasRegistry;
use crate::value::{Object, Value};
use crate::wire::{Event, EventKey, Wire, WireType};

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_I8: u8 = 0x10;
const TAG_I16: u8 = 0x11;
const TAG_I32: u8 = 0x12;
const TAG_I64: u8 = 0x13;
const TAG_F32: u8 = 0x18;
const TAG_F64: u8 = 0x19;
const TAG_TEXT: u8 = 0x20;
const TAG_BYTES: u8 = 0x21;
const TAG_OBJECT: u8 = 0x30;
const TAG_SEQUENCE: u8 = 0x40;
const TAG_EVENT_NAME: u8 = 0xE0;
const TAG_EVENT_ID: u8 = 0xE1;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 128;

/// Compact binary wire.
#[derive(Debug, Clone, Default)]
pub struct BinaryWire {
    registry: Arc<AliasRegistry>,
}

impl BinaryWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<AliasRegistry>) -> Self {
        Self { registry }
    }

    fn put_value(&self, value: &Value, dst: &mut BytesMut) -> Result<()> {
        match value {
            Value::Null => dst.put_u8(TAG_NULL),
            Value::Bool(false) => dst.put_u8(TAG_FALSE),
            Value::Bool(true) => dst.put_u8(TAG_TRUE),
            Value::Int8(v) => {
                dst.put_u8(TAG_I8);
                dst.put_i8(*v);
            }
            Value::Int16(v) => {
                dst.put_u8(TAG_I16);
                dst.put_i16_le(*v);
            }
            Value::Int32(v) => {
                dst.put_u8(TAG_I32);
                dst.put_i32_le(*v);
            }
            Value::Int64(v) => {
                dst.put_u8(TAG_I64);
                dst.put_i64_le(*v);
            }
            Value::Float32(v) => {
                dst.put_u8(TAG_F32);
                dst.put_f32_le(*v);
            }
            Value::Float64(v) => {
                dst.put_u8(TAG_F64);
                dst.put_f64_le(*v);
            }
            Value::Text(text) => {
                dst.put_u8(TAG_TEXT);
                put_len_prefixed(text.as_bytes(), dst)?;
            }
            Value::Bytes(bytes) => {
                dst.put_u8(TAG_BYTES);
                put_len_prefixed(bytes, dst)?;
            }
            Value::Object(object) => {
                dst.put_u8(TAG_OBJECT);
                put_len_prefixed(self.registry.alias_for(object.type_name()).as_bytes(), dst)?;
                put_count(object.len(), dst)?;
                for (name, field) in object.fields() {
                    put_len_prefixed(name.as_bytes(), dst)?;
                    self.put_value(field, dst)?;
                }
            }
            Value::Sequence(items) => {
                dst.put_u8(TAG_SEQUENCE);
                put_count(items.len(), dst)?;
                for item in items {
                    self.put_value(item, dst)?;
                }
            }
        }
        Ok(())
    }

    fn get_value(&self, src: &mut Bytes, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(WireError::TooDeep(MAX_DEPTH));
        }
        need(src, 1)?;
        let value = match src.get_u8() {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_I8 => {
                need(src, 1)?;
                Value::Int8(src.get_i8())
            }
            TAG_I16 => {
                need(src, 2)?;
                Value::Int16(src.get_i16_le())
            }
            TAG_I32 => {
                need(src, 4)?;
                Value::Int32(src.get_i32_le())
            }
            TAG_I64 => {
                need(src, 8)?;
                Value::Int64(src.get_i64_le())
            }
            TAG_F32 => {
                need(src, 4)?;
                Value::Float32(src.get_f32_le())
            }
            TAG_F64 => {
                need(src, 8)?;
                Value::Float64(src.get_f64_le())
            }
            TAG_TEXT => Value::Text(get_text(src)?),
            TAG_BYTES => Value::Bytes(get_len_prefixed(src)?),
            TAG_OBJECT => {
                let written = get_text(src)?;
                let mut object = Object::new(self.registry.type_for(&written));
                let count = get_count(src)?;
                for _ in 0..count {
                    let name = get_text(src)?;
                    let field = self.get_value(src, depth + 1)?;
                    object.fields_mut().push((name, field));
                }
                Value::Object(object)
            }
            TAG_SEQUENCE => {
                let count = get_count(src)?;
                // Every element needs at least one byte, so the count is
                // bounded by what is left.
                let mut items = Vec::with_capacity(count.min(src.remaining()));
                for _ in 0..count {
                    items.push(self.get_value(src, depth + 1)?);
                }
                Value::Sequence(items)
            }
            other => return Err(WireError::InvalidTag(other)),
        };
        Ok(value)
    }
}

impl Wire for BinaryWire {
    fn wire_type(&self) -> WireType {
        WireType::Binary
    }

    fn encode_value(&self, value: &Value, dst: &mut BytesMut) -> Result<()> {
        self.put_value(value, dst)
    }

    fn decode_value(&self, src: &mut Bytes) -> Result<Value> {
        self.get_value(src, 0)
    }

    fn encode_event(&self, key: &EventKey, value: &Value, dst: &mut BytesMut) -> Result<()> {
        match key {
            EventKey::Name(name) => {
                dst.put_u8(TAG_EVENT_NAME);
                put_len_prefixed(name.as_bytes(), dst)?;
            }
            EventKey::Id(id) => {
                dst.put_u8(TAG_EVENT_ID);
                dst.put_u32_le(*id);
            }
        }
        self.put_value(value, dst)
    }

    fn decode_event(&self, src: &mut Bytes) -> Result<Option<Event>> {
        if !src.has_remaining() {
            return Ok(None);
        }
        let key = match src.get_u8() {
            TAG_EVENT_NAME => EventKey::Name(get_text(src)?),
            TAG_EVENT_ID => {
                need(src, 4)?;
                EventKey::Id(src.get_u32_le())
            }
            other => return Err(WireError::InvalidTag(other)),
        };
        let value = self.get_value(src, 0)?;
        Ok(Some(Event { key, value }))
    }
}

fn need(src: &Bytes, n: usize) -> Result<()> {
    if src.remaining() < n {
        return Err(WireError::UnexpectedEof {
            needed: n - src.remaining(),
        });
    }
    Ok(())
}

fn put_count(count: usize, dst: &mut BytesMut) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| WireError::Unrepresentable {
        wire: "binary",
        reason: format!("length {count} exceeds u32"),
    })?;
    dst.put_u32_le(count);
    Ok(())
}

fn put_len_prefixed(bytes: &[u8], dst: &mut BytesMut) -> Result<()> {
    put_count(bytes.len(), dst)?;
    dst.put_slice(bytes);
    Ok(())
}

fn get_count(src: &mut Bytes) -> Result<usize> {
    need(src, 4)?;
    Ok(src.get_u32_le() as usize)
}

fn get_len_prefixed(src: &mut Bytes) -> Result<Bytes> {
    let len = get_count(src)?;
    need(src, len)?;
    Ok(src.split_to(len))
}

fn get_text(src: &mut Bytes) -> Result<String> {
    let raw = get_len_prefixed(src)?;
    Ok(std::str::from_utf8(&raw)?.to_string())
}
