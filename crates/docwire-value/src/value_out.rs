//! Write-side builders.
//!
//! A [`ValueOut`] is a slot that accepts exactly one value. Objects and
//! sequences hand out further slots, one per field or element, so callers
//! write nested data the same way whichever wire ends up encoding it.

use bytes::Bytes;

use crate::convert::{Marshallable, ToValue};
use crate::value::{Object, Value};

/// A single-use slot for one value.
#[derive(Debug)]
pub struct ValueOut<'a> {
    slot: &'a mut Value,
}

impl<'a> ValueOut<'a> {
    pub fn new(slot: &'a mut Value) -> Self {
        Self { slot }
    }

    pub fn write(self, value: impl Into<Value>) {
        *self.slot = value.into();
    }

    /// Write anything with a [`ToValue`] mapping.
    pub fn write_value<T: ToValue + ?Sized>(self, value: &T) {
        *self.slot = value.to_value();
    }

    pub fn null(self) {
        *self.slot = Value::Null;
    }

    pub fn bool(self, v: bool) {
        self.write(v);
    }

    pub fn int8(self, v: i8) {
        self.write(v);
    }

    pub fn int16(self, v: i16) {
        self.write(v);
    }

    pub fn int32(self, v: i32) {
        self.write(v);
    }

    pub fn int64(self, v: i64) {
        self.write(v);
    }

    pub fn float32(self, v: f32) {
        self.write(v);
    }

    pub fn float64(self, v: f64) {
        self.write(v);
    }

    pub fn text(self, v: impl Into<String>) {
        *self.slot = Value::Text(v.into());
    }

    pub fn bytes(self, v: impl Into<Bytes>) {
        *self.slot = Value::Bytes(v.into());
    }

    /// Write a typed object, filling its fields through `fill`.
    pub fn object(self, type_name: impl Into<String>, fill: impl FnOnce(&mut ObjectOut)) {
        let mut out = ObjectOut {
            object: Object::new(type_name),
        };
        fill(&mut out);
        *self.slot = Value::Object(out.object);
    }

    /// Write a sequence, one `element()` call per entry.
    pub fn sequence(self, fill: impl FnOnce(&mut SequenceOut)) {
        let mut out = SequenceOut { items: Vec::new() };
        fill(&mut out);
        *self.slot = Value::Sequence(out.items);
    }

    /// Write `value` as an object using its declared field schema.
    pub fn marshallable<T: Marshallable>(self, value: &T) {
        self.object(T::TYPE_NAME, |out| value.write_fields(out));
    }
}

/// Field writer for one object.
#[derive(Debug)]
pub struct ObjectOut {
    object: Object,
}

impl ObjectOut {
    /// Slot for the next field, appended in call order.
    pub fn field(&mut self, name: impl Into<String>) -> ValueOut<'_> {
        let fields = self.object.fields_mut();
        fields.push((name.into(), Value::Null));
        let last = fields.len() - 1;
        ValueOut::new(&mut fields[last].1)
    }

    /// Append a field from anything with a [`ToValue`] mapping.
    pub fn write<T: ToValue + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> &mut Self {
        self.field(name).write_value(value);
        self
    }

    pub fn into_object(self) -> Object {
        self.object
    }
}

/// Element writer for one sequence.
#[derive(Debug)]
pub struct SequenceOut {
    items: Vec<Value>,
}

impl SequenceOut {
    /// Slot for the next element.
    pub fn element(&mut self) -> ValueOut<'_> {
        self.items.push(Value::Null);
        let last = self.items.len() - 1;
        ValueOut::new(&mut self.items[last])
    }

    pub fn push<T: ToValue + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.element().write_value(value);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
