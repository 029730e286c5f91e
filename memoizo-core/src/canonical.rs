//! Canonical encoding of argument values for serialized cache keys.
//!
//! Every value becomes a JSON array whose first element names its kind, so values of
//! different kinds never encode alike: `None`, `Some(None)`, `Some(())` and `()` stay
//! apart, as do the integer `u128::MAX` and a string holding the same digits.
//! Integers are written as decimal text and floats as their bit pattern, so nothing is
//! lost to JSON's number range.
//!
//! Map entries and set elements are sorted by their encoded bytes, so equal maps and
//! sets encode alike regardless of iteration order. This holds for maps at any depth
//! when encoding through [`encode`]. Sets reached only through a `Serialize` impl look
//! like sequences and keep their iteration order.

use serde::ser::{
    self, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct EncodeError(String);

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError(msg.to_string())
    }
}

/// Encodes any serializable value. Fails only when its `Serialize` impl does.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, String> {
    value.serialize(KeySerializer).map_err(|e| e.to_string())
}

/// Bytes compared by the memo table.
pub(crate) fn to_bytes(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

pub(crate) fn node<const N: usize>(tag: &str, payload: [Value; N]) -> Value {
    let mut items = Vec::with_capacity(N + 1);
    items.push(Value::String(tag.to_owned()));
    items.extend(payload);
    Value::Array(items)
}

pub(crate) fn unit() -> Value {
    node("unit", [])
}

pub(crate) fn boolean(b: bool) -> Value {
    node("bool", [Value::Bool(b)])
}

pub(crate) fn int(i: i128) -> Value {
    node("int", [Value::String(i.to_string())])
}

pub(crate) fn uint(u: u128) -> Value {
    node("uint", [Value::String(u.to_string())])
}

pub(crate) fn float(bits: u64) -> Value {
    node("float", [Value::from(bits)])
}

pub(crate) fn character(c: char) -> Value {
    node("char", [Value::String(c.to_string())])
}

pub(crate) fn string(s: &str) -> Value {
    node("str", [Value::String(s.to_owned())])
}

pub(crate) fn bytes(bytes: &[u8]) -> Value {
    node(
        "bytes",
        [Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())],
    )
}

pub(crate) fn none() -> Value {
    node("none", [])
}

pub(crate) fn some(inner: Value) -> Value {
    node("some", [inner])
}

pub(crate) fn seq(items: Vec<Value>) -> Value {
    node("seq", [Value::Array(items)])
}

pub(crate) fn set(mut items: Vec<Value>) -> Value {
    items.sort_by_cached_key(to_bytes);
    node("set", [Value::Array(items)])
}

pub(crate) fn map(mut entries: Vec<(Value, Value)>) -> Value {
    entries.sort_by_cached_key(|(key, _)| to_bytes(key));
    let entries = entries
        .into_iter()
        .map(|(key, value)| Value::Array(vec![key, value]))
        .collect();
    node("map", [Value::Array(entries)])
}

pub(crate) fn keyword(name: &str, value: Value) -> Value {
    node("kw", [Value::String(name.to_owned()), value])
}

pub(crate) fn instance(addr: usize) -> Value {
    node("instance", [Value::from(addr)])
}

fn variant(name: &str, payload: Option<Value>) -> Value {
    match payload {
        Some(payload) => node("variant", [Value::String(name.to_owned()), payload]),
        None => node("variant", [Value::String(name.to_owned())]),
    }
}

struct KeySerializer;

impl Serializer for KeySerializer {
    type Ok = Value;
    type Error = EncodeError;

    type SerializeSeq = SeqEncoder;
    type SerializeTuple = SeqEncoder;
    type SerializeTupleStruct = SeqEncoder;
    type SerializeTupleVariant = SeqEncoder;
    type SerializeMap = MapEncoder;
    type SerializeStruct = StructEncoder;
    type SerializeStructVariant = StructEncoder;

    fn serialize_bool(self, v: bool) -> Result<Value, EncodeError> {
        Ok(boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EncodeError> {
        Ok(int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EncodeError> {
        Ok(int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EncodeError> {
        Ok(int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EncodeError> {
        Ok(int(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, EncodeError> {
        Ok(int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EncodeError> {
        Ok(uint(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EncodeError> {
        Ok(uint(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EncodeError> {
        Ok(uint(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EncodeError> {
        Ok(uint(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, EncodeError> {
        Ok(uint(v))
    }

    // Widened so that `1.5f32` and `1.5f64` encode alike, as their direct parts do.
    fn serialize_f32(self, v: f32) -> Result<Value, EncodeError> {
        Ok(float(f64::from(v).to_bits()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EncodeError> {
        Ok(float(v.to_bits()))
    }

    fn serialize_char(self, v: char) -> Result<Value, EncodeError> {
        Ok(character(v))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EncodeError> {
        Ok(string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, EncodeError> {
        Ok(bytes(v))
    }

    fn serialize_none(self) -> Result<Value, EncodeError> {
        Ok(none())
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, EncodeError>
    where
        T: ?Sized + Serialize,
    {
        Ok(some(value.serialize(KeySerializer)?))
    }

    fn serialize_unit(self) -> Result<Value, EncodeError> {
        Ok(unit())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EncodeError> {
        Ok(unit())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        name: &'static str,
    ) -> Result<Value, EncodeError> {
        Ok(variant(name, None))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        name: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError>
    where
        T: ?Sized + Serialize,
    {
        Ok(variant(name, Some(value.serialize(KeySerializer)?)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::new(None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::new(None, len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::new(None, len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, EncodeError> {
        Ok(SeqEncoder::new(Some(name), len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapEncoder, EncodeError> {
        Ok(MapEncoder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<StructEncoder, EncodeError> {
        Ok(StructEncoder::new(None, len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        name: &'static str,
        len: usize,
    ) -> Result<StructEncoder, EncodeError> {
        Ok(StructEncoder::new(Some(name), len))
    }
}

struct SeqEncoder {
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl SeqEncoder {
    fn new(variant: Option<&'static str>, len: usize) -> Self {
        Self {
            variant,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.items.push(value.serialize(KeySerializer)?);
        Ok(())
    }

    fn finish(self) -> Value {
        let body = seq(self.items);
        match self.variant {
            Some(name) => variant(name, Some(body)),
            None => body,
        }
    }
}

impl SerializeSeq for SeqEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTuple for SeqEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTupleStruct for SeqEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeTupleVariant for SeqEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}

struct MapEncoder {
    entries: Vec<(Value, Value)>,
    pending_key: Option<Value>,
}

impl SerializeMap for MapEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodeError("map value serialized before its key".to_string()))?;
        self.entries.push((key, value.serialize(KeySerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(map(self.entries))
    }
}

struct StructEncoder {
    variant: Option<&'static str>,
    fields: Vec<Value>,
}

impl StructEncoder {
    fn new(variant: Option<&'static str>, len: usize) -> Self {
        Self {
            variant,
            fields: Vec::with_capacity(len),
        }
    }

    fn push<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.fields.push(Value::Array(vec![
            Value::String(key.to_owned()),
            value.serialize(KeySerializer)?,
        ]));
        Ok(())
    }

    fn finish(self) -> Value {
        let body = node("struct", [Value::Array(self.fields)]);
        match self.variant {
            Some(name) => variant(name, Some(body)),
            None => body,
        }
    }
}

impl SerializeStruct for StructEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}

impl SerializeStructVariant for StructEncoder {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(self.finish())
    }
}
