//! Dynamic values and the schema type tags that describe them.
//!
//! Decoding is driven by a [`Type`]; encoding is driven by the [`Value`]
//! itself, since every value knows which encoder it belongs to.

use crate::error::KafkaCode;
use crate::message::{FetchResponsePartition, Message, PartitionMessageSet};
use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Wire primitives with a fixed or length-prefixed encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int8,
    Int16,
    Int32,
    Int64,
    String,
    Bytes,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        }
    }
}

/// Schema type tag.
///
/// `Copy` and built from `&'static` parts so schemas can live in statics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    /// int32-counted array of the element type.
    Array(&'static Type),
    /// Named composite handled by the struct codec.
    Struct(&'static str),
    /// A produce-side partition message set.
    MessageSet,
    /// A fetch response partition with its isolated message-set region.
    FetchPartition,
}

pub const INT8: Type = Type::Primitive(Primitive::Int8);
pub const INT16: Type = Type::Primitive(Primitive::Int16);
pub const INT32: Type = Type::Primitive(Primitive::Int32);
pub const INT64: Type = Type::Primitive(Primitive::Int64);
pub const STRING: Type = Type::Primitive(Primitive::String);
pub const BYTES: Type = Type::Primitive(Primitive::Bytes);

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Primitive(p) => p.name(),
            Type::Array(_) => "array",
            Type::Struct(name) => name,
            Type::MessageSet => "message_set",
            Type::FetchPartition => "fetch_partition",
        }
    }

    /// Returns whether `value` can be encoded as this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Primitive(p), v) => v.primitive() == Some(*p),
            (Type::Array(elem), Value::Array(items)) => items.iter().all(|v| elem.accepts(v)),
            (Type::Array(elem), Value::PrimitiveArray(p, items)) => {
                **elem == Type::Primitive(*p) && items.iter().all(|v| elem.accepts(v))
            }
            (Type::Struct(name), Value::Struct(s)) => s.name == *name,
            (Type::MessageSet, Value::MessageSet(_)) => true,
            (Type::FetchPartition, Value::FetchPartition(_)) => true,
            _ => false,
        }
    }
}

/// A decoded or to-be-encoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    /// `None` is the absent string; empty strings encode the same way.
    String(Option<String>),
    Bytes(Option<Bytes>),
    /// Array whose elements all encode as one declared primitive.
    PrimitiveArray(Primitive, Vec<Value>),
    /// Array whose elements each pick their own encoder.
    Array(Vec<Value>),
    Struct(Struct),
    Message(Message),
    MessageSet(PartitionMessageSet),
    FetchPartition(FetchResponsePartition),
    /// Translated form of an `error_code` field.
    ErrorCode(KafkaCode),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Some(s.into()))
    }

    pub fn bytes(b: impl Into<Bytes>) -> Self {
        Value::Bytes(Some(b.into()))
    }

    /// Returns the primitive this value encodes as, if it is a scalar.
    ///
    /// A translated error code still encodes as `int16`.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Value::Int8(_) => Some(Primitive::Int8),
            Value::Int16(_) | Value::ErrorCode(_) => Some(Primitive::Int16),
            Value::Int32(_) => Some(Primitive::Int32),
            Value::Int64(_) => Some(Primitive::Int64),
            Value::String(_) => Some(Primitive::String),
            Value::Bytes(_) => Some(Primitive::Bytes),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::PrimitiveArray(..) | Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Message(_) => "message",
            Value::MessageSet(_) => "message_set",
            Value::FetchPartition(_) => "fetch_partition",
            other => other.primitive().map(|p| p.name()).unwrap_or("unknown"),
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::Int16(v) => Some(*v),
            Value::ErrorCode(code) => Some(code.code()),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn as_error_code(&self) -> Option<KafkaCode> {
        match self {
            Value::ErrorCode(code) => Some(*code),
            Value::Int16(raw) => Some(KafkaCode::from_code(*raw)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::PrimitiveArray(_, items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fetch_partition(&self) -> Option<&FetchResponsePartition> {
        match self {
            Value::FetchPartition(p) => Some(p),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::String(s) => s.serialize(serializer),
            Value::Bytes(b) => b.serialize(serializer),
            Value::PrimitiveArray(_, items) | Value::Array(items) => items.serialize(serializer),
            Value::Struct(s) => s.serialize(serializer),
            Value::Message(m) => m.serialize(serializer),
            Value::MessageSet(set) => set.serialize(serializer),
            Value::FetchPartition(p) => p.serialize(serializer),
            Value::ErrorCode(code) => code.serialize(serializer),
        }
    }
}

/// One named field of a [`Struct`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
}

/// A named composite value with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub name: &'static str,
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &'static str, value: Value) -> Self {
        self.fields.push(Field { name, value });
        self
    }

    pub fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push(Field { name, value });
    }

    /// Returns the first field with the given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

impl Serialize for Struct {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field.name, &field.value)?;
        }
        map.end()
    }
}
