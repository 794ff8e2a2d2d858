//! Routes values to the codec that owns their shape.
//!
//! Primitives and arrays are handled here, messages and message sets by
//! [`crate::message`], and every other named composite by the
//! [`StructCodec`] collaborator.

use crate::error::ProtocolError;
use crate::message::{
    decode_fetch_partition, encode_fetch_partition, encode_message, encode_message_set,
};
use crate::primitive::{
    decode_primitive, encode_primitive, encode_primitive_array, get_count, put_count,
};
use crate::schema::StructCodec;
use crate::translate::FieldTranslator;
use crate::value::{Type, Value};
use bytes::{Buf, Bytes, BytesMut};

/// Borrowed view of the collaborators needed for one encode or decode call.
#[derive(Clone, Copy)]
pub struct Dispatch<'a> {
    structs: &'a dyn StructCodec,
    translator: &'a dyn FieldTranslator,
    verify_crc: bool,
}

impl<'a> Dispatch<'a> {
    pub fn new(
        structs: &'a dyn StructCodec,
        translator: &'a dyn FieldTranslator,
        verify_crc: bool,
    ) -> Self {
        Self {
            structs,
            translator,
            verify_crc,
        }
    }

    /// Whether message CRCs are checked on decode.
    pub fn verify_crc(&self) -> bool {
        self.verify_crc
    }

    /// Decodes one value of type `ty` from the front of `buf`.
    pub fn decode(&self, ty: Type, buf: &mut Bytes) -> Result<Value, ProtocolError> {
        match ty {
            Type::Primitive(p) => decode_primitive(p, buf),
            Type::Array(elem) => {
                let count = get_count(buf)?;
                // A corrupt count must not drive a huge allocation.
                let mut items = Vec::with_capacity(count.min(buf.remaining()));
                for _ in 0..count {
                    items.push(self.decode(*elem, buf)?);
                }
                Ok(Value::Array(items))
            }
            Type::FetchPartition => decode_fetch_partition(buf, self).map(Value::FetchPartition),
            Type::MessageSet => Err(ProtocolError::Unsupported("decoding produce message sets")),
            Type::Struct(name) => self.structs.decode(name, self, buf).map(Value::Struct),
        }
    }

    /// Decodes one field of a composite and runs it through the translator.
    pub fn decode_field(
        &self,
        struct_name: &str,
        field_name: &str,
        ty: Type,
        buf: &mut Bytes,
    ) -> Result<Value, ProtocolError> {
        let value = self.decode(ty, buf)?;
        Ok(self.translator.translate(struct_name, field_name, value))
    }

    /// Encodes `value` with the encoder its variant selects.
    pub fn encode(&self, value: &Value, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match value {
            Value::PrimitiveArray(p, items) => encode_primitive_array(*p, items, buf),
            Value::Array(items) => {
                put_count(buf, items.len())?;
                for item in items {
                    self.encode(item, buf)?;
                }
                Ok(())
            }
            Value::Struct(s) => self.structs.encode(s, self, buf),
            Value::Message(m) => encode_message(m, buf),
            Value::MessageSet(set) => encode_message_set(set, buf),
            Value::FetchPartition(p) => encode_fetch_partition(p, buf),
            scalar => match scalar.primitive() {
                Some(p) => encode_primitive(p, scalar, buf),
                None => Err(ProtocolError::TypeMismatch {
                    expected: "scalar",
                    actual: scalar.kind(),
                }),
            },
        }
    }
}
