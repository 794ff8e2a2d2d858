//! Struct codecs for API request and response bodies.
//!
//! [`StructCodec`] is the seam between the wire primitives and the per-API
//! message layouts. [`SchemaRegistry`] implements it from static field
//! tables for the v0 versions of the supported APIs.

use crate::dispatch::Dispatch;
use crate::error::ProtocolError;
use crate::value::{Struct, Type, INT16, INT32, INT64, STRING};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// Encodes and decodes named composites.
///
/// Implementations call back into `dispatch` for field values so arrays,
/// messages and nested structs keep their own encoders, and so decoded
/// fields pass through the field translator.
pub trait StructCodec: Send + Sync {
    fn encode(
        &self,
        value: &Struct,
        dispatch: &Dispatch<'_>,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError>;

    fn decode(
        &self,
        name: &str,
        dispatch: &Dispatch<'_>,
        buf: &mut Bytes,
    ) -> Result<Struct, ProtocolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSchema],
}

/// Builds a [`StructSchema`] literal from `"field": type` pairs.
macro_rules! schema {
    ($name:literal { $($field:literal: $ty:expr),* $(,)? }) => {
        StructSchema {
            name: $name,
            fields: &[$(FieldSchema { name: $field, ty: $ty }),*],
        }
    };
}

static INT32_ARRAY: Type = Type::Array(&INT32);
static INT64_ARRAY: Type = Type::Array(&INT64);
static STRING_ARRAY: Type = Type::Array(&STRING);

/// v0 schemas, requests first.
pub static V0_SCHEMAS: &[StructSchema] = &[
    // Produce (0)
    schema!("produce_request" {
        "required_acks": INT16,
        "timeout": INT32,
        "topics": Type::Array(&Type::Struct("produce_request.topic")),
    }),
    schema!("produce_request.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::MessageSet),
    }),
    // Fetch (1)
    schema!("fetch_request" {
        "replica_id": INT32,
        "max_wait_time": INT32,
        "min_bytes": INT32,
        "topics": Type::Array(&Type::Struct("fetch_request.topic")),
    }),
    schema!("fetch_request.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("fetch_request.partition")),
    }),
    schema!("fetch_request.partition" {
        "partition": INT32,
        "fetch_offset": INT64,
        "max_bytes": INT32,
    }),
    // ListOffsets (2)
    schema!("list_offsets_request" {
        "replica_id": INT32,
        "topics": Type::Array(&Type::Struct("list_offsets_request.topic")),
    }),
    schema!("list_offsets_request.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("list_offsets_request.partition")),
    }),
    schema!("list_offsets_request.partition" {
        "partition": INT32,
        "timestamp": INT64,
        "max_num_offsets": INT32,
    }),
    // Metadata (3)
    schema!("metadata_request" {
        "topics": STRING_ARRAY,
    }),
    // OffsetCommit (8)
    schema!("offset_commit_request" {
        "group_id": STRING,
        "topics": Type::Array(&Type::Struct("offset_commit_request.topic")),
    }),
    schema!("offset_commit_request.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("offset_commit_request.partition")),
    }),
    schema!("offset_commit_request.partition" {
        "partition": INT32,
        "offset": INT64,
        "metadata": STRING,
    }),
    // OffsetFetch (9)
    schema!("offset_fetch_request" {
        "group_id": STRING,
        "topics": Type::Array(&Type::Struct("offset_fetch_request.topic")),
    }),
    schema!("offset_fetch_request.topic" {
        "topic": STRING,
        "partitions": INT32_ARRAY,
    }),
    // GroupCoordinator (10)
    schema!("group_coordinator_request" {
        "group_id": STRING,
    }),
    // Responses
    schema!("produce_response" {
        "topics": Type::Array(&Type::Struct("produce_response.topic")),
    }),
    schema!("produce_response.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("produce_response.partition")),
    }),
    schema!("produce_response.partition" {
        "partition": INT32,
        "error_code": INT16,
        "offset": INT64,
    }),
    schema!("fetch_response" {
        "topics": Type::Array(&Type::Struct("fetch_response.topic")),
    }),
    schema!("fetch_response.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::FetchPartition),
    }),
    schema!("list_offsets_response" {
        "topics": Type::Array(&Type::Struct("list_offsets_response.topic")),
    }),
    schema!("list_offsets_response.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("list_offsets_response.partition")),
    }),
    schema!("list_offsets_response.partition" {
        "partition": INT32,
        "error_code": INT16,
        "offsets": INT64_ARRAY,
    }),
    schema!("metadata_response" {
        "brokers": Type::Array(&Type::Struct("metadata_response.broker")),
        "topics": Type::Array(&Type::Struct("metadata_response.topic")),
    }),
    schema!("metadata_response.broker" {
        "node_id": INT32,
        "host": STRING,
        "port": INT32,
    }),
    schema!("metadata_response.topic" {
        "error_code": INT16,
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("metadata_response.partition")),
    }),
    schema!("metadata_response.partition" {
        "error_code": INT16,
        "partition": INT32,
        "leader": INT32,
        "replicas": INT32_ARRAY,
        "isr": INT32_ARRAY,
    }),
    schema!("offset_commit_response" {
        "topics": Type::Array(&Type::Struct("offset_commit_response.topic")),
    }),
    schema!("offset_commit_response.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("offset_commit_response.partition")),
    }),
    schema!("offset_commit_response.partition" {
        "partition": INT32,
        "error_code": INT16,
    }),
    schema!("offset_fetch_response" {
        "topics": Type::Array(&Type::Struct("offset_fetch_response.topic")),
    }),
    schema!("offset_fetch_response.topic" {
        "topic": STRING,
        "partitions": Type::Array(&Type::Struct("offset_fetch_response.partition")),
    }),
    schema!("offset_fetch_response.partition" {
        "partition": INT32,
        "offset": INT64,
        "metadata": STRING,
        "error_code": INT16,
    }),
    schema!("group_coordinator_response" {
        "error_code": INT16,
        "coordinator_id": INT32,
        "host": STRING,
        "port": INT32,
    }),
];

/// Table-driven [`StructCodec`] over static schemas.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, &'static StructSchema>,
}

impl SchemaRegistry {
    /// Creates a registry holding the v0 schemas.
    pub fn new() -> Self {
        Self::empty().with_schemas(V0_SCHEMAS)
    }

    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Adds schemas, replacing any already registered under the same name.
    pub fn with_schemas(mut self, schemas: &'static [StructSchema]) -> Self {
        for schema in schemas {
            self.schemas.insert(schema.name, schema);
        }
        self
    }

    pub fn schema(&self, name: &str) -> Option<&'static StructSchema> {
        self.schemas.get(name).copied()
    }

    fn lookup(&self, name: &str) -> Result<&'static StructSchema, ProtocolError> {
        self.schema(name)
            .ok_or_else(|| ProtocolError::UnknownStruct(name.to_string()))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the first field where `value` departs from `schema`, if any.
fn first_mismatch(schema: &StructSchema, value: &Struct) -> Option<&'static str> {
    for (i, spec) in schema.fields.iter().enumerate() {
        match value.fields.get(i) {
            Some(f) if f.name == spec.name && spec.ty.accepts(&f.value) => {}
            _ => return Some(spec.name),
        }
    }
    value.fields.get(schema.fields.len()).map(|extra| extra.name)
}

impl StructCodec for SchemaRegistry {
    fn encode(
        &self,
        value: &Struct,
        dispatch: &Dispatch<'_>,
        buf: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        let schema = self.lookup(value.name)?;
        if let Some(field) = first_mismatch(schema, value) {
            return Err(ProtocolError::SchemaMismatch {
                name: value.name.to_string(),
                field: field.to_string(),
            });
        }
        for field in &value.fields {
            dispatch.encode(&field.value, buf)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        name: &str,
        dispatch: &Dispatch<'_>,
        buf: &mut Bytes,
    ) -> Result<Struct, ProtocolError> {
        let schema = self.lookup(name)?;
        let mut out = Struct {
            name: schema.name,
            fields: Vec::with_capacity(schema.fields.len()),
        };
        for spec in schema.fields {
            let value = dispatch.decode_field(schema.name, spec.name, spec.ty, buf)?;
            out.push(spec.name, value);
        }
        Ok(out)
    }
}
