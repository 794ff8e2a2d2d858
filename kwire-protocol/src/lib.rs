//! # kwire-protocol
//!
//! Wire codec for the v0 message-broker protocol.
//!
//! This crate provides:
//! - Big-endian primitives, length-prefixed strings and byte blobs
//! - Size-prefixed framing with the api key packed into the correlation id
//! - Schema-driven struct encoding and decoding behind [`StructCodec`]
//! - CRC-framed messages and message sets that tolerate truncated delivery
//! - Post-decode field translation of broker error codes

pub mod api;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod message;
pub mod primitive;
pub mod schema;
pub mod translate;
pub mod value;

pub use api::ApiKey;
pub use codec::{Codec, Decoded, Request, Response};
pub use config::CodecConfig;
pub use dispatch::Dispatch;
pub use error::{KafkaCode, ProtocolError};
pub use frame::{
    pack_correlation_id, unpack_correlation_id, FrameSplit, MAX_CORRELATION_ID, RESERVED_BITS,
};
pub use message::{FetchResponsePartition, Message, MessageSet, PartitionMessageSet};
pub use schema::{SchemaRegistry, StructCodec};
pub use translate::{ErrorCodeTranslator, FieldTranslator, Passthrough};
pub use value::{Field, Primitive, Struct, Type, Value};

/// Api version written when a request does not choose one.
pub const DEFAULT_API_VERSION: i16 = 0;

/// Largest frame body accepted by default (100 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;
