//! Command execution.

use bytes::Bytes;
use clap::Subcommand;
use kwire_protocol::{
    Codec, Decoded, Message, PartitionMessageSet, Primitive, ProtocolError, Request, Response,
    Struct, Value,
};

/// Requests the inspector can build.
#[derive(Debug, Clone, Subcommand)]
pub enum EncodeCommand {
    /// Metadata request for the given topics (all topics when none are given)
    Metadata {
        /// Topic name (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,
    },

    /// Fetch request for a single partition
    Fetch {
        /// Topic name
        #[arg(short, long)]
        topic: String,

        /// Partition number
        #[arg(short, long, default_value = "0")]
        partition: i32,

        /// Offset to fetch from
        #[arg(short, long, default_value = "0")]
        offset: i64,

        /// Maximum bytes to return for the partition
        #[arg(long, default_value = "1048576")]
        max_bytes: i32,

        /// Maximum time the broker may wait for data
        #[arg(long, default_value = "100")]
        max_wait_ms: i32,

        /// Minimum bytes to accumulate before answering
        #[arg(long, default_value = "1")]
        min_bytes: i32,
    },

    /// Produce request carrying one message
    Produce {
        /// Topic name
        #[arg(short, long)]
        topic: String,

        /// Partition number
        #[arg(short, long, default_value = "0")]
        partition: i32,

        /// Message key
        #[arg(short, long)]
        key: Option<String>,

        /// Message value
        #[arg(short, long)]
        value: String,

        /// Required acknowledgements
        #[arg(long, default_value = "1")]
        acks: i16,

        /// Broker-side timeout
        #[arg(long, default_value = "1000")]
        timeout_ms: i32,
    },

    /// Group coordinator lookup
    GroupCoordinator {
        /// Consumer group id
        #[arg(short, long)]
        group: String,
    },
}

impl EncodeCommand {
    /// Builds the request body struct.
    pub fn message(&self) -> Struct {
        match self {
            EncodeCommand::Metadata { topics } => Struct::new("metadata_request").with_field(
                "topics",
                Value::PrimitiveArray(
                    Primitive::String,
                    topics.iter().map(|t| Value::string(t.as_str())).collect(),
                ),
            ),

            EncodeCommand::Fetch {
                topic,
                partition,
                offset,
                max_bytes,
                max_wait_ms,
                min_bytes,
            } => {
                let partition = Struct::new("fetch_request.partition")
                    .with_field("partition", Value::Int32(*partition))
                    .with_field("fetch_offset", Value::Int64(*offset))
                    .with_field("max_bytes", Value::Int32(*max_bytes));
                let topic = Struct::new("fetch_request.topic")
                    .with_field("topic", Value::string(topic.as_str()))
                    .with_field("partitions", Value::Array(vec![Value::Struct(partition)]));
                Struct::new("fetch_request")
                    .with_field("replica_id", Value::Int32(-1))
                    .with_field("max_wait_time", Value::Int32(*max_wait_ms))
                    .with_field("min_bytes", Value::Int32(*min_bytes))
                    .with_field("topics", Value::Array(vec![Value::Struct(topic)]))
            }

            EncodeCommand::Produce {
                topic,
                partition,
                key,
                value,
                acks,
                timeout_ms,
            } => {
                let mut message = Message::new(Bytes::copy_from_slice(value.as_bytes()));
                if let Some(key) = key {
                    message = message.with_key(Bytes::copy_from_slice(key.as_bytes()));
                }
                let set = PartitionMessageSet {
                    partition: *partition,
                    messages: vec![message],
                };
                let topic = Struct::new("produce_request.topic")
                    .with_field("topic", Value::string(topic.as_str()))
                    .with_field("partitions", Value::Array(vec![Value::MessageSet(set)]));
                Struct::new("produce_request")
                    .with_field("required_acks", Value::Int16(*acks))
                    .with_field("timeout", Value::Int32(*timeout_ms))
                    .with_field("topics", Value::Array(vec![Value::Struct(topic)]))
            }

            EncodeCommand::GroupCoordinator { group } => Struct::new("group_coordinator_request")
                .with_field("group_id", Value::string(group.as_str())),
        }
    }
}

/// Encodes one request frame and returns it as hex.
pub fn encode(
    codec: &Codec,
    command: &EncodeCommand,
    correlation_id: i32,
    api_version: Option<i16>,
    client_id: &str,
) -> Result<String, ProtocolError> {
    let mut request = Request::new(correlation_id, command.message()).with_client_id(client_id);
    request.api_version = api_version;
    let frame = codec.encode_request(&request)?;
    tracing::debug!("Encoded {} ({} bytes)", request.message.name, frame.len());
    Ok(hex::encode(&frame))
}

/// Responses decoded from a capture.
#[derive(Debug)]
pub struct DecodeReport {
    pub responses: Vec<Response>,
    /// Bytes of a trailing frame that was not fully captured.
    pub incomplete_bytes: usize,
}

/// Decodes back-to-back response frames until the input runs out.
pub fn decode(codec: &Codec, mut input: Bytes) -> Result<DecodeReport, ProtocolError> {
    let mut responses = Vec::new();
    while !input.is_empty() {
        match codec.decode_response(input)? {
            Decoded::Complete(response, rest) => {
                responses.push(response);
                input = rest;
            }
            Decoded::IncompleteFrame(original) => {
                return Ok(DecodeReport {
                    responses,
                    incomplete_bytes: original.len(),
                });
            }
        }
    }
    Ok(DecodeReport {
        responses,
        incomplete_bytes: 0,
    })
}

/// Parses hex input, ignoring whitespace.
pub fn parse_hex(input: &str) -> Result<Bytes, hex::FromHexError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map(Bytes::from)
}

/// Formats a value as pretty-printed JSON.
pub fn format_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}
