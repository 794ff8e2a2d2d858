//! CRC-framed messages and the streaming message-set format.
//!
//! Message layout:
//!
//! ```text
//! +-----------+----------+---------+-------+------------+-----------+-------------+
//! | offset    | size     | crc32   | magic | attributes | key       | value       |
//! | 8 bytes   | 4 bytes  | 4 bytes | 1 byte| 1 byte     | bytes(32) | bytes(32)   |
//! +-----------+----------+---------+-------+------------+-----------+-------------+
//!                        |<-------------------- size bytes ---------------------->|
//! ```
//!
//! The CRC covers everything after it. A message set is messages laid back
//! to back with no count; its extent comes from an enclosing size field.

use crate::dispatch::Dispatch;
use crate::error::{KafkaCode, ProtocolError};
use crate::primitive::{get_bytes, get_i32, get_i64, get_i8, get_u32, put_bytes, split_region};
use crate::value::{Value, INT16, INT32, INT64};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Offset written on encode; the broker assigns real offsets.
pub const OFFSET_PLACEHOLDER: i64 = -1;

pub const DEFAULT_MAGIC_BYTE: i8 = 0;

pub const DEFAULT_ATTRIBUTES: i8 = 0;

/// Offset and size fields preceding every message.
pub const LOG_OVERHEAD: usize = 12;

/// Smallest possible encoded message: both key and value absent.
pub const MIN_MESSAGE_SIZE: usize = LOG_OVERHEAD + 4 + 1 + 1 + 4 + 4;

/// Struct name under which fetch partition fields are translated.
pub const FETCH_PARTITION_STRUCT: &str = "fetch_response.partition";

/// A single key/value record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Offset assigned by the broker; [`OFFSET_PLACEHOLDER`] when built locally.
    pub offset: i64,
    pub magic_byte: i8,
    pub attributes: i8,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            offset: OFFSET_PLACEHOLDER,
            magic_byte: DEFAULT_MAGIC_BYTE,
            attributes: DEFAULT_ATTRIBUTES,
            key: None,
            value: None,
        }
    }
}

impl Message {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_attributes(mut self, attributes: i8) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Messages produced to one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionMessageSet {
    pub partition: i32,
    pub messages: Vec<Message>,
}

/// Contents of a fetched message-set region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSet {
    /// Every fully delivered message, in order. Trailing partial bytes are dropped.
    Complete(Vec<Message>),
    /// The region was non-empty but too short for even one message.
    Incomplete,
}

impl MessageSet {
    pub fn messages(&self) -> &[Message] {
        match self {
            MessageSet::Complete(messages) => messages,
            MessageSet::Incomplete => &[],
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, MessageSet::Incomplete)
    }
}

/// One partition of a fetch response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResponsePartition {
    pub partition: i32,
    pub error_code: KafkaCode,
    pub high_watermark_offset: i64,
    /// Region size declared by the broker.
    pub message_set_size: i32,
    pub messages: MessageSet,
}

fn checked_i32(len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| ProtocolError::ValueTooLong {
        len,
        max: i32::MAX as usize,
    })
}

/// Encodes a message with the offset placeholder and a fresh CRC.
pub fn encode_message(message: &Message, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let mut body = BytesMut::new();
    body.put_i8(message.magic_byte);
    body.put_i8(message.attributes);
    put_bytes(&mut body, message.key.as_deref())?;
    put_bytes(&mut body, message.value.as_deref())?;

    let crc = crc32fast::hash(&body);
    let size = checked_i32(4 + body.len())?;

    buf.reserve(LOG_OVERHEAD + 4 + body.len());
    buf.put_i64(OFFSET_PLACEHOLDER);
    buf.put_i32(size);
    buf.put_u32(crc);
    buf.put_slice(&body);
    Ok(())
}

fn encode_messages(messages: &[Message]) -> Result<BytesMut, ProtocolError> {
    let mut out = BytesMut::new();
    for message in messages {
        encode_message(message, &mut out)?;
    }
    Ok(out)
}

/// Encodes partition, total size and the messages back to back.
pub fn encode_message_set(
    set: &PartitionMessageSet,
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let messages = encode_messages(&set.messages)?;
    buf.put_i32(set.partition);
    buf.put_i32(checked_i32(messages.len())?);
    buf.put_slice(&messages);
    Ok(())
}

/// Decodes one message, advancing `buf` only on success.
///
/// The stored CRC is compared against the record only when `verify_crc` is set.
pub fn decode_message(buf: &mut Bytes, verify_crc: bool) -> Result<Message, ProtocolError> {
    let mut cursor = buf.clone();
    let offset = get_i64(&mut cursor)?;
    let size = get_i32(&mut cursor)?;
    if size < 0 {
        return Err(ProtocolError::InvalidLength(size.into()));
    }
    let mut record = split_region(&mut cursor, size as usize)?;

    let crc = get_u32(&mut record)?;
    if verify_crc {
        let actual = crc32fast::hash(&record);
        if actual != crc {
            return Err(ProtocolError::CrcMismatch {
                expected: crc,
                actual,
            });
        }
    }

    let magic_byte = get_i8(&mut record)?;
    let attributes = get_i8(&mut record)?;
    let key = get_bytes(&mut record)?;
    let value = get_bytes(&mut record)?;

    *buf = cursor;
    Ok(Message {
        offset,
        magic_byte,
        attributes,
        key,
        value,
    })
}

/// Decodes a whole message-set region.
///
/// Brokers cut message sets at arbitrary byte boundaries, so running out of
/// bytes is never an error here: a short tail is dropped once at least one
/// message decoded, and a region that cannot yield even one message is
/// reported as [`MessageSet::Incomplete`].
pub fn decode_message_set(
    mut region: Bytes,
    verify_crc: bool,
) -> Result<MessageSet, ProtocolError> {
    let mut messages = Vec::new();

    while !region.is_empty() {
        let attempt = if region.len() < MIN_MESSAGE_SIZE {
            Err(ProtocolError::Truncated {
                needed: MIN_MESSAGE_SIZE,
                remaining: region.len(),
            })
        } else {
            decode_message(&mut region, verify_crc)
        };

        match attempt {
            Ok(message) => messages.push(message),
            Err(e) if messages.is_empty() => {
                if e.is_truncation() {
                    tracing::debug!(
                        "Message set of {} bytes holds no complete message",
                        region.len()
                    );
                    return Ok(MessageSet::Incomplete);
                }
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(
                    "Dropping {} trailing message set bytes after {} messages: {}",
                    region.len(),
                    messages.len(),
                    e
                );
                break;
            }
        }
    }

    Ok(MessageSet::Complete(messages))
}

fn translated_mismatch(expected: &'static str, value: &Value) -> ProtocolError {
    ProtocolError::TypeMismatch {
        expected,
        actual: value.kind(),
    }
}

/// Decodes a fetch response partition, isolating its message-set region.
///
/// Each header field passes through the translator under
/// [`FETCH_PARTITION_STRUCT`]. On success `buf` is left at the first byte
/// after the region.
pub fn decode_fetch_partition(
    buf: &mut Bytes,
    dispatch: &Dispatch<'_>,
) -> Result<FetchResponsePartition, ProtocolError> {
    let mut field =
        |name, ty| dispatch.decode_field(FETCH_PARTITION_STRUCT, name, ty, &mut *buf);

    let partition = match field("partition", INT32)? {
        Value::Int32(v) => v,
        other => return Err(translated_mismatch("int32", &other)),
    };
    let error_code = match field("error_code", INT16)? {
        Value::ErrorCode(code) => code,
        Value::Int16(raw) => KafkaCode::from_code(raw),
        other => return Err(translated_mismatch("error_code", &other)),
    };
    let high_watermark_offset = match field("high_watermark_offset", INT64)? {
        Value::Int64(v) => v,
        other => return Err(translated_mismatch("int64", &other)),
    };
    let message_set_size = match field("message_set_size", INT32)? {
        Value::Int32(v) => v,
        other => return Err(translated_mismatch("int32", &other)),
    };
    if message_set_size < 0 {
        return Err(ProtocolError::InvalidLength(message_set_size.into()));
    }

    let region = split_region(buf, message_set_size as usize)?;
    let messages = decode_message_set(region, dispatch.verify_crc())?;

    Ok(FetchResponsePartition {
        partition,
        error_code,
        high_watermark_offset,
        message_set_size,
        messages,
    })
}

/// Encodes a fetch response partition, as a broker would.
///
/// The region size is recomputed from the messages; an incomplete set
/// encodes as an empty region.
pub fn encode_fetch_partition(
    partition: &FetchResponsePartition,
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let messages = encode_messages(partition.messages.messages())?;
    buf.put_i32(partition.partition);
    buf.put_i16(partition.error_code.code());
    buf.put_i64(partition.high_watermark_offset);
    buf.put_i32(checked_i32(messages.len())?);
    buf.put_slice(&messages);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::translate::ErrorCodeTranslator;

    fn encoded(messages: &[Message]) -> Bytes {
        encode_messages(messages).unwrap().freeze()
    }

    #[test]
    fn test_message_layout() {
        let message = Message::new(&b"v"[..]).with_key(&b"k"[..]);
        let mut buf = BytesMut::new();
        encode_message(&message, &mut buf).unwrap();

        let body: &[u8] = &[0, 0, 0, 0, 0, 1, b'k', 0, 0, 0, 1, b'v'];
        assert_eq!(&buf[0..8], &(-1i64).to_be_bytes());
        assert_eq!(&buf[8..12], &((4 + body.len()) as i32).to_be_bytes());
        assert_eq!(&buf[12..16], &crc32fast::hash(body).to_be_bytes());
        assert_eq!(&buf[16..], body);
    }

    #[test]
    fn test_minimal_message_size() {
        let mut buf = BytesMut::new();
        encode_message(&Message::default(), &mut buf).unwrap();
        assert_eq!(buf.len(), MIN_MESSAGE_SIZE);
    }

    #[test]
    fn test_message_roundtrip() {
        let message = Message::new(&b"payload"[..]).with_key(&b"key"[..]);
        let mut region = encoded(&[message]);
        let decoded = decode_message(&mut region, true).unwrap();

        assert_eq!(decoded.key.as_deref(), Some(&b"key"[..]));
        assert_eq!(decoded.value.as_deref(), Some(&b"payload"[..]));
        assert_eq!(decoded.offset, OFFSET_PLACEHOLDER);
        assert!(region.is_empty());
    }

    #[test]
    fn test_message_set_layout() {
        let set = PartitionMessageSet {
            partition: 3,
            messages: vec![Message::new(&b"a"[..]), Message::new(&b"b"[..])],
        };
        let mut buf = BytesMut::new();
        encode_message_set(&set, &mut buf).unwrap();

        let messages = encoded(&set.messages);
        assert_eq!(&buf[0..4], &3i32.to_be_bytes());
        assert_eq!(&buf[4..8], &(messages.len() as i32).to_be_bytes());
        assert_eq!(&buf[8..], &messages[..]);
    }

    #[test]
    fn test_message_set_complete() {
        let region = encoded(&[Message::new(&b"one"[..]), Message::new(&b"two"[..])]);
        let set = decode_message_set(region, false).unwrap();
        let values: Vec<_> = set
            .messages()
            .iter()
            .map(|m| m.value.clone().unwrap())
            .collect();
        assert_eq!(values, vec![Bytes::from("one"), Bytes::from("two")]);
    }

    #[test]
    fn test_message_set_drops_truncated_tail() {
        let mut region = BytesMut::from(
            &encoded(&[Message::new(&b"one"[..]), Message::new(&b"two"[..])])[..],
        );
        region.extend_from_slice(&[1, 2, 3]);

        let set = decode_message_set(region.freeze(), false).unwrap();
        assert!(matches!(&set, MessageSet::Complete(m) if m.len() == 2));
    }

    #[test]
    fn test_message_set_drops_partial_second_message() {
        let full = encoded(&[Message::new(&b"one"[..]), Message::new(&b"two"[..])]);
        let first_len = encoded(&[Message::new(&b"one"[..])]).len();
        let region = full.slice(..first_len + 20);

        let set = decode_message_set(region, false).unwrap();
        assert_eq!(set.messages().len(), 1);
    }

    #[test]
    fn test_message_set_all_truncated() {
        let region = encoded(&[Message::new(&b"a long enough value"[..])]);
        let short = region.slice(..region.len() - 1);

        let set = decode_message_set(short, false).unwrap();
        assert_eq!(set, MessageSet::Incomplete);
    }

    #[test]
    fn test_message_set_below_minimum_is_incomplete() {
        let region = Bytes::from_static(&[0xFF; 10]);
        assert_eq!(
            decode_message_set(region, false).unwrap(),
            MessageSet::Incomplete
        );
    }

    #[test]
    fn test_empty_message_set_is_complete() {
        assert_eq!(
            decode_message_set(Bytes::new(), false).unwrap(),
            MessageSet::Complete(vec![])
        );
    }

    #[test]
    fn test_first_message_negative_size_is_error() {
        let mut region = BytesMut::new();
        region.put_i64(0);
        region.put_i32(-5);
        region.extend_from_slice(&[0u8; 20]);

        let err = decode_message_set(region.freeze(), false).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(-5)));
    }

    #[test]
    fn test_crc_verification() {
        let mut region = BytesMut::from(&encoded(&[Message::new(&b"value"[..])])[..]);
        let last = region.len() - 1;
        region[last] ^= 0xFF;
        let region = region.freeze();

        // Trusted by default.
        assert!(decode_message(&mut region.clone(), false).is_ok());

        let err = decode_message(&mut region.clone(), true).unwrap_err();
        assert!(matches!(err, ProtocolError::CrcMismatch { .. }));
    }

    #[test]
    fn test_fetch_partition_roundtrip() {
        let partition = FetchResponsePartition {
            partition: 2,
            error_code: KafkaCode::NoError,
            high_watermark_offset: 100,
            message_set_size: 0,
            messages: MessageSet::Complete(vec![Message::new(&b"x"[..])]),
        };
        let mut buf = BytesMut::new();
        encode_fetch_partition(&partition, &mut buf).unwrap();
        buf.put_u8(0xAB);

        let registry = SchemaRegistry::new();
        let translator = ErrorCodeTranslator;
        let dispatch = Dispatch::new(&registry, &translator, false);

        let mut input = buf.freeze();
        let decoded = decode_fetch_partition(&mut input, &dispatch).unwrap();
        assert_eq!(decoded.partition, 2);
        assert_eq!(decoded.high_watermark_offset, 100);
        assert_eq!(decoded.message_set_size as usize, MIN_MESSAGE_SIZE + 1);
        assert_eq!(decoded.messages.messages().len(), 1);
        assert_eq!(&input[..], &[0xAB]);
    }

    #[test]
    fn test_fetch_partition_translates_error_code() {
        let mut buf = BytesMut::new();
        buf.put_i32(0);
        buf.put_i16(3);
        buf.put_i64(-1);
        buf.put_i32(0);

        let registry = SchemaRegistry::new();
        let translator = ErrorCodeTranslator;
        let dispatch = Dispatch::new(&registry, &translator, false);

        let decoded = decode_fetch_partition(&mut buf.freeze(), &dispatch).unwrap();
        assert_eq!(decoded.error_code, KafkaCode::UnknownTopicOrPartition);
        assert_eq!(decoded.messages, MessageSet::Complete(vec![]));
    }

    #[test]
    fn test_fetch_partition_fields_pass_through_translator() {
        let mut buf = BytesMut::new();
        buf.put_i32(4);
        buf.put_i16(0);
        buf.put_i64(10);
        buf.put_i32(0);

        let seen = std::sync::Mutex::new(Vec::new());
        let translator = |struct_name: &str, field: &str, value: Value| {
            seen.lock().unwrap().push((struct_name.to_string(), field.to_string()));
            match (field, value) {
                ("high_watermark_offset", Value::Int64(v)) => Value::Int64(v * 2),
                (_, value) => value,
            }
        };
        let registry = SchemaRegistry::new();
        let dispatch = Dispatch::new(&registry, &translator, false);

        let decoded = decode_fetch_partition(&mut buf.freeze(), &dispatch).unwrap();
        assert_eq!(decoded.partition, 4);
        assert_eq!(decoded.high_watermark_offset, 20);

        let fields: Vec<_> = seen
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|(s, f)| {
                assert_eq!(s, FETCH_PARTITION_STRUCT);
                f
            })
            .collect();
        assert_eq!(
            fields,
            ["partition", "error_code", "high_watermark_offset", "message_set_size"]
        );
    }

    #[test]
    fn test_fetch_partition_rejects_retyped_field() {
        let mut buf = BytesMut::new();
        buf.put_i32(0);
        buf.put_i16(0);
        buf.put_i64(0);
        buf.put_i32(0);

        let translator = |_: &str, field: &str, value: Value| match field {
            "partition" => Value::string("zero"),
            _ => value,
        };
        let registry = SchemaRegistry::new();
        let dispatch = Dispatch::new(&registry, &translator, false);

        let err = decode_fetch_partition(&mut buf.freeze(), &dispatch).unwrap_err();
        assert!(matches!(err, ProtocolError::TypeMismatch { expected: "int32", .. }));
    }

    #[test]
    fn test_fetch_partition_region_overrun() {
        let mut buf = BytesMut::new();
        buf.put_i32(0);
        buf.put_i16(0);
        buf.put_i64(10);
        buf.put_i32(100);
        buf.extend_from_slice(&[0u8; 10]);

        let registry = SchemaRegistry::new();
        let translator = ErrorCodeTranslator;
        let dispatch = Dispatch::new(&registry, &translator, false);

        let err = decode_fetch_partition(&mut buf.freeze(), &dispatch).unwrap_err();
        assert!(err.is_truncation());
    }
}
