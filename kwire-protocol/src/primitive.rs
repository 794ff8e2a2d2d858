//! Fixed-width integers, length-prefixed strings and byte blobs.
//!
//! All integers are big-endian two's complement. Strings carry an int16
//! length, byte blobs an int32 length; `-1` marks an absent value.
//!
//! Readers take `&mut Bytes` and only advance it once the whole field is
//! known to be present, so a failed read leaves the cursor where it was.

use crate::error::ProtocolError;
use crate::value::{Primitive, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length value marking an absent string or byte blob.
pub const NULL_LENGTH: i32 = -1;

fn ensure_remaining(buf: &Bytes, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_i8(buf: &mut Bytes) -> Result<i8, ProtocolError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn get_i16(buf: &mut Bytes) -> Result<i16, ProtocolError> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn get_i32(buf: &mut Bytes) -> Result<i32, ProtocolError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn get_i64(buf: &mut Bytes) -> Result<i64, ProtocolError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn get_u32(buf: &mut Bytes) -> Result<u32, ProtocolError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32())
}

/// Splits off exactly `len` bytes as a view for further decoding.
///
/// Only used to isolate regions (frame bodies, message sets); decoded values
/// are always copied out of them.
pub(crate) fn split_region(buf: &mut Bytes, len: usize) -> Result<Bytes, ProtocolError> {
    ensure_remaining(buf, len)?;
    Ok(buf.split_to(len))
}

/// Reads `len` bytes after a prefix of `prefix` bytes, copying them out.
///
/// The copy matters: the receive buffer belongs to the transport and may be
/// reused as soon as decoding returns.
fn take_copied(buf: &mut Bytes, prefix: usize, len: usize) -> Result<Bytes, ProtocolError> {
    ensure_remaining(buf, prefix + len)?;
    buf.advance(prefix);
    let out = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(out)
}

/// Reads an int16-prefixed string. Both `-1` and `0` lengths decode to `None`.
pub fn get_string(buf: &mut Bytes) -> Result<Option<String>, ProtocolError> {
    ensure_remaining(buf, 2)?;
    let len = i16::from_be_bytes([buf[0], buf[1]]);
    if len < 0 {
        if i32::from(len) != NULL_LENGTH {
            return Err(ProtocolError::InvalidLength(len.into()));
        }
        buf.advance(2);
        return Ok(None);
    }
    let raw = take_copied(buf, 2, len as usize)?;
    if raw.is_empty() {
        return Ok(None);
    }
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

/// Reads an int32-prefixed byte blob. Both `-1` and `0` lengths decode to `None`.
pub fn get_bytes(buf: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    ensure_remaining(buf, 4)?;
    let len = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if len < 0 {
        if len != NULL_LENGTH {
            return Err(ProtocolError::InvalidLength(len.into()));
        }
        buf.advance(4);
        return Ok(None);
    }
    let raw = take_copied(buf, 4, len as usize)?;
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(raw))
}

/// Writes an int16-prefixed string. Absent and empty strings both emit `-1`.
pub fn put_string(buf: &mut BytesMut, value: Option<&str>) -> Result<(), ProtocolError> {
    match value {
        Some(s) if !s.is_empty() => {
            if s.len() > i16::MAX as usize {
                return Err(ProtocolError::ValueTooLong {
                    len: s.len(),
                    max: i16::MAX as usize,
                });
            }
            buf.put_i16(s.len() as i16);
            buf.put_slice(s.as_bytes());
        }
        _ => buf.put_i16(NULL_LENGTH as i16),
    }
    Ok(())
}

/// Writes an int32-prefixed byte blob. Absent and empty blobs both emit `-1`.
pub fn put_bytes(buf: &mut BytesMut, value: Option<&[u8]>) -> Result<(), ProtocolError> {
    match value {
        Some(b) if !b.is_empty() => {
            if b.len() > i32::MAX as usize {
                return Err(ProtocolError::ValueTooLong {
                    len: b.len(),
                    max: i32::MAX as usize,
                });
            }
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
        }
        _ => buf.put_i32(NULL_LENGTH),
    }
    Ok(())
}

fn mismatch(expected: Primitive, actual: &Value) -> ProtocolError {
    ProtocolError::TypeMismatch {
        expected: expected.name(),
        actual: actual.kind(),
    }
}

/// Encodes a scalar value as the given primitive.
pub fn encode_primitive(
    primitive: Primitive,
    value: &Value,
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    match (primitive, value) {
        (Primitive::Int8, Value::Int8(v)) => buf.put_i8(*v),
        (Primitive::Int16, Value::Int16(v)) => buf.put_i16(*v),
        (Primitive::Int16, Value::ErrorCode(code)) => buf.put_i16(code.code()),
        (Primitive::Int32, Value::Int32(v)) => buf.put_i32(*v),
        (Primitive::Int64, Value::Int64(v)) => buf.put_i64(*v),
        (Primitive::String, Value::String(s)) => put_string(buf, s.as_deref())?,
        (Primitive::Bytes, Value::Bytes(b)) => put_bytes(buf, b.as_deref())?,
        (expected, actual) => return Err(mismatch(expected, actual)),
    }
    Ok(())
}

/// Decodes one value of the given primitive.
pub fn decode_primitive(primitive: Primitive, buf: &mut Bytes) -> Result<Value, ProtocolError> {
    Ok(match primitive {
        Primitive::Int8 => Value::Int8(get_i8(buf)?),
        Primitive::Int16 => Value::Int16(get_i16(buf)?),
        Primitive::Int32 => Value::Int32(get_i32(buf)?),
        Primitive::Int64 => Value::Int64(get_i64(buf)?),
        Primitive::String => Value::String(get_string(buf)?),
        Primitive::Bytes => Value::Bytes(get_bytes(buf)?),
    })
}

/// Encodes an int32-counted array whose elements are all `primitive`.
///
/// Every element is checked before anything is written, so a mismatch
/// leaves `buf` untouched.
pub fn encode_primitive_array(
    primitive: Primitive,
    items: &[Value],
    buf: &mut BytesMut,
) -> Result<(), ProtocolError> {
    if let Some(bad) = items.iter().find(|v| v.primitive() != Some(primitive)) {
        return Err(mismatch(primitive, bad));
    }
    put_count(buf, items.len())?;
    for item in items {
        encode_primitive(primitive, item, buf)?;
    }
    Ok(())
}

/// Writes an int32 element count.
pub fn put_count(buf: &mut BytesMut, count: usize) -> Result<(), ProtocolError> {
    if count > i32::MAX as usize {
        return Err(ProtocolError::ValueTooLong {
            len: count,
            max: i32::MAX as usize,
        });
    }
    buf.put_i32(count as i32);
    Ok(())
}

/// Reads an int32 element count, rejecting negative values.
pub fn get_count(buf: &mut Bytes) -> Result<usize, ProtocolError> {
    let count = get_i32(buf)?;
    if count < 0 {
        return Err(ProtocolError::InvalidLength(count.into()));
    }
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(primitive: Primitive, value: Value) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_primitive(primitive, &value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_int32_layout() {
        assert_eq!(&encode(Primitive::Int32, Value::Int32(258))[..], &[0, 0, 1, 2]);
    }

    #[test]
    fn test_negative_int16_layout() {
        assert_eq!(&encode(Primitive::Int16, Value::Int16(-2))[..], &[0xFF, 0xFE]);
    }

    #[test]
    fn test_string_layout() {
        assert_eq!(
            &encode(Primitive::String, Value::string("abc"))[..],
            &[0, 3, b'a', b'b', b'c']
        );
    }

    #[test]
    fn test_absent_and_empty_string_encode_as_sentinel() {
        let absent = encode(Primitive::String, Value::String(None));
        let empty = encode(Primitive::String, Value::string(""));
        assert_eq!(&absent[..], &[0xFF, 0xFF]);
        assert_eq!(absent, empty);

        let mut buf = absent.freeze();
        assert_eq!(get_string(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_length_string_decodes_absent() {
        let mut buf = Bytes::from_static(&[0, 0, 9]);
        assert_eq!(get_string(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], &[9]);
    }

    #[test]
    fn test_absent_bytes_sentinel() {
        let encoded = encode(Primitive::Bytes, Value::Bytes(None));
        assert_eq!(&encoded[..], &[0xFF, 0xFF, 0xFF, 0xFF]);

        let mut buf = encoded.freeze();
        assert_eq!(get_bytes(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bytes_roundtrip_leaves_rest() {
        let mut buf = BytesMut::new();
        put_bytes(&mut buf, Some(b"hello")).unwrap();
        buf.put_u8(42);

        let mut input = buf.freeze();
        let value = get_bytes(&mut input).unwrap().unwrap();
        assert_eq!(&value[..], b"hello");
        assert_eq!(&input[..], &[42]);
    }

    #[test]
    fn test_decoded_bytes_do_not_alias_input() {
        let input = Bytes::from(vec![0, 0, 0, 3, 1, 2, 3]);
        let mut cursor = input.clone();
        let value = get_bytes(&mut cursor).unwrap().unwrap();

        let input_range = input.as_ptr() as usize..input.as_ptr() as usize + input.len();
        assert!(!input_range.contains(&(value.as_ptr() as usize)));
    }

    #[test]
    fn test_truncated_string_does_not_advance() {
        let mut buf = Bytes::from_static(&[0, 5, b'a', b'b']);
        let err = get_string(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 7,
                remaining: 4
            }
        ));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_invalid_negative_length() {
        let mut buf = Bytes::from_static(&[0xFF, 0xFE]);
        assert!(matches!(
            get_string(&mut buf),
            Err(ProtocolError::InvalidLength(-2))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Bytes::from_static(&[0, 2, 0xC3, 0x28]);
        assert!(matches!(get_string(&mut buf), Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(i16::MAX as usize + 1);
        let mut buf = BytesMut::new();
        let err = put_string(&mut buf, Some(&long)).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueTooLong { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_primitive_array() {
        let mut buf = BytesMut::new();
        encode_primitive_array(
            Primitive::Int32,
            &[Value::Int32(1), Value::Int32(2)],
            &mut buf,
        )
        .unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn test_primitive_array_rejects_mismatched_element() {
        let mut buf = BytesMut::new();
        let err = encode_primitive_array(
            Primitive::Int32,
            &[Value::Int32(1), Value::Int64(2)],
            &mut buf,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TypeMismatch {
                expected: "int32",
                actual: "int64"
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_primitive_type_mismatch() {
        let mut buf = BytesMut::new();
        let err = encode_primitive(Primitive::String, &Value::Int8(1), &mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::TypeMismatch { .. }));
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut buf = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFE]);
        assert!(matches!(
            get_count(&mut buf),
            Err(ProtocolError::InvalidLength(-2))
        ));
    }
}
