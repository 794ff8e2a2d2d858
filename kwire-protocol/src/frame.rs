//! Size-prefixed framing and correlation id packing.
//!
//! Frame layout:
//!
//! ```text
//! +---------+--------------------------------+
//! | size    | body                           |
//! | 4 bytes | size bytes                     |
//! +---------+--------------------------------+
//! ```
//!
//! Request bodies start with api key, api version, combined correlation id
//! and client id. Response bodies start with the combined correlation id
//! only, so the api key is packed into its top bits to tell the decoder
//! which response layout follows.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

/// Low bits of the combined id that carry the caller's correlation id.
pub const RESERVED_BITS: u32 = 24;

/// Largest correlation id that fits below the api key.
pub const MAX_CORRELATION_ID: i32 = (1 << RESERVED_BITS) - 1;

/// Size of the length prefix.
pub const SIZE_PREFIX_LEN: usize = 4;

/// Packs `api_key` into the top bits of `correlation_id`.
pub fn pack_correlation_id(api_key: i16, correlation_id: i32) -> Result<i32, ProtocolError> {
    if !(0..=MAX_CORRELATION_ID).contains(&correlation_id) {
        return Err(ProtocolError::CorrelationIdOutOfRange {
            id: correlation_id,
            max: MAX_CORRELATION_ID,
        });
    }
    Ok((i32::from(api_key) << RESERVED_BITS) | correlation_id)
}

/// Splits a combined id into `(api_key, correlation_id)`.
pub fn unpack_correlation_id(combined: i32) -> (i16, i32) {
    let api_key = (combined >> RESERVED_BITS) as i16;
    (api_key, combined & MAX_CORRELATION_ID)
}

/// Result of looking for one frame at the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSplit {
    /// Not enough bytes yet; holds the input unchanged.
    Incomplete(Bytes),
    /// The frame body and whatever followed it.
    Complete { body: Bytes, rest: Bytes },
}

/// Splits the first frame off `input` without copying.
///
/// The size prefix is peeked, so an incomplete frame hands back exactly the
/// bytes it was given.
pub fn split_frame(input: Bytes, max_frame_size: usize) -> Result<FrameSplit, ProtocolError> {
    if input.len() < SIZE_PREFIX_LEN {
        return Ok(FrameSplit::Incomplete(input));
    }

    let size = i32::from_be_bytes([input[0], input[1], input[2], input[3]]);
    if size < 0 {
        return Err(ProtocolError::InvalidLength(size.into()));
    }
    let size = size as usize;
    if size > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: max_frame_size,
        });
    }
    if input.len() - SIZE_PREFIX_LEN < size {
        tracing::debug!(
            "Incomplete frame: {} of {} body bytes available",
            input.len() - SIZE_PREFIX_LEN,
            size
        );
        return Ok(FrameSplit::Incomplete(input));
    }

    let mut rest = input;
    let frame = rest.split_to(SIZE_PREFIX_LEN + size);
    Ok(FrameSplit::Complete {
        body: frame.slice(SIZE_PREFIX_LEN..),
        rest,
    })
}

/// Writes one frame: a placeholder size, the body from `write_body`, then the
/// real size patched over the placeholder.
pub fn write_frame<F>(
    buf: &mut BytesMut,
    max_frame_size: usize,
    write_body: F,
) -> Result<(), ProtocolError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), ProtocolError>,
{
    let start = buf.len();
    buf.put_i32(0);
    if let Err(e) = write_body(buf) {
        buf.truncate(start);
        return Err(e);
    }

    let size = buf.len() - start - SIZE_PREFIX_LEN;
    let max = max_frame_size.min(i32::MAX as usize);
    if size > max {
        buf.truncate(start);
        return Err(ProtocolError::FrameTooLarge { size, max });
    }
    buf[start..start + SIZE_PREFIX_LEN].copy_from_slice(&(size as i32).to_be_bytes());
    Ok(())
}
