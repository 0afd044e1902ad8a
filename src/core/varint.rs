//! VarInt codec used for frame length prefixes.
//!
//! Each byte carries 7 value bits, least significant group first, with the
//! high bit set when another byte follows.

use crate::error::{constants, ReactorError, Result};
use bytes::BufMut;

/// Maximum encoded length of a 32-bit VarInt
pub const MAX_VARINT_LEN: usize = 5;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Decode a VarInt from the start of `buf`.
///
/// Returns `Ok(None)` when `buf` ends before the VarInt does, so callers can
/// tell an incomplete prefix apart from a malformed one.
///
/// # Errors
/// `VarIntTooLong` if a fifth byte still carries the continuation bit.
pub fn decode(buf: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & SEGMENT_BITS) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(ReactorError::VarIntTooLong);
    }
    Ok(None)
}

/// Decode a non-negative length prefix, see [`decode`].
pub fn decode_len(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    match decode(buf)? {
        Some((raw, read)) => {
            let value = raw as i32;
            if value < 0 {
                return Err(ReactorError::InvalidFrame(constants::ERR_NEGATIVE_LENGTH));
            }
            Ok(Some((value as usize, read)))
        }
        None => Ok(None),
    }
}

/// Append the VarInt encoding of `value` to `dst`
pub fn encode<B: BufMut>(mut value: u32, dst: &mut B) {
    loop {
        if value & !u32::from(SEGMENT_BITS) == 0 {
            dst.put_u8(value as u8);
            return;
        }
        dst.put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        value >>= 7;
    }
}

/// Number of bytes [`encode`] writes for `value`
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}
