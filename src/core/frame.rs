//! Frame encoding and stream reassembly.
//!
//! [`reassemble`] is the heart of the read path: it walks a buffer holding any
//! number of complete frames followed by at most one incomplete frame, hands
//! every complete frame to a sink in arrival order and reports how many bytes
//! it consumed. Whatever it did not consume is the caller's pending remainder.

use crate::core::varint;
use crate::error::{constants, ReactorError, Result};
use crate::utils::compression::{maybe_compress, Inflater};
use bytes::{BufMut, BytesMut};

/// Outcome of one reassembly pass over a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reassembly {
    /// Number of frames delivered to the sink
    pub frames: usize,
    /// Number of frames that were inflated before delivery
    pub inflated: usize,
    /// Bytes consumed from the front of the input
    pub consumed: usize,
}

/// Per-pass framing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Maximum declared body length and inflated payload length
    pub max_packet_size: usize,
    /// Whether bodies carry a data-length prefix (compression enabled)
    pub compressed: bool,
}

/// Decode every complete frame in `input`.
///
/// `content` and `inflater` are scratch space owned by the calling worker;
/// `content` is left empty when this returns. Stops at the first incomplete
/// frame without error. Each frame reaches `deliver` before the next one is
/// decoded, and nothing is delivered for a frame that is not fully present.
///
/// # Errors
/// - `OversizedPacket` when a declared body or data length exceeds the limit,
///   raised as soon as the length prefix is readable
/// - `VarIntTooLong` / `InvalidFrame` for malformed prefixes
/// - decompression errors from [`Inflater::inflate_into`]
/// - anything `deliver` returns
pub fn reassemble<F>(
    input: &[u8],
    limits: FrameLimits,
    inflater: &mut Inflater,
    content: &mut BytesMut,
    mut deliver: F,
) -> Result<Reassembly>
where
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut outcome = Reassembly {
        frames: 0,
        inflated: 0,
        consumed: 0,
    };

    while outcome.consumed < input.len() {
        let remaining = &input[outcome.consumed..];
        let Some((body_len, prefix_len)) = varint::decode_len(remaining)? else {
            break;
        };
        if body_len > limits.max_packet_size {
            return Err(ReactorError::OversizedPacket(body_len));
        }
        let frame_end = prefix_len + body_len;
        if frame_end > remaining.len() {
            break;
        }
        let body = &remaining[prefix_len..frame_end];

        if limits.compressed {
            let (data_len, data_prefix) = varint::decode_len(body)?.ok_or(
                ReactorError::InvalidFrame(constants::ERR_MISSING_DATA_LENGTH),
            )?;
            let data = &body[data_prefix..];
            if data_len == 0 {
                deliver(data)?;
            } else {
                if data_len > limits.max_packet_size {
                    return Err(ReactorError::OversizedPacket(data_len));
                }
                inflater.inflate_into(data, content, data_len)?;
                let delivered = deliver(&content[..]);
                content.clear();
                delivered?;
                outcome.inflated += 1;
            }
        } else {
            deliver(body)?;
        }

        outcome.frames += 1;
        outcome.consumed += frame_end;
    }

    Ok(outcome)
}

/// Append one frame carrying `payload` to `dst`.
///
/// With `compression_threshold` unset the frame is plain. With a threshold
/// the body carries a data-length prefix and the payload is zlib-compressed
/// when it is at least `threshold` bytes long.
///
/// # Errors
/// `OversizedPacket` when the encoded body would not fit a length prefix,
/// or a compression failure.
pub fn encode_frame(
    payload: &[u8],
    compression_threshold: Option<usize>,
    dst: &mut BytesMut,
) -> Result<()> {
    match compression_threshold {
        None => {
            let body_len = prefix_value(payload.len())?;
            dst.reserve(varint::encoded_len(body_len) + payload.len());
            varint::encode(body_len, dst);
            dst.put_slice(payload);
        }
        Some(threshold) => {
            let (data, compressed) = maybe_compress(payload, threshold)?;
            let data_len = if compressed {
                prefix_value(payload.len())?
            } else {
                0
            };
            let body_len = prefix_value(varint::encoded_len(data_len) + data.len())?;
            dst.reserve(varint::encoded_len(body_len) + body_len as usize);
            varint::encode(body_len, dst);
            varint::encode(data_len, dst);
            dst.put_slice(&data);
        }
    }
    Ok(())
}

fn prefix_value(len: usize) -> Result<u32> {
    i32::try_from(len)
        .map(|v| v as u32)
        .map_err(|_| ReactorError::OversizedPacket(len))
}
