use crate::error::{ReactorError, Result};
use bytes::BytesMut;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use tracing::debug;

/// Streaming zlib decompressor reused across frames.
///
/// One instance lives in each worker's scratch context. The internal state is
/// reset after every frame, whether inflation succeeded or not, so no window
/// data from one frame can influence the next.
pub struct Inflater {
    inner: Decompress,
}

impl Inflater {
    /// Create a decompressor expecting zlib-wrapped input
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(true),
        }
    }

    /// Inflate `input` into `out`, which must end up holding exactly
    /// `expected_len` bytes.
    ///
    /// `out` is cleared first. On success it holds the inflated payload.
    ///
    /// # Errors
    /// - `DecompressionFailure` for corrupt or truncated streams
    /// - `DecompressedSizeMismatch` when the stream inflates to a different size
    pub fn inflate_into(
        &mut self,
        input: &[u8],
        out: &mut BytesMut,
        expected_len: usize,
    ) -> Result<()> {
        out.clear();
        // One byte of slack lets an overlong stream show up as a size mismatch
        out.resize(expected_len + 1, 0);

        let status = self
            .inner
            .decompress(input, &mut out[..], FlushDecompress::Finish);
        let produced = self.inner.total_out() as usize;
        self.inner.reset(true);

        let result = match status {
            Ok(Status::StreamEnd) if produced == expected_len => Ok(()),
            Ok(Status::StreamEnd) => Err(ReactorError::DecompressedSizeMismatch {
                expected: expected_len,
                actual: produced,
            }),
            Ok(_) if produced > expected_len => Err(ReactorError::DecompressedSizeMismatch {
                expected: expected_len,
                actual: produced,
            }),
            Ok(status) => {
                debug!(?status, produced, expected_len, "Truncated compressed stream");
                Err(ReactorError::DecompressionFailure)
            }
            Err(e) => {
                debug!(error = %e, "Corrupt compressed stream");
                Err(ReactorError::DecompressionFailure)
            }
        };

        out.truncate(produced.min(expected_len));
        if result.is_err() {
            out.clear();
        }
        result
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// Compresses data into a zlib stream
///
/// # Errors
/// Returns `ReactorError::CompressionFailure` if compression fails
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 16),
        Compression::default(),
    );
    encoder
        .write_all(data)
        .map_err(|_| ReactorError::CompressionFailure)?;
    encoder.finish().map_err(|_| ReactorError::CompressionFailure)
}

/// Compress data if it meets the configured threshold, otherwise return it unchanged.
/// Returns the output bytes and a flag indicating whether compression was applied.
///
/// Empty payloads are never compressed: a zero data length on the wire already
/// means "not compressed".
pub fn maybe_compress(data: &[u8], threshold_bytes: usize) -> Result<(Vec<u8>, bool)> {
    if data.is_empty() || data.len() < threshold_bytes {
        Ok((data.to_vec(), false))
    } else {
        Ok((compress(data)?, true))
    }
}
