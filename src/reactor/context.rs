//! Per-worker scratch buffers.

use crate::config::BufferConfig;
use crate::core::varint::MAX_VARINT_LEN;
use crate::utils::compression::Inflater;
use bytes::BytesMut;

/// Buffers reused by every connection a worker services.
///
/// A context is created on the worker thread and never leaves it. At most one
/// connection's bytes occupy it at a time, and [`clear_buffers`] runs after
/// every connection is processed, on success and failure alike.
///
/// [`clear_buffers`]: ScratchContext::clear_buffers
pub struct ScratchContext {
    /// Pending bytes of the current connection followed by freshly read bytes
    pub raw: BytesMut,
    /// Holds one inflated payload at a time
    pub reassembled: BytesMut,
    /// Streaming zlib state, reset after every frame
    pub inflater: Inflater,
    read_chunk: usize,
}

impl ScratchContext {
    /// Allocate buffers for the given sizing.
    ///
    /// `raw` can hold a maximal pending frame plus one full read, so neither
    /// buffer reallocates while the worker runs.
    pub fn new(config: &BufferConfig) -> Self {
        let max_wire_frame = config.max_packet_size + MAX_VARINT_LEN;
        Self {
            raw: BytesMut::with_capacity(max_wire_frame + config.read_buffer_size),
            reassembled: BytesMut::with_capacity(config.max_packet_size + 1),
            inflater: Inflater::new(),
            read_chunk: config.read_buffer_size,
        }
    }

    /// Maximum number of bytes pulled from a socket by a single read
    pub fn read_chunk(&self) -> usize {
        self.read_chunk
    }

    /// Drop all buffered bytes, keeping the allocations
    pub fn clear_buffers(&mut self) {
        self.raw.clear();
        self.reassembled.clear();
    }

    /// Whether both buffers are empty
    pub fn is_clear(&self) -> bool {
        self.raw.is_empty() && self.reassembled.is_empty()
    }
}
