//! # Error Types
//!
//! Error handling for the reactor core.
//!
//! This module defines every failure the reactor can raise, from multiplexer
//! failures down to protocol violations found while reassembling frames.
//!
//! ## Error Categories
//! - **Worker-scoped**: poll failures and registration failures. They are logged
//!   and never close an unrelated connection.
//! - **Connection-scoped**: read failures, end-of-stream, oversized frames,
//!   malformed prefixes, decompression failures and dispatch failures. Each one
//!   tears down exactly the connection that raised it.
//! - **Startup**: configuration errors and multiplexer creation failures abort
//!   server startup.
//!
//! ## Example Usage
//! ```rust
//! use frame_reactor::error::{ReactorError, Result};
//!
//! fn check_frame(len: usize, max: usize) -> Result<()> {
//!     if len > max {
//!         return Err(ReactorError::OversizedPacket(len));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_frame(10, 4).unwrap_err();
//! assert!(err.is_connection_scoped());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative length prefix";
    pub const ERR_MISSING_DATA_LENGTH: &str = "Compressed frame is missing its data length";
}

/// ReactorError is the primary error type for all reactor operations
#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Poll failed: {0}")]
    Poll(#[source] io::Error),

    #[error("Registration failed: {0}")]
    Registration(#[source] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("VarInt too long")]
    VarIntTooLong,

    #[error("Invalid frame: {0}")]
    InvalidFrame(&'static str),

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Decompressed size mismatch: expected {expected} bytes, got {actual}")]
    DecompressedSizeMismatch { expected: usize, actual: usize },

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server is closed")]
    ServerClosed,
}

impl ReactorError {
    /// Whether this error only concerns the connection that raised it.
    ///
    /// Connection-scoped errors trigger a disconnect of that connection and
    /// nothing else. Everything else is handled at the worker or server level.
    pub fn is_connection_scoped(&self) -> bool {
        matches!(
            self,
            ReactorError::Io(_)
                | ReactorError::ConnectionClosed
                | ReactorError::OversizedPacket(_)
                | ReactorError::VarIntTooLong
                | ReactorError::InvalidFrame(_)
                | ReactorError::DecompressionFailure
                | ReactorError::DecompressedSizeMismatch { .. }
                | ReactorError::Dispatch(_)
                | ReactorError::LockPoisoned
        )
    }

    /// Whether this error is a violation of the wire protocol by the peer
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ReactorError::OversizedPacket(_)
                | ReactorError::VarIntTooLong
                | ReactorError::InvalidFrame(_)
                | ReactorError::DecompressionFailure
                | ReactorError::DecompressedSizeMismatch { .. }
        )
    }
}

/// Type alias for Results using ReactorError
pub type Result<T> = std::result::Result<T, ReactorError>;
