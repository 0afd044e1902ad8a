//! # Utility Modules
//!
//! Supporting utilities for the reactor.
//!
//! ## Components
//! - **Compression**: zlib inflate state reused across frames, plus the
//!   matching compressor for producing frames
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Inflated output is bounded by the declared data length, itself bounded
//!   by the maximum packet size

pub mod compression;
pub mod logging;
pub mod metrics;
