//! # Core Framing Components
//!
//! Low-level wire framing: VarInt length prefixes, frame encoding and the
//! reassembly loop that turns a raw byte stream into discrete frames.
//!
//! ## Wire Format
//! ```text
//! plain:      [VarInt bodyLength] [payload]
//! compressed: [VarInt bodyLength] [VarInt dataLength] [zlib(payload) | payload]
//! ```
//! A `dataLength` of zero marks a payload that was sent uncompressed.
//!
//! ## Limits
//! - A VarInt is at most 5 bytes long
//! - Declared body length and inflated length are bounded by the configured
//!   maximum packet size, checked before any body byte is buffered further

pub mod frame;
pub mod varint;
