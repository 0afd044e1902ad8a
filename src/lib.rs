//! # frame-reactor
//!
//! Non-blocking TCP reactor that turns byte streams into length-prefixed
//! frames.
//!
//! A fixed pool of worker threads each owns a readiness multiplexer and a set
//! of connections. Bytes read from a connection are reassembled into frames,
//! optionally zlib-inflated, and handed to a [`FrameProcessor`] in arrival
//! order. Frames split across reads are cached per connection until complete.
//!
//! ## Example
//! ```no_run
//! use frame_reactor::{Connection, ReactorConfig, Result, Server, Services};
//! use std::net::TcpListener;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let services = Services::new(|connection: &Arc<Connection>, frame: &[u8]| -> Result<()> {
//!     println!("{} sent {} bytes", connection.id(), frame.len());
//!     Ok(())
//! });
//! let server = Server::start(ReactorConfig::default(), services)?;
//!
//! let listener = TcpListener::bind("127.0.0.1:25565")?;
//! for stream in listener.incoming() {
//!     server.register_connection(stream?)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The reactor is only available on Unix targets.

pub mod config;
pub mod core;
pub mod error;
#[cfg(unix)]
pub mod protocol;
#[cfg(unix)]
pub mod reactor;
pub mod utils;

pub use config::ReactorConfig;
pub use error::{ReactorError, Result};
#[cfg(unix)]
pub use protocol::{ConnectionRegistry, FrameProcessor, NoopSessions, SessionId, SessionOwner};
#[cfg(unix)]
pub use reactor::{Connection, ConnectionId, Server, Services, Worker};
