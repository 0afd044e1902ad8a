//! # Reactor
//!
//! Multi-threaded, readiness-driven TCP read path.
//!
//! ## Components
//! - **Server**: fixed pool of workers, round-robin connection assignment
//! - **Worker / Reactor**: one `mio::Poll` per worker and the dispatch cycle
//!   that reads ready connections under a per-cycle read budget
//! - **Connection**: identity, online flag and compression switch, shareable
//!   with the processor
//! - **Channel**: the socket, held only by the owning worker
//! - **PendingBytes**: incomplete trailing frames, owned by the reactor
//! - **ScratchContext**: per-worker buffers reused for every connection
//! - **thread**: the driver loop with failure backoff
//!
//! ## Threading
//! A connection belongs to one worker for its whole life and is only read on
//! that worker's thread. Registration and disconnection are safe from any
//! thread.

mod channel;
pub mod connection;
pub mod context;
pub mod panic;
pub mod pending;
pub mod server;
pub mod thread;
pub mod worker;

pub use channel::ReadOutcome;
pub use connection::{Connection, ConnectionId};
pub use context::ScratchContext;
pub use pending::PendingBytes;
pub use server::Server;
pub use thread::{Backoff, DispatchCycle};
pub use worker::{Reactor, Services, Worker};
