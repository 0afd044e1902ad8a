//! # Collaborator Seams
//!
//! Interfaces to the layers around the reactor core.
//!
//! The reactor never interprets frame payloads or owns application state. It
//! talks to the rest of the system through:
//! - **FrameProcessor**: receives every reassembled frame, in arrival order
//! - **SessionOwner**: releases application state when a connection drops
//! - **ConnectionRegistry**: process-wide map from connections to sessions

pub mod dispatcher;
pub mod session;

pub use dispatcher::FrameProcessor;
pub use session::{ConnectionRegistry, NoopSessions, SessionId, SessionOwner};
