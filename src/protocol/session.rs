//! Weak link between connections and application sessions.
//!
//! A connection never owns its session. The association is a key stored in
//! [`ConnectionRegistry`] and resolved when the connection goes away, which
//! keeps connection and session objects free of ownership cycles.

use crate::reactor::connection::{Connection, ConnectionId};
use dashmap::DashMap;
use std::fmt;

/// Identifier of an application-level session (player, user, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl SessionId {
    /// Create a new [`SessionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Owner of application state attached to connections.
pub trait SessionOwner: Send + Sync + 'static {
    /// Release `session`, whose connection has just been torn down.
    ///
    /// Called at most once per connection, from the worker thread that owned it.
    fn remove_session(&self, session: SessionId, connection: &Connection);
}

/// Session owner for deployments without application sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessions;

impl SessionOwner for NoopSessions {
    fn remove_session(&self, _session: SessionId, _connection: &Connection) {}
}

/// Concurrent registry of sessions keyed by [`ConnectionId`].
///
/// Written by the application when a session is established, drained by the
/// reactor on disconnect.
#[derive(Default)]
pub struct ConnectionRegistry(DashMap<ConnectionId, SessionId>);

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `session` with a connection, returning any previous association.
    pub fn attach(&self, id: ConnectionId, session: SessionId) -> Option<SessionId> {
        self.0.insert(id, session)
    }

    /// Remove the association, typically on connection teardown.
    pub fn detach(&self, id: ConnectionId) -> Option<SessionId> {
        self.0.remove(&id).map(|(_, session)| session)
    }

    /// Look up the session of a connection without removing it.
    #[must_use]
    pub fn session_for(&self, id: ConnectionId) -> Option<SessionId> {
        self.0.get(&id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
