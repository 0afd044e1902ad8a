//! Incomplete-frame bytes carried between reads, owned by the worker thread.

use crate::reactor::connection::Connection;
use bytes::BytesMut;
use mio::Token;
use std::collections::HashMap;

/// Per-connection cache of bytes that did not yet form a complete frame.
///
/// Lives inside the [`Reactor`](crate::reactor::Reactor), so only the worker
/// thread ever touches it. Connections with nothing cached have no entry.
#[derive(Debug, Default)]
pub struct PendingBytes {
    entries: HashMap<Token, BytesMut>,
}

impl PendingBytes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the cached bytes for `token` to the end of `dst`.
    ///
    /// The entry is kept until [`store`](Self::store) replaces it, so a read
    /// that yields nothing loses no bytes.
    pub fn consume_into(&self, token: Token, dst: &mut BytesMut) {
        if let Some(cached) = self.entries.get(&token) {
            dst.extend_from_slice(cached);
        }
    }

    /// Replace the cache for `connection` with `remainder`
    pub fn store(&mut self, connection: &Connection, remainder: &[u8]) {
        let token = connection.token();
        if remainder.is_empty() {
            self.entries.remove(&token);
        } else {
            let cached = self.entries.entry(token).or_default();
            cached.clear();
            cached.extend_from_slice(remainder);
        }
        connection.set_pending_len(remainder.len());
    }

    pub fn remove(&mut self, token: Token) {
        self.entries.remove(&token);
    }

    /// Keep only the entries whose token satisfies `live`
    pub fn retain<F: FnMut(&Token) -> bool>(&mut self, mut live: F) {
        self.entries.retain(|token, _| live(token));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
