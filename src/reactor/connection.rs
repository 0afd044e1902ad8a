//! Per-socket connection state.

use crate::core::frame::{self, FrameLimits, Reassembly};
use crate::error::{ReactorError, Result};
use crate::protocol::FrameProcessor;
use crate::reactor::context::ScratchContext;
use mio::Token;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next identifier
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// One accepted TCP connection owned by a single worker.
///
/// This is the shareable view of a connection: identity, the online flag and
/// the compression switch. The socket itself stays with the owning worker and
/// is closed when the worker disconnects the connection, even while other
/// threads still hold an `Arc<Connection>`.
pub struct Connection {
    id: ConnectionId,
    token: Token,
    worker_id: usize,
    remote_address: SocketAddr,
    online: AtomicBool,
    compression: AtomicBool,
    pending_len: AtomicUsize,
}

impl Connection {
    pub(crate) fn new(token: Token, worker_id: usize, remote_address: SocketAddr) -> Self {
        Self {
            id: ConnectionId::next(),
            token,
            worker_id,
            remote_address,
            online: AtomicBool::new(true),
            compression: AtomicBool::new(false),
            pending_len: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Multiplexer token, the channel identity inside its worker
    pub fn token(&self) -> Token {
        self.token
    }

    /// Index of the worker that owns this connection for its whole lifetime
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Set the online flag, returning whether this call changed it.
    ///
    /// Only the first `refresh_online(false)` returns `true`, which is what
    /// makes teardown run once even when two failures race to disconnect.
    pub fn refresh_online(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::AcqRel) != online
    }

    /// Whether frame bodies carry a data-length prefix
    pub fn compression_enabled(&self) -> bool {
        self.compression.load(Ordering::Acquire)
    }

    /// Switch the compressed frame layout on or off.
    ///
    /// Takes effect from the next frame the worker decodes. When to switch is
    /// decided by the protocol layer above the reactor.
    pub fn set_compression(&self, enabled: bool) {
        self.compression.store(enabled, Ordering::Release);
    }

    /// Number of bytes of an incomplete frame the worker is holding back
    pub fn pending_len(&self) -> usize {
        self.pending_len.load(Ordering::Relaxed)
    }

    pub(crate) fn set_pending_len(&self, len: usize) {
        self.pending_len.store(len, Ordering::Relaxed);
    }

    /// Decode every complete frame in `ctx.raw` and hand it to `processor`.
    ///
    /// Delivery stops as soon as the connection goes offline, including when
    /// the processor itself disconnected it. The bytes from
    /// `outcome.consumed` onwards are the incomplete tail the caller keeps.
    ///
    /// # Errors
    /// Any reassembly or decompression error, whatever the processor returns,
    /// and `ConnectionClosed` if the connection went offline mid-buffer.
    pub fn process_frames(
        self: &Arc<Self>,
        ctx: &mut ScratchContext,
        processor: &dyn FrameProcessor,
        max_packet_size: usize,
    ) -> Result<Reassembly> {
        let limits = FrameLimits {
            max_packet_size,
            compressed: self.compression_enabled(),
        };
        let ScratchContext {
            raw,
            reassembled,
            inflater,
            ..
        } = ctx;

        frame::reassemble(&raw[..], limits, inflater, reassembled, |frame| {
            if !self.is_online() {
                return Err(ReactorError::ConnectionClosed);
            }
            processor.process(self, frame)
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("worker_id", &self.worker_id)
            .field("remote_address", &self.remote_address)
            .field("online", &self.is_online())
            .field("compression", &self.compression_enabled())
            .finish()
    }
}
