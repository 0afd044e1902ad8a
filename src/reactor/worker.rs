//! Readiness-driven worker: one multiplexer, one thread, many connections.
//!
//! A worker is split in two halves. [`Worker`] is a cloneable handle used by
//! acceptor threads to register connections and by anyone to tear one down.
//! [`Reactor`] owns the `mio::Poll` and runs dispatch cycles; it lives on the
//! worker thread together with that thread's [`ScratchContext`].

use crate::config::{ReactorConfig, SocketConfig};
use crate::error::{ReactorError, Result};
use crate::protocol::{ConnectionRegistry, FrameProcessor, NoopSessions, SessionOwner};
use crate::reactor::channel::{Channel, ReadOutcome};
use crate::reactor::connection::Connection;
use crate::reactor::context::ScratchContext;
use crate::reactor::panic::format_panic;
use crate::reactor::pending::PendingBytes;
use crate::utils::metrics::Metrics;
use dashmap::DashMap;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use socket2::SockRef;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Token reserved for the registration waker
pub(crate) const WAKE_TOKEN: Token = Token(usize::MAX);

/// External collaborators shared by every worker of a server.
#[derive(Clone)]
pub struct Services {
    /// Receives every reassembled frame
    pub processor: Arc<dyn FrameProcessor>,
    /// Releases application state on disconnect
    pub sessions: Arc<dyn SessionOwner>,
    /// Process-wide connection → session associations
    pub registry: Arc<ConnectionRegistry>,
    pub metrics: Arc<Metrics>,
}

impl Services {
    /// Services with no session owner, a fresh registry and fresh metrics
    pub fn new<P: FrameProcessor>(processor: P) -> Self {
        Self {
            processor: Arc::new(processor),
            sessions: Arc::new(NoopSessions),
            registry: Arc::new(ConnectionRegistry::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_sessions<S: SessionOwner>(mut self, sessions: S) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// A live connection together with the socket only its worker may touch
#[derive(Clone)]
struct Slot {
    connection: Arc<Connection>,
    channel: Arc<Channel>,
}

/// How a service pass ended for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// The socket reported `WouldBlock` or the connection went offline
    Drained,
    /// The read budget ran out with data possibly still queued
    BudgetExhausted,
}

struct WorkerInner {
    id: usize,
    registry: Registry,
    waker: Waker,
    connections: DashMap<Token, Slot>,
    next_token: AtomicUsize,
    closed: AtomicBool,
    socket: SocketConfig,
    max_packet_size: usize,
    services: Services,
}

/// Handle to a worker, cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

/// The polling half of a worker, owned by the worker thread.
///
/// Readiness is edge-triggered, so a connection that still had data when its
/// read budget ran out gets no new event. Such connections go to a backlog
/// that is serviced in the next cycle, and while the backlog is non-empty the
/// poll does not block.
pub struct Reactor {
    poll: Poll,
    events: Events,
    poll_timeout: Option<Duration>,
    read_budget: usize,
    ready: Vec<Token>,
    backlog: Vec<Token>,
    pending: PendingBytes,
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Create a worker and its reactor.
    ///
    /// # Errors
    /// Fails if the multiplexer or its waker cannot be created. This is the
    /// only failure that should abort server startup.
    pub fn new(id: usize, config: &ReactorConfig, services: Services) -> Result<(Worker, Reactor)> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;

        let inner = Arc::new(WorkerInner {
            id,
            registry,
            waker,
            connections: DashMap::new(),
            next_token: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            socket: config.socket.clone(),
            max_packet_size: config.buffers.max_packet_size,
            services,
        });

        debug!(worker_id = id, "Worker created");

        let reactor = Reactor {
            poll,
            events: Events::with_capacity(config.server.events_capacity),
            poll_timeout: config.server.poll_timeout,
            read_budget: config.server.read_budget.max(1),
            ready: Vec::new(),
            backlog: Vec::new(),
            pending: PendingBytes::new(),
            inner: Arc::clone(&inner),
        };
        Ok((Worker { inner }, reactor))
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Hand an accepted socket to this worker.
    ///
    /// Switches the socket to non-blocking mode, applies socket tuning, makes
    /// the connection visible in the map, subscribes it for read readiness
    /// and wakes the multiplexer so the next poll sees it. Callable from any
    /// thread, concurrently with the worker's own dispatch loop.
    ///
    /// # Errors
    /// `ServerClosed` once the worker is closed, including when it closes
    /// while this call is in flight. `Registration` if the socket cannot be
    /// configured or subscribed. The connection is not kept in either case.
    pub fn register_connection(
        &self,
        stream: std::net::TcpStream,
        remote_address: SocketAddr,
    ) -> Result<Arc<Connection>> {
        if self.is_closed() {
            return Err(ReactorError::ServerClosed);
        }
        stream
            .set_nonblocking(true)
            .map_err(ReactorError::Registration)?;
        apply_socket_options(&stream, &self.inner.socket).map_err(ReactorError::Registration)?;

        let token = Token(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        let channel = Arc::new(Channel::new(mio::net::TcpStream::from_std(stream)));
        let connection = Arc::new(Connection::new(token, self.inner.id, remote_address));

        // Map entry first: an event for this token may arrive as soon as it is registered
        self.inner.connections.insert(
            token,
            Slot {
                connection: Arc::clone(&connection),
                channel: Arc::clone(&channel),
            },
        );
        let fd = channel.as_raw_fd();
        if let Err(e) = self
            .inner
            .registry
            .register(&mut SourceFd(&fd), token, Interest::READABLE)
        {
            self.inner.connections.remove(&token);
            return Err(ReactorError::Registration(e));
        }
        self.inner.services.metrics.connection_registered();

        // A close that raced with this registration may already have swept the map
        if self.is_closed() {
            self.inner.disconnect(&connection);
            return Err(ReactorError::ServerClosed);
        }

        if let Err(e) = self.inner.waker.wake() {
            warn!(worker_id = self.inner.id, error = %e, "Failed to wake worker after registration");
        }

        debug!(
            worker_id = self.inner.id,
            connection_id = connection.id().as_u64(),
            remote = %remote_address,
            "Connection registered"
        );
        Ok(connection)
    }

    /// Tear a connection down. See [`Reactor`] for when the worker does this itself.
    pub fn disconnect(&self, connection: &Connection) {
        self.inner.disconnect(connection);
    }

    /// Refuse further registrations. Connections already registered stay up
    /// until [`disconnect_all`](Self::disconnect_all) or the reactor shuts down.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Disconnect every connection currently in this worker's map
    pub fn disconnect_all(&self) -> usize {
        self.inner.disconnect_all()
    }

    /// Look up a live connection by its multiplexer token
    pub fn connection(&self, token: Token) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .get(&token)
            .map(|entry| Arc::clone(&entry.value().connection))
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    /// Interrupt a blocked poll
    pub fn wake(&self) -> Result<()> {
        self.inner.waker.wake()?;
        Ok(())
    }
}

impl Reactor {
    pub fn worker_id(&self) -> usize {
        self.inner.id
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    /// Handle to the worker this reactor drives
    pub fn worker(&self) -> Worker {
        Worker {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Connections whose read budget ran out in the last cycle
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Run one dispatch cycle: poll, then service every ready connection.
    ///
    /// Ready connections are the ones the poll reported plus the backlog of
    /// the previous cycle. Each gets at most `read_budget` reads, serviced one
    /// at a time on the calling thread. Any failure while servicing a
    /// connection disconnects that connection only. `ctx` is cleared after
    /// every connection, whatever the outcome.
    ///
    /// Returns the number of connections serviced.
    ///
    /// # Errors
    /// `Poll` if the multiplexer fails; no connection is touched in that case.
    pub fn run_dispatch_cycle(&mut self, ctx: &mut ScratchContext) -> Result<usize> {
        let timeout = if self.ready.is_empty() && self.backlog.is_empty() {
            self.poll_timeout
        } else {
            Some(Duration::ZERO)
        };
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            self.inner.services.metrics.poll_failure();
            warn!(worker_id = self.inner.id, error = %e, "Poll failed");
            return Err(ReactorError::Poll(e));
        }

        // Leftovers of a cycle that unwound, then last cycle's backlog, then new events
        self.ready.append(&mut self.backlog);
        let carried = self.ready.len();
        for event in self.events.iter() {
            let token = event.token();
            if token == WAKE_TOKEN {
                continue;
            }
            if !(event.is_readable() || event.is_read_closed() || event.is_error()) {
                continue;
            }
            if !self.ready[..carried].contains(&token) {
                self.ready.push(token);
            }
        }
        self.events.clear();

        let Self {
            ready,
            backlog,
            pending,
            inner,
            read_budget,
            ..
        } = self;

        let mut serviced = 0;
        let mut index = 0;
        while index < ready.len() {
            let token = ready[index];
            index += 1;

            let Some(slot) = inner.slot(token) else {
                pending.remove(token);
                continue;
            };
            if !slot.connection.is_online() {
                pending.remove(token);
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                inner.service_connection(&slot, pending, ctx, *read_budget)
            }))
            .unwrap_or_else(|panic| {
                Err(ReactorError::Dispatch(format!(
                    "panic while processing frames: {}",
                    format_panic(panic)
                )))
            });
            ctx.clear_buffers();
            serviced += 1;

            match result {
                Ok(Drain::BudgetExhausted) if slot.connection.is_online() => backlog.push(token),
                Ok(_) => {}
                Err(e) => {
                    inner.record_failure(&slot.connection, &e);
                    inner.disconnect(&slot.connection);
                }
            }
            if !slot.connection.is_online() {
                pending.remove(token);
            }
        }
        ready.clear();

        // Entries of connections disconnected from other threads
        if pending.len() > inner.connections.len() {
            pending.retain(|token| inner.connections.contains_key(token));
        }

        Ok(serviced)
    }

    /// Disconnect every connection still owned by this worker
    pub fn shutdown(&mut self) {
        let closed = self.inner.disconnect_all();
        self.pending.clear();
        self.ready.clear();
        self.backlog.clear();
        debug!(worker_id = self.inner.id, closed, "Worker shut down");
    }
}

impl WorkerInner {
    fn slot(&self, token: Token) -> Option<Slot> {
        self.connections.get(&token).map(|entry| entry.value().clone())
    }

    /// Read and process until the socket would block or `budget` reads are done.
    fn service_connection(
        &self,
        slot: &Slot,
        pending: &mut PendingBytes,
        ctx: &mut ScratchContext,
        budget: usize,
    ) -> Result<Drain> {
        let metrics = &self.services.metrics;
        let connection = &slot.connection;
        for _ in 0..budget {
            pending.consume_into(connection.token(), &mut ctx.raw);
            let chunk = ctx.read_chunk();
            let read = slot.channel.read_into(&mut ctx.raw, chunk)?;
            let ReadOutcome::Data(n) = read else {
                return Ok(Drain::Drained);
            };
            metrics.bytes_read(n as u64);

            let outcome =
                connection.process_frames(ctx, self.services.processor.as_ref(), self.max_packet_size)?;
            pending.store(connection, &ctx.raw[outcome.consumed..]);
            metrics.frames(outcome.frames as u64, outcome.inflated as u64);
            trace!(
                worker_id = self.id,
                connection_id = connection.id().as_u64(),
                bytes = n,
                frames = outcome.frames,
                pending = connection.pending_len(),
                "Chunk processed"
            );
            ctx.clear_buffers();

            if !connection.is_online() {
                return Ok(Drain::Drained);
            }
        }
        Ok(Drain::BudgetExhausted)
    }

    fn record_failure(&self, connection: &Connection, error: &ReactorError) {
        let metrics = &self.services.metrics;
        let connection_id = connection.id().as_u64();
        match error {
            ReactorError::ConnectionClosed => {
                debug!(worker_id = self.id, connection_id, "Peer closed connection");
            }
            e if e.is_protocol_violation() => {
                metrics.protocol_error();
                warn!(
                    worker_id = self.id,
                    connection_id,
                    remote = %connection.remote_address(),
                    error = %e,
                    "Protocol violation, dropping connection"
                );
            }
            e => {
                metrics.connection_error();
                debug!(worker_id = self.id, connection_id, error = %e, "Connection failed");
            }
        }
    }

    /// Teardown runs at most once per connection; later calls return early.
    ///
    /// Dropping the slot releases the map's hold on the socket. The descriptor
    /// is closed as soon as a service pass in flight on the worker thread,
    /// if any, lets go of its copy.
    fn disconnect(&self, connection: &Connection) {
        if connection.worker_id() != self.id {
            warn!(
                worker_id = self.id,
                owner = connection.worker_id(),
                connection_id = connection.id().as_u64(),
                "Disconnect requested on a worker that does not own the connection"
            );
            return;
        }
        if !connection.refresh_online(false) {
            return;
        }

        let removed = self
            .connections
            .remove_if(&connection.token(), |_, slot| {
                std::ptr::eq(Arc::as_ptr(&slot.connection), connection)
            });
        if let Some((_, slot)) = removed {
            let fd = slot.channel.as_raw_fd();
            if let Err(e) = self.registry.deregister(&mut SourceFd(&fd)) {
                debug!(worker_id = self.id, error = %e, "Deregistration failed");
            }
            if let Err(e) = slot.channel.shutdown() {
                self.services.metrics.close_failure();
                warn!(
                    worker_id = self.id,
                    connection_id = connection.id().as_u64(),
                    error = %e,
                    "Failed to close channel"
                );
            }
            self.services.metrics.connection_closed();
        }

        if let Some(session) = self.services.registry.detach(connection.id()) {
            self.services.sessions.remove_session(session, connection);
        }

        debug!(
            worker_id = self.id,
            connection_id = connection.id().as_u64(),
            remote = %connection.remote_address(),
            "Connection closed"
        );
    }

    fn disconnect_all(&self) -> usize {
        let remaining: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(&entry.value().connection))
            .collect();
        for connection in &remaining {
            self.disconnect(connection);
        }
        remaining.len()
    }
}

fn apply_socket_options(stream: &std::net::TcpStream, options: &SocketConfig) -> io::Result<()> {
    let socket = SockRef::from(stream);
    socket.set_send_buffer_size(options.send_buffer_size)?;
    socket.set_recv_buffer_size(options.recv_buffer_size)?;
    socket.set_nodelay(options.no_delay)?;
    Ok(())
}
