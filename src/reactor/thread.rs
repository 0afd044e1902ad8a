//! Dedicated thread driving one reactor for the lifetime of the server.

use crate::config::{BufferConfig, ServerConfig};
use crate::error::Result;
use crate::reactor::context::ScratchContext;
use crate::reactor::panic::format_panic;
use crate::reactor::worker::Reactor;
use crate::utils::metrics::Metrics;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

static THREAD_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Only the first failure of a streak and every Nth after it are logged
const LOG_EVERY_N_FAILURES: u64 = 64;

/// Exponential delay between consecutive failed cycles.
///
/// Starts at `initial`, doubles on each failure and is capped at `max`. A
/// successful cycle resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    failures: u64,
}

impl Backoff {
    /// Clamps both delays to at least 1ms and swaps them if inverted.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let mut initial = initial.max(Duration::from_millis(1));
        let mut max = max.max(Duration::from_millis(1));
        if initial > max {
            std::mem::swap(&mut initial, &mut max);
        }
        Self {
            initial,
            max,
            current: initial,
            failures: 0,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.backoff_initial, config.backoff_max)
    }

    /// Record a failure and return how long to wait before the next cycle
    pub fn on_failure(&mut self) -> Duration {
        self.failures += 1;
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.current = self.initial;
    }

    /// Failures since the last successful cycle
    pub fn consecutive_failures(&self) -> u64 {
        self.failures
    }

    fn should_log(&self) -> bool {
        self.failures == 1 || self.failures % LOG_EVERY_N_FAILURES == 0
    }
}

/// What the driver loop runs once per iteration.
///
/// [`Reactor`] is the implementation used by the server.
pub trait DispatchCycle: Send + 'static {
    fn worker_id(&self) -> usize;

    /// Where cycle failures are counted
    fn metrics(&self) -> Arc<Metrics>;

    /// Poll once and service whatever is ready
    fn run_dispatch_cycle(&mut self, ctx: &mut ScratchContext) -> Result<usize>;

    /// Release everything still held once the loop ends
    fn shutdown(&mut self);
}

impl DispatchCycle for Reactor {
    fn worker_id(&self) -> usize {
        Reactor::worker_id(self)
    }

    fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.services().metrics)
    }

    fn run_dispatch_cycle(&mut self, ctx: &mut ScratchContext) -> Result<usize> {
        Reactor::run_dispatch_cycle(self, ctx)
    }

    fn shutdown(&mut self) {
        Reactor::shutdown(self);
    }
}

/// Start the worker thread for `reactor`.
///
/// The thread allocates its own [`ScratchContext`] and runs dispatch cycles
/// until `open` is cleared. Clearing `open` only takes effect once the
/// current poll returns, so pair it with [`Worker::wake`].
///
/// [`Worker::wake`]: crate::reactor::Worker::wake
pub fn spawn<D: DispatchCycle>(
    reactor: D,
    buffers: BufferConfig,
    backoff: Backoff,
    open: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let name = format!(
        "reactor-worker-{}",
        THREAD_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let handle = thread::Builder::new().name(name).spawn(move || {
        let mut ctx = ScratchContext::new(&buffers);
        run(reactor, &mut ctx, backoff, &open);
    })?;
    Ok(handle)
}

/// The driver loop. A failed or panicking cycle is logged and swallowed;
/// the loop only ends when `open` is cleared.
pub fn run<D: DispatchCycle>(
    mut reactor: D,
    ctx: &mut ScratchContext,
    mut backoff: Backoff,
    open: &AtomicBool,
) {
    let worker_id = reactor.worker_id();
    let metrics = reactor.metrics();
    info!(worker_id, "Worker thread started");

    while open.load(Ordering::Acquire) {
        let cycle = panic::catch_unwind(AssertUnwindSafe(|| reactor.run_dispatch_cycle(ctx)));
        let failure = match cycle {
            Ok(Ok(_)) => {
                backoff.reset();
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => {
                ctx.clear_buffers();
                format!("panic: {}", format_panic(panic))
            }
        };

        metrics.cycle_failure();
        let delay = backoff.on_failure();
        if backoff.should_log() {
            error!(
                worker_id,
                error = %failure,
                consecutive_failures = backoff.consecutive_failures(),
                delay_ms = delay.as_millis() as u64,
                "Dispatch cycle failed"
            );
        }
        thread::sleep(delay);
    }

    reactor.shutdown();
    info!(worker_id, "Worker thread stopped");
}
