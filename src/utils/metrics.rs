//! Observability and Metrics
//!
//! Counters describing the reactor's read path: connection churn, bytes and
//! frames ingested, and failures by category.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector shared by every worker of a server
#[derive(Debug)]
pub struct Metrics {
    /// Total connections registered
    pub connections_total: AtomicU64,
    /// Currently registered connections
    pub connections_active: AtomicU64,
    /// Total bytes read from sockets
    pub bytes_read: AtomicU64,
    /// Total frames handed to the frame processor
    pub frames_dispatched: AtomicU64,
    /// Frames that were inflated before dispatch
    pub frames_inflated: AtomicU64,
    /// Multiplexer poll failures
    pub poll_failures: AtomicU64,
    /// Dispatch cycles that failed or panicked
    pub cycle_failures: AtomicU64,
    /// Connections dropped for a protocol violation
    pub protocol_errors: AtomicU64,
    /// Connections dropped for any other connection-scoped failure
    pub connection_errors: AtomicU64,
    /// Channel close failures during teardown
    pub close_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            frames_dispatched: AtomicU64::new(0),
            frames_inflated: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            cycle_failures: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            close_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_registered(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record bytes pulled from a socket
    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_read.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record frames produced by one reassembly pass
    pub fn frames(&self, dispatched: u64, inflated: u64) {
        self.frames_dispatched.fetch_add(dispatched, Ordering::Relaxed);
        self.frames_inflated.fetch_add(inflated, Ordering::Relaxed);
    }

    pub fn poll_failure(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_failure(&self) {
        self.cycle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            frames_inflated: self.frames_inflated.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            cycle_failures: self.cycle_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            bytes_read = snapshot.bytes_read,
            frames_dispatched = snapshot.frames_dispatched,
            frames_inflated = snapshot.frames_inflated,
            poll_failures = snapshot.poll_failures,
            cycle_failures = snapshot.cycle_failures,
            protocol_errors = snapshot.protocol_errors,
            connection_errors = snapshot.connection_errors,
            close_failures = snapshot.close_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Reactor metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub bytes_read: u64,
    pub frames_dispatched: u64,
    pub frames_inflated: u64,
    pub poll_failures: u64,
    pub cycle_failures: u64,
    pub protocol_errors: u64,
    pub connection_errors: u64,
    pub close_failures: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lifecycle_counters() {
        let metrics = Metrics::new();
        metrics.connection_registered();
        metrics.connection_registered();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_frame_and_byte_counters() {
        let metrics = Metrics::new();
        metrics.bytes_read(128);
        metrics.bytes_read(64);
        metrics.frames(3, 1);
        metrics.protocol_error();
        metrics.poll_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_read, 192);
        assert_eq!(snapshot.frames_dispatched, 3);
        assert_eq!(snapshot.frames_inflated, 1);
        assert_eq!(snapshot.protocol_errors, 1);
        assert_eq!(snapshot.poll_failures, 1);
        assert_eq!(snapshot.cycle_failures, 0);
    }
}
