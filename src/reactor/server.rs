//! Fixed pool of workers sharing one set of [`Services`].

use crate::config::ReactorConfig;
use crate::error::{ReactorError, Result};
use crate::reactor::connection::Connection;
use crate::reactor::thread::{self, Backoff};
use crate::reactor::worker::{Services, Worker};
use crate::utils::metrics::Metrics;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// A running pool of reactor workers.
///
/// Every accepted socket is handed to exactly one worker, chosen round-robin,
/// and stays with it until it is disconnected. Dropping the server shuts it
/// down.
pub struct Server {
    workers: Vec<Worker>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    open: Arc<AtomicBool>,
    next_worker: AtomicUsize,
    services: Services,
}

impl Server {
    /// Validate `config`, create `worker_count` workers and start one driver
    /// thread per worker.
    ///
    /// # Errors
    /// `ConfigError` for an invalid configuration, or the error that stopped a
    /// worker or its thread from being created. Threads started before the
    /// failure are stopped again.
    pub fn start(config: ReactorConfig, services: Services) -> Result<Self> {
        config.validate_strict()?;

        let mut server = Self {
            workers: Vec::with_capacity(config.server.worker_count),
            threads: Mutex::new(Vec::with_capacity(config.server.worker_count)),
            open: Arc::new(AtomicBool::new(true)),
            next_worker: AtomicUsize::new(0),
            services: services.clone(),
        };

        for id in 0..config.server.worker_count {
            let (worker, reactor) = Worker::new(id, &config, services.clone())?;
            let handle = thread::spawn(
                reactor,
                config.buffers.clone(),
                Backoff::from_config(&config.server),
                Arc::clone(&server.open),
            )?;
            server.workers.push(worker);
            server
                .threads
                .get_mut()
                .map_err(|_| ReactorError::LockPoisoned)?
                .push(handle);
        }

        info!(
            workers = server.workers.len(),
            max_packet_size = config.buffers.max_packet_size,
            "Reactor server started"
        );
        Ok(server)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Hand an accepted socket to the next worker in rotation.
    ///
    /// # Errors
    /// `ServerClosed` after shutdown, otherwise whatever
    /// [`Worker::register_connection`] reports.
    pub fn register_connection(&self, stream: TcpStream) -> Result<Arc<Connection>> {
        if !self.is_open() {
            return Err(ReactorError::ServerClosed);
        }
        let remote_address = stream.peer_addr().map_err(ReactorError::Registration)?;
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[index].register_connection(stream, remote_address)
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Live connections across all workers
    pub fn connection_count(&self) -> usize {
        self.workers.iter().map(Worker::connection_count).sum()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.services.metrics
    }

    /// Stop every worker and wait for its thread to exit.
    ///
    /// Workers are closed to new registrations first. Each worker disconnects
    /// its remaining connections on the way out, and a final sweep catches
    /// any registration that was in flight while the threads stopped.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        for worker in &self.workers {
            worker.close();
            if let Err(e) = worker.wake() {
                warn!(worker_id = worker.id(), error = %e, "Failed to wake worker for shutdown");
            }
        }

        let handles = match self.threads.lock() {
            Ok(mut threads) => std::mem::take(&mut *threads),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!("Worker thread terminated by panic");
            }
        }

        let stragglers: usize = self.workers.iter().map(Worker::disconnect_all).sum();
        if stragglers > 0 {
            warn!(stragglers, "Disconnected connections registered during shutdown");
        }
        info!("Reactor server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn config(workers: usize) -> ReactorConfig {
        ReactorConfig::default_with_overrides(|c| {
            c.server.worker_count = workers;
            c.server.poll_timeout = Some(std::time::Duration::from_millis(20));
        })
    }

    fn services() -> Services {
        Services::new(|_: &Arc<Connection>, _: &[u8]| -> Result<()> { Ok(()) })
    }

    #[test]
    fn test_round_robin_assignment() {
        let server = Server::start(config(3), services()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut clients = Vec::new();
        let mut owners = Vec::new();
        for _ in 0..6 {
            clients.push(std::net::TcpStream::connect(addr).unwrap());
            let (stream, _) = listener.accept().unwrap();
            owners.push(server.register_connection(stream).unwrap().worker_id());
        }
        assert_eq!(owners, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(server.connection_count(), 6);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_registration() {
        let server = Server::start(config(2), services()).unwrap();
        server.shutdown();
        server.shutdown();
        assert!(!server.is_open());

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, _) = listener.accept().unwrap();
        assert!(matches!(
            server.register_connection(stream),
            Err(ReactorError::ServerClosed)
        ));
    }

    #[test]
    fn test_worker_handles_reject_registration_after_shutdown() {
        let server = Server::start(config(2), services()).unwrap();
        let workers: Vec<Worker> = server.workers().to_vec();
        server.shutdown();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        for worker in &workers {
            let _client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
            let (stream, remote) = listener.accept().unwrap();
            assert!(worker.is_closed());
            assert!(matches!(
                worker.register_connection(stream, remote),
                Err(ReactorError::ServerClosed)
            ));
            assert_eq!(worker.connection_count(), 0);
        }
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_shutdown_leaves_no_connection_behind() {
        let server = Server::start(config(3), services()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut held = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..9 {
            clients.push(std::net::TcpStream::connect(addr).unwrap());
            let (stream, _) = listener.accept().unwrap();
            held.push(server.register_connection(stream).unwrap());
        }
        server.shutdown();

        assert_eq!(server.connection_count(), 0);
        assert!(held.iter().all(|connection| !connection.is_online()));
        assert_eq!(server.metrics().snapshot().connections_active, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Server::start(config(0), services());
        assert!(matches!(result, Err(ReactorError::ConfigError(_))));
    }
}
