//! Shared fixtures for reactor integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bytes::BytesMut;
use frame_reactor::config::ReactorConfig;
use frame_reactor::core::frame::encode_frame;
use frame_reactor::reactor::{Connection, ConnectionId, Reactor, ScratchContext, Services, Worker};
use frame_reactor::{Result, SessionId, SessionOwner};
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Frames seen by the processor, tagged with the connection that sent them
#[derive(Clone, Default)]
pub struct Collector {
    frames: Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>,
}

impl Collector {
    pub fn services(&self) -> Services {
        let frames = Arc::clone(&self.frames);
        Services::new(move |connection: &Arc<Connection>, frame: &[u8]| -> Result<()> {
            frames.lock().unwrap().push((connection.id(), frame.to_vec()));
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frames_of(&self, id: ConnectionId) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _)| *owner == id)
            .map(|(_, frame)| frame.clone())
            .collect()
    }
}

/// Session owner counting how often each session is released
#[derive(Clone, Default)]
pub struct RemovalCounter {
    pub removed: Arc<AtomicUsize>,
    pub last: Arc<Mutex<Option<SessionId>>>,
}

impl SessionOwner for RemovalCounter {
    fn remove_session(&self, session: SessionId, _connection: &Connection) {
        self.removed.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(session);
    }
}

impl RemovalCounter {
    pub fn count(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

pub fn test_config(read_buffer_size: usize, max_packet_size: usize) -> ReactorConfig {
    ReactorConfig::default_with_overrides(|c| {
        c.server.worker_count = 1;
        c.server.poll_timeout = Some(Duration::from_millis(10));
        c.buffers.read_buffer_size = read_buffer_size;
        c.buffers.max_packet_size = max_packet_size;
    })
}

pub struct Harness {
    pub worker: Worker,
    pub reactor: Reactor,
    pub ctx: ScratchContext,
    listener: TcpListener,
}

impl Harness {
    pub fn new(config: &ReactorConfig, services: Services) -> Self {
        let (worker, reactor) = Worker::new(0, config, services).unwrap();
        Self {
            worker,
            reactor,
            ctx: ScratchContext::new(&config.buffers),
            listener: TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Connect a client and register the accepted side with the worker
    pub fn connect(&self) -> (Arc<Connection>, TcpStream) {
        let client = TcpStream::connect(self.addr()).unwrap();
        client.set_nodelay(true).unwrap();
        let (accepted, remote) = self.listener.accept().unwrap();
        let connection = self.worker.register_connection(accepted, remote).unwrap();
        (connection, client)
    }

    /// Run dispatch cycles until `done` holds or five seconds pass
    pub fn pump_until(&mut self, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            self.reactor.run_dispatch_cycle(&mut self.ctx).unwrap();
            assert!(self.ctx.is_clear(), "scratch buffers must be cleared after each cycle");
        }
        done()
    }

    /// Run a few cycles without waiting for anything in particular
    pub fn pump(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.reactor.run_dispatch_cycle(&mut self.ctx).unwrap();
        }
    }
}

pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(payload, None, &mut buf).unwrap();
    buf.to_vec()
}

pub fn compressed_frame(payload: &[u8], threshold: usize) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(payload, Some(threshold), &mut buf).unwrap();
    buf.to_vec()
}

/// A client that writes small frames as fast as the socket accepts them
pub struct Flood {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<usize>>,
}

impl Flood {
    pub fn start(mut client: TcpStream) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        client
            .set_write_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let burst: Vec<u8> = (0..64).flat_map(|_| frame(&[0x5A; 32])).collect();
        let handle = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut offset = 0;
                let mut written = 0;
                while !stop.load(Ordering::Relaxed) {
                    match client.write(&burst[offset..]) {
                        Ok(0) => break,
                        Ok(n) => {
                            written += n;
                            offset = (offset + n) % burst.len();
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::WouldBlock
                                    | std::io::ErrorKind::TimedOut
                                    | std::io::ErrorKind::Interrupted
                            ) => {}
                        Err(_) => break,
                    }
                }
                written
            })
        };
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop writing and return how many bytes went out
    pub fn stop(&mut self) -> usize {
        self.stop.store(true, Ordering::Relaxed);
        self.handle
            .take()
            .map(|handle| handle.join().unwrap())
            .unwrap_or(0)
    }
}

impl Drop for Flood {
    fn drop(&mut self) {
        self.stop();
    }
}
