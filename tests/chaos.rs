//! Chaos tests
//!
//! Peers that trickle bytes at random boundaries, vanish mid-frame or send
//! garbage must never disturb well-behaved peers on the same workers.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{compressed_frame, frame, Collector};
use frame_reactor::config::ReactorConfig;
use frame_reactor::Server;
use rand::Rng;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

fn config() -> ReactorConfig {
    ReactorConfig::default_with_overrides(|c| {
        c.server.worker_count = 2;
        c.server.poll_timeout = Some(Duration::from_millis(50));
        c.buffers.read_buffer_size = 128;
        c.buffers.max_packet_size = 16 * 1024;
    })
}

/// Write `wire` in random-sized pieces with short random pauses
fn trickle(client: &mut TcpStream, wire: &[u8]) {
    let mut rng = rand::rng();
    let mut offset = 0;
    while offset < wire.len() {
        let len = rng.random_range(1..=64).min(wire.len() - offset);
        client.write_all(&wire[offset..offset + len]).unwrap();
        offset += len;
        if rng.random_bool(0.1) {
            thread::sleep(Duration::from_micros(rng.random_range(50..500)));
        }
    }
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
#[serial_test::serial]
fn test_random_fragmentation_preserves_frames() {
    let collector = Collector::default();
    let server = Server::start(config(), collector.services()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();

    let mut rng = rand::rng();
    let payloads: Vec<Vec<u8>> = (0..200)
        .map(|_| {
            let len = rng.random_range(0..2048);
            (0..len).map(|_| rng.random()).collect()
        })
        .collect();
    let wire: Vec<u8> = payloads.iter().flat_map(|p| frame(p)).collect();

    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    let connection = server.register_connection(accepted).unwrap();
    trickle(&mut client, &wire);

    assert!(wait_for(|| collector.len() == payloads.len()));
    assert_eq!(collector.frames_of(connection.id()), payloads);
}

#[test]
#[serial_test::serial]
fn test_random_fragmentation_of_compressed_stream() {
    let collector = Collector::default();
    let server = Server::start(config(), collector.services()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();

    let mut rng = rand::rng();
    let payloads: Vec<Vec<u8>> = (0..100)
        .map(|i| {
            let len = rng.random_range(0..8192);
            (0..len).map(|j| ((i + j) % 13) as u8).collect()
        })
        .collect();
    let wire: Vec<u8> = payloads.iter().flat_map(|p| compressed_frame(p, 256)).collect();

    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    let connection = server.register_connection(accepted).unwrap();
    connection.set_compression(true);
    trickle(&mut client, &wire);

    assert!(wait_for(|| collector.len() == payloads.len()));
    assert_eq!(collector.frames_of(connection.id()), payloads);
}

#[test]
#[serial_test::serial]
fn test_misbehaving_peers_do_not_affect_others() {
    let collector = Collector::default();
    let server = Server::start(config(), collector.services()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let register = || {
        let client = TcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (server.register_connection(accepted).unwrap(), client)
    };

    let (good, mut good_client) = register();
    let (garbage, mut garbage_client) = register();
    let (quitter, mut quitter_client) = register();
    let (oversized, mut oversized_client) = register();

    garbage_client.write_all(&[0xFF; 32]).unwrap();
    let half = frame(&[7u8; 1000]);
    quitter_client.write_all(&half[..500]).unwrap();
    drop(quitter_client);
    // Declares 1 MiB against a 16 KiB limit
    oversized_client.write_all(&[0x80, 0x80, 0x40]).unwrap();

    let expected: Vec<Vec<u8>> = (0..50u32).map(|i| i.to_be_bytes().repeat(40)).collect();
    let wire: Vec<u8> = expected.iter().flat_map(|p| frame(p)).collect();
    trickle(&mut good_client, &wire);

    assert!(wait_for(|| collector.len() == expected.len()));
    assert!(wait_for(|| !garbage.is_online() && !quitter.is_online() && !oversized.is_online()));
    assert!(good.is_online());
    assert_eq!(collector.frames_of(good.id()), expected);
    assert_eq!(server.connection_count(), 1);
    assert_eq!(server.metrics().snapshot().protocol_errors, 2);
}
