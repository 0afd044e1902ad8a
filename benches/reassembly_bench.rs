use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use frame_reactor::core::frame::{encode_frame, reassemble, FrameLimits};
use frame_reactor::utils::compression::Inflater;

const MAX_PACKET: usize = 2_097_151;

#[allow(clippy::unwrap_used)]
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");
    for &size in &[64usize, 512, 4096, 65536] {
        let payload = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("plain_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::with_capacity(size + 8),
                |mut buf| encode_frame(&payload, None, &mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("compressed_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::with_capacity(size + 16),
                |mut buf| encode_frame(&payload, Some(256), &mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_reassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble");

    // Many small frames in one read, the common case for chatty peers
    for &(count, size) in &[(1000usize, 16usize), (100, 512), (4, 65536)] {
        for compressed in [false, true] {
            let mut wire = BytesMut::new();
            let payload: Vec<u8> = (0..size).map(|i| (i % 31) as u8).collect();
            for _ in 0..count {
                let threshold = compressed.then_some(256);
                encode_frame(&payload, threshold, &mut wire).unwrap();
            }
            let limits = FrameLimits {
                max_packet_size: MAX_PACKET,
                compressed,
            };
            let mode = if compressed { "zlib" } else { "plain" };

            group.throughput(Throughput::Bytes((count * size) as u64));
            group.bench_function(format!("{mode}_{count}x{size}b"), |b| {
                let mut inflater = Inflater::new();
                let mut content = BytesMut::with_capacity(MAX_PACKET + 1);
                b.iter(|| {
                    let mut delivered = 0usize;
                    let outcome = reassemble(&wire, limits, &mut inflater, &mut content, |frame| {
                        delivered += frame.len();
                        Ok(())
                    })
                    .unwrap();
                    assert_eq!(outcome.frames, count);
                    delivered
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_reassemble);
criterion_main!(benches);
