//! Benchmarks for the frame codec and dispatch path
//!
//! Measures decode throughput over a mixed telemetry byte stream, both as one
//! contiguous buffer and in TCP-sized chunks, plus the cost of merging decoded
//! frames into the vehicle state store.
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use mavsession::dispatcher::MessageDispatcher;
use mavsession::protocol::{Inbound, MavlinkCodec};
use mavsession::store::VehicleStateStore;
use mavsession::test_utils::{sample_telemetry_stream, vehicle_heartbeat};
use std::hint::black_box;
use std::time::SystemTime;
use tokio_util::codec::Decoder;

const FRAMES: usize = 1_000;

fn decode_all(codec: &mut MavlinkCodec, buf: &mut BytesMut) -> usize {
    let mut count = 0;
    while let Some(item) = codec.decode(buf).expect("decode") {
        black_box(&item);
        count += 1;
    }
    count
}

fn bench_decode(c: &mut Criterion) {
    let stream = sample_telemetry_stream(FRAMES);

    let mut group = c.benchmark_group("codec_decode");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("contiguous", |b| {
        b.iter(|| {
            let mut codec = MavlinkCodec::default();
            let mut buf = BytesMut::from(&stream[..]);
            assert_eq!(decode_all(&mut codec, &mut buf), FRAMES);
        })
    });

    group.bench_function("chunked_1500", |b| {
        b.iter(|| {
            let mut codec = MavlinkCodec::default();
            let mut buf = BytesMut::new();
            let mut count = 0;
            for chunk in stream.chunks(1500) {
                buf.extend_from_slice(chunk);
                count += decode_all(&mut codec, &mut buf);
            }
            assert_eq!(count, FRAMES);
        })
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let heartbeat = vehicle_heartbeat(4, 89);
    let mut codec = MavlinkCodec::default();

    c.bench_function("codec_encode_heartbeat", |b| {
        b.iter(|| black_box(codec.encode_frame(black_box(heartbeat.clone())).expect("encode")))
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let stream = sample_telemetry_stream(FRAMES);
    let mut codec = MavlinkCodec::default();
    let mut buf = BytesMut::from(&stream[..]);
    let mut frames: Vec<Inbound> = Vec::with_capacity(FRAMES);
    while let Some(item) = codec.decode(&mut buf).expect("decode") {
        frames.push(item);
    }

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(frames.len() as u64));

    group.bench_function("merge_into_store", |b| {
        b.iter(|| {
            let store = VehicleStateStore::new();
            let mut dispatcher = MessageDispatcher::new();
            let now = SystemTime::now();
            for frame in &frames {
                black_box(dispatcher.dispatch(&store, frame.clone(), now));
            }
            black_box(store.snapshot())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode, bench_dispatch);
criterion_main!(benches);
