//! Throughput of the line codec.
//!
//! Run with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fingerkey_protocol::{Command, DeviceLine, LineCodec, Response};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

/// A full enroll exchange as the host sees it.
const ENROLL_TRANSCRIPT: &[u8] = b"Place finger to enroll...\r\n\
Remove finger\r\n\
Place same finger again...\r\n\
R,S,5,0,Fingerprint enrolled successfully\r\n\
R,Y,0,0,Ready for next command\r\n";

fn bench_encode_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_response");
    group.throughput(Throughput::Elements(1));

    let plain = Response::success(5, 142, "Fingerprint matched");
    let escaped = Response::failure(0, "Sensor said: a, b\nand c");

    for (name, response) in [("plain", plain), ("escaped", escaped)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &response, |b, response| {
            b.iter(|| {
                let mut codec = LineCodec::new();
                let mut buffer = BytesMut::new();
                codec.encode(black_box(response.clone()), &mut buffer).unwrap();
                black_box(buffer);
            });
        });
    }

    group.finish();
}

fn bench_encode_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");
    group.throughput(Throughput::Elements(1));

    group.bench_function("verify", |b| {
        b.iter(|| {
            let mut codec = LineCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(Command::verify()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

fn bench_decode_transcript(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_transcript");
    group.throughput(Throughput::Bytes(ENROLL_TRANSCRIPT.len() as u64));

    group.bench_function("enroll", |b| {
        b.iter(|| {
            let mut codec = LineCodec::new();
            let mut buffer = BytesMut::from(ENROLL_TRANSCRIPT);
            let mut responses = 0;
            while let Some(line) = codec.decode(&mut buffer).unwrap() {
                if matches!(line, DeviceLine::Response(_)) {
                    responses += 1;
                }
            }
            black_box(responses);
        });
    });

    group.finish();
}

/// Bytes arriving a few at a time, as from a slow serial bridge.
fn bench_decode_partial_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_partial_streaming");
    group.throughput(Throughput::Bytes(ENROLL_TRANSCRIPT.len() as u64));

    for chunk in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut codec = LineCodec::new();
                let mut buffer = BytesMut::new();
                let mut lines = 0;
                for piece in ENROLL_TRANSCRIPT.chunks(chunk) {
                    buffer.extend_from_slice(piece);
                    while let Some(line) = codec.decode(&mut buffer).unwrap() {
                        black_box(line);
                        lines += 1;
                    }
                }
                black_box(lines);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_response,
    bench_encode_command,
    bench_decode_transcript,
    bench_decode_partial_streaming
);
criterion_main!(benches);
