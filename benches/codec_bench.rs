//! Benchmark for the storage envelope codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mintmark::storage::codec;

fn create_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

fn bench_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in [256, 4 * 1024, 64 * 1024].iter() {
        let payload = create_payload(*size);
        let encoded = codec::encode(&payload).unwrap().encoded;

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| black_box(codec::encode(black_box(payload)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| black_box(codec::decode(black_box(encoded)).unwrap()));
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let payload = create_payload(64 * 1024);

    c.bench_function("checksum_64k", |b| {
        b.iter(|| black_box(codec::checksum(black_box(&payload))));
    });
}

criterion_group!(benches, bench_encode_decode, bench_checksum);
criterion_main!(benches);
