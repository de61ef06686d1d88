//! 블록 체크섬 벤치마크

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use blocksync::block::{compare_checksums, compute_checksums, BlockLayout};

fn bench_compute_checksums(c: &mut Criterion) {
    let data: Vec<u8> = (0..16 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let mut group = c.benchmark_group("compute_checksums");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for block_size in [64 * 1024, 4 * 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(block_size), &block_size, |b, &bs| {
            let layout = BlockLayout::new(data.len() as u64, bs);
            b.iter(|| {
                let mut cursor = Cursor::new(data.as_slice());
                black_box(compute_checksums(&mut cursor, layout).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_compare_checksums(c: &mut Criterion) {
    let local: Vec<u32> = (0..262_144).collect();
    let mut peer = local.clone();
    for i in (0..peer.len()).step_by(97) {
        peer[i] ^= 1;
    }

    c.bench_function("compare_checksums_256k", |b| {
        b.iter(|| black_box(compare_checksums(&local, &peer)))
    });
}

criterion_group!(benches, bench_compute_checksums, bench_compare_checksums);
criterion_main!(benches);
