use brisk_core::Descriptors;
use brisk_match::{simd, Backend, BruteForceMatcher, DescriptorMatcher};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Deterministic pseudo-random descriptor rows
fn create_descriptors(rows: usize, width: usize, seed: u32) -> Descriptors {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let data = (0..rows * width)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    Descriptors::from_vec(width, data).unwrap()
}

/// Benchmark popcount backends over common descriptor widths
fn bench_hamming(c: &mut Criterion) {
    let mut group = c.benchmark_group("hamming");
    for &width in &[16usize, 48, 64, 512] {
        let a = create_descriptors(1, width, 1);
        let b = create_descriptors(1, width, 2);

        group.bench_with_input(BenchmarkId::new("scalar", width), &width, |bench, _| {
            bench.iter(|| black_box(simd::popcount_scalar(black_box(a.row(0)), black_box(b.row(0)))))
        });

        let backend = Backend::detect();
        group.bench_with_input(BenchmarkId::new(backend.name(), width), &width, |bench, _| {
            bench.iter(|| black_box(backend.distance(black_box(a.row(0)), black_box(b.row(0))).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark brute-force k-NN and radius search
fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    group.sample_size(20);
    let width = 64;

    for &(queries, train_rows) in &[(100, 1000), (500, 2000)] {
        let query = create_descriptors(queries, width, 7);
        let mut matcher = BruteForceMatcher::new(width).unwrap();
        matcher.add(create_descriptors(train_rows, width, 11));

        let label = format!("{}x{}", queries, train_rows);
        group.bench_with_input(BenchmarkId::new("knn_k2", &label), &query, |b, query| {
            b.iter(|| black_box(matcher.knn_match(black_box(query), 2, None, false).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("radius_200", &label), &query, |b, query| {
            b.iter(|| black_box(matcher.radius_match(black_box(query), 200.0, None, true).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_hamming, bench_matching);
criterion_main!(benches);
