use brisk_core::{ImageView, IntegralImage, Keypoint};
use brisk_descriptor::{
    BriskExtractor, DescriptorExtractor, Discretization, ExtractorConfig, PatternTable, RingPattern,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Gradient plus ripple texture, so comparisons rarely tie
fn create_benchmark_image(width: usize, height: usize) -> Vec<u8> {
    let mut img = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f32, y as f32);
            let v = 90.0 + 40.0 * (fx * 0.11).sin() * (fy * 0.07).cos() + ((x * 31 + y * 17) % 23) as f32;
            img.push(v as u8);
        }
    }
    img
}

fn grid_keypoints(width: usize, height: usize, step: usize, size: f32) -> Vec<Keypoint> {
    let mut keypoints = Vec::new();
    for y in (step..height - step).step_by(step) {
        for x in (step..width - step).step_by(step) {
            keypoints.push(Keypoint::new(x as f32, y as f32, size));
        }
    }
    keypoints
}

/// Benchmark pattern table construction per discretization
fn bench_table_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_build");
    group.sample_size(10);

    for &(scales, rotations) in &[(16, 256), (64, 1024)] {
        let disc = Discretization {
            scales,
            rotations,
            scale_range: 30.0,
        };
        group.bench_with_input(
            BenchmarkId::new("standard_rings", format!("{}x{}", scales, rotations)),
            &disc,
            |b, &disc| b.iter(|| black_box(PatternTable::from_rings(&RingPattern::standard(1.0), disc).unwrap())),
        );
    }
    group.finish();
}

/// Benchmark descriptor extraction with and without orientation estimation
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let (width, height) = (640, 480);
    let img = create_benchmark_image(width, height);
    let view = ImageView::new(&img, width, height).unwrap();
    let integral = IntegralImage::compute(&view);

    for (name, config) in [
        ("rotation_invariant", ExtractorConfig::new()),
        ("upright", ExtractorConfig::upright_preset()),
    ] {
        let extractor = BriskExtractor::new(&config).unwrap();
        for &size in &[7.2f32, 20.0] {
            let keypoints = grid_keypoints(width, height, 32, size);
            group.bench_with_input(
                BenchmarkId::new(name, format!("{}kp_size{}", keypoints.len(), size)),
                &keypoints,
                |b, keypoints| {
                    b.iter(|| {
                        let mut kps = keypoints.clone();
                        black_box(
                            extractor
                                .compute_with_integral(view.into(), &integral, black_box(&mut kps))
                                .unwrap(),
                        )
                    })
                },
            );
        }
    }
    group.finish();
}

/// Benchmark extraction including integral image computation
fn bench_compute(c: &mut Criterion) {
    let (width, height) = (320, 240);
    let img = create_benchmark_image(width, height);
    let extractor = BriskExtractor::new(&ExtractorConfig::compact_preset()).unwrap();
    let keypoints = grid_keypoints(width, height, 24, 9.0);

    c.bench_function("compute_320x240", |b| {
        b.iter(|| {
            let view = ImageView::new(black_box(&img), width, height).unwrap();
            let mut kps = keypoints.clone();
            black_box(extractor.compute(view.into(), &mut kps).unwrap())
        })
    });
}

criterion_group!(benches, bench_table_build, bench_extraction, bench_compute);
criterion_main!(benches);
