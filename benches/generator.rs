//! Criterion benchmarks for matrix and frame generation.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use neurofeed::{build_frame, generate_with, Activation, AreaLayout, GenerationConfig, Prng, SimulationConfig};

/// Benchmark a single matrix at growing sizes with the default activation.
fn bench_matrix_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_size");

    for side in [8usize, 25, 64, 128, 256].iter() {
        group.throughput(Throughput::Elements((side * side) as u64));
        group.bench_with_input(BenchmarkId::new("random_count", side), side, |b, &side| {
            let cfg = GenerationConfig::new(side, side);
            let mut rng = Prng::new(42);
            b.iter(|| black_box(generate_with(&cfg, &mut rng).map(|m| m.total())))
        });
    }

    group.finish();
}

/// Dense activation stresses the sampler rather than the allocation.
fn bench_dense_activation(c: &mut Criterion) {
    let mut group = c.benchmark_group("activation");

    for fraction in [0.01f64, 0.1, 0.5, 1.0].iter() {
        group.bench_with_input(BenchmarkId::new("fraction", fraction), fraction, |b, &f| {
            let cfg = GenerationConfig::new(64, 64).with_activation(Activation::Fraction(f));
            let mut rng = Prng::new(7);
            b.iter(|| black_box(generate_with(&cfg, &mut rng).map(|m| m.active_count())))
        });
    }

    group.finish();
}

/// One full tick: every area of the default layout.
fn bench_frame(c: &mut Criterion) {
    let layout = AreaLayout::default();
    let cfg = SimulationConfig::default();
    let mut rng = Prng::new(1);
    c.bench_function("frame_default_layout", |b| {
        b.iter(|| black_box(build_frame(&layout, &cfg, 1, &mut rng).map(|f| f.total_activity)))
    });
}

criterion_group!(benches, bench_matrix_sizes, bench_dense_activation, bench_frame);
criterion_main!(benches);
