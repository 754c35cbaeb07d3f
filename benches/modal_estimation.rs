//! Benchmarks for the analysis hot path: band-pass plus subspace
//! identification across the configured window/order grid.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oscimon::analysis::{BandpassFilter, ModalEstimator};
use std::f64::consts::PI;

const FS: f64 = 25.0;

fn decaying_mode(freq_hz: f64, damping_pct: f64, phase: f64, len: usize) -> Vec<f64> {
    let zeta = damping_pct / 100.0;
    let omega_n = 2.0 * PI * freq_hz;
    let omega_d = omega_n * (1.0 - zeta * zeta).sqrt();
    (0..len)
        .map(|i| {
            let t = i as f64 / FS;
            // Deterministic dither keeps the covariances full rank.
            let dither = 0.01 * ((i as f64 * 12.9898).sin() * 43758.5453).fract();
            (-zeta * omega_n * t).exp() * (omega_d * t + phase).sin() + dither
        })
        .collect()
}

fn bench_estimator(c: &mut Criterion) {
    let estimator = ModalEstimator::new(FS, [0.1, 2.5]);
    let mut group = c.benchmark_group("ssi_estimate");

    for &(window, order) in &[(1500usize, 10usize), (1500, 30), (2500, 20), (2500, 30)] {
        let channels = vec![
            decaying_mode(0.6, 5.0, 0.0, window),
            decaying_mode(0.6, 5.0, PI / 3.0, window),
        ];
        group.bench_with_input(
            BenchmarkId::new(format!("w{}", window), order),
            &order,
            |b, &order| {
                b.iter(|| {
                    let _ = black_box(estimator.estimate(black_box(&channels), order));
                })
            },
        );
    }
    group.finish();
}

fn bench_bandpass(c: &mut Criterion) {
    let mut filter = BandpassFilter::new(0.1, 2.5);
    let samples = decaying_mode(0.6, 5.0, 0.0, 2500);

    c.bench_function("bandpass_2500", |b| {
        b.iter(|| {
            let _ = black_box(filter.apply(black_box(&samples), FS));
        })
    });
}

criterion_group!(benches, bench_estimator, bench_bandpass);
criterion_main!(benches);
