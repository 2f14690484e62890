use criterion::{criterion_group, criterion_main, Criterion};
use spux_core::balancer::{Adaptive, Balancer};
use spux_core::resampling::redraw;
use std::hint::black_box;

const WORKERS: usize = 16;
const PARTICLES: usize = 4096;

fn skewed_survivors(rng: &mut fastrand::Rng) -> Vec<usize> {
    // A few heavy particles cloned many times, the kind of round that
    // forces most of the traffic.
    (0..PARTICLES)
        .map(|_| {
            if rng.f64() < 0.7 {
                rng.usize(0..32)
            } else {
                rng.usize(0..PARTICLES)
            }
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let indices: Vec<usize> = (0..PARTICLES).collect();
    let ensembles = Adaptive.ensembles(&indices, WORKERS).unwrap();
    let mut rng = fastrand::Rng::with_seed(42);
    let survivors = skewed_survivors(&mut rng);

    c.bench_function("adaptive routings (4k particles, 16 workers)", |b| {
        b.iter(|| Adaptive.routings(black_box(&ensembles), black_box(&survivors)))
    });

    let (_, routings) = Adaptive.routings(&ensembles, &survivors).unwrap();
    c.bench_function("traffic + sources (4k particles)", |b| {
        b.iter(|| {
            let traffic = Adaptive.traffic(black_box(&routings));
            let sources = Adaptive.sources(black_box(&routings));
            (traffic, sources)
        })
    });

    let errors: Vec<f64> = (0..PARTICLES).map(|_| -rng.f64() * 50.0).collect();
    c.bench_function("redraw (4k particles)", |b| {
        b.iter(|| {
            let mut rng = fastrand::Rng::with_seed(7);
            redraw(black_box(&indices), black_box(&errors), PARTICLES, &mut rng)
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
