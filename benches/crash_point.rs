//! Crash point and tick benchmarks.

use std::num::NonZeroU32;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crash_server::{
    config::GameConfig,
    core::{crash_point::roll_from_seed, curve::multiplier_at, rng::DeterministicRng},
    CrashPointGenerator, MatchEngine, RecordingSink,
};

fn bench_roll(c: &mut Criterion) {
    let crash_per = NonZeroU32::new(20).unwrap();
    let seed = [7u8; 16];
    c.bench_function("roll_from_seed", |b| {
        b.iter(|| roll_from_seed(black_box(&seed), crash_per))
    });

    let mut generator = CrashPointGenerator::new(DeterministicRng::new(1));
    c.bench_function("generate", |b| b.iter(|| generator.generate(crash_per)));
}

fn bench_curve(c: &mut Criterion) {
    c.bench_function("multiplier_at", |b| b.iter(|| multiplier_at(black_box(12.5))));
}

fn bench_tick(c: &mut Criterion) {
    let mut engine = MatchEngine::new(
        GameConfig::default(),
        DeterministicRng::new(1),
        RecordingSink::new(),
    );
    let dt = engine.tick_dt();
    c.bench_function("engine_tick", |b| {
        b.iter(|| {
            engine.tick(dt);
            engine.sink_mut().clear();
        })
    });
}

criterion_group!(benches, bench_roll, bench_curve, bench_tick);
criterion_main!(benches);
