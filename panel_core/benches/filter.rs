use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use panel_core::config::InjectorConfig;
use panel_core::filter::{FilterKind, FilterState};
use panel_core::generator::{RandNoise, SignalGenerator};

// Raw samples around 74 with ±5 uniform noise, reproducible
fn synth_trace(n: usize, seed: u64) -> Vec<f64> {
    let cfg = InjectorConfig::default();
    let mut generator = SignalGenerator::new(RandNoise::seeded(seed));
    (0..n).map(|_| generator.tick(&cfg)).collect()
}

fn bench_filters(c: &mut Criterion) {
    let trace = synth_trace(4096, 7);

    for kind in [FilterKind::None, FilterKind::MovingAverage, FilterKind::Kalman] {
        c.bench_function(&format!("filter_{}_4096", kind.as_str()), |b| {
            b.iter_batched(
                || FilterState::fresh(kind, 74.0, 5.0),
                |mut state| {
                    let mut acc = 0.0;
                    for &x in &trace {
                        acc += state.apply(black_box(x));
                    }
                    black_box(acc)
                },
                BatchSize::SmallInput,
            );
        });
    }
}

fn bench_generator(c: &mut Criterion) {
    let cfg = InjectorConfig::default();
    c.bench_function("generator_tick", |b| {
        let mut generator = SignalGenerator::new(RandNoise::seeded(1));
        b.iter(|| black_box(generator.tick(black_box(&cfg))));
    });
}

criterion_group!(benches, bench_filters, bench_generator);
criterion_main!(benches);
