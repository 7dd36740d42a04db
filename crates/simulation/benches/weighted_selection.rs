use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use erpbot_simulation::{choose_weighted, select_weighted, ActionKind, GeneratorConfig};

fn bench_weighted_selection(c: &mut Criterion) {
    let mix = GeneratorConfig::default().weights;
    let weight = |(_, w): &(ActionKind, u32)| f64::from(*w);

    c.bench_function("select_weighted_walk", |b| {
        b.iter(|| select_weighted(black_box(&mix), weight, black_box(99.999)))
    });

    let mut rng = StdRng::seed_from_u64(42);
    c.bench_function("choose_weighted_seeded", |b| {
        b.iter(|| choose_weighted(black_box(&mix), weight, &mut rng))
    });
}

criterion_group!(benches, bench_weighted_selection);
criterion_main!(benches);
