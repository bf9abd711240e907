use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kioku_core::{MemoryConfig, MemoryState, rank_candidates};

fn bench_utility_scan(c: &mut Criterion) {
    let config = MemoryConfig::default();
    let now = 500.0;
    let atoms: Vec<(i64, MemoryState, f64)> = (0..10_000)
        .map(|i| {
            let last_relearn = (i % 400) as f64;
            let last_refresh = last_relearn + (i % 37) as f64;
            (
                i,
                MemoryState::new(Some(last_refresh), Some(last_relearn)),
                (i % 50 + 1) as f64,
            )
        })
        .collect();

    c.bench_function("utility_rank_10k", |b| {
        b.iter(|| {
            let mut candidates: Vec<(f64, i64, i64)> = atoms
                .iter()
                .filter_map(|(packed, state, frequency)| {
                    state
                        .review_utility(black_box(now), *frequency, 10_000.0, &config)
                        .map(|u| (u, *packed, *packed))
                })
                .collect();
            rank_candidates(&mut candidates);
            candidates.first().map(|c| c.1)
        })
    });
}

criterion_group!(benches, bench_utility_scan);
criterion_main!(benches);
