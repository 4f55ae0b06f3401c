//! Performance benchmarks for grouping and engine ticks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use match_hall::config::MatchmakingConfig;
use match_hall::matchmaking::{group_by_rank, group_random, MatchmakingEngine, RankGroup};
use match_hall::rank::RankTable;
use match_hall::{InMemoryDirectory, InMemoryRegistry};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

fn waiting(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("player_{}", i)).collect()
}

fn bench_group_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_random");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| black_box(group_random(waiting(count), 4, &mut rng)))
        });
    }
    group.finish();
}

fn bench_group_by_rank(c: &mut Criterion) {
    let table = RankTable::new(
        vec!["Bronze".into(), "Silver".into(), "Gold".into()],
        vec![0, 100, 300],
    )
    .unwrap();
    let groups = vec![
        RankGroup {
            name: "low".to_string(),
            start_tier: "Bronze".to_string(),
            end_tier: "Silver".to_string(),
        },
        RankGroup {
            name: "high".to_string(),
            start_tier: "Silver".to_string(),
            end_tier: "Gold".to_string(),
        },
    ];

    let mut group = c.benchmark_group("group_by_rank");
    for count in [100usize, 1_000, 10_000] {
        let scores: HashMap<String, i64> = waiting(count)
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, (i % 400) as i64))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                black_box(group_by_rank(
                    waiting(count),
                    &groups,
                    &table,
                    |p| scores.get(p).copied().unwrap_or(0),
                    4,
                ))
            })
        });
    }
    group.finish();
}

fn bench_engine_cycle(c: &mut Criterion) {
    c.bench_function("engine_join_and_group_200", |b| {
        b.iter(|| {
            let mut engine = MatchmakingEngine::new(
                "Bench",
                MatchmakingConfig::with_sizes(4, 2),
                None,
                Arc::new(InMemoryRegistry::new()),
                Arc::new(InMemoryDirectory::new()),
            )
            .unwrap()
            .with_seed(9);

            for participant in waiting(200) {
                let _ = engine.join(&participant);
            }
            for tick in 1..=20 {
                engine.tick(tick);
            }
            black_box(engine.stats())
        })
    });
}

criterion_group!(
    benches,
    bench_group_random,
    bench_group_by_rank,
    bench_engine_cycle
);
criterion_main!(benches);
