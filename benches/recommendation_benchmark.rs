use criterion::{criterion_group, criterion_main, Criterion};
use marketplace_receipts::models::{make_index, RecommendationSet, ScoredAddon};
use marketplace_receipts::services::recommendations::build_recommendations;
use std::hint::black_box;

/// Recommendation sets shaped like production: each add-on scores a few
/// hundred others, with heavy overlap between sets.
fn recommendation_sets(count: u64, scores_per_set: u64) -> Vec<RecommendationSet> {
    (0..count)
        .map(|addon_id| RecommendationSet {
            addon_id,
            scores: (0..scores_per_set)
                .map(|i| ScoredAddon {
                    addon_id: (addon_id * 7 + i * 13) % 5000,
                    score: 1.0 / (i + 1) as f64,
                })
                .collect(),
        })
        .collect()
}

fn benchmark_build_recommendations(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_recommendations");

    for installed in [5u64, 30, 100] {
        let ids: Vec<u64> = (0..installed).collect();
        let sets = recommendation_sets(installed, 300);

        group.bench_function(format!("{}_installed", installed), |b| {
            b.iter(|| build_recommendations(black_box(&ids), black_box(&sets)))
        });
    }

    group.finish();
}

fn benchmark_make_index(c: &mut Criterion) {
    let ids: Vec<u64> = (0..100).rev().collect();
    c.bench_function("make_index_100", |b| b.iter(|| make_index(black_box(&ids))));
}

criterion_group!(
    benches,
    benchmark_build_recommendations,
    benchmark_make_index
);
criterion_main!(benches);
