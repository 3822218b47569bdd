//! Criterion benchmarks for u-netalign.
//!
//! Uses synthetic random graphs to measure the annealing inner loop and the
//! GO similarity build independent of any real network.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::sync::Arc;
use u_netalign::graph::{Graph, GraphPair};
use u_netalign::measures::{
    EdgeCorrectness, LocalMeasure, Measure, MeasureCombination, SymmetricSubstructureScore,
};
use u_netalign::random::create_rng;
use u_netalign::sana::{Budget, SanaConfig, SanaRunner, TemperatureMode};
use u_netalign::similarity::{GoSimilarity, SimilarityMatrix};

// ===========================================================================
// Synthetic inputs
// ===========================================================================

fn random_graph(name: &str, n: usize, avg_degree: usize, seed: u64) -> Graph {
    let mut rng = create_rng(seed);
    let edges: Vec<(usize, usize)> = (0..n * avg_degree / 2)
        .map(|_| (rng.random_range(0..n), rng.random_range(0..n)))
        .collect();
    let names = (0..n).map(|i| format!("{name}{i}")).collect();
    Graph::new(name, names, &edges).unwrap()
}

fn random_pair(n1: usize, n2: usize) -> GraphPair {
    GraphPair::new(random_graph("a", n1, 8, 1), random_graph("b", n2, 8, 2)).unwrap()
}

fn random_terms(n: usize, seed: u64) -> Vec<Vec<u32>> {
    let mut rng = create_rng(seed);
    (0..n)
        .map(|_| {
            let mut terms: Vec<u32> = (0..rng.random_range(0..12))
                .map(|_| rng.random_range(0..2_000))
                .collect();
            terms.sort_unstable();
            terms.dedup();
            terms
        })
        .collect()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_sana_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("sana_100k_iterations");
    group.sample_size(10);

    for &(n1, n2) in &[(200usize, 250usize), (1_000, 1_500)] {
        let pair = random_pair(n1, n2);
        let sims = SimilarityMatrix::from_fn(n1, n2, |i, j| ((i ^ j) % 7) as f32 / 6.0);
        let mut combo = MeasureCombination::new(&pair);
        combo.push(Measure::global(EdgeCorrectness), 0.4).unwrap();
        combo.push(Measure::global(SymmetricSubstructureScore), 0.4).unwrap();
        combo
            .push(LocalMeasure::new("sim", Arc::new(sims)).into(), 0.2)
            .unwrap();
        let config = SanaConfig::default()
            .with_t_initial(TemperatureMode::Explicit(1e-3))
            .with_t_decay(TemperatureMode::Explicit(10.0))
            .with_budget(Budget::Iterations(100_000))
            .with_seed(42);
        group.bench_with_input(
            BenchmarkId::new(format!("n{}_m{}", n1, n2), n1),
            &config,
            |b, config| {
                b.iter(|| {
                    let result = SanaRunner::run(black_box(&combo), &pair, black_box(config));
                    black_box(result)
                })
            },
        );
    }
    group.finish();
}

fn bench_go_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("go_similarity");
    group.sample_size(10);

    let go = GoSimilarity::new(vec![1.0], 1.0).unwrap();
    for &n in &[500usize, 2_000] {
        let g1 = random_terms(n, 3);
        let g2 = random_terms(n + n / 4, 4);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(g1, g2), |b, (g1, g2)| {
            b.iter(|| black_box(go.compute(black_box(g1), black_box(g2))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sana_iterations, bench_go_similarity);
criterion_main!(benches);
