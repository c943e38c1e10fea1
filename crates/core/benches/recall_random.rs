//! Recall benchmark: synthetic unit vectors, unit-cosine distance.
//! Measures build time, QPS and Recall@10 against brute-force ground truth.
//!
//! Usage: cargo bench --bench recall_random

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallworld_core::{
    normalize, unit_cosine_distance, DefaultRandom, NeighbourSelectionHeuristic, Parameters,
    SmallWorld,
};
use std::time::Instant;

const COUNT: usize = 20_000;
const QUERIES: usize = 500;
const DIMENSION: usize = 32;
const K: usize = 10;

#[allow(clippy::ptr_arg)]
fn unit_cosine(a: &Vec<f32>, b: &Vec<f32>) -> f32 {
    unit_cosine_distance(a, b)
}

fn random_unit_vectors(rng: &mut StdRng, count: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| {
            let mut v: Vec<f32> = (0..DIMENSION).map(|_| rng.gen_range(-1.0..1.0)).collect();
            normalize(&mut v);
            v
        })
        .collect()
}

/// Exact top-K ids for every query.
fn ground_truth(items: &[Vec<f32>], queries: &[Vec<f32>]) -> Vec<Vec<u32>> {
    queries
        .iter()
        .map(|q| {
            let mut scored: Vec<(f32, u32)> = items
                .iter()
                .enumerate()
                .map(|(i, v)| (unit_cosine_distance(q, v), i as u32))
                .collect();
            scored.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            scored.iter().take(K).map(|&(_, id)| id).collect()
        })
        .collect()
}

fn run(label: &str, params: Parameters, items: &[Vec<f32>], queries: &[Vec<f32>], truth: &[Vec<u32>]) {
    let t0 = Instant::now();
    let mut world = SmallWorld::new(
        unit_cosine as fn(&Vec<f32>, &Vec<f32>) -> f32,
        DefaultRandom::new(42),
        params,
    )
    .unwrap();
    world.add_items(items.to_vec()).unwrap();
    let build_time = t0.elapsed();
    println!(
        "[{label}] build: {:.2}s ({:.0} items/s), top layer {:?}, cache hit rate {:.3}",
        build_time.as_secs_f64(),
        items.len() as f64 / build_time.as_secs_f64(),
        world.top_layer(),
        world.cache_hit_rate()
    );

    for ef in [16, 32, 64, 128, 256] {
        let t0 = Instant::now();
        let mut hits_total = 0usize;
        for (q, expected) in queries.iter().zip(truth) {
            let hits = world.knn_search_with_ef(q, K, ef).unwrap();
            hits_total += hits.iter().filter(|h| expected.contains(&h.id)).count();
        }
        let elapsed = t0.elapsed();
        let recall = hits_total as f64 / (queries.len() * K) as f64;
        let qps = queries.len() as f64 / elapsed.as_secs_f64();
        println!("[{label}] ef={ef:>4}  recall@{K}={recall:.4}  qps={qps:.0}");
    }
}

fn main() {
    let mut rng = StdRng::seed_from_u64(7);
    let items = random_unit_vectors(&mut rng, COUNT);
    let queries = random_unit_vectors(&mut rng, QUERIES);

    println!("Computing ground truth for {QUERIES} queries over {COUNT} vectors (dim {DIMENSION})...");
    let truth = ground_truth(&items, &queries);

    run("simple", Parameters::for_degree(16), &items, &queries, &truth);
    run(
        "heuristic",
        Parameters {
            neighbour_heuristic: NeighbourSelectionHeuristic::SelectHeuristic,
            ..Parameters::for_degree(16)
        },
        &items,
        &queries,
        &truth,
    );
}
