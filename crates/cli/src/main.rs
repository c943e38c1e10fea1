use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallworld_core::{
    config, normalize, unit_cosine_distance, DefaultRandom, NeighbourSelectionHeuristic,
    Parameters, SmallWorld,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

type Distance = fn(&Vec<f32>, &Vec<f32>) -> f32;
type Index = SmallWorld<Vec<f32>, Distance>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Heuristic {
    Simple,
    Heuristic,
}

#[derive(Parser)]
#[command(
    name = "smallworld",
    about = "Build, evaluate and persist an HNSW graph over random unit vectors"
)]
struct Args {
    /// Number of vectors to index
    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Vector dimension
    #[arg(long, default_value_t = 32)]
    dimension: usize,

    /// Degree bound on layers >= 1 (layer 0 uses 2*m)
    #[arg(long, default_value_t = config::DEFAULT_M)]
    m: usize,

    /// Neighbor selection strategy
    #[arg(long, value_enum, default_value_t = Heuristic::Simple)]
    heuristic: Heuristic,

    /// Heuristic only: expand candidates with their neighbors
    #[arg(long, default_value_t = false)]
    expand_best_selection: bool,

    /// Heuristic only: do not refill free slots with pruned candidates
    #[arg(long, default_value_t = false)]
    no_keep_pruned: bool,

    /// Disable the construction distance cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    #[arg(long, default_value_t = config::DEFAULT_EF_CONSTRUCTION)]
    ef_construction: usize,

    #[arg(long, default_value_t = config::DEFAULT_EF_SEARCH)]
    ef_search: usize,

    /// Neighbors returned per query
    #[arg(long, default_value_t = 10)]
    k: usize,

    /// Seed for both the data and the layer assignment
    #[arg(long, default_value_t = config::DEFAULT_RANDOM_SEED)]
    seed: u64,

    /// Save the graph here after building (".swg" is appended if no extension)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Load the graph from here instead of building it
    #[arg(long)]
    load: Option<PathBuf>,

    /// Query threads for the evaluation pass
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

#[allow(clippy::ptr_arg)]
fn unit_cosine(a: &Vec<f32>, b: &Vec<f32>) -> f32 {
    unit_cosine_distance(a, b)
}

fn random_unit_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut v: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
            normalize(&mut v);
            v
        })
        .collect()
}

fn parameters(args: &Args) -> Parameters {
    Parameters {
        neighbour_heuristic: match args.heuristic {
            Heuristic::Simple => NeighbourSelectionHeuristic::SelectSimple,
            Heuristic::Heuristic => NeighbourSelectionHeuristic::SelectHeuristic,
        },
        expand_best_selection: args.expand_best_selection,
        keep_pruned_connections: !args.no_keep_pruned,
        enable_distance_cache_for_construction: !args.no_cache,
        initial_items_size: args.count,
        ef_construction: args.ef_construction,
        ef_search: args.ef_search,
        ..Parameters::for_degree(args.m)
    }
}

/// Queries every item against the index and counts how often it finds itself first.
fn evaluate(index: &Index, items: &[Vec<f32>], k: usize, threads: usize) -> Result<usize, String> {
    let next = AtomicUsize::new(0);
    let found = AtomicUsize::new(0);

    std::thread::scope(|s| -> Result<(), String> {
        let workers: Vec<_> = (0..threads.max(1))
            .map(|_| {
                s.spawn(|| -> Result<(), String> {
                    loop {
                        let id = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(id) else {
                            return Ok(());
                        };
                        let hits = index.knn_search(item, k).map_err(|e| e.to_string())?;
                        if hits.first().is_some_and(|h| h.id as usize == id) {
                            found.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker
                .join()
                .map_err(|_| "query worker panicked".to_string())??;
        }
        Ok(())
    })?;

    Ok(found.into_inner())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "smallworld_cli=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "smallworld_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();

    if args.count == 0 || args.dimension == 0 {
        eprintln!("Error: count and dimension must be > 0");
        std::process::exit(1);
    }
    if !matches!(args.heuristic, Heuristic::Heuristic)
        && (args.expand_best_selection || args.no_keep_pruned)
    {
        tracing::warn!("--expand-best-selection and --no-keep-pruned only apply to --heuristic heuristic");
    }

    let items = random_unit_vectors(args.count, args.dimension, args.seed);
    let generator = DefaultRandom::new(args.seed);

    let index = match &args.load {
        Some(path) => {
            let index = Index::load(path, items.clone(), unit_cosine as Distance, generator)?;
            tracing::info!(
                "Loaded {} nodes from {:?} (top layer {:?})",
                index.len(),
                path,
                index.top_layer()
            );
            index
        }
        None => {
            let mut index = Index::new(unit_cosine as Distance, generator, parameters(&args))?;
            let t0 = Instant::now();
            index.add_items(items.clone())?;
            let elapsed = t0.elapsed();
            let stats = index.distance_stats();
            tracing::info!(
                "Built graph: {} nodes in {:.2}s, top layer {:?}, {} distance calculations, cache hit rate {:.3}",
                index.len(),
                elapsed.as_secs_f64(),
                index.top_layer(),
                stats.calculations,
                index.cache_hit_rate()
            );
            index
        }
    };

    let t0 = Instant::now();
    let found = evaluate(&index, &items, args.k, args.threads)?;
    let elapsed = t0.elapsed();
    tracing::info!(
        "Self-recall {}/{} ({:.4}), {:.0} queries/s on {} threads (k={}, ef_search={})",
        found,
        items.len(),
        found as f64 / items.len() as f64,
        items.len() as f64 / elapsed.as_secs_f64(),
        args.threads.max(1),
        args.k,
        index.parameters().ef_search
    );

    if let Some(path) = &args.save {
        let path = if path.extension().is_none() {
            path.with_extension(config::GRAPH_FILE_EXTENSION)
        } else {
            path.clone()
        };
        index.save(&path)?;
        let reloaded = Index::load(
            &path,
            items,
            unit_cosine as Distance,
            DefaultRandom::new(args.seed),
        )?;
        if reloaded.print() != index.print() {
            return Err(format!("graph reloaded from {path:?} differs from the saved graph").into());
        }
        tracing::info!("Verified snapshot {:?}", path);
    }

    Ok(())
}
