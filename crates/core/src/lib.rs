//! # smallworld-core
//!
//! In-memory Hierarchical Navigable Small World (HNSW) graph for approximate
//! k-nearest-neighbor search over arbitrary items with a caller-supplied
//! distance function.
//!
//! The library is synchronous and free of async dependencies. Construction is
//! single-writer; queries take `&self` and may run from any number of threads.

/// Global configuration constants: defaults and snapshot framing.
pub mod config;
/// Error type shared by every fallible operation.
pub mod error;
/// HNSW graph engine: nodes, construction, selection, search and distances.
pub mod hnsw;
/// Injected randomness for layer assignment.
pub mod random;
/// Reader/writer-locked handle for interleaving inserts with queries.
pub mod shared;
/// The public index facade.
pub mod smallworld;
/// Storage layer: graph snapshots with atomic writes.
pub mod storage;

pub use error::{Result, SmallWorldError};
pub use hnsw::distance::{
    cosine_distance, euclidean_sq_distance, negative_dot_distance, normalize,
    unit_cosine_distance, DistanceMetric,
};
pub use hnsw::{DistanceStats, KnnResult, NeighbourSelectionHeuristic, Node, Parameters};
pub use random::{random_layer, DefaultRandom, RandomSource};
pub use shared::SharedSmallWorld;
pub use smallworld::SmallWorld;
