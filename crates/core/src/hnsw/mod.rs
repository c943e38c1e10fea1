//! Hierarchical Navigable Small World (HNSW) graph engine.
//!
//! Nodes live in a dense arena indexed by item id; every node owns one
//! adjacency list per layer it participates in. Insertion and pruning work
//! purely through ids, so the recursive re-pruning of neighbors never needs
//! aliased mutable references.

/// Unordered-pair distance memo used during construction.
pub mod cache;
/// Distance kernels for `f32` vectors.
pub mod distance;
/// Graph core: parameters, node arena, items and distance evaluation.
pub mod graph;
/// Insertion: greedy descent, per-layer candidate search and linking.
pub mod insert;
/// Per-item node record.
pub mod node;
/// Layer search and the multi-layer k-NN query.
pub mod search;
/// Simple and heuristic neighbor selection.
pub mod select;
/// Epoch-stamped visited set.
pub mod visited;

pub use cache::{DistanceCache, DistanceStats};
pub use distance::DistanceMetric;
pub use graph::{Graph, NeighbourSelectionHeuristic, Parameters};
pub use node::Node;
pub use search::KnnResult;
pub use select::NeighbourSelection;
