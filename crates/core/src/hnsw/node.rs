//! Per-item graph record.

use serde::{Deserialize, Serialize};

/// One node per item, sharing the item's id.
///
/// `neighbors[l]` holds the adjacency list at layer `l` for `l in 0..=layer`.
/// Lists are kept in the order the selection algorithm returned them
/// (ascending distance to this node at the time of the last rewire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub layer: usize,
    pub neighbors: Vec<Vec<u32>>,
}

impl Node {
    /// Creates an unlinked node with empty adjacency lists on layers `0..=layer`.
    pub fn new(layer: usize) -> Self {
        Self {
            layer,
            neighbors: vec![Vec::new(); layer + 1],
        }
    }

    /// Neighbors at `layer`, empty above this node's top layer.
    #[inline]
    pub fn neighbors_at(&self, layer: usize) -> &[u32] {
        match self.neighbors.get(layer) {
            Some(list) => list,
            None => &[],
        }
    }
}
