//! Layer search primitives and the multi-layer k-NN query.
//!
//! Both insertion and querying use the same two building blocks:
//! [`greedy_closest`] walks one layer towards the target, moving to the single
//! best neighbor until no neighbor improves, and [`search_layer`] runs a
//! bounded best-first search that keeps the `ef` closest nodes seen.
//! Distances are supplied by a closure so construction can route them through
//! the cache while queries compute them directly.

use crate::hnsw::graph::Graph;
use crate::hnsw::node::Node;
use crate::hnsw::select::by_distance_then_id;
use crate::hnsw::visited::VisitedSet;
use crate::{Result, SmallWorldError};
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

thread_local! {
    /// Per-thread visited set reused across queries.
    static QUERY_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::default());
}

/// One k-NN hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnResult {
    pub id: u32,
    pub distance: f32,
}

/// Heap entry ordered by `(distance, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    distance: OrderedFloat<f32>,
    id: u32,
}

impl Candidate {
    #[inline]
    fn new(distance: f32, id: u32) -> Self {
        Self {
            distance: OrderedFloat(distance),
            id,
        }
    }
}

/// Single-best greedy walk on `layer` starting from `start = (distance, id)`.
/// Returns the local minimum reached.
pub(crate) fn greedy_closest<D>(
    nodes: &[Node],
    start: (f32, u32),
    layer: usize,
    distance_to: &mut D,
) -> (f32, u32)
where
    D: FnMut(u32) -> f32,
{
    let mut current = start;
    loop {
        let mut next = current;
        for &neighbor in nodes[current.1 as usize].neighbors_at(layer) {
            let d = distance_to(neighbor);
            if d < next.0 {
                next = (d, neighbor);
            }
        }
        if next.1 == current.1 {
            return current;
        }
        current = next;
    }
}

/// Bounded best-first search on one layer.
///
/// `entry_points` carry their already known distances. Returns up to `ef`
/// nodes sorted ascending by `(distance, id)`. `visited` is reset on entry.
pub(crate) fn search_layer<D>(
    nodes: &[Node],
    entry_points: &[(f32, u32)],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    distance_to: &mut D,
) -> Vec<(f32, u32)>
where
    D: FnMut(u32) -> f32,
{
    visited.reset();
    let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef + 1);

    for &(dist, ep) in entry_points {
        if visited.mark(ep) {
            let c = Candidate::new(dist, ep);
            candidates.push(Reverse(c));
            results.push(c);
            if results.len() > ef {
                results.pop();
            }
        }
    }

    while let Some(Reverse(closest)) = candidates.pop() {
        // Closest unexpanded candidate is worse than the worst kept result
        if results.len() >= ef && results.peek().is_some_and(|worst| closest > *worst) {
            break;
        }

        for &neighbor in nodes[closest.id as usize].neighbors_at(layer) {
            if !visited.mark(neighbor) {
                continue;
            }
            let c = Candidate::new(distance_to(neighbor), neighbor);
            let should_add = results.len() < ef || results.peek().is_some_and(|worst| c < *worst);
            if should_add {
                candidates.push(Reverse(c));
                results.push(c);
                if results.len() > ef {
                    results.pop(); // remove worst
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|c| (c.distance.0, c.id))
        .collect()
}

impl<T, F> Graph<T, F>
where
    F: Fn(&T, &T) -> f32,
{
    /// Approximate k nearest neighbors of `query` with the configured `ef_search`.
    pub fn knn_search(&self, query: &T, k: usize) -> Result<Vec<KnnResult>> {
        self.knn_search_with_ef(query, k, self.params.ef_search)
    }

    /// Approximate k nearest neighbors with an explicit pool width.
    ///
    /// The effective width is `max(ef, k)`; if layer 0 yields fewer than `k`
    /// candidates the width is doubled up to the node count and the layer is
    /// searched again. Nodes that layer 0 cannot reach from the entry point
    /// (pruning may strip every inbound link) are then scored directly, so
    /// exactly `min(k, len)` results come back. Results are ascending by
    /// distance, ties by id.
    pub fn knn_search_with_ef(&self, query: &T, k: usize, ef: usize) -> Result<Vec<KnnResult>> {
        if k == 0 {
            return Err(SmallWorldError::InvalidParameter("k must be >= 1".into()));
        }
        if ef == 0 {
            return Err(SmallWorldError::InvalidParameter("ef must be >= 1".into()));
        }
        let entry_point = self.entry_point.ok_or(SmallWorldError::EmptyIndex)?;

        let mut distance_to = |id: u32| self.eval.to_item(query, id);

        // Descend from the top layer down to layer 1
        let top = self.nodes[entry_point as usize].layer;
        let mut current = (distance_to(entry_point), entry_point);
        for layer in (1..=top).rev() {
            current = greedy_closest(&self.nodes, current, layer, &mut distance_to);
        }

        let node_count = self.nodes.len();
        let mut ef = ef.max(k).min(node_count);
        let mut pool = QUERY_VISITED.with(|cell| -> Vec<(f32, u32)> {
            let mut visited = cell.borrow_mut();
            visited.ensure_len(node_count);
            loop {
                let found = search_layer(
                    &self.nodes,
                    std::slice::from_ref(&current),
                    ef,
                    0,
                    &mut visited,
                    &mut distance_to,
                );
                if found.len() >= k {
                    return found;
                }
                if ef >= node_count {
                    // Full-width pass: every marked node is already in `found`
                    return top_up_unreached(found, k, &mut visited, node_count, &mut distance_to);
                }
                ef = (ef * 2).min(node_count);
            }
        });

        pool.truncate(k);
        Ok(pool
            .into_iter()
            .map(|(distance, id)| KnnResult { id, distance })
            .collect())
    }
}

/// Scores the nodes `visited` never marked and merges them into `found`,
/// keeping the `k` best by `(distance, id)`.
fn top_up_unreached<D>(
    mut found: Vec<(f32, u32)>,
    k: usize,
    visited: &mut VisitedSet,
    node_count: usize,
    distance_to: &mut D,
) -> Vec<(f32, u32)>
where
    D: FnMut(u32) -> f32,
{
    let reached = found.len();
    for id in 0..node_count as u32 {
        if visited.mark(id) {
            found.push((distance_to(id), id));
        }
    }
    if found.len() > reached {
        tracing::debug!(
            "Layer 0 reached {} of {} nodes, scored {} directly",
            reached,
            node_count,
            found.len() - reached
        );
        found.sort_unstable_by(by_distance_then_id);
    }
    found.truncate(k);
    found
}
