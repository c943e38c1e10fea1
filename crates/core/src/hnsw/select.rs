//! Neighbor selection: which candidate edges a node keeps at a layer.
//!
//! Both strategies take a pool of `(distance_to_base, id)` candidates and
//! return at most `m` of them. They are used when a node is inserted and when
//! an existing node overflows its degree bound and has to be re-pruned.

use crate::hnsw::graph::{DistanceEvaluator, NeighbourSelectionHeuristic, Parameters};
use crate::hnsw::node::Node;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Active selection strategy, fixed at graph creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighbourSelection {
    /// Keep the `m` closest candidates.
    Simple,
    /// Keep candidates that are closer to the base than to any kept candidate
    /// (Algorithm 4 of the HNSW paper).
    Heuristic {
        expand_best_selection: bool,
        keep_pruned_connections: bool,
    },
}

/// Ascending distance, ties by ascending id.
#[inline]
pub(crate) fn by_distance_then_id(a: &(f32, u32), b: &(f32, u32)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

impl NeighbourSelection {
    pub fn from_parameters(params: &Parameters) -> Self {
        match params.neighbour_heuristic {
            NeighbourSelectionHeuristic::SelectSimple => NeighbourSelection::Simple,
            NeighbourSelectionHeuristic::SelectHeuristic => NeighbourSelection::Heuristic {
                expand_best_selection: params.expand_best_selection,
                keep_pruned_connections: params.keep_pruned_connections,
            },
        }
    }

    /// Picks at most `m` neighbors for `base` at `layer` out of `candidates`.
    ///
    /// `candidates` must not contain `base`. Distances between candidates are
    /// evaluated through `eval` so they hit the construction cache.
    pub(crate) fn select<T, F>(
        &self,
        nodes: &[Node],
        eval: &mut DistanceEvaluator<T, F>,
        base: u32,
        candidates: Vec<(f32, u32)>,
        m: usize,
        layer: usize,
    ) -> Vec<(f32, u32)>
    where
        F: Fn(&T, &T) -> f32,
    {
        match *self {
            NeighbourSelection::Simple => select_simple(candidates, m),
            NeighbourSelection::Heuristic {
                expand_best_selection,
                keep_pruned_connections,
            } => {
                let candidates = if expand_best_selection {
                    expand_candidates(nodes, eval, base, candidates, layer)
                } else {
                    candidates
                };
                select_heuristic(eval, candidates, m, keep_pruned_connections)
            }
        }
    }
}

fn select_simple(mut candidates: Vec<(f32, u32)>, m: usize) -> Vec<(f32, u32)> {
    candidates.sort_unstable_by(by_distance_then_id);
    candidates.truncate(m);
    candidates
}

/// Adds every candidate's `layer` neighbors (one hop) to the pool.
fn expand_candidates<T, F>(
    nodes: &[Node],
    eval: &mut DistanceEvaluator<T, F>,
    base: u32,
    mut candidates: Vec<(f32, u32)>,
    layer: usize,
) -> Vec<(f32, u32)>
where
    F: Fn(&T, &T) -> f32,
{
    let mut seen: HashSet<u32> = candidates.iter().map(|&(_, id)| id).collect();
    seen.insert(base);

    let originals: Vec<u32> = candidates.iter().map(|&(_, id)| id).collect();
    for cid in originals {
        for &hop in nodes[cid as usize].neighbors_at(layer) {
            if seen.insert(hop) {
                candidates.push((eval.between(base, hop), hop));
            }
        }
    }
    candidates
}

fn select_heuristic<T, F>(
    eval: &mut DistanceEvaluator<T, F>,
    mut candidates: Vec<(f32, u32)>,
    m: usize,
    keep_pruned_connections: bool,
) -> Vec<(f32, u32)>
where
    F: Fn(&T, &T) -> f32,
{
    candidates.sort_unstable_by(by_distance_then_id);

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    let mut discarded: Vec<(f32, u32)> = Vec::new();

    for (dist_to_base, cid) in candidates {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base < eval.between(cid, sid));
        if is_diverse {
            selected.push((dist_to_base, cid));
        } else {
            discarded.push((dist_to_base, cid));
        }
    }

    // `discarded` is already in ascending order
    if keep_pruned_connections {
        let free = m.saturating_sub(selected.len());
        selected.extend(discarded.into_iter().take(free));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::graph::Graph;

    fn abs_distance(a: &f32, b: &f32) -> f32 {
        (a - b).abs()
    }

    type LineGraph = Graph<f32, fn(&f32, &f32) -> f32>;

    /// Base node 0 at 0.0; candidates at 1.0, 1.1, -1.0, 5.0 and 0.5.
    fn line_graph(params: Parameters) -> LineGraph {
        let mut graph: LineGraph = Graph::new(abs_distance as fn(&f32, &f32) -> f32, params);
        graph.eval.items = vec![0.0, 1.0, 1.1, -1.0, 5.0, 0.5];
        graph.nodes = (0..6).map(|_| Node::new(0)).collect();
        graph
    }

    fn pool(graph: &mut LineGraph, ids: &[u32]) -> Vec<(f32, u32)> {
        ids.iter().map(|&id| (graph.get_distance(0, id), id)).collect()
    }

    fn ids(selected: &[(f32, u32)]) -> Vec<u32> {
        selected.iter().map(|&(_, id)| id).collect()
    }

    fn heuristic(expand: bool, keep: bool) -> Parameters {
        Parameters {
            neighbour_heuristic: NeighbourSelectionHeuristic::SelectHeuristic,
            expand_best_selection: expand,
            keep_pruned_connections: keep,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_from_parameters() {
        assert_eq!(
            NeighbourSelection::from_parameters(&Parameters::default()),
            NeighbourSelection::Simple
        );
        assert_eq!(
            NeighbourSelection::from_parameters(&heuristic(true, false)),
            NeighbourSelection::Heuristic {
                expand_best_selection: true,
                keep_pruned_connections: false
            }
        );
    }

    #[test]
    fn test_simple_keeps_closest_with_id_tiebreak() {
        let mut g = line_graph(Parameters::default());
        let candidates = pool(&mut g, &[4, 3, 2, 1]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 2, 0);
        // 1 and 3 are both at distance 1.0
        assert_eq!(ids(&selected), vec![1, 3]);
    }

    #[test]
    fn test_simple_with_small_pool_keeps_everything() {
        let mut g = line_graph(Parameters::default());
        let candidates = pool(&mut g, &[2]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 5, 0);
        assert_eq!(ids(&selected), vec![2]);
    }

    #[test]
    fn test_heuristic_prunes_clustered_candidates() {
        let mut g = line_graph(heuristic(false, false));
        let candidates = pool(&mut g, &[1, 2, 3, 4]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 3, 0);
        // 1.1 sits next to 1.0, 5.0 is closer to 1.0 than to the base
        assert_eq!(ids(&selected), vec![1, 3]);
    }

    #[test]
    fn test_heuristic_keep_pruned_refills_in_distance_order() {
        let mut g = line_graph(heuristic(false, true));
        let candidates = pool(&mut g, &[4, 2, 3, 1]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 3, 0);
        assert_eq!(ids(&selected), vec![1, 3, 2]);

        let candidates = pool(&mut g, &[4, 2, 3, 1]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 10, 0);
        assert_eq!(ids(&selected), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_heuristic_expansion_reaches_one_hop_neighbors() {
        let mut g = line_graph(heuristic(true, false));
        // node 1 knows node 5 (at 0.5) and the base itself
        g.nodes[1].neighbors[0] = vec![5, 0];
        let candidates = pool(&mut g, &[1, 2]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 1, 0);
        assert_eq!(ids(&selected), vec![5]);
    }

    #[test]
    fn test_expansion_never_returns_base_or_duplicates() {
        let mut g = line_graph(heuristic(true, true));
        g.nodes[1].neighbors[0] = vec![0, 2, 3];
        g.nodes[2].neighbors[0] = vec![1, 0, 3];
        let candidates = pool(&mut g, &[1, 2]);
        let selected = g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 10, 0);
        let mut got = ids(&selected);
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_heuristic_pairwise_distances_use_cache() {
        let mut g = line_graph(heuristic(false, true));
        let candidates = pool(&mut g, &[1, 2, 3, 4]);
        g.selection.select(&g.nodes, &mut g.eval, 0, candidates.clone(), 3, 0);
        let before = g.distance_stats();
        g.selection.select(&g.nodes, &mut g.eval, 0, candidates, 3, 0);
        let after = g.distance_stats();
        assert!(after.calculations > before.calculations);
        assert_eq!(
            after.cache_hits - before.cache_hits,
            after.calculations - before.calculations
        );
    }
}
