//! Wiring a freshly created node into the layered graph.
//!
//! The node already exists in the arena (with its layer drawn) but has no
//! edges and nothing links to it. Insertion greedily descends to the node's
//! top layer, gathers candidates per layer with `ef_construction`, lets the
//! active [`NeighbourSelection`](crate::hnsw::select::NeighbourSelection)
//! pick the edges, links both directions and re-prunes any neighbor that
//! overflows its degree bound.

use crate::hnsw::graph::Graph;
use crate::hnsw::search::{greedy_closest, search_layer};
use crate::hnsw::visited::VisitedSet;

impl<T, F> Graph<T, F>
where
    F: Fn(&T, &T) -> f32,
{
    /// Links node `node_id` into the graph.
    pub(crate) fn insert(&mut self, node_id: u32) {
        let level = self.nodes[node_id as usize].layer;

        // First node: nothing to link to
        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(node_id);
            return;
        };
        let top = self.nodes[entry_point as usize].layer;

        let Graph {
            params,
            nodes,
            eval,
            selection,
            ..
        } = self;

        // Phase 1: greedy single-best descent down to level + 1
        let mut current = (eval.between(node_id, entry_point), entry_point);
        for layer in (level + 1..=top).rev() {
            current = greedy_closest(nodes, current, layer, &mut |id| {
                eval.between(node_id, id)
            });
        }

        // Phase 2: best-first search per layer, select, link both ways
        let mut visited = VisitedSet::new(nodes.len());
        let mut layer_eps = vec![current];
        for layer in (0..=level.min(top)).rev() {
            let mut candidates = search_layer(
                nodes,
                &layer_eps,
                params.ef_construction,
                layer,
                &mut visited,
                &mut |id| eval.between(node_id, id),
            );
            candidates.retain(|&(_, id)| id != node_id);

            let bound = params.max_neighbours(layer);
            let selected = selection.select(nodes, eval, node_id, candidates.clone(), bound, layer);
            nodes[node_id as usize].neighbors[layer] = selected.iter().map(|&(_, id)| id).collect();

            // Phase 3: back-links, re-pruning neighbors pushed over the bound
            for &(_, neighbor_id) in &selected {
                let nid = neighbor_id as usize;
                nodes[nid].neighbors[layer].push(node_id);
                if nodes[nid].neighbors[layer].len() > bound {
                    let pool: Vec<(f32, u32)> = nodes[nid].neighbors[layer]
                        .iter()
                        .map(|&cid| (eval.between(neighbor_id, cid), cid))
                        .collect();
                    let kept = selection.select(nodes, eval, neighbor_id, pool, bound, layer);
                    tracing::trace!(
                        "Re-pruned node {} at layer {}: {} -> {} neighbors",
                        neighbor_id,
                        layer,
                        bound + 1,
                        kept.len()
                    );
                    nodes[nid].neighbors[layer] = kept.iter().map(|&(_, id)| id).collect();
                }
            }

            if !candidates.is_empty() {
                layer_eps = candidates;
            }
        }

        // Ties on the top layer go to the most recent node
        if level >= top {
            self.entry_point = Some(node_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hnsw::graph::{Graph, NeighbourSelectionHeuristic, Parameters};
    use crate::random::DefaultRandom;

    fn abs_distance(a: &f32, b: &f32) -> f32 {
        (a - b).abs()
    }

    fn spread(n: usize) -> Vec<f32> {
        // Deterministic, non-monotone insertion order
        (0..n).map(|i| ((i * 37) % n) as f32).collect()
    }

    fn assert_well_formed<F: Fn(&f32, &f32) -> f32>(graph: &Graph<f32, F>) {
        let params = graph.parameters();
        for (id, node) in graph.nodes().iter().enumerate() {
            assert_eq!(node.neighbors.len(), node.layer + 1);
            for (layer, list) in node.neighbors.iter().enumerate() {
                assert!(list.len() <= params.max_neighbours(layer));
                let mut sorted = list.clone();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(sorted.len(), list.len(), "duplicate neighbor at node {id}");
                for &n in list {
                    assert_ne!(n as usize, id, "self loop at node {id}");
                    assert!(graph.nodes()[n as usize].layer >= layer);
                }
            }
        }
    }

    #[test]
    fn test_second_node_links_both_ways() {
        let mut graph = Graph::new(abs_distance, Parameters::default());
        graph.add_items(vec![0.0, 1.0], &mut DefaultRandom::new(99)).unwrap();
        assert_eq!(graph.nodes()[0].neighbors[0], vec![1]);
        assert_eq!(graph.nodes()[1].neighbors[0], vec![0]);
    }

    #[test]
    fn test_degree_bounds_hold_simple() {
        let mut graph = Graph::new(abs_distance, Parameters::for_degree(3));
        graph.add_items(spread(400), &mut DefaultRandom::new(4)).unwrap();
        assert_well_formed(&graph);
    }

    #[test]
    fn test_degree_bounds_hold_heuristic() {
        for (expand, keep) in [(false, false), (true, false), (false, true), (true, true)] {
            let params = Parameters {
                neighbour_heuristic: NeighbourSelectionHeuristic::SelectHeuristic,
                expand_best_selection: expand,
                keep_pruned_connections: keep,
                ..Parameters::for_degree(3)
            };
            let mut graph = Graph::new(abs_distance, params);
            graph.add_items(spread(300), &mut DefaultRandom::new(5)).unwrap();
            assert_well_formed(&graph);
        }
    }

    #[test]
    fn test_insertion_is_deterministic_for_a_seed() {
        let build = || {
            let mut graph = Graph::new(abs_distance, Parameters::for_degree(4));
            graph.add_items(spread(250), &mut DefaultRandom::new(17)).unwrap();
            graph.nodes().to_vec()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_batches_match_single_batch() {
        let items = spread(120);
        let mut one = Graph::new(abs_distance, Parameters::default());
        one.add_items(items.clone(), &mut DefaultRandom::new(2)).unwrap();

        // Layers are drawn per batch before wiring, so split batches draw in
        // the same order as one big batch
        let mut two = Graph::new(abs_distance, Parameters::default());
        let mut rng = DefaultRandom::new(2);
        two.add_items(items[..60].to_vec(), &mut rng).unwrap();
        two.add_items(items[60..].to_vec(), &mut rng).unwrap();

        assert_eq!(one.nodes(), two.nodes());
        assert_eq!(one.entry_point(), two.entry_point());
    }
}
