//! Graph core: parameters, node arena, item store and distance evaluation.
//!
//! [`Parameters`] defines the tuning knobs (M, Mmax0, level lambda, selection
//! heuristic, cache, ef). [`Graph`] owns the canonical state and routes every
//! item-to-item distance through [`DistanceEvaluator`], which applies the
//! construction cache and keeps the counters.

use crate::config;
use crate::hnsw::cache::{DistanceCache, DistanceStats};
use crate::hnsw::node::Node;
use crate::hnsw::select::NeighbourSelection;
use crate::random::{random_layer, RandomSource};
use crate::{Result, SmallWorldError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Instant;

/// Which neighbor-selection strategy wires new nodes into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighbourSelectionHeuristic {
    /// Keep the closest candidates.
    SelectSimple,
    /// Diversity-pruned selection (optionally expanded / refilled).
    SelectHeuristic,
}

/// Configuration parameters for a graph.
///
/// Persisted together with the node list, so a deserialized graph keeps
/// building and searching with the settings it was created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Degree bound on layers ≥ 1.
    pub m: usize,
    /// Degree bound on layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Layer distribution parameter, canonically `1 / ln(m)`.
    pub level_lambda: f64,
    pub neighbour_heuristic: NeighbourSelectionHeuristic,
    /// Heuristic only: also consider each candidate's neighbors before pruning.
    pub expand_best_selection: bool,
    /// Heuristic only: refill free slots with pruned candidates, closest first.
    pub keep_pruned_connections: bool,
    pub enable_distance_cache_for_construction: bool,
    /// Capacity hint for the item and node arenas.
    pub initial_items_size: usize,
    /// Capacity hint for the distance cache, capped at
    /// `initial_items_size * m_max0` entries.
    pub initial_distance_cache_size: usize,
    /// Candidate pool width while inserting.
    pub ef_construction: usize,
    /// Minimum candidate pool width while querying.
    pub ef_search: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            m: config::DEFAULT_M,
            m_max0: config::DEFAULT_M * 2,
            level_lambda: config::level_lambda_for(config::DEFAULT_M),
            neighbour_heuristic: NeighbourSelectionHeuristic::SelectSimple,
            expand_best_selection: false,
            keep_pruned_connections: true,
            enable_distance_cache_for_construction: true,
            initial_items_size: config::DEFAULT_INITIAL_ITEMS_SIZE,
            initial_distance_cache_size: config::DEFAULT_INITIAL_DISTANCE_CACHE_SIZE,
            ef_construction: config::DEFAULT_EF_CONSTRUCTION,
            ef_search: config::DEFAULT_EF_SEARCH,
        }
    }
}

impl Parameters {
    /// Defaults with degree `m`, `m_max0 = 2m` and `level_lambda = 1/ln(m)`.
    pub fn for_degree(m: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            level_lambda: config::level_lambda_for(m),
            ..Self::default()
        }
    }

    /// Degree bound at `layer`.
    #[inline]
    pub fn max_neighbours(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.m == 0 {
            return Err(SmallWorldError::InvalidParameter("m must be >= 1".into()));
        }
        if self.m_max0 == 0 {
            return Err(SmallWorldError::InvalidParameter(
                "m_max0 must be >= 1".into(),
            ));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(SmallWorldError::InvalidParameter(format!(
                "ef must be >= 1 (ef_construction={}, ef_search={})",
                self.ef_construction, self.ef_search
            )));
        }
        if !self.level_lambda.is_finite() || self.level_lambda <= 0.0 {
            return Err(SmallWorldError::InvalidParameter(format!(
                "level_lambda must be finite and > 0, got {}",
                self.level_lambda
            )));
        }
        Ok(())
    }
}

/// Item store plus the distance function, construction cache and counters.
///
/// Kept apart from the node arena so insertion can borrow nodes immutably
/// while evaluating distances mutably.
pub struct DistanceEvaluator<T, F> {
    pub(crate) items: Vec<T>,
    distance: F,
    cache: Option<DistanceCache>,
    calculations: u64,
    cache_hits: u64,
}

impl<T, F> DistanceEvaluator<T, F>
where
    F: Fn(&T, &T) -> f32,
{
    fn new(distance: F, params: &Parameters) -> Self {
        let cache = params
            .enable_distance_cache_for_construction
            .then(|| DistanceCache::with_capacity(initial_cache_capacity(params)));
        Self {
            items: Vec::with_capacity(params.initial_items_size),
            distance,
            cache,
            calculations: 0,
            cache_hits: 0,
        }
    }

    /// Distance between two stored items, memoized when the cache is enabled.
    ///
    /// Panics if either id is out of range.
    #[inline]
    pub fn between(&mut self, from: u32, to: u32) -> f32 {
        self.calculations += 1;
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.try_get(from, to)) {
            self.cache_hits += 1;
            return hit;
        }
        let d = (self.distance)(&self.items[from as usize], &self.items[to as usize]);
        if let Some(cache) = self.cache.as_mut() {
            cache.set(from, to, d);
        }
        d
    }

    /// Distance from an external query to a stored item. Never cached or counted.
    #[inline]
    pub fn to_item(&self, query: &T, id: u32) -> f32 {
        (self.distance)(query, &self.items[id as usize])
    }

    pub fn stats(&self) -> DistanceStats {
        DistanceStats {
            calculations: self.calculations,
            cache_hits: self.cache_hits,
            cache_entries: self.cache.as_ref().map_or(0, DistanceCache::len),
        }
    }
}

/// Cache pre-size: the configured hint, but no more than one entry per
/// layer-0 link slot of the expected items.
fn initial_cache_capacity(params: &Parameters) -> usize {
    params
        .initial_distance_cache_size
        .min(params.initial_items_size.saturating_mul(params.m_max0))
}

/// Canonical graph state. Node `i` describes item `i`.
pub struct Graph<T, F> {
    pub(crate) params: Parameters,
    pub(crate) nodes: Vec<Node>,
    pub(crate) eval: DistanceEvaluator<T, F>,
    pub(crate) selection: NeighbourSelection,
    pub(crate) entry_point: Option<u32>,
}

impl<T, F> Graph<T, F>
where
    F: Fn(&T, &T) -> f32,
{
    /// Creates an empty graph. `params` must already be validated.
    pub fn new(distance: F, params: Parameters) -> Self {
        let selection = NeighbourSelection::from_parameters(&params);
        Self {
            nodes: Vec::with_capacity(params.initial_items_size),
            eval: DistanceEvaluator::new(distance, &params),
            selection,
            entry_point: None,
            params,
        }
    }

    /// Rebuilds a graph from a persisted node list and the original items.
    ///
    /// The caller is responsible for having validated `nodes` against `items`.
    pub(crate) fn from_parts(
        distance: F,
        params: Parameters,
        items: Vec<T>,
        nodes: Vec<Node>,
    ) -> Self {
        let mut graph = Self::new(distance, params);
        graph.eval.items = items;
        graph.nodes = nodes;
        graph.entry_point = top_entry_point(&graph.nodes);
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn items(&self) -> &[T] {
        &self.eval.items
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// Highest layer in the graph, `None` when empty.
    pub fn top_layer(&self) -> Option<usize> {
        self.entry_point.map(|ep| self.nodes[ep as usize].layer)
    }

    /// Appends `items`, assigns each a random layer, then wires the new nodes
    /// in supply order. Returns the ids given to the new items.
    ///
    /// Fails with [`SmallWorldError::CapacityExceeded`], leaving the graph
    /// untouched, if the batch would need ids beyond `u32::MAX`.
    pub fn add_items<R>(&mut self, items: Vec<T>, generator: &mut R) -> Result<Range<u32>>
    where
        R: RandomSource + ?Sized,
    {
        let start = Instant::now();
        let count = items.len();
        let ids = id_range(self.nodes.len(), count)?;

        self.eval.items.extend(items);
        self.nodes.reserve(count);
        for _ in 0..count {
            let layer = random_layer(generator, self.params.level_lambda);
            self.nodes.push(Node::new(layer));
        }

        for id in ids.clone() {
            self.insert(id);
        }

        let stats = self.eval.stats();
        tracing::debug!(
            "Inserted {} items ({} total) in {:?}, top layer {:?}, cache hit rate {:.3}",
            count,
            self.nodes.len(),
            start.elapsed(),
            self.top_layer(),
            stats.hit_rate()
        );
        Ok(ids)
    }

    /// Item-to-item distance through the construction cache.
    ///
    /// Panics if either id is out of range.
    pub fn get_distance(&mut self, from: u32, to: u32) -> f32 {
        self.eval.between(from, to)
    }

    pub fn distance_stats(&self) -> DistanceStats {
        self.eval.stats()
    }

    /// `hits / calculations`; NaN before the first calculation.
    pub fn cache_hit_rate(&self) -> f32 {
        self.eval.stats().hit_rate()
    }
}

/// Ids for `count` items appended after `len` existing ones.
fn id_range(len: usize, count: usize) -> Result<Range<u32>> {
    match len.checked_add(count).map(u32::try_from) {
        Some(Ok(end)) => Ok(end - count as u32..end),
        _ => Err(SmallWorldError::CapacityExceeded {
            requested: len.saturating_add(count),
            limit: u32::MAX as usize,
        }),
    }
}

/// Last node holding the maximum layer, matching the promotion rule used
/// during insertion.
pub(crate) fn top_entry_point(nodes: &[Node]) -> Option<u32> {
    let mut best: Option<(usize, u32)> = None;
    for (id, node) in nodes.iter().enumerate() {
        if best.map_or(true, |(layer, _)| node.layer >= layer) {
            best = Some((node.layer, id as u32));
        }
    }
    best.map(|(_, id)| id)
}
