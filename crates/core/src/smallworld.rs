//! The public index facade.
//!
//! [`SmallWorld`] bundles a [`Graph`] with the random source used to draw node
//! layers, validates parameters up front and exposes checked variants of the
//! graph's id-based operations.

use crate::hnsw::graph::{Graph, Parameters};
use crate::hnsw::node::Node;
use crate::hnsw::{DistanceStats, KnnResult};
use crate::random::{DefaultRandom, RandomSource};
use crate::storage::persistence;
use crate::{Result, SmallWorldError};
use std::fmt::{self, Write as _};
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

/// HNSW index over items of type `T` compared with distance function `F`.
///
/// `G` supplies the uniform draws that decide each new node's layer. With a
/// fixed seed the same items produce the same graph on every run.
pub struct SmallWorld<T, F, G = DefaultRandom> {
    graph: Graph<T, F>,
    generator: G,
}

impl<T, F, G> SmallWorld<T, F, G>
where
    F: Fn(&T, &T) -> f32,
    G: RandomSource,
{
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`SmallWorldError::InvalidParameter`] if `parameters` fail
    /// [`Parameters::validate`].
    pub fn new(distance: F, generator: G, parameters: Parameters) -> Result<Self> {
        parameters.validate()?;
        tracing::debug!(
            "Created index (m={}, m_max0={}, heuristic={:?}, cache={})",
            parameters.m,
            parameters.m_max0,
            parameters.neighbour_heuristic,
            parameters.enable_distance_cache_for_construction
        );
        Ok(Self {
            graph: Graph::new(distance, parameters),
            generator,
        })
    }

    /// Inserts `items` in order; returns the ids they were given.
    ///
    /// # Errors
    ///
    /// Returns [`SmallWorldError::CapacityExceeded`] if the index would grow
    /// past `u32::MAX` items. Nothing is inserted in that case.
    pub fn add_items(&mut self, items: Vec<T>) -> Result<Range<u32>> {
        self.graph.add_items(items, &mut self.generator)
    }

    /// The `k` approximate nearest items to `query`, closest first.
    pub fn knn_search(&self, query: &T, k: usize) -> Result<Vec<KnnResult>> {
        self.graph.knn_search(query, k)
    }

    /// Like [`knn_search`](Self::knn_search) with a per-call pool width.
    pub fn knn_search_with_ef(&self, query: &T, k: usize, ef: usize) -> Result<Vec<KnnResult>> {
        self.graph.knn_search_with_ef(query, k, ef)
    }

    /// Distance between two stored items through the construction cache.
    ///
    /// # Errors
    ///
    /// Returns [`SmallWorldError::IdOutOfRange`] if either id is unknown.
    pub fn get_distance(&mut self, from: u32, to: u32) -> Result<f32> {
        let len = self.graph.len();
        for id in [from, to] {
            if id as usize >= len {
                return Err(SmallWorldError::IdOutOfRange { id, len });
            }
        }
        Ok(self.graph.get_distance(from, to))
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn parameters(&self) -> &Parameters {
        self.graph.parameters()
    }

    pub fn items(&self) -> &[T] {
        self.graph.items()
    }

    pub fn item(&self, id: u32) -> Option<&T> {
        self.graph.items().get(id as usize)
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.graph.nodes().get(id as usize)
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.graph.entry_point()
    }

    pub fn top_layer(&self) -> Option<usize> {
        self.graph.top_layer()
    }

    pub fn distance_stats(&self) -> DistanceStats {
        self.graph.distance_stats()
    }

    /// `hits / calculations` of the construction cache; NaN before any
    /// item-to-item distance was evaluated.
    pub fn cache_hit_rate(&self) -> f32 {
        self.graph.cache_hit_rate()
    }

    pub fn graph(&self) -> &Graph<T, F> {
        &self.graph
    }

    /// Writes the graph structure (parameters and nodes) to `writer`.
    pub fn serialize_graph<W: Write>(&self, writer: W) -> Result<()> {
        persistence::write_graph(&self.graph, writer)
    }

    /// Rebuilds an index from bytes produced by
    /// [`serialize_graph`](Self::serialize_graph).
    ///
    /// `items` must be the same items, in the same order, that the serialized
    /// graph was built from. Reads exactly one snapshot, so `reader` can carry
    /// further data after it.
    pub fn deserialize_graph<Rd: Read>(
        items: Vec<T>,
        distance: F,
        generator: G,
        reader: Rd,
    ) -> Result<Self> {
        let graph = persistence::read_graph(reader, items, distance)?;
        Ok(Self { graph, generator })
    }

    /// Atomically saves the graph structure to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save_graph(&self.graph, path.as_ref())
    }

    /// Loads a graph saved with [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>, items: Vec<T>, distance: F, generator: G) -> Result<Self> {
        let graph = persistence::load_graph(path.as_ref(), items, distance)?;
        Ok(Self { graph, generator })
    }

    /// Deterministic text dump of the graph structure.
    ///
    /// Lists the parameters that shape the graph, the node count and entry
    /// point, then every layer from the top down with each participating node
    /// and its neighbor ids. Two graphs print the same iff they have the same
    /// structure.
    pub fn print(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_structure(&mut out);
        out
    }

    fn write_structure(&self, out: &mut String) -> fmt::Result {
        let p = self.graph.parameters();
        writeln!(
            out,
            "parameters: m={} m_max0={} level_lambda={} heuristic={:?} expand_best_selection={} keep_pruned_connections={} ef_construction={} ef_search={}",
            p.m,
            p.m_max0,
            p.level_lambda,
            p.neighbour_heuristic,
            p.expand_best_selection,
            p.keep_pruned_connections,
            p.ef_construction,
            p.ef_search
        )?;
        let nodes = self.graph.nodes();
        match self.graph.entry_point() {
            Some(ep) => writeln!(out, "nodes: {} entry_point: {}", nodes.len(), ep)?,
            None => writeln!(out, "nodes: {} entry_point: none", nodes.len())?,
        }

        let Some(top) = self.graph.top_layer() else {
            return Ok(());
        };
        for layer in (0..=top).rev() {
            writeln!(out, "layer {layer}:")?;
            for (id, node) in nodes.iter().enumerate() {
                if node.layer >= layer {
                    writeln!(out, "  {} -> {:?}", id, node.neighbors[layer])?;
                }
            }
        }
        Ok(())
    }
}
