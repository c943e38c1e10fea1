//! Global configuration constants for smallworld.
//!
//! Default graph parameters and persistence framing constants are defined here.
//! These are compile-time defaults; runtime configuration is carried by
//! [`Parameters`](crate::hnsw::Parameters) and, for the binary, by CLI arguments.

/// Default number of bidirectional links per node on layers ≥ 1.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 5–48. Default: 10.
pub const DEFAULT_M: usize = 10;

/// Default ef parameter during graph construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during search.
///
/// The effective pool width of a query is `max(ef_search, k)`.
pub const DEFAULT_EF_SEARCH: usize = 50;

/// Default capacity hint for the item and node arenas.
pub const DEFAULT_INITIAL_ITEMS_SIZE: usize = 1024;

/// Default capacity hint for the construction distance cache (entries).
pub const DEFAULT_INITIAL_DISTANCE_CACHE_SIZE: usize = 1024 * 1024;

/// Seed used by [`DefaultRandom::default`](crate::random::DefaultRandom).
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Magic bytes written between the graph payload and its CRC32 footer.
pub const GRAPH_SNAPSHOT_MAGIC: &[u8; 4] = b"SWG1";

/// Extension given to snapshot files saved without one.
pub const GRAPH_FILE_EXTENSION: &str = "swg";

/// Level generation multiplier for degree `m`: `1 / ln(m)`.
///
/// Degrees below 2 are treated as 2 so the multiplier stays finite.
pub fn level_lambda_for(m: usize) -> f64 {
    1.0 / (m.max(2) as f64).ln()
}
