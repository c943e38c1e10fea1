//! Storage layer: checksummed graph snapshots.
//!
//! Only the graph structure is persisted. Items stay with the application and
//! are handed back on load, so a snapshot is small and independent of `T`.

/// Snapshot encode/decode and atomic file save/load.
pub mod persistence;

pub use persistence::{load_graph, read_graph, save_graph, validate_snapshot, write_graph};
