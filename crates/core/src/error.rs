//! Error type shared by graph construction, search and persistence.

use thiserror::Error;

/// Errors returned by the public smallworld API.
///
/// Construction only fails when ids would run past `u32::MAX`; the other
/// errors come from bad arguments and from persistence.
#[derive(Debug, Error)]
pub enum SmallWorldError {
    /// Invalid configuration value or call argument (`k == 0`, `ef == 0`, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Query issued against a graph with no items.
    #[error("index is empty")]
    EmptyIndex,

    /// Item id outside `0..len`.
    #[error("item id {id} out of range (graph holds {len} items)")]
    IdOutOfRange { id: u32, len: usize },

    /// Appending would assign ids beyond `u32::MAX`.
    #[error("cannot hold {requested} items, ids are limited to {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    /// Persisted graph is malformed or inconsistent with the supplied items.
    #[error("graph decode failed: {0}")]
    Decode(String),

    /// CRC32 footer does not match the payload.
    #[error("graph checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Encoding the graph payload failed.
    #[error("graph encode failed: {0}")]
    Encode(String),

    /// Underlying reader/writer or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SmallWorldError>;
