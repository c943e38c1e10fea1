//! Construction-time memoization of pairwise item distances.
//!
//! Neighbor selection evaluates the same pairs repeatedly (candidate vs every
//! accepted neighbor, then again when an over-full neighbor is re-pruned).
//! The cache keys on the unordered id pair, so `(a, b)` and `(b, a)` share an
//! entry; this relies on the distance function being symmetric.

use std::collections::HashMap;

/// Unordered-pair distance memo. Grows without eviction.
#[derive(Debug, Default)]
pub struct DistanceCache {
    values: HashMap<u64, f32>,
}

#[inline]
fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (u64::from(lo) << 32) | u64::from(hi)
}

impl DistanceCache {
    /// Creates an empty cache pre-sized for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: HashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn try_get(&self, a: u32, b: u32) -> Option<f32> {
        self.values.get(&pair_key(a, b)).copied()
    }

    /// Stores `value` for the pair; overwrites any previous value.
    #[inline]
    pub fn set(&mut self, a: u32, b: u32, value: f32) {
        self.values.insert(pair_key(a, b), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Entries the cache holds before it reallocates.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Distance evaluation counters owned by one graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistanceStats {
    /// Item-to-item distance requests, cached or not.
    pub calculations: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Entries currently held by the cache (0 when disabled).
    pub cache_entries: usize,
}

impl DistanceStats {
    /// `cache_hits / calculations`; NaN before the first calculation.
    pub fn hit_rate(&self) -> f32 {
        self.cache_hits as f32 / self.calculations as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_order_independent() {
        let mut cache = DistanceCache::with_capacity(16);
        cache.set(3, 9, 0.25);
        assert_eq!(cache.try_get(3, 9), Some(0.25));
        assert_eq!(cache.try_get(9, 3), Some(0.25));
        assert_eq!(cache.try_get(3, 8), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = DistanceCache::default();
        cache.set(1, 2, 1.0);
        cache.set(2, 1, 2.0);
        assert_eq!(cache.try_get(1, 2), Some(2.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_pairs_do_not_collide() {
        let mut cache = DistanceCache::default();
        cache.set(0, 1, 1.0);
        cache.set(1, 0x1_0000, 2.0);
        cache.set(u32::MAX, 0, 3.0);
        assert_eq!(cache.try_get(1, 0), Some(1.0));
        assert_eq!(cache.try_get(0x1_0000, 1), Some(2.0));
        assert_eq!(cache.try_get(0, u32::MAX), Some(3.0));
    }

    #[test]
    fn test_hit_rate_undefined_without_calculations() {
        assert!(DistanceStats::default().hit_rate().is_nan());
        let stats = DistanceStats {
            calculations: 4,
            cache_hits: 1,
            cache_entries: 3,
        };
        assert!((stats.hit_rate() - 0.25).abs() < f32::EPSILON);
    }
}
