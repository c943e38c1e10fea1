//! Thread-safe handle around a [`SmallWorld`].
//!
//! Insertion needs exclusive access while queries only read, so the index sits
//! behind a `parking_lot::RwLock`: any number of concurrent searches, one batch
//! insert at a time. Cloning the handle shares the same index.

use crate::hnsw::KnnResult;
use crate::random::{DefaultRandom, RandomSource};
use crate::smallworld::SmallWorld;
use crate::Result;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Range;
use std::sync::Arc;

pub struct SharedSmallWorld<T, F, G = DefaultRandom> {
    inner: Arc<RwLock<SmallWorld<T, F, G>>>,
}

impl<T, F, G> Clone for SharedSmallWorld<T, F, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, F, G> From<SmallWorld<T, F, G>> for SharedSmallWorld<T, F, G> {
    fn from(world: SmallWorld<T, F, G>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(world)),
        }
    }
}

impl<T, F, G> SharedSmallWorld<T, F, G>
where
    F: Fn(&T, &T) -> f32,
    G: RandomSource,
{
    pub fn new(world: SmallWorld<T, F, G>) -> Self {
        Self::from(world)
    }

    /// Inserts a batch under the write lock.
    pub fn add_items(&self, items: Vec<T>) -> Result<Range<u32>> {
        self.inner.write().add_items(items)
    }

    pub fn knn_search(&self, query: &T, k: usize) -> Result<Vec<KnnResult>> {
        self.inner.read().knn_search(query, k)
    }

    pub fn knn_search_with_ef(&self, query: &T, k: usize, ef: usize) -> Result<Vec<KnnResult>> {
        self.inner.read().knn_search_with_ef(query, k, ef)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn print(&self) -> String {
        self.inner.read().print()
    }

    /// Shared access for operations not forwarded by the handle.
    pub fn read(&self) -> RwLockReadGuard<'_, SmallWorld<T, F, G>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SmallWorld<T, F, G>> {
        self.inner.write()
    }
}
