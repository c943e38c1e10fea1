//! Epoch-stamped visited set for best-first layer search.
//!
//! Each slot remembers the epoch in which it was last marked; `reset()` only
//! bumps the epoch, so repeated searches over the same graph never pay for a
//! full clear except on epoch wrap-around.

#[derive(Debug, Default)]
pub struct VisitedSet {
    stamps: Vec<u32>,
    epoch: u32,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: vec![0; capacity],
            epoch: 1,
        }
    }

    /// Forget all marks. O(1) except once every `u32::MAX` resets.
    pub fn reset(&mut self) {
        if self.epoch == u32::MAX {
            self.stamps.fill(0);
            self.epoch = 1;
        } else {
            self.epoch += 1;
        }
    }

    /// Grow to cover ids `0..len`; new slots start unmarked.
    pub fn ensure_len(&mut self, len: usize) {
        if len > self.stamps.len() {
            self.stamps.resize(len, 0);
        }
        if self.epoch == 0 {
            self.epoch = 1;
        }
    }

    /// Marks `id`; returns `true` if it was not yet marked in this epoch.
    #[inline]
    pub fn mark(&mut self, id: u32) -> bool {
        let slot = &mut self.stamps[id as usize];
        if *slot == self.epoch {
            false
        } else {
            *slot = self.epoch;
            true
        }
    }
}
