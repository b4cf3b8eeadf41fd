//! Overlay id allocation
//!
//! Ids come from partitions with fixed bases. Allocation scans upward from
//! the base to the first value that is neither a known id (built-in or
//! overlay, any partition) nor already handed out by this allocator, so two
//! back-to-back creates get distinct ids before either reaches the store.
//!
//! Pages additionally shift overlay ids by a fixed per-view offset
//! ([`ViewNamespace`]) so the same overlay record can appear on several
//! listings without clashing with the ids those listings already use.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// First id for freely-added overlay entries
pub const FREE_ID_BASE: i64 = 100_000;

/// First id of category partition slot 0
pub const CATEGORY_ID_BASE: i64 = 10_000;

/// Width of one category partition
pub const CATEGORY_ID_STRIDE: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPartition {
    /// Freely added by an admin
    Free,
    /// Category-specific dynamic entries, by classifier slot
    Category(u8),
}

impl IdPartition {
    pub fn base(self) -> i64 {
        match self {
            IdPartition::Free => FREE_ID_BASE,
            IdPartition::Category(slot) => CATEGORY_ID_BASE + i64::from(slot) * CATEGORY_ID_STRIDE,
        }
    }
}

/// Per-view offset applied to overlay ids by listing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewNamespace {
    Models,
    Accessories,
}

impl ViewNamespace {
    pub fn offset(self) -> i64 {
        match self {
            ViewNamespace::Models => 1_000,
            ViewNamespace::Accessories => 2_000,
        }
    }

    /// Id an overlay entry is shown under in this view
    pub fn apparent_id(self, overlay_id: i64) -> i64 {
        overlay_id + self.offset()
    }

    /// Inverse of [`ViewNamespace::apparent_id`]
    pub fn overlay_id(self, apparent_id: i64) -> Option<i64> {
        let id = apparent_id - self.offset();
        (id > 0).then_some(id)
    }
}

/// Allocator with an in-memory reservation set
#[derive(Debug, Default)]
pub struct IdAllocator {
    reserved: Mutex<BTreeSet<i64>>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id in `partition` not present in `known` or reserved earlier
    pub fn next_id(&self, partition: IdPartition, known: &HashSet<i64>) -> i64 {
        let mut reserved = self.reserved.lock();
        let mut candidate = partition.base();
        while known.contains(&candidate) || reserved.contains(&candidate) {
            candidate += 1;
        }
        reserved.insert(candidate);
        tracing::trace!(?partition, id = candidate, "Allocated overlay id");
        candidate
    }

    /// Drop reservations that the store now records (or that were discarded)
    pub fn release(&self, ids: impl IntoIterator<Item = i64>) {
        let mut reserved = self.reserved.lock();
        for id in ids {
            reserved.remove(&id);
        }
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().len()
    }

    /// Like [`IdAllocator::next_id`], held until the returned guard drops
    pub fn reserve(self: &Arc<Self>, partition: IdPartition, known: &HashSet<i64>) -> ReservedId {
        ReservedId {
            id: self.next_id(partition, known),
            allocator: Arc::clone(self),
        }
    }
}

/// An id reserved ahead of its write
///
/// Dropping the guard releases the reservation, whether or not the id was
/// written. Once written, the id is known to the store and stays taken.
#[derive(Debug)]
pub struct ReservedId {
    id: i64,
    allocator: Arc<IdAllocator>,
}

impl ReservedId {
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Drop for ReservedId {
    fn drop(&mut self) {
        self.allocator.release([self.id]);
    }
}

/// Ids that appear more than once across `static_ids` and `overlay_ids`
pub fn find_collisions(
    static_ids: impl IntoIterator<Item = i64>,
    overlay_ids: impl IntoIterator<Item = i64>,
) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut dupes = BTreeSet::new();
    for id in static_ids.into_iter().chain(overlay_ids) {
        if !seen.insert(id) {
            dupes.insert(id);
        }
    }
    dupes.into_iter().collect()
}
