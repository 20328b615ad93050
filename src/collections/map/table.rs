/*!
 * Tables
 *
 * A table is a power-of-two array of slots plus the stripe locks guarding
 * them. Each table generation owns its own stripes, so the lock for slot `i`
 * always means "slot `i` of this generation".
 */

use super::bucket::Bucket;
use crate::core::errors::{MapError, MapResult};
use crate::core::sync::{PairGuard, StripeLocks};
use arc_swap::{ArcSwap, Guard};
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Slot contents: a live bucket, or a forwarding marker left by a resize
pub(crate) enum Slot<K, V> {
    Bucket(Bucket<K, V>),
    Moved(Arc<Table<K, V>>),
}

/// Fixed-length array of bucket snapshots
pub(crate) struct Table<K, V> {
    slots: Box<[ArcSwap<Slot<K, V>>]>,
    locks: StripeLocks,
    mask: usize,
    generation: u64,
}

/// Fold a 64-bit hash to 32 bits and mix the high half into the low half
///
/// Indexing masks off all but the low bits, so without mixing, keys that
/// differ only in high bits would all collide in small tables.
#[inline]
pub(crate) fn spread(hash: u64) -> u32 {
    let h = (hash ^ (hash >> 32)) as u32;
    h ^ (h >> 16)
}

impl<K, V> Table<K, V> {
    /// Allocate the initial table
    pub(crate) fn new(len: usize, stripe_count: usize) -> Self {
        Self::from_slots(Vec::with_capacity(len), len, stripe_count, 0)
    }

    /// Allocate a table of `len` empty slots for a resize
    ///
    /// The slot array is reserved fallibly so a failed resize leaves the
    /// caller's current table untouched.
    pub(crate) fn try_new(len: usize, stripe_count: usize, generation: u64) -> MapResult<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(len)
            .map_err(|_| MapError::AllocationFailed { requested: len })?;

        Ok(Self::from_slots(slots, len, stripe_count, generation))
    }

    fn from_slots(
        mut slots: Vec<ArcSwap<Slot<K, V>>>,
        len: usize,
        stripe_count: usize,
        generation: u64,
    ) -> Self {
        debug_assert!(len.is_power_of_two());

        let empty = Arc::new(Slot::Bucket(Bucket::empty()));
        slots.extend((0..len).map(|_| ArcSwap::new(Arc::clone(&empty))));

        Self {
            slots: slots.into_boxed_slice(),
            locks: StripeLocks::new(stripe_count.min(len)),
            mask: len - 1,
            generation,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn stripe_count(&self) -> usize {
        self.locks.len()
    }

    #[inline]
    pub(crate) fn index(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    /// Lock-free snapshot of a slot
    #[inline]
    pub(crate) fn load(&self, index: usize) -> Guard<Arc<Slot<K, V>>> {
        self.slots[index].load()
    }

    /// Owned snapshot of a slot
    #[inline]
    pub(crate) fn load_full(&self, index: usize) -> Arc<Slot<K, V>> {
        self.slots[index].load_full()
    }

    /// Publish a new slot value; caller holds the slot's stripe lock
    #[inline]
    pub(crate) fn store(&self, index: usize, slot: Slot<K, V>) {
        self.slots[index].store(Arc::new(slot));
    }

    #[inline]
    pub(crate) fn lock(&self, index: usize) -> MutexGuard<'_, ()> {
        self.locks.lock(index)
    }

    #[inline]
    pub(crate) fn lock_pair(&self, a: usize, b: usize) -> PairGuard<'_> {
        self.locks.lock_pair(a, b)
    }
}
