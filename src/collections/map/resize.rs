/*!
 * Incremental Resize
 *
 * Doubling is split into per-bucket migrations that writers perform on
 * their way in:
 *
 * 1. A writer that pushes the load over the threshold starts a resize by
 *    allocating the next table and publishing a `ResizeState`.
 * 2. Every writer first claims a stride of old indices and migrates them.
 *    A writer whose own bucket has not been migrated yet migrates it first.
 * 3. Migrating index `i` holds the old stripe for `i`, splits the bucket on
 *    the old-length bit into `i` and `i + old_len`, then leaves a forwarding
 *    marker. Readers follow the marker and never block.
 * 4. Whoever migrates the last bucket publishes the new table.
 *
 * A helper that unwinds mid-stride hands its unfinished indices back, so a
 * later helper picks them up and the resize still completes.
 *
 * Lock order is always older generation before newer, and ascending index
 * within a generation. The resize gate is never held while waiting on a
 * stripe.
 */

use super::map::StripedMap;
use super::table::{Slot, Table};
use crate::core::errors::{MapError, MapResult};
use crate::core::limits::MAXIMUM_CAPACITY;
use parking_lot::Mutex;
use std::hash::{BuildHasher, Hash};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// One in-progress doubling from `from` to `to`
pub(crate) struct ResizeState<K, V> {
    pub(crate) from: Arc<Table<K, V>>,
    pub(crate) to: Arc<Table<K, V>>,
    /// Next old index to hand out to a helper
    transfer_index: AtomicUsize,
    /// Old indices fully migrated
    migrated: AtomicUsize,
    /// Claimed ranges whose helper unwound before finishing them
    abandoned: Mutex<Vec<Range<usize>>>,
}

impl<K, V> ResizeState<K, V> {
    fn new(from: Arc<Table<K, V>>, to: Arc<Table<K, V>>) -> Self {
        Self {
            from,
            to,
            transfer_index: AtomicUsize::new(0),
            migrated: AtomicUsize::new(0),
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Claim up to `stride` old indices to migrate
    ///
    /// Once fresh indices run out, ranges abandoned by unwound helpers are
    /// handed out again.
    fn claim(&self, stride: usize) -> Option<Claim<'_, K, V>> {
        let len = self.from.len();
        let start = self.transfer_index.fetch_add(stride, Ordering::AcqRel);
        let range = if start < len {
            start..(start + stride).min(len)
        } else {
            self.abandoned.lock().pop()?
        };
        Some(Claim { state: self, range })
    }

    /// Migrate old index `index`; the caller holds its stripe in `from`
    ///
    /// Returns true if this was the last bucket, making the caller
    /// responsible for completing the resize.
    fn transfer_locked(&self, index: usize) -> bool
    where
        K: Eq,
    {
        let slot = self.from.load_full(index);
        let bucket = match &*slot {
            Slot::Bucket(bucket) => bucket,
            Slot::Moved(_) => return false,
        };

        let old_len = self.from.len();
        let (lo, hi) = bucket.split(old_len, self.to.len());
        {
            let _pair = self.to.lock_pair(index, index + old_len);
            self.to.store(index, Slot::Bucket(lo));
            self.to.store(index + old_len, Slot::Bucket(hi));
        }
        self.from.store(index, Slot::Moved(Arc::clone(&self.to)));

        self.migrated.fetch_add(1, Ordering::AcqRel) + 1 == old_len
    }

    fn is_complete(&self) -> bool {
        self.migrated.load(Ordering::Acquire) == self.from.len()
    }
}

/// Indices a helper still owes; whatever is left on drop goes back to the state
struct Claim<'a, K, V> {
    state: &'a ResizeState<K, V>,
    range: Range<usize>,
}

impl<K, V> Drop for Claim<'_, K, V> {
    fn drop(&mut self) {
        if !self.range.is_empty() {
            self.state.abandoned.lock().push(self.range.clone());
        }
    }
}

/// Allocation failure while growing is fatal to the calling operation
fn allocation_fault(err: MapError, current: usize) -> ! {
    error!(current, error = %err, "Table allocation failed");
    panic!("{}", err);
}

impl<K, V, S> StripedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// The resize migrating out of `table`, if there is one
    pub(super) fn migrating_from(&self, table: &Arc<Table<K, V>>) -> Option<Arc<ResizeState<K, V>>> {
        let state = self.resize.load_full()?;
        Arc::ptr_eq(&state.from, table).then_some(state)
    }

    /// Migrate one stride of buckets if a resize is in progress
    pub(super) fn help_resize(&self) {
        let Some(state) = self.resize.load_full() else {
            return;
        };
        let Some(mut claim) = state.claim(self.migration_stride) else {
            return;
        };

        while !claim.range.is_empty() {
            let index = claim.range.start;
            let last = {
                let _guard = state.from.lock(index);
                state.transfer_locked(index)
            };
            claim.range.start += 1;
            if last {
                self.complete_resize(&state);
            }
        }
    }

    /// Migrate `index` for a writer already holding its old stripe
    pub(super) fn transfer_held(&self, state: &Arc<ResizeState<K, V>>, index: usize) {
        if state.transfer_locked(index) {
            self.complete_resize(state);
        }
    }

    /// Start a resize if the current table is over its load threshold
    pub(super) fn check_load(&self) {
        if self.resize.load().is_some() {
            return;
        }
        let table = self.table.load_full();
        let threshold = table.len() as f64 * self.load_factor;
        if self.len() as f64 > threshold {
            self.grow_from(&table);
        }
    }

    /// Grow past `table` unless someone already did
    ///
    /// Allocation failure panics with the [`MapError`]; nothing shared has
    /// changed by then, so the map stays usable on `table`. Never called with
    /// a stripe held.
    pub(super) fn grow_from(&self, table: &Arc<Table<K, V>>) {
        let _gate = self.resize_gate.lock();

        match self.begin_resize(table) {
            Ok(()) | Err(MapError::ResizeInProgress(_)) | Err(MapError::CapacityExhausted(_)) => {}
            Err(err @ MapError::AllocationFailed { .. }) => allocation_fault(err, table.len()),
        }
    }

    /// Allocate the next table and publish the resize; caller holds the gate
    fn begin_resize(&self, table: &Arc<Table<K, V>>) -> MapResult<()> {
        if let Some(state) = self.resize.load_full() {
            return Err(MapError::ResizeInProgress(state.from.generation()));
        }
        // Stale caller: the table already moved on
        if !Arc::ptr_eq(&self.table.load_full(), table) {
            return Ok(());
        }
        if table.len() >= MAXIMUM_CAPACITY {
            return Err(MapError::CapacityExhausted(table.len()));
        }

        let next = Table::try_new(table.len() * 2, self.stripe_count, table.generation() + 1)?;
        debug!(
            from = table.len(),
            to = next.len(),
            generation = next.generation(),
            len = self.len(),
            "Resize started"
        );

        self.resize
            .store(Some(Arc::new(ResizeState::new(Arc::clone(table), Arc::new(next)))));
        Ok(())
    }

    /// Publish the migrated table and clear the resize
    fn complete_resize(&self, state: &Arc<ResizeState<K, V>>) {
        let _gate = self.resize_gate.lock();

        let current = self.resize.load_full();
        if !current.is_some_and(|c| Arc::ptr_eq(&c, state)) {
            return;
        }
        debug_assert!(state.is_complete());

        self.table.store(Arc::clone(&state.to));
        self.resize.store(None);
        debug!(
            table_len = state.to.len(),
            generation = state.to.generation(),
            len = self.len(),
            "Resize complete"
        );

        // Inserts during migration may have pushed the new table over too
        let threshold = state.to.len() as f64 * self.load_factor;
        if self.len() as f64 > threshold {
            if let Err(err @ MapError::AllocationFailed { .. }) = self.begin_resize(&state.to) {
                allocation_fault(err, state.to.len());
            }
        }
    }

    /// Double the table now
    ///
    /// Starts a resize that writers (or [`finish_resize`](Self::finish_resize))
    /// then carry out. Unlike implicit growth, allocation failure comes back as
    /// an error instead of a panic.
    pub fn try_grow(&self) -> MapResult<()> {
        let _gate = self.resize_gate.lock();
        let table = self.table.load_full();
        self.begin_resize(&table)
    }

    /// Migrate every remaining bucket of every pending resize
    pub(super) fn drive_resize(&self) {
        while let Some(state) = self.resize.load_full() {
            for index in 0..state.from.len() {
                let last = {
                    let _guard = state.from.lock(index);
                    state.transfer_locked(index)
                };
                if last {
                    self.complete_resize(&state);
                }
            }

            // The last bucket may belong to another thread still completing
            while self
                .resize
                .load_full()
                .is_some_and(|current| Arc::ptr_eq(&current, &state))
            {
                std::thread::yield_now();
            }
        }
    }
}
