/*!
 * Striped Map
 *
 * Concurrent hash map with lock-free reads and striped writes.
 *
 * # Concurrency
 *
 * - **Reads** load the published table and one slot snapshot; no locks, no
 *   waiting, and forwarding markers are followed into the next table.
 * - **Writes** take the stripe lock for their slot in the table they landed
 *   on, build a replacement bucket, and publish it with one atomic store.
 * - **Resizes** migrate bucket by bucket; every writer helps before it writes
 *   (see `resize.rs`).
 */

use super::bucket::{Bucket, Entry, Pressure, Removal, Upsert};
use super::config::MapConfig;
use super::reentrancy::{next_map_id, MutationScope};
use super::resize::ResizeState;
use super::stats::MapStats;
use super::table::{spread, Slot, Table};
use crate::core::errors::ConfigResult;
use crate::core::limits::DEFAULT_CAPACITY;
use ahash::RandomState;
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Lock-striped concurrent hash map
///
/// # Performance
///
/// - **Reads**: lock-free, never block, never help a resize
/// - **Writes**: block only on their own stripe (and, while migrating, on the
///   two destination stripes in the new table)
/// - **Worst case per bucket**: O(log n) once a bucket treeifies
///
/// # Example
///
/// ```
/// use striped_sync::StripedMap;
///
/// let map = StripedMap::new();
/// map.insert("alpha", 1);
/// assert_eq!(map.get("alpha"), Some(1));
/// assert_eq!(map.insert("alpha", 2), Some(1));
/// assert_eq!(map.remove("alpha"), Some(2));
/// assert!(map.is_empty());
/// ```
pub struct StripedMap<K, V, S = RandomState> {
    /// Current table; replaced wholesale when a resize completes
    pub(super) table: ArcSwap<Table<K, V>>,
    /// In-progress resize, if any
    pub(super) resize: ArcSwapOption<ResizeState<K, V>>,
    /// Serializes starting and completing resizes
    pub(super) resize_gate: Mutex<()>,
    pub(super) len: AtomicUsize,
    pub(super) load_factor: f64,
    pub(super) stripe_count: usize,
    pub(super) migration_stride: usize,
    hash_builder: S,
    id: u64,
}

/// Change to the entry count made by a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Unchanged,
    Added,
    Removed,
}

/// What a mutation closure decided to do with its bucket
struct Mutation<K, V, R> {
    bucket: Option<Bucket<K, V>>,
    delta: Delta,
    pressure: Pressure,
    untreeified: bool,
    result: R,
}

impl<K, V, R> Mutation<K, V, R> {
    fn unchanged(result: R) -> Self {
        Self {
            bucket: None,
            delta: Delta::Unchanged,
            pressure: Pressure::Normal,
            untreeified: false,
            result,
        }
    }

    fn upserted(upsert: Upsert<K, V>, result: R) -> Self {
        Self {
            delta: if upsert.previous.is_some() {
                Delta::Unchanged
            } else {
                Delta::Added
            },
            bucket: Some(upsert.bucket),
            pressure: upsert.pressure,
            untreeified: false,
            result,
        }
    }

    fn removed(removal: Removal<K, V>, result: R) -> Self {
        Self {
            bucket: Some(removal.bucket),
            delta: Delta::Removed,
            pressure: Pressure::Normal,
            untreeified: removal.untreeified,
            result,
        }
    }
}

impl<K, V> StripedMap<K, V, RandomState> {
    /// Create an empty map with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty map whose table starts at `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(MapConfig::with_capacity(capacity), RandomState::new())
    }
}

impl<K, V, S> StripedMap<K, V, S> {
    /// Create an empty map using `hash_builder`
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::build(MapConfig::default(), hash_builder)
    }

    /// Create an empty map with a starting capacity and `hash_builder`
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::build(MapConfig::with_capacity(capacity), hash_builder)
    }

    /// Create an empty map from a full configuration
    pub fn with_config(config: MapConfig, hash_builder: S) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config, hash_builder))
    }

    fn build(config: MapConfig, hash_builder: S) -> Self {
        let table = Table::new(config.table_len(), config.stripe_count);

        Self {
            table: ArcSwap::from_pointee(table),
            resize: ArcSwapOption::empty(),
            resize_gate: Mutex::new(()),
            len: AtomicUsize::new(0),
            load_factor: config.load_factor,
            stripe_count: config.stripe_count,
            migration_stride: config.migration_stride,
            hash_builder,
            id: next_map_id(),
        }
    }

    /// Approximate number of entries
    ///
    /// Under concurrent mutation this is a value that was correct at some
    /// earlier instant, not necessarily the current one.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Check if the map is (approximately) empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the current table
    pub fn capacity(&self) -> usize {
        self.table.load().len()
    }

    /// Number of completed resizes
    pub fn generation(&self) -> u64 {
        self.table.load().generation()
    }

    /// Check if a resize is migrating buckets
    pub fn is_resizing(&self) -> bool {
        self.resize.load().is_some()
    }

    /// The map's hasher
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Visit every entry
    ///
    /// Weakly consistent: each bucket is seen as one snapshot, but buckets are
    /// visited at different instants. No locks are held while `f` runs.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let table = self.table.load_full();
        for index in 0..table.len() {
            visit_slot(&table, index, &mut f);
        }
    }

    /// Shape of the current table
    pub fn stats(&self) -> MapStats {
        let table = self.table.load_full();
        let mut stats = MapStats {
            len: self.len(),
            table_len: table.len(),
            stripe_count: table.stripe_count(),
            generation: table.generation(),
            resizing: self.is_resizing(),
            ..MapStats::default()
        };

        for index in 0..table.len() {
            match &**table.load(index) {
                Slot::Moved(_) => stats.moved_buckets += 1,
                Slot::Bucket(bucket) if bucket.is_empty() => stats.empty_buckets += 1,
                Slot::Bucket(bucket) => {
                    if bucket.is_tree() {
                        stats.tree_buckets += 1;
                    } else {
                        stats.chain_buckets += 1;
                    }
                    stats.longest_bucket = stats.longest_bucket.max(bucket.len());
                }
            }
        }

        stats
    }
}

/// Visit one slot, following forwarding into both halves of the next table
fn visit_slot<K, V, F>(table: &Table<K, V>, index: usize, f: &mut F)
where
    F: FnMut(&K, &V),
{
    let slot = table.load(index);
    match &**slot {
        Slot::Bucket(bucket) => bucket.for_each(|e| f(&e.key, &e.value)),
        Slot::Moved(next) => {
            visit_slot(&**next, index, f);
            visit_slot(&**next, index + table.len(), f);
        }
    }
}

impl<K, V, S> StripedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash<Q>(&self, key: &Q) -> u32
    where
        Q: Hash + ?Sized,
    {
        spread(self.hash_builder.hash_one(key))
    }

    /// Read a value through `f` without cloning it
    ///
    /// Never blocks: the slot snapshot stays valid even if a writer publishes
    /// a replacement while `f` runs.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let hash = self.hash(key);
        let mut table = self.table.load_full();

        loop {
            let slot = table.load_full(table.index(hash));
            table = match &*slot {
                Slot::Bucket(bucket) => return bucket.find(hash, key).map(|e| f(&e.value)),
                Slot::Moved(next) => Arc::clone(next),
            };
        }
    }

    /// Check if `key` is present
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_with(key, |_| ()).is_some()
    }

    /// Run `op` on the bucket for `hash` under its stripe lock
    ///
    /// Resolves forwarding and migrates the bucket first if its table is
    /// being resized, so `op` always sees the bucket of the newest table.
    /// `op` builds a replacement; nothing is published until it returns, so a
    /// panic inside it (a faulty `Eq`, a failing supplier) leaves the map as
    /// it was.
    fn mutate<R, F>(&self, hash: u32, op: F) -> R
    where
        F: FnOnce(&Bucket<K, V>, usize) -> Mutation<K, V, R>,
    {
        let _scope = MutationScope::enter(self.id);
        self.help_resize();

        let mut table = self.table.load_full();
        loop {
            let index = table.index(hash);
            let guard = table.lock(index);
            let slot = table.load_full(index);

            let bucket = match &*slot {
                Slot::Bucket(bucket) => bucket,
                Slot::Moved(next) => {
                    // Migrated since we loaded the table: the lock we hold is stale
                    let next = Arc::clone(next);
                    drop(guard);
                    table = next;
                    continue;
                }
            };

            if let Some(state) = self.migrating_from(&table) {
                self.transfer_held(&state, index);
                drop(guard);
                continue;
            }

            let Mutation {
                bucket: replacement,
                delta,
                pressure,
                untreeified,
                result,
            } = op(bucket, table.len());

            if let Some(replacement) = replacement {
                table.store(index, Slot::Bucket(replacement));
            }
            match delta {
                Delta::Added => {
                    self.len.fetch_add(1, Ordering::AcqRel);
                }
                Delta::Removed => {
                    self.len.fetch_sub(1, Ordering::AcqRel);
                }
                Delta::Unchanged => {}
            }
            drop(guard);

            match pressure {
                Pressure::Treeified => trace!(index, table_len = table.len(), "Bucket treeified"),
                Pressure::Crowded => self.grow_from(&table),
                Pressure::Normal => {}
            }
            if untreeified {
                trace!(index, table_len = table.len(), "Bucket reverted to chain");
            }
            if delta == Delta::Added {
                self.check_load();
            }

            return result;
        }
    }

    /// Remove every entry
    ///
    /// Buckets are emptied one stripe at a time; concurrent inserts into
    /// already-cleared buckets survive.
    pub fn clear(&self) {
        let _scope = MutationScope::enter(self.id);

        loop {
            self.drive_resize();

            let table = self.table.load_full();
            let mut forwarded = false;
            for index in 0..table.len() {
                let _guard = table.lock(index);
                match &**table.load(index) {
                    Slot::Moved(_) => forwarded = true,
                    Slot::Bucket(bucket) if bucket.is_empty() => {}
                    Slot::Bucket(bucket) => {
                        let removed = bucket.len();
                        table.store(index, Slot::Bucket(Bucket::empty()));
                        self.len.fetch_sub(removed, Ordering::AcqRel);
                    }
                }
            }

            if !forwarded {
                return;
            }
        }
    }

    /// Drive any in-progress resize to completion
    pub fn finish_resize(&self) {
        let _scope = MutationScope::enter(self.id);
        self.drive_resize();
    }
}

impl<K, V, S> StripedMap<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Get a clone of the value for `key`
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_with(key, V::clone)
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let hash = self.hash(&key);
        let entry = Entry::new(hash, key, value);

        self.mutate(hash, move |bucket, table_len| {
            let upsert = bucket.upsert(entry, table_len);
            let previous = upsert.previous.as_ref().map(|e| e.value.clone());
            Mutation::upserted(upsert, previous)
        })
    }

    /// Remove `key`, returning its value
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);

        self.mutate(hash, |bucket, _| match bucket.remove(hash, key) {
            Some(removal) => {
                let value = removal.entry.value.clone();
                Mutation::removed(removal, Some(value))
            }
            None => Mutation::unchanged(None),
        })
    }

    /// Return the value for `key`, inserting `supplier()` first if absent
    ///
    /// The check and insert are atomic. `supplier` runs at most once, only
    /// when the key is absent, and while the key's stripe lock is held: keep
    /// it short. Reads of this map inside `supplier` are fine; mutating this
    /// map from inside it panics (it would otherwise deadlock).
    pub fn compute_if_absent<F>(&self, key: K, supplier: F) -> V
    where
        F: FnOnce() -> V,
    {
        let hash = self.hash(&key);

        self.mutate(hash, move |bucket, table_len| {
            if let Some(existing) = bucket.find(hash, &key) {
                return Mutation::unchanged(existing.value.clone());
            }
            let value = supplier();
            let upsert = bucket.upsert(Entry::new(hash, key, value.clone()), table_len);
            Mutation::upserted(upsert, value)
        })
    }

    /// Atomically replace the value for `key` with `remap(current)`
    ///
    /// Returning `None` removes the key. Returns the new value. Same locking
    /// rules as [`compute_if_absent`](Self::compute_if_absent).
    pub fn compute<F>(&self, key: K, remap: F) -> Option<V>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let hash = self.hash(&key);

        self.mutate(hash, move |bucket, table_len| {
            let current = bucket.find(hash, &key);
            let existed = current.is_some();

            match remap(current.map(|e| &e.value)) {
                Some(value) => {
                    let upsert = bucket.upsert(Entry::new(hash, key, value.clone()), table_len);
                    Mutation::upserted(upsert, Some(value))
                }
                None if existed => match bucket.remove(hash, &key) {
                    Some(removal) => Mutation::removed(removal, None),
                    None => Mutation::unchanged(None),
                },
                None => Mutation::unchanged(None),
            }
        })
    }

    /// Clone every entry out of the map (weakly consistent)
    pub fn snapshot(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|k, v| out.push((k.clone(), v.clone())));
        out
    }
}

impl<K, V, S: Default> Default for StripedMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V> FromIterator<(K, V)> for StripedMap<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K, V, S> std::fmt::Debug for StripedMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedMap")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("generation", &self.generation())
            .field("resizing", &self.is_resizing())
            .finish()
    }
}
