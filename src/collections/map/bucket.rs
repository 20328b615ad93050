/*!
 * Buckets
 *
 * A bucket holds every entry whose spread hash lands on one table slot.
 * Buckets are immutable snapshots: writers build a replacement under the
 * stripe lock and publish it with a single store, readers traverse whatever
 * snapshot they loaded.
 */

use super::tree::TreeBin;
use crate::core::limits::{MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD};
use std::borrow::Borrow;
use std::sync::Arc;

/// Key/value pair with its cached spread hash
///
/// Immutable once published; an update publishes a new entry.
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V) -> Arc<Self> {
        Arc::new(Self { hash, key, value })
    }

    #[inline]
    fn matches<Q>(&self, hash: u32, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.hash == hash && key.eq(self.key.borrow())
    }
}

/// Bucket contents: a short unordered chain, or a tree once it overflows
pub(crate) enum Bucket<K, V> {
    Chain(Vec<Arc<Entry<K, V>>>),
    Tree(TreeBin<K, V>),
}

/// Collision pressure reported by an insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pressure {
    /// Nothing to do
    Normal,
    /// The chain just became a tree
    Treeified,
    /// The chain overflowed but the table is too small to treeify; grow instead
    Crowded,
}

/// Outcome of an insert-or-replace
pub(crate) struct Upsert<K, V> {
    pub(crate) bucket: Bucket<K, V>,
    pub(crate) previous: Option<Arc<Entry<K, V>>>,
    pub(crate) pressure: Pressure,
}

/// Outcome of a removal
pub(crate) struct Removal<K, V> {
    pub(crate) bucket: Bucket<K, V>,
    pub(crate) entry: Arc<Entry<K, V>>,
    pub(crate) untreeified: bool,
}

impl<K, V> Bucket<K, V> {
    pub(crate) const fn empty() -> Self {
        Bucket::Chain(Vec::new())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        match self {
            Bucket::Chain(chain) => chain.len(),
            Bucket::Tree(tree) => tree.len(),
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub(crate) fn is_tree(&self) -> bool {
        matches!(self, Bucket::Tree(_))
    }

    /// Find the entry for `key`
    pub(crate) fn find<Q>(&self, hash: u32, key: &Q) -> Option<&Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self {
            Bucket::Chain(chain) => chain.iter().find(|e| e.matches(hash, key)),
            Bucket::Tree(tree) => tree.find(hash, key),
        }
    }

    /// Visit every entry
    pub(crate) fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Entry<K, V>>),
    {
        match self {
            Bucket::Chain(chain) => chain.iter().for_each(&mut f),
            Bucket::Tree(tree) => tree.for_each(f),
        }
    }

    /// All entries, cloned out of the snapshot
    pub(crate) fn entries(&self) -> Vec<Arc<Entry<K, V>>> {
        match self {
            Bucket::Chain(chain) => chain.clone(),
            Bucket::Tree(tree) => tree.entries(),
        }
    }

    /// Replacement bucket with `entry` inserted (or replacing the equal key)
    pub(crate) fn upsert(&self, entry: Arc<Entry<K, V>>, table_len: usize) -> Upsert<K, V>
    where
        K: Eq,
    {
        match self {
            Bucket::Tree(tree) => {
                let (tree, previous) = tree.insert(entry);
                Upsert {
                    bucket: Bucket::Tree(tree),
                    previous,
                    pressure: Pressure::Normal,
                }
            }
            Bucket::Chain(chain) => {
                let pos = chain
                    .iter()
                    .position(|e| e.hash == entry.hash && e.key == entry.key);

                let mut entries = chain.clone();
                let previous = match pos {
                    Some(pos) => Some(std::mem::replace(&mut entries[pos], entry)),
                    None => {
                        entries.push(entry);
                        None
                    }
                };

                let pressure = if previous.is_some() || entries.len() < TREEIFY_THRESHOLD {
                    Pressure::Normal
                } else if table_len >= MIN_TREEIFY_CAPACITY {
                    Pressure::Treeified
                } else {
                    Pressure::Crowded
                };

                let bucket = match pressure {
                    Pressure::Treeified => Bucket::Tree(TreeBin::from_distinct(entries)),
                    _ => Bucket::Chain(entries),
                };

                Upsert {
                    bucket,
                    previous,
                    pressure,
                }
            }
        }
    }

    /// Replacement bucket without `key`; `None` if the key is absent
    ///
    /// A tree that shrinks to `UNTREEIFY_THRESHOLD` reverts to a chain.
    pub(crate) fn remove<Q>(&self, hash: u32, key: &Q) -> Option<Removal<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self {
            Bucket::Chain(chain) => {
                let pos = chain.iter().position(|e| e.matches(hash, key))?;
                let mut entries = chain.clone();
                let entry = entries.swap_remove(pos);
                Some(Removal {
                    bucket: Bucket::Chain(entries),
                    entry,
                    untreeified: false,
                })
            }
            Bucket::Tree(tree) => {
                let (tree, entry) = tree.remove(hash, key)?;
                let untreeified = tree.len() <= UNTREEIFY_THRESHOLD;
                let bucket = if untreeified {
                    Bucket::Chain(tree.entries())
                } else {
                    Bucket::Tree(tree)
                };
                Some(Removal {
                    bucket,
                    entry,
                    untreeified,
                })
            }
        }
    }

    /// Split into the low and high halves for a doubled table
    ///
    /// `bit` is the old table length; entries with that hash bit clear stay at
    /// the same index, the rest move to `index + bit`.
    /// Runs no user code: entries keep their cached hash and are already
    /// distinct, so neither half compares keys.
    pub(crate) fn split(&self, bit: usize, new_len: usize) -> (Self, Self) {
        let was_tree = self.is_tree();
        let (lo, hi): (Vec<_>, Vec<_>) = self
            .entries()
            .into_iter()
            .partition(|e| (e.hash as usize & bit) == 0);

        (
            Self::rebuild(lo, was_tree, new_len),
            Self::rebuild(hi, was_tree, new_len),
        )
    }

    fn rebuild(entries: Vec<Arc<Entry<K, V>>>, was_tree: bool, table_len: usize) -> Self {
        let count = entries.len();
        let as_tree = (count >= TREEIFY_THRESHOLD && table_len >= MIN_TREEIFY_CAPACITY)
            || (was_tree && count > UNTREEIFY_THRESHOLD);

        if as_tree {
            Bucket::Tree(TreeBin::from_distinct(entries))
        } else {
            Bucket::Chain(entries)
        }
    }
}
