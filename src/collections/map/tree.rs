/*!
 * Tree Buckets
 *
 * Persistent AVL tree for overflowing buckets. Nodes are shared through
 * `Arc`, and insert/remove copy only the root-to-leaf path, so publishing a
 * new tree leaves every snapshot held by readers intact.
 *
 * Keys only promise `Hash + Eq`, so nodes are ordered by the spread hash and
 * each node holds every entry with that exact hash, tie-broken linearly.
 */

use super::bucket::Entry;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::sync::Arc;

type Link<K, V> = Option<Arc<TreeNode<K, V>>>;

struct TreeNode<K, V> {
    hash: u32,
    /// Entries with exactly `hash`; never empty
    entries: Vec<Arc<Entry<K, V>>>,
    left: Link<K, V>,
    right: Link<K, V>,
    height: u8,
}

/// Balanced tree of entries, ordered by hash
pub(crate) struct TreeBin<K, V> {
    root: Link<K, V>,
    count: usize,
}

impl<K, V> Clone for TreeBin<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            count: self.count,
        }
    }
}

#[inline]
fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |node| node.height)
}

fn make<K, V>(
    hash: u32,
    entries: Vec<Arc<Entry<K, V>>>,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<TreeNode<K, V>> {
    let height = 1 + height(&left).max(height(&right));
    Arc::new(TreeNode {
        hash,
        entries,
        left,
        right,
        height,
    })
}

/// Build a node, rotating once or twice if the subtrees differ by more than one
fn balance<K, V>(
    hash: u32,
    entries: Vec<Arc<Entry<K, V>>>,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<TreeNode<K, V>> {
    let (hl, hr) = (height(&left), height(&right));

    if hl > hr + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                let new_right = make(hash, entries, l.right.clone(), right);
                return make(l.hash, l.entries.clone(), l.left.clone(), Some(new_right));
            }
            if let Some(lr) = &l.right {
                let new_left = make(l.hash, l.entries.clone(), l.left.clone(), lr.left.clone());
                let new_right = make(hash, entries, lr.right.clone(), right);
                return make(lr.hash, lr.entries.clone(), Some(new_left), Some(new_right));
            }
        }
    } else if hr > hl + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                let new_left = make(hash, entries, left, r.left.clone());
                return make(r.hash, r.entries.clone(), Some(new_left), r.right.clone());
            }
            if let Some(rl) = &r.left {
                let new_left = make(hash, entries, left, rl.left.clone());
                let new_right = make(r.hash, r.entries.clone(), rl.right.clone(), r.right.clone());
                return make(rl.hash, rl.entries.clone(), Some(new_left), Some(new_right));
            }
        }
    }

    make(hash, entries, left, right)
}

fn insert_node<K: Eq, V>(
    link: &Link<K, V>,
    entry: Arc<Entry<K, V>>,
    replaced: &mut Option<Arc<Entry<K, V>>>,
) -> Arc<TreeNode<K, V>> {
    let Some(node) = link else {
        return make(entry.hash, vec![entry], None, None);
    };

    match entry.hash.cmp(&node.hash) {
        Ordering::Less => {
            let left = insert_node(&node.left, entry, replaced);
            balance(node.hash, node.entries.clone(), Some(left), node.right.clone())
        }
        Ordering::Greater => {
            let right = insert_node(&node.right, entry, replaced);
            balance(node.hash, node.entries.clone(), node.left.clone(), Some(right))
        }
        Ordering::Equal => {
            let mut entries = node.entries.clone();
            match entries.iter().position(|e| e.key == entry.key) {
                Some(pos) => *replaced = Some(std::mem::replace(&mut entries[pos], entry)),
                None => entries.push(entry),
            }
            make(node.hash, entries, node.left.clone(), node.right.clone())
        }
    }
}

/// Detach the leftmost node, returning its contents and the rebuilt subtree
fn take_min<K, V>(node: &Arc<TreeNode<K, V>>) -> (u32, Vec<Arc<Entry<K, V>>>, Link<K, V>) {
    match &node.left {
        None => (node.hash, node.entries.clone(), node.right.clone()),
        Some(left) => {
            let (hash, entries, new_left) = take_min(left);
            let rebuilt = balance(node.hash, node.entries.clone(), new_left, node.right.clone());
            (hash, entries, Some(rebuilt))
        }
    }
}

/// Remove the entry at `pos` in the node with `hash`; the entry must exist
fn remove_node<K, V>(
    link: &Link<K, V>,
    hash: u32,
    pos: usize,
    removed: &mut Option<Arc<Entry<K, V>>>,
) -> Link<K, V> {
    let node = link.as_ref()?;

    match hash.cmp(&node.hash) {
        Ordering::Less => {
            let left = remove_node(&node.left, hash, pos, removed);
            Some(balance(node.hash, node.entries.clone(), left, node.right.clone()))
        }
        Ordering::Greater => {
            let right = remove_node(&node.right, hash, pos, removed);
            Some(balance(node.hash, node.entries.clone(), node.left.clone(), right))
        }
        Ordering::Equal if node.entries.len() > 1 => {
            let mut entries = node.entries.clone();
            *removed = Some(entries.remove(pos));
            Some(make(node.hash, entries, node.left.clone(), node.right.clone()))
        }
        Ordering::Equal => {
            *removed = node.entries.get(pos).cloned();
            match (&node.left, &node.right) {
                (None, right) => right.clone(),
                (left, None) => left.clone(),
                (left, Some(right)) => {
                    let (min_hash, min_entries, new_right) = take_min(right);
                    Some(balance(min_hash, min_entries, left.clone(), new_right))
                }
            }
        }
    }
}

/// Perfectly balanced subtree over nodes already sorted by hash
fn build_sorted<K, V>(nodes: &[(u32, Vec<Arc<Entry<K, V>>>)]) -> Link<K, V> {
    if nodes.is_empty() {
        return None;
    }
    let mid = nodes.len() / 2;
    let left = build_sorted(&nodes[..mid]);
    let right = build_sorted(&nodes[mid + 1..]);
    let (hash, entries) = &nodes[mid];
    Some(make(*hash, entries.clone(), left, right))
}

fn visit<K, V, F>(link: &Link<K, V>, f: &mut F)
where
    F: FnMut(&Arc<Entry<K, V>>),
{
    if let Some(node) = link {
        visit(&node.left, f);
        node.entries.iter().for_each(&mut *f);
        visit(&node.right, f);
    }
}

impl<K, V> TreeBin<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            root: None,
            count: 0,
        }
    }

    /// Tree over entries whose keys are already known to be distinct
    ///
    /// Groups by hash without comparing keys, so treeifying or splitting a
    /// bucket never runs `Eq`.
    pub(crate) fn from_distinct(mut entries: Vec<Arc<Entry<K, V>>>) -> Self {
        let count = entries.len();
        entries.sort_by_key(|e| e.hash);

        let mut nodes: Vec<(u32, Vec<Arc<Entry<K, V>>>)> = Vec::new();
        for entry in entries {
            match nodes.last_mut() {
                Some((hash, group)) if *hash == entry.hash => group.push(entry),
                _ => nodes.push((entry.hash, vec![entry])),
            }
        }

        Self {
            root: build_sorted(&nodes),
            count,
        }
    }

    /// Number of entries
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Tree height (0 for an empty tree)
    #[cfg(test)]
    pub(crate) fn height(&self) -> u8 {
        height(&self.root)
    }

    /// Find an entry by hash and key
    pub(crate) fn find<Q>(&self, hash: u32, key: &Q) -> Option<&Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut link = &self.root;
        while let Some(node) = link {
            link = match hash.cmp(&node.hash) {
                Ordering::Less => &node.left,
                Ordering::Greater => &node.right,
                Ordering::Equal => {
                    return node.entries.iter().find(|e| key.eq(e.key.borrow()));
                }
            };
        }
        None
    }

    /// Position of `key` within its hash node, if present
    fn locate<Q>(&self, hash: u32, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut link = &self.root;
        while let Some(node) = link {
            link = match hash.cmp(&node.hash) {
                Ordering::Less => &node.left,
                Ordering::Greater => &node.right,
                Ordering::Equal => {
                    return node.entries.iter().position(|e| key.eq(e.key.borrow()));
                }
            };
        }
        None
    }

    /// New tree with `entry` inserted, plus the entry it replaced
    pub(crate) fn insert(&self, entry: Arc<Entry<K, V>>) -> (Self, Option<Arc<Entry<K, V>>>)
    where
        K: Eq,
    {
        let mut replaced = None;
        let root = insert_node(&self.root, entry, &mut replaced);
        let count = if replaced.is_some() {
            self.count
        } else {
            self.count + 1
        };
        (
            Self {
                root: Some(root),
                count,
            },
            replaced,
        )
    }

    /// New tree without `key`, plus the removed entry; `None` if absent
    ///
    /// Key comparisons all happen before any node is rebuilt.
    pub(crate) fn remove<Q>(&self, hash: u32, key: &Q) -> Option<(Self, Arc<Entry<K, V>>)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let pos = self.locate(hash, key)?;
        let mut removed = None;
        let root = remove_node(&self.root, hash, pos, &mut removed);
        let entry = removed?;
        Some((
            Self {
                root,
                count: self.count - 1,
            },
            entry,
        ))
    }

    /// Visit entries in hash order
    pub(crate) fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Entry<K, V>>),
    {
        visit(&self.root, &mut f);
    }

    /// All entries in hash order
    pub(crate) fn entries(&self) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::with_capacity(self.count);
        self.for_each(|e| out.push(Arc::clone(e)));
        out
    }
}
