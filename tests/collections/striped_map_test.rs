/*!
 * Striped Map Concurrency Tests
 * Multi-threaded inserts, updates and reads across live resizes
 */

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use striped_sync::{MapConfig, StripedMap};

const THREADS: usize = 8;

/// Every key hashes to the same value
#[derive(Clone, Default)]
struct SameHash;

struct SameHasher;

impl Hasher for SameHasher {
    fn finish(&self) -> u64 {
        0
    }
    fn write(&mut self, _bytes: &[u8]) {}
}

impl BuildHasher for SameHash {
    type Hasher = SameHasher;
    fn build_hasher(&self) -> SameHasher {
        SameHasher
    }
}

/// Uses a key's own `u64` as its hash
#[derive(Clone, Default)]
struct PassThrough;

#[derive(Default)]
struct PassThroughHasher(u64);

impl Hasher for PassThroughHasher {
    fn finish(&self) -> u64 {
        self.0
    }
    fn write(&mut self, _bytes: &[u8]) {}
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

impl BuildHasher for PassThrough {
    type Hasher = PassThroughHasher;
    fn build_hasher(&self) -> PassThroughHasher {
        PassThroughHasher::default()
    }
}

static BREAK_EQ: AtomicBool = AtomicBool::new(false);

/// Key whose `Eq` panics for id 5 once `BREAK_EQ` is set
struct Fragile {
    id: u32,
    hash: u64,
}

impl Hash for Fragile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for Fragile {
    fn eq(&self, other: &Self) -> bool {
        if BREAK_EQ.load(Ordering::SeqCst) && (self.id == 5 || other.id == 5) {
            panic!("Eq broken for key 5");
        }
        self.id == other.id
    }
}

impl Eq for Fragile {}

#[test]
fn test_concurrent_inserts_through_resizes() {
    let map = Arc::new(StripedMap::with_capacity(16));
    let per_thread = 10_000 / THREADS as u64;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS as u64)
        .map(|t| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    let key = t * per_thread + i;
                    assert_eq!(map.insert(key, key * 2), None);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    map.finish_resize();
    assert_eq!(map.len(), 10_000);
    assert!(map.generation() >= 9);
    for key in 0..10_000u64 {
        assert_eq!(map.get(&key), Some(key * 2), "key {} missing", key);
    }

    let stats = map.stats();
    assert!(!stats.resizing);
    assert_eq!(stats.moved_buckets, 0);
}

#[test]
fn test_compute_increments_are_not_lost() {
    let map = Arc::new(StripedMap::new());
    let increments = 1_000;
    let keys = 16u32;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..increments {
                    let key = i as u32 % keys;
                    map.compute(key, |v: Option<&u64>| Some(v.copied().unwrap_or(0) + 1));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total: u64 = (0..keys).map(|k| map.get(&k).unwrap_or(0)).sum();
    assert_eq!(total, (THREADS * increments) as u64);
}

#[test]
fn test_compute_if_absent_supplier_runs_once_per_key() {
    let map = Arc::new(StripedMap::with_capacity(4));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let map = Arc::clone(&map);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for key in 0..500u32 {
                    let value = map.compute_if_absent(key, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        key + 1
                    });
                    assert_eq!(value, key + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 500);
    assert_eq!(map.len(), 500);
}

#[test]
fn test_readers_never_miss_published_keys() {
    let map = Arc::new(StripedMap::with_capacity(16));
    let published = Arc::new(AtomicU64::new(0));
    let total = 20_000u64;

    let writer = {
        let map = Arc::clone(&map);
        let published = Arc::clone(&published);
        thread::spawn(move || {
            for key in 0..total {
                map.insert(key, key);
                published.store(key + 1, Ordering::Release);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let map = Arc::clone(&map);
            let published = Arc::clone(&published);
            thread::spawn(move || {
                let mut checks = 0u64;
                loop {
                    let high = published.load(Ordering::Acquire);
                    if high > 0 {
                        let key = (checks * 7919 + r) % high;
                        assert_eq!(map.get(&key), Some(key), "published key {} unreadable", key);
                    }
                    checks += 1;
                    if high == total {
                        break;
                    }
                }
                checks
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_concurrent_removes_drain_map() {
    let map = Arc::new(StripedMap::with_capacity(1024));
    for key in 0..8_000u32 {
        map.insert(key, key);
    }

    let handles: Vec<_> = (0..THREADS as u32)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let mut removed = 0;
                for key in (t..8_000).step_by(THREADS) {
                    if map.remove(&key) == Some(key) {
                        removed += 1;
                    }
                }
                removed
            })
        })
        .collect();

    let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(removed, 8_000);
    assert!(map.is_empty());
}

#[test]
fn test_colliding_keys_share_tree_bucket() {
    let map = Arc::new(StripedMap::with_capacity_and_hasher(64, SameHash));

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..50u32 {
                    map.insert(t * 1000 + i, i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = map.stats();
    assert_eq!(stats.tree_buckets, 1);
    assert_eq!(stats.longest_bucket, 200);
    for t in 0..4u32 {
        for i in 0..50u32 {
            assert_eq!(map.get(&(t * 1000 + i)), Some(i));
        }
    }

    for t in 0..4u32 {
        for i in 0..50u32 {
            if t > 0 || i > 2 {
                map.remove(&(t * 1000 + i));
            }
        }
    }
    let stats = map.stats();
    assert_eq!(stats.tree_buckets, 0);
    assert_eq!(stats.chain_buckets, 1);
    assert_eq!(map.len(), 3);
}

#[test]
fn test_reentrant_compute_panics_without_deadlock() {
    let map = StripedMap::new();
    map.insert("seed", 1);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        map.compute("seed", |v| {
            map.remove("seed");
            v.copied()
        })
    }));

    let message = result
        .err()
        .and_then(|p| p.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_default();
    assert!(message.contains("reentrant mutation"), "got {:?}", message);

    assert_eq!(map.get("seed"), Some(1));
    assert_eq!(map.insert("after", 2), None);
}

#[test]
fn test_mutating_other_map_inside_supplier() {
    let primary = StripedMap::new();
    let audit = StripedMap::new();

    let value = primary.compute_if_absent(1, || {
        audit.insert(1, "computed");
        10
    });

    assert_eq!(value, 10);
    assert_eq!(audit.get(&1), Some("computed"));
}

#[test]
fn test_for_each_sees_every_entry_once() {
    let config = MapConfig {
        migration_stride: 2,
        ..MapConfig::compact()
    };
    let map = StripedMap::with_config(config, ahash::RandomState::new()).unwrap();
    for key in 0..300u32 {
        map.insert(key, ());
    }

    let mut seen = HashSet::new();
    map.for_each(|k, _| assert!(seen.insert(*k), "key {} visited twice", k));
    assert_eq!(seen.len(), 300);
}

#[test]
fn test_broken_eq_stays_with_its_key_across_resize() {
    let map = StripedMap::with_capacity_and_hasher(64, PassThrough);
    for id in 0..10 {
        map.insert(Fragile { id, hash: 0 }, id);
    }
    assert_eq!(map.stats().tree_buckets, 1);

    BREAK_EQ.store(true, Ordering::SeqCst);
    map.try_grow().unwrap();

    // Helping the resize splits the tree holding key 5
    let unrelated = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        map.insert(Fragile { id: 1000, hash: 1 }, 1000)
    }));
    assert!(matches!(unrelated, Ok(None)));

    map.finish_resize();
    assert!(!map.is_resizing());
    assert_eq!(map.capacity(), 128);
    assert_eq!(map.insert(Fragile { id: 2000, hash: 2 }, 2000), None);

    let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        map.get(&Fragile { id: 5, hash: 0 })
    }));
    assert!(poisoned.is_err());

    BREAK_EQ.store(false, Ordering::SeqCst);
    assert_eq!(map.len(), 12);
    for id in 0..10 {
        assert_eq!(map.get(&Fragile { id, hash: 0 }), Some(id));
    }
    assert_eq!(map.get(&Fragile { id: 1000, hash: 1 }), Some(1000));
}
