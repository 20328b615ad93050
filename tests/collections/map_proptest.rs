/*!
 * Striped Map Model Tests
 * Random operation sequences checked against std HashMap
 */

use proptest::prelude::*;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use striped_sync::{MapConfig, StripedMap};

#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u32),
    Remove(u16),
    ComputeIfAbsent(u16, u32),
    Increment(u16),
    Clear,
}

fn op_strategy(keys: u16) -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..keys, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => (0..keys).prop_map(Op::Remove),
        2 => (0..keys, any::<u32>()).prop_map(|(k, v)| Op::ComputeIfAbsent(k, v)),
        2 => (0..keys).prop_map(Op::Increment),
        1 => Just(Op::Clear),
    ]
}

/// Folds every key into one of four hashes so buckets grow deep
#[derive(Clone, Default)]
struct FourHashes;

#[derive(Default)]
struct FourHasher(u64);

impl Hasher for FourHasher {
    fn finish(&self) -> u64 {
        self.0 % 4
    }
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = self.0.wrapping_add(u64::from(*b));
        }
    }
}

impl BuildHasher for FourHashes {
    type Hasher = FourHasher;
    fn build_hasher(&self) -> FourHasher {
        FourHasher::default()
    }
}

fn run_model<S: BuildHasher>(map: &StripedMap<u16, u32, S>, ops: &[Op]) -> Result<(), TestCaseError> {
    let mut model: HashMap<u16, u32> = HashMap::new();

    for op in ops {
        match *op {
            Op::Insert(k, v) => {
                prop_assert_eq!(map.insert(k, v), model.insert(k, v));
            }
            Op::Remove(k) => {
                prop_assert_eq!(map.remove(&k), model.remove(&k));
            }
            Op::ComputeIfAbsent(k, v) => {
                let expected = *model.entry(k).or_insert(v);
                prop_assert_eq!(map.compute_if_absent(k, || v), expected);
            }
            Op::Increment(k) => {
                let expected = model.get(&k).copied().unwrap_or(0).wrapping_add(1);
                model.insert(k, expected);
                prop_assert_eq!(
                    map.compute(k, |v| Some(v.copied().unwrap_or(0).wrapping_add(1))),
                    Some(expected)
                );
            }
            Op::Clear => {
                map.clear();
                model.clear();
            }
        }
        prop_assert_eq!(map.len(), model.len());
    }

    let mut actual = map.snapshot();
    actual.sort_unstable();
    let mut expected: Vec<(u16, u32)> = model.into_iter().collect();
    expected.sort_unstable();
    prop_assert_eq!(actual, expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_matches_hashmap(ops in prop::collection::vec(op_strategy(512), 1..400)) {
        let config = MapConfig {
            initial_capacity: 1,
            migration_stride: 1,
            ..MapConfig::default()
        };
        let map = StripedMap::with_config(config, ahash::RandomState::new()).unwrap();
        run_model(&map, &ops)?;
    }

    #[test]
    fn prop_matches_hashmap_under_collisions(ops in prop::collection::vec(op_strategy(64), 1..300)) {
        let map = StripedMap::with_capacity_and_hasher(64, FourHashes);
        run_model(&map, &ops)?;
        prop_assert!(map.stats().longest_bucket <= map.len().max(1));
    }
}
