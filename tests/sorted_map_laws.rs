#![cfg(feature = "persistent")]
//! Model-based laws for PersistentSortedMap.
//!
//! Long seeded operation sequences are replayed against a
//! `std::collections::BTreeMap`; the tree must stay consistent after every
//! write and iterate exactly like the model.

use std::collections::BTreeMap;

use cowtrie::persistent::{PersistentSortedMap, TransientSortedMap};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

// =============================================================================
// Seeded model replay
// =============================================================================

#[rstest]
#[case(3, 11)]
#[case(7, 12)]
#[case(33, 13)]
fn test_seeded_operations_match_model(#[case] order: usize, #[case] seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut map: PersistentSortedMap<u32, u32> = PersistentSortedMap::with_order(order).unwrap();
    let mut model: BTreeMap<u32, u32> = BTreeMap::new();

    for step in 0..10_000 {
        let key = rng.gen_range(0..500);
        let value = rng.gen_range(0..4);
        match rng.gen_range(0..8) {
            0..=3 => {
                map = map.insert(key, value);
                model.insert(key, value);
            }
            4..=6 => {
                map = map.remove(&key);
                model.remove(&key);
            }
            _ => {
                map = map.update_with(&key, |current| current.map(|current| current + 1));
                if let Some(current) = model.get_mut(&key) {
                    *current += 1;
                }
            }
        }
        assert_eq!(map.check_consistency(), Ok(()), "order {order}, step {step}");
        assert_eq!(map.len(), model.len(), "order {order}, step {step}");
    }
    assert!(map.iter().eq(model.iter()));
    assert!(map.iter_rev().eq(model.iter().rev()));
}

#[rstest]
#[case(3)]
#[case(7)]
#[case(33)]
fn test_fast_remove_matches_model_after_pack(#[case] order: usize) {
    let mut rng = SmallRng::seed_from_u64(order as u64);
    let mut transient: TransientSortedMap<u32, u32> = TransientSortedMap::with_order(order).unwrap();
    let mut model: BTreeMap<u32, u32> = BTreeMap::new();

    for _ in 0..5_000 {
        let key = rng.gen_range(0..300);
        if rng.gen_bool(0.6) {
            transient.insert(key, key);
            model.insert(key, key);
        } else {
            assert_eq!(transient.fast_remove(&key), model.remove(&key).is_some());
        }
        assert_eq!(transient.len(), model.len());
    }
    transient.pack().unwrap();
    assert_eq!(transient.check_consistency(), Ok(()));
    let map = transient.persistent();
    assert!(map.iter().eq(model.iter()));
}

// =============================================================================
// Range Law: map.range(a..b) equals the model's range
// =============================================================================

fn arbitrary_keys() -> impl Strategy<Value = Vec<i16>> {
    prop::collection::vec(any::<i16>(), 0..400)
}

proptest! {
    #[test]
    fn prop_range_matches_model(keys in arbitrary_keys(), start in any::<i16>(), end in any::<i16>(), order in 3_usize..12) {
        prop_assume!(start <= end);
        let map = keys
            .iter()
            .fold(PersistentSortedMap::with_order(order).unwrap(), |map, key| map.insert(*key, ()));
        let model: BTreeMap<i16, ()> = keys.iter().map(|key| (*key, ())).collect();
        prop_assert!(map.range(start..end).map(|(key, _)| *key).eq(model.range(start..end).map(|(key, _)| *key)));
        prop_assert!(map.range(start..=end).map(|(key, _)| *key).eq(model.range(start..=end).map(|(key, _)| *key)));
        prop_assert!(map.range(..end).map(|(key, _)| *key).eq(model.range(..end).map(|(key, _)| *key)));
    }
}

// =============================================================================
// Persistence Law: writes never change earlier versions
// =============================================================================

proptest! {
    #[test]
    fn prop_earlier_version_unchanged(keys in arbitrary_keys(), removed in arbitrary_keys()) {
        let original: PersistentSortedMap<i16, i16> = keys.iter().map(|key| (*key, *key)).collect();
        let snapshot: Vec<(i16, i16)> = original.iter().map(|(key, value)| (*key, *value)).collect();
        let edited = original.remove_all(&removed).insert(i16::MIN, 0);
        prop_assert_eq!(edited.check_consistency(), Ok(()));
        let after: Vec<(i16, i16)> = original.iter().map(|(key, value)| (*key, *value)).collect();
        prop_assert_eq!(snapshot, after);
    }
}
