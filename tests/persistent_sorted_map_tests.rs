#![cfg(feature = "persistent")]
//! Integration tests for PersistentSortedMap.
//!
//! These tests drive the B-tree through splits, borrows and merges, check
//! the tree after every write, and cover tombstones, packing and options.

use std::ops::ControlFlow;

use cowtrie::error::CollectionError;
use cowtrie::persistent::{PersistentSortedMap, SortedMapOptions, TransientSortedMap};
use rstest::rstest;

// =============================================================================
// Rebalancing
// =============================================================================

#[rstest]
fn test_order_five_grow_and_shrink_repairs_the_tree() {
    let mut transient = TransientSortedMap::with_order(5).unwrap();
    for key in 1..=40 {
        assert!(transient.insert(key, key * 10));
        assert_eq!(transient.check_consistency(), Ok(()));
    }
    assert!(transient.stats().splits > 0);

    for key in 1..=35 {
        assert!(transient.remove(&key));
        assert_eq!(transient.check_consistency(), Ok(()), "after removing {key}");
    }
    let stats = transient.stats();
    assert!(stats.borrows > 0);
    assert!(stats.merges > 0);

    let map = transient.persistent();
    assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![36, 37, 38, 39, 40]);
    assert_eq!(map.get(&38), Some(&380));
}

#[rstest]
#[case(3)]
#[case(4)]
#[case(6)]
#[case(33)]
fn test_descending_inserts_and_interleaved_removals(#[case] order: usize) {
    let mut map = PersistentSortedMap::with_order(order).unwrap();
    for key in (0..300).rev() {
        map = map.insert(key, key);
    }
    assert_eq!(map.check_consistency(), Ok(()));
    for key in (0..300).step_by(3) {
        map = map.remove(&key);
        assert_eq!(map.check_consistency(), Ok(()));
    }
    assert_eq!(map.len(), 200);
    assert!(map.keys().all(|key| key % 3 != 0));
}

#[rstest]
fn test_removing_everything_leaves_empty_consistent_map() {
    let map: PersistentSortedMap<i32, i32> = (0..100).map(|key| (key, key)).collect();
    let emptied = map.remove_all(&(0..100).collect::<Vec<_>>());
    assert!(emptied.is_empty());
    assert_eq!(emptied.height(), 0);
    assert_eq!(emptied.check_consistency(), Ok(()));
    assert_eq!(map.len(), 100);
}

// =============================================================================
// Persistence
// =============================================================================

#[rstest]
fn test_versions_are_independent() {
    let base: PersistentSortedMap<i32, &str> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
    let updated = base.insert(2, "z");
    let removed = base.remove(&1);
    assert_eq!(base.get(&2), Some(&"b"));
    assert_eq!(updated.get(&2), Some(&"z"));
    assert_eq!(removed.first(), Some((&2, &"b")));
    assert_eq!(base.len(), 3);
}

#[rstest]
fn test_no_op_writes_share_root() {
    let map: PersistentSortedMap<i32, i32> = (0..50).map(|key| (key, key)).collect();
    assert!(map.insert(10, 10).ptr_eq(&map));
    assert!(map.remove(&999).ptr_eq(&map));
    assert!(map.fast_remove(&999).ptr_eq(&map));
    assert!(map.with_mutations(|_| {}).ptr_eq(&map));
}

// =============================================================================
// Tombstones and packing
// =============================================================================

#[rstest]
fn test_fast_remove_then_pack_restores_consistency() {
    let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::with_order(5)
        .unwrap()
        .pack_entries((0..100).map(|key| (key, key)))
        .unwrap();
    assert_eq!(map.check_consistency(), Ok(()));

    let thinned = map.with_mutations(|batch| {
        for key in (0..100).filter(|key| key % 2 == 0) {
            assert!(batch.fast_remove(&key));
        }
    });
    assert_eq!(thinned.len(), 50);
    assert_eq!(
        thinned.check_consistency().map_err(|violation| violation.code()),
        Err(113)
    );
    assert!(thinned.keys().copied().eq((1..100).step_by(2)));

    let packed = thinned.pack().unwrap();
    assert_eq!(packed.check_consistency(), Ok(()));
    assert_eq!(packed, thinned);
    assert!(packed.height() <= thinned.height());
}

#[rstest]
fn test_removed_key_can_be_revived() {
    let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::with_order(3)
        .unwrap()
        .pack_entries((0..20).map(|key| (key, key)))
        .unwrap();
    let removed = map.fast_remove(&10);
    assert!(!removed.contains_key(&10));
    let revived = removed.insert(10, 100);
    assert_eq!(revived.len(), 20);
    assert_eq!(revived.get(&10), Some(&100));
}

#[rstest]
fn test_pack_entries_sorts_and_deduplicates() {
    let map = PersistentSortedMap::new()
        .pack_entries([(5, 'e'), (1, 'a'), (3, 'c'), (1, 'z')])
        .unwrap();
    assert_eq!(
        map.iter().map(|(key, value)| (*key, *value)).collect::<Vec<_>>(),
        vec![(1, 'z'), (3, 'c'), (5, 'e')]
    );
}

// =============================================================================
// Ranges and iteration
// =============================================================================

#[rstest]
#[case(10..20, (10..20).collect())]
#[case(95..200, (95..100).collect())]
#[case(-5..3, vec![0, 1, 2])]
#[case(50..50, vec![])]
fn test_range_queries(#[case] range: std::ops::Range<i32>, #[case] expected: Vec<i32>) {
    let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::with_order(4)
        .unwrap()
        .pack_entries((0..100).map(|key| (key, key)))
        .unwrap();
    assert_eq!(map.range(range).map(|(key, _)| *key).collect::<Vec<_>>(), expected);
}

#[rstest]
fn test_range_skips_tombstones() {
    let map: PersistentSortedMap<i32, i32> = (0..30).map(|key| (key, key)).collect();
    let thinned = map.fast_remove(&11).remove(&12);
    assert_eq!(
        thinned.range(10..=14).map(|(key, _)| *key).collect::<Vec<_>>(),
        vec![10, 13, 14]
    );
}

#[rstest]
fn test_reverse_iteration_and_iterate() {
    let map: PersistentSortedMap<i32, i32> = (0..200).map(|key| (key, key)).collect();
    assert!(map.iter_rev().map(|(key, _)| *key).eq((0..200).rev()));
    let mut last = None;
    let visited = map.iterate(true, |key, _| {
        last = Some(*key);
        if *key == 190 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(visited, 10);
    assert_eq!(last, Some(190));
}

// =============================================================================
// Diagnostics and options
// =============================================================================

#[rstest]
fn test_debug_tree_shows_internal_tombstone() {
    let map = PersistentSortedMap::with_order(5)
        .unwrap()
        .pack_entries((1..=5).map(|key| (key, ())))
        .unwrap()
        .remove(&3);
    let dump = map.debug_tree(None);
    assert!(dump.contains("- REMOVED ENTRY[0]: 3"));
    assert!(dump.starts_with("+ LEAF[0] (L0)\n"));
    assert_eq!(map.debug_tree(Some(0)), "");
}

#[rstest]
fn test_invalid_options_are_rejected() {
    assert_eq!(
        PersistentSortedMap::<i32, i32>::with_order(2).err(),
        Some(CollectionError::InvalidOrder { order: 2 })
    );
    let options = SortedMapOptions {
        node_type: "redblack".to_string(),
        btree_order: 8,
    };
    assert!(matches!(
        PersistentSortedMap::<i32, i32>::with_options(options),
        Err(CollectionError::UnsupportedNodeShape { .. })
    ));
}

#[cfg(feature = "serde")]
#[rstest]
fn test_options_from_json_drive_the_tree() {
    let options: SortedMapOptions =
        serde_json::from_str(r#"{"nodeType": "btree", "btreeOrder": 3}"#).unwrap();
    let map = PersistentSortedMap::with_options(options).unwrap();
    let map = (0..10).fold(map, |map, key| map.insert(key, key));
    assert_eq!(map.options().btree_order, 3);
    assert_eq!(map.height(), 3);
    assert_eq!(map.check_consistency(), Ok(()));
}
