//! Persistent (immutable) collections with scoped mutation batches.
//!
//! This module provides three engines, each behind a persistent handle and a
//! transient (batch) handle:
//!
//! - [`PersistentHashMap`]: hash map on a hash array mapped trie
//! - [`PersistentVector`]: indexed sequence on a radix trie with a tail
//! - [`PersistentSortedMap`]: ordered map on a B-tree with bulk packing
//!
//! # Structural Sharing
//!
//! Every write copies only the path from the root to the changed entry.
//! A write that changes nothing returns a handle sharing the original root,
//! which [`ptr_eq`](PersistentHashMap::ptr_eq) makes observable.
//!
//! # Mutation batches
//!
//! `with_mutations` opens a batch for the duration of a closure. The first
//! write in the batch copies a node; later writes in the same batch edit
//! that copy in place. Handles created before the batch never see its
//! writes.
//!
//! # Examples
//!
//! ## `PersistentHashMap`
//!
//! ```rust
//! use cowtrie::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//! ```
//!
//! ## `PersistentVector`
//!
//! ```rust
//! use cowtrie::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! assert_eq!(vector.get(50), Some(&50));
//!
//! let shifted = vector.push_front(-1);
//! assert_eq!(shifted.get(0), Some(&-1));
//! assert_eq!(vector.len(), 100);
//! ```
//!
//! ## `PersistentSortedMap`
//!
//! ```rust
//! use cowtrie::persistent::PersistentSortedMap;
//!
//! let map: PersistentSortedMap<i32, &str> =
//!     [(3, "three"), (1, "one"), (2, "two")].into_iter().collect();
//! let range: Vec<_> = map.range(1..=2).map(|(key, _)| *key).collect();
//! assert_eq!(range, vec![1, 2]);
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod btree;
mod hash_trie;
mod hashmap;
mod options;
mod owner;
mod sorted_map;
mod vector;
mod vector_trie;

pub use btree::RebalanceStats;
pub use hash_trie::NodeKind;
pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIterator;
pub use hashmap::TransientHashMap;
pub use options::BTREE_NODE_TYPE;
pub use options::SortedMapOptions;
pub use sorted_map::PersistentSortedMap;
pub use sorted_map::PersistentSortedMapIterator;
pub use sorted_map::TransientSortedMap;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIterator;
pub use vector::TransientVector;

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentHashMap<i32, i32>: Send, Sync);
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<i32>: Send, Sync);
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentSortedMap<i32, i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_clone() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        let reference_counter_clone = reference_counter.clone();
        assert!(ReferenceCounter::ptr_eq(&reference_counter, &reference_counter_clone));
    }

    #[rstest]
    fn test_make_mut_copies_only_when_shared() {
        let mut unique: ReferenceCounter<Vec<i32>> = ReferenceCounter::new(vec![1]);
        let before = ReferenceCounter::as_ptr(&unique);
        ReferenceCounter::make_mut(&mut unique).push(2);
        assert_eq!(ReferenceCounter::as_ptr(&unique), before);

        let shared = unique.clone();
        ReferenceCounter::make_mut(&mut unique).push(3);
        assert_eq!(*shared, vec![1, 2]);
        assert_eq!(*unique, vec![1, 2, 3]);
    }
}
