//! Persistent (immutable) sorted map based on a B-tree.
//!
//! This module provides [`PersistentSortedMap`], an ordered map that uses
//! structural sharing, and [`TransientSortedMap`], its batch-mutation
//! counterpart.
//!
//! # Overview
//!
//! Entries live in a B-tree of configurable order (33 by default). Keys
//! removed from internal nodes are tombstoned instead of being pulled up
//! from a leaf, and [`PersistentSortedMap::fast_remove`] tombstones keys
//! anywhere without rebalancing. [`PersistentSortedMap::pack`] rebuilds a
//! minimum-height tree from the live entries and drops every tombstone.
//!
//! - O(log N) get, insert and remove
//! - O(N) pack
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::PersistentSortedMap;
//!
//! let map = PersistentSortedMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! let keys: Vec<_> = map.keys().copied().collect();
//! assert_eq!(keys, vec![1, 2, 3]);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.remove(&2);
//! assert_eq!(map.len(), 3);
//! assert_eq!(updated.len(), 2);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::{Bound, ControlFlow, RangeBounds};
use std::rc::Rc;

use crate::error::{CollectionResult, ConsistencyViolation};

use super::ReferenceCounter;
use super::btree::{BTree, BTreeIter, RebalanceStats};
use super::options::SortedMapOptions;
use super::owner::OwnerToken;

// =============================================================================
// PersistentSortedMap Definition
// =============================================================================

/// A persistent (immutable) sorted map based on a B-tree.
///
/// # Time Complexity
///
/// | Operation     | Complexity |
/// |---------------|------------|
/// | `new`         | O(1)       |
/// | `get`         | O(log N)   |
/// | `insert`      | O(log N)   |
/// | `remove`      | O(log N)   |
/// | `fast_remove` | O(log N)   |
/// | `first`       | O(log N)   |
/// | `pack`        | O(N)       |
/// | `len`         | O(1)       |
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentSortedMap;
///
/// let map: PersistentSortedMap<i32, &str> = [(2, "b"), (1, "a")].into_iter().collect();
/// assert_eq!(map.first(), Some((&1, &"a")));
/// assert_eq!(map.last(), Some((&2, &"b")));
/// ```
pub struct PersistentSortedMap<K, V> {
    tree: BTree<K, V>,
    options: ReferenceCounter<SortedMapOptions>,
}

impl<K, V> Clone for PersistentSortedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            options: self.options.clone(),
        }
    }
}

impl<K, V> PersistentSortedMap<K, V> {
    /// Creates a new empty map with the default options.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<String, i32> = PersistentSortedMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.options().btree_order, 33);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let options = SortedMapOptions::default();
        Self {
            tree: BTree::new(options.btree_order),
            options: ReferenceCounter::new(options),
        }
    }

    /// Creates a new empty map with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::UnsupportedNodeShape`] or
    /// [`CollectionError::InvalidOrder`] if the options do not validate.
    ///
    /// [`CollectionError::UnsupportedNodeShape`]: crate::error::CollectionError::UnsupportedNodeShape
    /// [`CollectionError::InvalidOrder`]: crate::error::CollectionError::InvalidOrder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::{PersistentSortedMap, SortedMapOptions};
    ///
    /// let options = SortedMapOptions::default().with_order(2);
    /// assert!(PersistentSortedMap::<i32, i32>::with_options(options).is_err());
    /// ```
    pub fn with_options(options: SortedMapOptions) -> CollectionResult<Self> {
        options.validate()?;
        Ok(Self {
            tree: BTree::new(options.btree_order),
            options: ReferenceCounter::new(options),
        })
    }

    /// Creates a new empty map with the default options and the given order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidOrder`](crate::error::CollectionError::InvalidOrder)
    /// if `order` is below 3.
    pub fn with_order(order: usize) -> CollectionResult<Self> {
        Self::with_options(SortedMapOptions::default().with_order(order))
    }

    /// Returns the number of live entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains no live entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    /// Returns the options this map was created with.
    #[must_use]
    pub fn options(&self) -> &SortedMapOptions {
        &self.options
    }

    /// Returns the number of levels in the tree, or zero for an empty map.
    #[must_use]
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns `true` if both maps share the same root node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    /// Returns an iterator over entries in ascending key order.
    pub fn iter(&self) -> PersistentSortedMapIterator<'_, K, V> {
        PersistentSortedMapIterator::new(self.tree.iter(false), self.len())
    }

    /// Returns an iterator over entries in descending key order.
    pub fn iter_rev(&self) -> PersistentSortedMapIterator<'_, K, V> {
        PersistentSortedMapIterator::new(self.tree.iter(true), self.len())
    }

    /// Returns an iterator over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Visits entries in key order until `visit` breaks.
    ///
    /// Returns the number of entries visited, including the one that broke.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::ops::ControlFlow;
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..10).map(|key| (key, key)).collect();
    /// let visited = map.iterate(true, |key, _| {
    ///     if *key == 7 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    /// });
    /// assert_eq!(visited, 3);
    /// ```
    pub fn iterate<F>(&self, reverse: bool, visit: F) -> usize
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        self.tree.iterate(reverse, visit)
    }

    /// Converts this map into a transient map for batch updates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..3).map(|key| (key, key)).collect();
    /// let mut transient = map.transient();
    /// transient.insert(3, 3);
    /// transient.remove(&0);
    /// let updated = transient.persistent();
    /// assert_eq!(updated.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn transient(self) -> TransientSortedMap<K, V> {
        TransientSortedMap {
            tree: self.tree,
            options: self.options,
            owner: OwnerToken::mint(),
            altered: false,
            stats: RebalanceStats::default(),
            _marker: PhantomData,
        }
    }
}

impl<K: Ord, V> PersistentSortedMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns `true` if the map contains a live entry for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).is_some()
    }

    /// Returns the entry with the smallest key.
    #[must_use]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.tree.iter(false).next()
    }

    /// Returns the entry with the largest key.
    #[must_use]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.tree.iter(true).next()
    }

    /// Returns an iterator over the entries whose keys fall in `range`.
    ///
    /// The iterator seeks straight to the start bound instead of walking
    /// the entries below it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..100).map(|key| (key, key * 2)).collect();
    /// let keys: Vec<_> = map.range(10..15).map(|(key, _)| *key).collect();
    /// assert_eq!(keys, vec![10, 11, 12, 13, 14]);
    /// assert_eq!(map.range(95..).count(), 5);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> impl Iterator<Item = (&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        let start = self.tree.seek(range.start_bound());
        start.take_while(move |(key, _)| match range.end_bound() {
            Bound::Included(end) => (*key).borrow() <= end,
            Bound::Excluded(end) => (*key).borrow() < end,
            Bound::Unbounded => true,
        })
    }

    /// Verifies the B-tree invariants, reporting the first violation found.
    ///
    /// Maps touched by [`fast_remove`](Self::fast_remove) report tombstones
    /// in leaves until they are packed.
    ///
    /// # Errors
    ///
    /// Returns the [`ConsistencyViolation`] describing the broken invariant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..500).map(|key| (key, key)).collect();
    /// assert!(map.check_consistency().is_ok());
    /// ```
    pub fn check_consistency(&self) -> Result<(), ConsistencyViolation> {
        self.tree.check_consistency()
    }
}

impl<K: fmt::Debug, V> PersistentSortedMap<K, V> {
    /// Renders the tree structure, one line per node or entry.
    ///
    /// Levels deeper than `max_depth` are omitted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::with_order(3).unwrap().insert(1, ()).insert(2, ());
    /// assert_eq!(map.debug_tree(None), "- ENTRY[0]: 1\n- ENTRY[1]: 2\n");
    /// ```
    #[must_use]
    pub fn debug_tree(&self, max_depth: Option<usize>) -> String {
        self.tree.debug_tree(max_depth)
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PersistentSortedMap<K, V> {
    /// Creates a map containing a single entry.
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// Inserting a value equal to the current one returns a map sharing this
    /// map's root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new().insert(1, "one");
    /// let same = map.insert(1, "one");
    /// assert!(map.ptr_eq(&same));
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.with_mutations(|transient| {
            transient.insert(key, value);
        })
    }

    /// Removes a key, rebalancing the tree.
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.with_mutations(|transient| {
            transient.remove(key);
        })
    }

    /// Removes a key by tombstoning it, without rebalancing.
    ///
    /// The tombstone stays in the tree until the map is packed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map: PersistentSortedMap<i32, i32> = (0..50).map(|key| (key, key)).collect();
    /// let removed = map.fast_remove(&10);
    /// assert_eq!(removed.get(&10), None);
    /// assert_eq!(removed.len(), 49);
    /// assert!(removed.pack().unwrap().check_consistency().is_ok());
    /// ```
    #[must_use]
    pub fn fast_remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.with_mutations(|transient| {
            transient.fast_remove(key);
        })
    }

    /// Inserts, updates or removes the entry for `key` through `updater`.
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        self.with_mutations(|transient| {
            transient.update_with(key, updater);
        })
    }

    /// Removes every key yielded by `keys`.
    #[must_use]
    pub fn remove_all<'a, Q, I>(&self, keys: I) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        self.with_mutations(|transient| {
            for key in keys {
                transient.remove(key);
            }
        })
    }

    /// Inserts every entry of `other`, its values winning on shared keys.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.with_mutations(|transient| {
            transient.extend(other.iter().map(|(key, value)| (key.clone(), value.clone())));
        })
    }

    /// Rebuilds the map as a minimum-height tree without tombstones.
    ///
    /// # Errors
    ///
    /// Returns an error if the options no longer validate or the packer
    /// fails; this map is left untouched.
    pub fn pack(&self) -> CollectionResult<Self> {
        let mut transient = self.clone().transient();
        transient.pack()?;
        Ok(transient.persistent())
    }

    /// Replaces the contents with `entries`, packed into a minimum-height tree.
    ///
    /// The entries need not be sorted. When a key repeats, its last
    /// occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the options no longer validate or the packer
    /// fails; this map is left untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let map = PersistentSortedMap::new()
    ///     .pack_entries([(3, "c"), (1, "a"), (3, "z")])
    ///     .unwrap();
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get(&3), Some(&"z"));
    /// ```
    pub fn pack_entries<I>(&self, entries: I) -> CollectionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut transient = self.clone().transient();
        transient.pack_entries(entries)?;
        Ok(transient.persistent())
    }

    /// Returns an empty map with the same options.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self {
            tree: BTree::new(self.tree.order()),
            options: self.options.clone(),
        }
    }

    /// Applies a batch of edits through a [`TransientSortedMap`].
    ///
    /// If the batch changes nothing, the returned map shares this map's root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentSortedMap;
    ///
    /// let base: PersistentSortedMap<i32, i32> = PersistentSortedMap::new();
    /// let filled = base.with_mutations(|batch| {
    ///     for key in (0..100).rev() {
    ///         batch.insert(key, key);
    ///     }
    /// });
    /// assert_eq!(filled.first(), Some((&0, &0)));
    /// assert!(base.is_empty());
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, body: F) -> Self
    where
        F: FnOnce(&mut TransientSortedMap<K, V>),
    {
        let mut transient = self.clone().transient();
        body(&mut transient);
        if transient.was_altered() {
            transient.persistent()
        } else {
            self.clone()
        }
    }
}

// =============================================================================
// TransientSortedMap Definition
// =============================================================================

/// A mutable sorted map owning one mutation batch.
///
/// Besides the usual batch semantics, the transient counts the splits,
/// borrows and merges its writes caused; see [`stats`](Self::stats).
///
/// `TransientSortedMap` is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::TransientSortedMap;
///
/// let mut transient = TransientSortedMap::with_order(5).unwrap();
/// for key in 1..=40 {
///     transient.insert(key, key);
/// }
/// for key in 1..=35 {
///     transient.remove(&key);
/// }
/// let stats = transient.stats();
/// assert!(stats.splits > 0 && stats.merges > 0);
/// assert_eq!(transient.persistent().len(), 5);
/// ```
pub struct TransientSortedMap<K, V> {
    tree: BTree<K, V>,
    options: ReferenceCounter<SortedMapOptions>,
    owner: OwnerToken,
    altered: bool,
    stats: RebalanceStats,
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientSortedMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientSortedMap<String, String>: Send, Sync);

impl<K, V> TransientSortedMap<K, V> {
    /// Creates an empty transient map with the default options.
    #[must_use]
    pub fn new() -> Self {
        PersistentSortedMap::new().transient()
    }

    /// Creates an empty transient map with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options do not validate.
    pub fn with_options(options: SortedMapOptions) -> CollectionResult<Self> {
        PersistentSortedMap::with_options(options).map(PersistentSortedMap::transient)
    }

    /// Creates an empty transient map with the given order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidOrder`](crate::error::CollectionError::InvalidOrder)
    /// if `order` is below 3.
    pub fn with_order(order: usize) -> CollectionResult<Self> {
        PersistentSortedMap::with_order(order).map(PersistentSortedMap::transient)
    }

    /// Returns the number of live entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains no live entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    /// Returns `true` if any write in this batch changed the map.
    #[inline]
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Returns the structural repairs performed so far in this batch.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> RebalanceStats {
        self.stats
    }

    /// Returns the options this map was created with.
    #[must_use]
    pub fn options(&self) -> &SortedMapOptions {
        &self.options
    }

    /// Runs `body` against this transient.
    ///
    /// Batches do not nest: the body continues the batch already open here.
    pub fn with_mutations<F>(&mut self, body: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        body(self);
        self
    }

    /// Ends the batch and freezes the map.
    ///
    /// # Complexity
    ///
    /// O(1) - only moves fields
    #[must_use]
    pub fn persistent(self) -> PersistentSortedMap<K, V> {
        PersistentSortedMap {
            tree: self.tree,
            options: self.options,
        }
    }
}

impl<K: Ord, V> TransientSortedMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns `true` if the map contains a live entry for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).is_some()
    }

    /// Verifies the B-tree invariants of the batch in progress.
    ///
    /// # Errors
    ///
    /// Returns the [`ConsistencyViolation`] describing the broken invariant.
    pub fn check_consistency(&self) -> Result<(), ConsistencyViolation> {
        self.tree.check_consistency()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> TransientSortedMap<K, V> {
    /// Inserts a key-value pair in place.
    ///
    /// Returns `true` if the map changed.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let altered = self
            .tree
            .upsert(self.owner, key, value, &mut self.stats)
            .altered;
        self.altered |= altered;
        altered
    }

    /// Removes a key in place, rebalancing the tree.
    ///
    /// Returns `true` if the key was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let altered = self.tree.remove(self.owner, key, &mut self.stats).altered;
        self.altered |= altered;
        altered
    }

    /// Tombstones a key in place without rebalancing.
    ///
    /// Returns `true` if the key was present.
    pub fn fast_remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let altered = self.tree.fast_remove(self.owner, key).altered;
        self.altered |= altered;
        altered
    }

    /// Inserts, updates or removes the entry for `key` through `updater`.
    ///
    /// Returns `true` if the map changed.
    pub fn update_with<Q, F>(&mut self, key: &Q, updater: F) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(key)) {
            Some(value) => self.insert(key.to_owned(), value),
            None => self.remove(key),
        }
    }

    /// Repacks the live entries into a minimum-height tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the options no longer validate or the packer
    /// fails; the map is left untouched.
    pub fn pack(&mut self) -> CollectionResult<()> {
        let entries: Vec<(K, V)> = self
            .tree
            .iter(false)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.replace_packed(entries)
    }

    /// Replaces the contents with `entries`, packed into a minimum-height tree.
    ///
    /// The entries are sorted stably by key; a repeated key keeps its last
    /// value.
    ///
    /// # Errors
    ///
    /// Returns an error if the options no longer validate or the packer
    /// fails; the map is left untouched.
    pub fn pack_entries<I>(&mut self, entries: I) -> CollectionResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut sorted: Vec<(K, V)> = entries.into_iter().collect();
        sorted.sort_by(|left, right| left.0.cmp(&right.0));
        let mut unique: Vec<(K, V)> = Vec::with_capacity(sorted.len());
        for entry in sorted {
            match unique.last_mut() {
                Some(last) if last.0 == entry.0 => *last = entry,
                _ => unique.push(entry),
            }
        }
        self.replace_packed(unique)
    }

    fn replace_packed(&mut self, entries: Vec<(K, V)>) -> CollectionResult<()> {
        self.options.validate()?;
        let mut tree = BTree::new(self.options.btree_order);
        tree.pack(self.owner, entries.into_iter())?;
        self.tree = tree;
        self.altered = true;
        Ok(())
    }

    /// Removes every entry.
    ///
    /// Returns `true` if the map was not already empty.
    pub fn clear(&mut self) -> bool {
        let altered = self.tree.clear();
        self.altered |= altered;
        altered
    }
}

impl<K, V> Default for TransientSortedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> Extend<(K, V)> for TransientSortedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentSortedMap`].
pub struct PersistentSortedMapIterator<'a, K, V> {
    inner: BTreeIter<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> PersistentSortedMapIterator<'a, K, V> {
    const fn new(inner: BTreeIter<'a, K, V>, remaining: usize) -> Self {
        Self { inner, remaining }
    }
}

impl<'a, K, V> Iterator for PersistentSortedMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentSortedMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentSortedMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentSortedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientSortedMap::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentSortedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentSortedMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for PersistentSortedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && (self.ptr_eq(other) || self.iter().eq(other.iter()))
    }
}

impl<K: Eq, V: Eq> Eq for PersistentSortedMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentSortedMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectionError;
    use rstest::rstest;

    fn keys(map: &PersistentSortedMap<i32, i32>) -> Vec<i32> {
        map.keys().copied().collect()
    }

    fn ordered(order: usize, keys: impl IntoIterator<Item = i32>) -> PersistentSortedMap<i32, i32> {
        PersistentSortedMap::with_order(order)
            .unwrap()
            .with_mutations(|transient| transient.extend(keys.into_iter().map(|key| (key, key))))
    }

    #[rstest]
    fn test_new_is_empty() {
        let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.first(), None);
        assert_eq!(map.height(), 0);
        assert_eq!(map.check_consistency(), Ok(()));
    }

    #[rstest]
    fn test_with_options_rejects_bad_node_type() {
        let options = SortedMapOptions {
            node_type: "hash".to_string(),
            ..SortedMapOptions::default()
        };
        assert!(matches!(
            PersistentSortedMap::<i32, i32>::with_options(options),
            Err(CollectionError::UnsupportedNodeShape { .. })
        ));
    }

    #[rstest]
    fn test_insert_preserves_original() {
        let map = ordered(5, 0..20);
        let updated = map.insert(100, 100);
        assert_eq!(map.len(), 20);
        assert_eq!(updated.len(), 21);
        assert_eq!(map.get(&100), None);
        assert_eq!(updated.get(&100), Some(&100));
    }

    #[rstest]
    fn test_remove_absent_key_shares_root() {
        let map = ordered(5, 0..20);
        assert!(map.remove(&50).ptr_eq(&map));
        assert!(map.fast_remove(&50).ptr_eq(&map));
    }

    #[rstest]
    fn test_keys_come_out_sorted() {
        let map = ordered(4, [5, 3, 9, 1, 7, 2, 8]);
        assert_eq!(keys(&map), vec![1, 2, 3, 5, 7, 8, 9]);
        let reversed: Vec<i32> = map.iter_rev().map(|(key, _)| *key).collect();
        assert_eq!(reversed, vec![9, 8, 7, 5, 3, 2, 1]);
    }

    #[rstest]
    fn test_first_and_last_skip_tombstones() {
        let map = ordered(5, 1..=30).fast_remove(&1).fast_remove(&30);
        assert_eq!(map.first(), Some((&2, &2)));
        assert_eq!(map.last(), Some((&29, &29)));
    }

    #[rstest]
    #[case(10, 20, 10)]
    #[case(0, 5, 5)]
    #[case(95, 200, 5)]
    #[case(40, 40, 0)]
    fn test_range_counts(#[case] start: i32, #[case] end: i32, #[case] expected: usize) {
        let map = ordered(5, 0..100);
        assert_eq!(map.range(start..end).count(), expected);
    }

    #[rstest]
    fn test_range_bound_kinds() {
        let map = ordered(5, (0..100).map(|key| key * 2));
        let inclusive: Vec<i32> = map.range(10..=14).map(|(key, _)| *key).collect();
        assert_eq!(inclusive, vec![10, 12, 14]);
        let gap: Vec<i32> = map.range(11..17).map(|(key, _)| *key).collect();
        assert_eq!(gap, vec![12, 14, 16]);
        let excluded: Vec<i32> = map
            .range((Bound::Excluded(10), Bound::Included(14)))
            .map(|(key, _)| *key)
            .collect();
        assert_eq!(excluded, vec![12, 14]);
        assert_eq!(map.range(..).count(), 100);
    }

    #[rstest]
    fn test_range_skips_tombstones() {
        let map = ordered(3, 0..50).fast_remove(&20).remove(&21);
        let found: Vec<i32> = map.range(19..23).map(|(key, _)| *key).collect();
        assert_eq!(found, vec![19, 22]);
    }

    #[rstest]
    fn test_pack_drops_tombstones() {
        let mut map = ordered(5, 0..200);
        for key in (0..200).step_by(3) {
            map = map.fast_remove(&key);
        }
        assert_eq!(map.check_consistency().map_err(|violation| violation.code()), Err(113));
        let packed = map.pack().unwrap();
        assert_eq!(packed.check_consistency(), Ok(()));
        assert_eq!(keys(&packed), keys(&map));
        assert!(packed.height() <= map.height());
    }

    #[rstest]
    fn test_pack_entries_last_occurrence_wins() {
        let map = PersistentSortedMap::with_order(3)
            .unwrap()
            .pack_entries([(2, 20), (1, 10), (2, 21), (3, 30), (1, 11)])
            .unwrap();
        let entries: Vec<(i32, i32)> = map.iter().map(|(key, value)| (*key, *value)).collect();
        assert_eq!(entries, vec![(1, 11), (2, 21), (3, 30)]);
        assert_eq!(map.check_consistency(), Ok(()));
    }

    #[rstest]
    fn test_pack_empty_map() {
        let map: PersistentSortedMap<i32, i32> = PersistentSortedMap::new();
        let packed = map.pack().unwrap();
        assert!(packed.is_empty());
        assert_eq!(packed.check_consistency(), Ok(()));
    }

    #[rstest]
    fn test_update_with() {
        let map = ordered(5, 0..10);
        let incremented = map.update_with(&3, |value| value.map(|value| value + 100));
        assert_eq!(incremented.get(&3), Some(&103));
        let removed = map.update_with(&3, |_| None);
        assert!(!removed.contains_key(&3));
        let added = map.update_with(&42, |_| Some(0));
        assert_eq!(added.get(&42), Some(&0));
    }

    #[rstest]
    fn test_remove_all_and_merge() {
        let map = ordered(5, 0..10);
        let trimmed = map.remove_all(&[1, 2, 3]);
        assert_eq!(keys(&trimmed), vec![0, 4, 5, 6, 7, 8, 9]);
        let merged = trimmed.merge(&ordered(5, 1..3));
        assert_eq!(keys(&merged), vec![0, 1, 2, 4, 5, 6, 7, 8, 9]);
    }

    #[rstest]
    fn test_clear_keeps_options() {
        let map = ordered(7, 0..10).clear();
        assert!(map.is_empty());
        assert_eq!(map.options().btree_order, 7);
    }

    #[rstest]
    fn test_transient_counts_rebalancing() {
        let mut transient = TransientSortedMap::with_order(3).unwrap();
        transient.extend((0..100).map(|key| (key, key)));
        assert!(transient.stats().splits > 0);
        for key in 0..100 {
            transient.remove(&key);
            assert_eq!(transient.check_consistency(), Ok(()));
        }
        assert!(transient.stats().merges > 0);
        assert!(transient.is_empty());
    }

    #[rstest]
    fn test_transient_with_mutations_reenters_batch() {
        let mut transient = TransientSortedMap::new();
        transient
            .with_mutations(|batch| {
                batch.insert(1, 1);
            })
            .with_mutations(|batch| {
                batch.insert(2, 2);
            });
        assert!(transient.was_altered());
        assert_eq!(transient.persistent().len(), 2);
    }

    #[rstest]
    fn test_with_mutations_without_change_shares_root() {
        let map = ordered(5, 0..10);
        let same = map.with_mutations(|transient| {
            transient.insert(3, 3);
            transient.remove(&99);
        });
        assert!(same.ptr_eq(&map));
    }

    #[rstest]
    fn test_equality_ignores_shape() {
        let inserted = ordered(3, 0..50);
        let packed = inserted.pack().unwrap();
        assert_eq!(inserted, packed);
        assert_ne!(inserted, inserted.remove(&10));
    }

    #[rstest]
    fn test_debug_output() {
        let map = ordered(5, [2, 1]);
        assert_eq!(format!("{map:?}"), "{1: 1, 2: 2}");
    }
}
