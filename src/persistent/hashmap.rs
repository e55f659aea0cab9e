//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map that
//! uses structural sharing, and [`TransientHashMap`], its batch-mutation
//! counterpart.
//!
//! # Overview
//!
//! The map is a hash array mapped trie with 32-way branching. Small maps are
//! a single flat array node; as the map grows its nodes are promoted to
//! sparse bitmap branches, then to dense branches, and demoted again as it
//! shrinks.
//!
//! - O(log32 N) get, insert and remove
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//! ```
//!
//! # Mutation batches
//!
//! [`PersistentHashMap::with_mutations`] runs a closure against a
//! [`TransientHashMap`]. Nodes copied during the batch are edited in place
//! for the rest of it, and the result is frozen into a new persistent map.
//!
//! ```rust
//! use cowtrie::persistent::PersistentHashMap;
//!
//! let base: PersistentHashMap<i32, i32> = PersistentHashMap::new();
//! let filled = base.with_mutations(|batch| {
//!     for key in 0..100 {
//!         batch.insert(key, key * key);
//!     }
//! });
//! assert_eq!(filled.len(), 100);
//! assert!(base.is_empty());
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::rc::Rc;

use super::hash_trie::{HashTrie, HashTrieIter, NodeKind};
use super::owner::OwnerToken;

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentHashMap;
///
/// let map = PersistentHashMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct PersistentHashMap<K, V> {
    trie: HashTrie<K, V>,
}

impl<K, V> Clone for PersistentHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie.clone(),
        }
    }
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trie: HashTrie::new(),
        }
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trie.len() == 0
    }

    /// Returns the kind of the root node, or `None` for an empty map.
    ///
    /// This is a debugging aid: it shows how the trie has reshaped itself.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::{NodeKind, PersistentHashMap};
    ///
    /// let small: PersistentHashMap<i32, i32> = (0..4).map(|key| (key, key)).collect();
    /// assert_eq!(small.root_kind(), Some(NodeKind::ArrayLeaf));
    ///
    /// let large: PersistentHashMap<i32, i32> = (0..1000).map(|key| (key, key)).collect();
    /// assert_eq!(large.root_kind(), Some(NodeKind::HashArrayMapped));
    /// ```
    #[must_use]
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.trie.root_kind()
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// Two empty maps are considered to share their (absent) root.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.trie.ptr_eq(&other.trie)
    }

    /// Returns an iterator over key-value pairs in hash-bucket order.
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator {
            inner: self.trie.iter(false),
        }
    }

    /// Returns an iterator over key-value pairs in reverse hash-bucket order.
    #[must_use]
    pub fn iter_rev(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator {
            inner: self.trie.iter(true),
        }
    }

    /// Returns an iterator over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Visits entries until `visit` returns [`ControlFlow::Break`].
    ///
    /// Returns the number of entries visited, including the one that stopped
    /// the walk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::ops::ControlFlow;
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<i32, i32> = (0..10).map(|key| (key, key)).collect();
    /// let mut seen = 0;
    /// let visited = map.iterate(false, |_, _| {
    ///     seen += 1;
    ///     if seen == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    /// });
    /// assert_eq!(visited, 3);
    /// ```
    pub fn iterate<F>(&self, reverse: bool, visit: F) -> usize
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        self.trie.iterate(reverse, visit)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("key".to_string(), 42);
    /// assert_eq!(map.get("key"), Some(&42));
    /// assert_eq!(map.get("other"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trie.get(key)
    }

    /// Returns `true` if the map contains the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trie.get(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PersistentHashMap<K, V> {
    /// Creates a map containing a single key-value pair.
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    fn write<F>(&self, edit: F) -> Self
    where
        F: FnOnce(&mut HashTrie<K, V>, OwnerToken) -> bool,
    {
        let mut trie = self.trie.clone();
        if edit(&mut trie, OwnerToken::mint()) {
            Self { trie }
        } else {
            self.clone()
        }
    }

    /// Inserts a key-value pair, returning a new map.
    ///
    /// If the key already maps to an equal value, the returned map shares
    /// this map's root.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert(1, "one");
    /// let same = map.insert(1, "one");
    /// assert!(map.ptr_eq(&same));
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.write(|trie, owner| trie.upsert(owner, key, value).altered)
    }

    /// Removes a key, returning a new map.
    ///
    /// Removing an absent key returns a map sharing this map's root.
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.write(|trie, owner| trie.remove(owner, key).altered)
    }

    /// Inserts, updates or removes the entry for `key` through `updater`.
    ///
    /// The updater receives the current value (if any) and returns the new
    /// value, or `None` to remove the entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("count".to_string(), 10);
    /// let updated = map.update_with("count", |value| value.map(|count| count + 1));
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(key)) {
            Some(value) => self.insert(key.to_owned(), value),
            None => self.remove(key),
        }
    }

    /// Merges two maps, with values from `other` taking precedence.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let left = PersistentHashMap::new().insert("a", 1).insert("b", 2);
    /// let right = PersistentHashMap::new().insert("b", 20).insert("c", 3);
    ///
    /// let merged = left.merge(&right);
    /// assert_eq!(merged.get("b"), Some(&20));
    /// assert_eq!(merged.len(), 3);
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.with_mutations(|batch| {
            for (key, value) in other {
                batch.insert(key.clone(), value.clone());
            }
        })
    }

    /// Removes every key yielded by `keys`.
    #[must_use]
    pub fn remove_all<'a, Q, I>(&self, keys: I) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        self.with_mutations(|batch| {
            for key in keys {
                batch.remove(key);
            }
        })
    }

    /// Returns an empty map.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Applies a batch of edits through a [`TransientHashMap`].
    ///
    /// If the batch changes nothing, the returned map shares this map's root.
    #[must_use]
    pub fn with_mutations<F>(&self, body: F) -> Self
    where
        F: FnOnce(&mut TransientHashMap<K, V>),
    {
        let mut transient = self.clone().transient();
        body(&mut transient);
        if transient.was_altered() {
            transient.persistent()
        } else {
            self.clone()
        }
    }

    /// Converts this map into a transient map for batch updates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<i32, i32> = (0..3).map(|key| (key, key)).collect();
    /// let mut transient = map.transient();
    /// transient.insert(3, 3);
    /// transient.remove(&0);
    /// let updated = transient.persistent();
    /// assert_eq!(updated.len(), 3);
    /// assert!(!updated.contains_key(&0));
    /// ```
    #[must_use]
    pub fn transient(self) -> TransientHashMap<K, V> {
        TransientHashMap {
            trie: self.trie,
            owner: OwnerToken::mint(),
            altered: false,
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// TransientHashMap Definition
// =============================================================================

/// A mutable hash map owning one mutation batch.
///
/// Nodes created or copied by this transient carry its batch token and are
/// edited in place by later writes. Nodes shared with persistent maps are
/// never modified.
///
/// `TransientHashMap` is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// transient.insert("a", 1);
/// transient.insert("b", 2);
/// let map = transient.persistent();
/// assert_eq!(map.len(), 2);
/// ```
pub struct TransientHashMap<K, V> {
    trie: HashTrie<K, V>,
    owner: OwnerToken,
    altered: bool,
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHashMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashMap<String, String>: Send, Sync);

impl<K, V> TransientHashMap<K, V> {
    /// Creates an empty transient map with a fresh batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: HashTrie::new(),
            owner: OwnerToken::mint(),
            altered: false,
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trie.len() == 0
    }

    /// Returns `true` if any write in this batch changed the map.
    #[inline]
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Returns the kind of the root node, or `None` for an empty map.
    #[must_use]
    pub fn root_kind(&self) -> Option<NodeKind> {
        self.trie.root_kind()
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trie.get(key)
    }

    /// Returns `true` if the map contains the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trie.get(key).is_some()
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
    pub fn persistent(self) -> PersistentHashMap<K, V> {
        PersistentHashMap { trie: self.trie }
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> TransientHashMap<K, V> {
    /// Inserts a key-value pair in place.
    ///
    /// Returns `true` if the map changed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::TransientHashMap;
    ///
    /// let mut transient = TransientHashMap::new();
    /// assert!(transient.insert(1, "one"));
    /// assert!(!transient.insert(1, "one"));
    /// assert!(transient.insert(1, "uno"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let altered = self.trie.upsert(self.owner, key, value).altered;
        self.altered |= altered;
        altered
    }

    /// Removes a key in place.
    ///
    /// Returns `true` if the key was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let altered = self.trie.remove(self.owner, key).altered;
        self.altered |= altered;
        altered
    }

    /// Inserts, updates or removes the entry for `key` through `updater`.
    ///
    /// Returns `true` if the map changed.
    pub fn update_with<Q, F>(&mut self, key: &Q, updater: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(key)) {
            Some(value) => self.insert(key.to_owned(), value),
            None => self.remove(key),
        }
    }
}

impl<K, V> Default for TransientHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> Extend<(K, V)> for TransientHashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentHashMap`].
pub struct PersistentHashMapIterator<'a, K, V> {
    inner: HashTrieIter<'a, K, V>,
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientHashMap::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.ptr_eq(other)
            || self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
