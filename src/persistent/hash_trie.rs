//! Hash array mapped trie engine.
//!
//! Nodes come in five kinds. Small maps live in a single `ArrayLeaf`; larger
//! ones branch on 5-bit digits of the key hash through `BitmapIndexed`
//! (sparse) and `HashArrayMapped` (dense) nodes, ending in `ValueLeaf` and
//! `HashCollision` leaves. Kinds are promoted and demoted as entries come
//! and go, so the trie stays compact.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::ops::ControlFlow;

use arrayvec::ArrayVec;
use smallvec::SmallVec;
use tracing::trace;

use super::ReferenceCounter;
use super::owner::{ChangeFlags, Owned, OwnerToken, make_editable};

// =============================================================================
// Constants
// =============================================================================

/// Number of hash bits consumed per trie level.
const BITS_PER_LEVEL: u32 = 5;

/// Branching factor of the trie (2^5 = 32).
const BRANCHING_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Mask for extracting one digit from a hash.
#[allow(clippy::cast_possible_truncation)]
const MASK: u32 = (BRANCHING_FACTOR - 1) as u32;

/// Largest `ArrayLeaf` before it is rebuilt as a trie.
const MAX_ARRAY_MAP_SIZE: usize = BRANCHING_FACTOR / 4;

/// Largest `BitmapIndexed` before it is expanded to `HashArrayMapped`.
const MAX_BITMAP_INDEXED_SIZE: usize = BRANCHING_FACTOR / 2;

/// Smallest `HashArrayMapped` before it is packed back to `BitmapIndexed`.
const MIN_HASH_ARRAY_MAP_SIZE: usize = BRANCHING_FACTOR / 4;

// =============================================================================
// Hash computation
// =============================================================================

#[cfg(feature = "fxhash")]
type KeyHashBuilder = rustc_hash::FxBuildHasher;

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
type KeyHashBuilder = std::hash::BuildHasherDefault<ahash::AHasher>;

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
type KeyHashBuilder =
    std::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;

/// Computes the 32-bit trie hash of a key.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn hash_key<Q: Hash + ?Sized>(key: &Q) -> u32 {
    let hash = KeyHashBuilder::default().hash_one(key);
    (hash ^ (hash >> 32)) as u32
}

/// Extracts the digit of `hash` examined at `shift`.
const fn digit(hash: u32, shift: u32) -> usize {
    ((hash >> shift) & MASK) as usize
}

const fn bit_for(hash: u32, shift: u32) -> u32 {
    1 << digit(hash, shift)
}

/// Position of `bit` among the children of a bitmap node.
const fn compact_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// =============================================================================
// Node Definition
// =============================================================================

/// The kind of a hash trie node.
///
/// Exposed so callers can observe how the trie reshapes itself; see
/// [`PersistentHashMap::root_kind`](super::PersistentHashMap::root_kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Up to eight entries scanned linearly. Only ever used as the root.
    ArrayLeaf,
    /// Sparse branch: a 32-bit bitmap and one child per set bit.
    BitmapIndexed,
    /// Dense branch: 32 slots, some of which may be empty.
    HashArrayMapped,
    /// Entries whose hashes are identical.
    HashCollision,
    /// A single entry.
    ValueLeaf,
}

type Child<K, V> = ReferenceCounter<HashNode<K, V>>;

#[derive(Clone)]
pub(crate) struct HashNode<K, V> {
    owner: OwnerToken,
    body: HashBody<K, V>,
}

#[derive(Clone)]
enum HashBody<K, V> {
    ArrayLeaf {
        entries: ArrayVec<(K, V), MAX_ARRAY_MAP_SIZE>,
    },
    BitmapIndexed {
        bitmap: u32,
        children: Vec<Child<K, V>>,
    },
    HashArrayMapped {
        count: usize,
        children: Box<[Option<Child<K, V>>; BRANCHING_FACTOR]>,
    },
    HashCollision {
        hash: u32,
        entries: SmallVec<[(K, V); 2]>,
    },
    ValueLeaf {
        hash: u32,
        key: K,
        value: V,
    },
}

impl<K: Clone, V: Clone> Owned for HashNode<K, V> {
    fn owner(&self) -> OwnerToken {
        self.owner
    }

    fn set_owner(&mut self, owner: OwnerToken) {
        self.owner = owner;
    }
}

/// A structural rewrite that replaces a node instead of editing it.
enum Reshape {
    /// A full `ArrayLeaf` receives a new key.
    Explode,
    /// A leaf receives a key with another hash (or another key with its hash).
    Merge { existing_hash: u32 },
    /// A full `BitmapIndexed` receives a new child.
    Expand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Kept,
    Emptied,
}

impl<K, V> HashNode<K, V> {
    pub(crate) const fn kind(&self) -> NodeKind {
        match self.body {
            HashBody::ArrayLeaf { .. } => NodeKind::ArrayLeaf,
            HashBody::BitmapIndexed { .. } => NodeKind::BitmapIndexed,
            HashBody::HashArrayMapped { .. } => NodeKind::HashArrayMapped,
            HashBody::HashCollision { .. } => NodeKind::HashCollision,
            HashBody::ValueLeaf { .. } => NodeKind::ValueLeaf,
        }
    }

    const fn is_leaf(&self) -> bool {
        matches!(
            self.body,
            HashBody::ValueLeaf { .. } | HashBody::HashCollision { .. }
        )
    }

    const fn value_leaf(owner: OwnerToken, hash: u32, key: K, value: V) -> Self {
        Self {
            owner,
            body: HashBody::ValueLeaf { hash, key, value },
        }
    }

    fn get<Q>(&self, mut shift: u32, hash: u32, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        loop {
            match &node.body {
                HashBody::ArrayLeaf { entries } => {
                    return entries
                        .iter()
                        .find(|(candidate, _)| candidate.borrow() == key)
                        .map(|(_, value)| value);
                }
                HashBody::BitmapIndexed { bitmap, children } => {
                    let bit = bit_for(hash, shift);
                    if bitmap & bit == 0 {
                        return None;
                    }
                    node = children.get(compact_index(*bitmap, bit)).map(|child| &**child)?;
                }
                HashBody::HashArrayMapped { children, .. } => {
                    node = children[digit(hash, shift)].as_deref()?;
                }
                HashBody::HashCollision {
                    hash: shared,
                    entries,
                } => {
                    if *shared != hash {
                        return None;
                    }
                    return entries
                        .iter()
                        .find(|(candidate, _)| candidate.borrow() == key)
                        .map(|(_, value)| value);
                }
                HashBody::ValueLeaf {
                    key: candidate,
                    value,
                    ..
                } => {
                    return (candidate.borrow() == key).then_some(value);
                }
            }
            shift += BITS_PER_LEVEL;
        }
    }
}

impl<K: Clone + Eq + Hash, V: Clone> HashNode<K, V> {
    /// Decides whether inserting `key` requires replacing this node.
    fn reshape_for(&self, shift: u32, hash: u32, key: &K) -> Option<Reshape> {
        match &self.body {
            HashBody::ArrayLeaf { entries }
                if entries.is_full() && !entries.iter().any(|(candidate, _)| candidate == key) =>
            {
                Some(Reshape::Explode)
            }
            HashBody::BitmapIndexed { bitmap, children }
                if bitmap & bit_for(hash, shift) == 0
                    && children.len() >= MAX_BITMAP_INDEXED_SIZE =>
            {
                Some(Reshape::Expand)
            }
            HashBody::HashCollision {
                hash: existing_hash,
                ..
            } if *existing_hash != hash => Some(Reshape::Merge {
                existing_hash: *existing_hash,
            }),
            HashBody::ValueLeaf {
                hash: existing_hash,
                key: existing_key,
                ..
            } if existing_key != key => Some(Reshape::Merge {
                existing_hash: *existing_hash,
            }),
            _ => None,
        }
    }

    /// Writes `key -> value` below `slot`. The caller has established that
    /// the write alters the trie.
    fn upsert(slot: &mut Child<K, V>, owner: OwnerToken, shift: u32, hash: u32, key: K, value: V) {
        if let Some(reshape) = slot.reshape_for(shift, hash, &key) {
            let existing = ReferenceCounter::clone(slot);
            *slot = match reshape {
                Reshape::Explode => Self::create_nodes(owner, &existing, hash, key, value),
                Reshape::Merge { existing_hash } => {
                    Self::merge_into_node(existing, existing_hash, owner, shift, hash, key, value)
                }
                Reshape::Expand => Self::expand_nodes(owner, &existing, shift, hash, key, value),
            };
            return;
        }

        let node = make_editable(slot, owner);
        match &mut node.body {
            HashBody::ArrayLeaf { entries } => {
                match entries.iter().position(|(candidate, _)| *candidate == key) {
                    Some(index) => entries[index].1 = value,
                    None => entries.push((key, value)),
                }
            }
            HashBody::BitmapIndexed { bitmap, children } => {
                let bit = bit_for(hash, shift);
                let index = compact_index(*bitmap, bit);
                if *bitmap & bit == 0 {
                    children.insert(
                        index,
                        ReferenceCounter::new(Self::value_leaf(owner, hash, key, value)),
                    );
                    *bitmap |= bit;
                } else {
                    Self::upsert(
                        &mut children[index],
                        owner,
                        shift + BITS_PER_LEVEL,
                        hash,
                        key,
                        value,
                    );
                }
            }
            HashBody::HashArrayMapped { count, children } => {
                let cell = &mut children[digit(hash, shift)];
                if let Some(child) = cell.as_mut() {
                    Self::upsert(child, owner, shift + BITS_PER_LEVEL, hash, key, value);
                } else {
                    *cell = Some(ReferenceCounter::new(Self::value_leaf(
                        owner, hash, key, value,
                    )));
                    *count += 1;
                }
            }
            HashBody::HashCollision { entries, .. } => {
                match entries.iter().position(|(candidate, _)| *candidate == key) {
                    Some(index) => entries[index].1 = value,
                    None => entries.push((key, value)),
                }
            }
            HashBody::ValueLeaf { value: current, .. } => *current = value,
        }
    }

    /// Removes `key` from below `slot`. The caller has established that the
    /// key is present.
    fn remove<Q>(slot: &mut Child<K, V>, owner: OwnerToken, shift: u32, hash: u32, key: &Q) -> Removal
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match &slot.body {
            HashBody::ValueLeaf { .. } => return Removal::Emptied,
            HashBody::ArrayLeaf { entries } if entries.len() <= 1 => return Removal::Emptied,
            HashBody::HashCollision { entries, .. } if entries.len() <= 2 => {
                let survivor = entries
                    .iter()
                    .find(|(candidate, _)| candidate.borrow() != key)
                    .cloned();
                return match survivor {
                    Some((survivor_key, survivor_value)) => {
                        trace!(hash, "collision node collapsed to value leaf");
                        *slot = ReferenceCounter::new(Self::value_leaf(
                            owner,
                            hash,
                            survivor_key,
                            survivor_value,
                        ));
                        Removal::Kept
                    }
                    None => Removal::Emptied,
                };
            }
            _ => {}
        }

        let node = make_editable(slot, owner);
        let replacement = match &mut node.body {
            HashBody::ArrayLeaf { entries } => {
                if let Some(index) = entries
                    .iter()
                    .position(|(candidate, _)| candidate.borrow() == key)
                {
                    entries.swap_remove(index);
                }
                None
            }
            HashBody::HashCollision { entries, .. } => {
                if let Some(index) = entries
                    .iter()
                    .position(|(candidate, _)| candidate.borrow() == key)
                {
                    entries.swap_remove(index);
                }
                None
            }
            HashBody::ValueLeaf { .. } => return Removal::Emptied,
            HashBody::BitmapIndexed { bitmap, children } => {
                let bit = bit_for(hash, shift);
                if *bitmap & bit == 0 {
                    return Removal::Kept;
                }
                let index = compact_index(*bitmap, bit);
                match Self::remove(
                    &mut children[index],
                    owner,
                    shift + BITS_PER_LEVEL,
                    hash,
                    key,
                ) {
                    Removal::Kept => {
                        (children.len() == 1 && children[0].is_leaf()).then(|| children[0].clone())
                    }
                    Removal::Emptied if children.len() == 1 => return Removal::Emptied,
                    Removal::Emptied if children.len() == 2 && children[index ^ 1].is_leaf() => {
                        Some(children[index ^ 1].clone())
                    }
                    Removal::Emptied => {
                        children.remove(index);
                        *bitmap ^= bit;
                        None
                    }
                }
            }
            HashBody::HashArrayMapped { count, children } => {
                let position = digit(hash, shift);
                let Some(child) = children[position].as_mut() else {
                    return Removal::Kept;
                };
                match Self::remove(child, owner, shift + BITS_PER_LEVEL, hash, key) {
                    Removal::Kept => None,
                    Removal::Emptied => {
                        children[position] = None;
                        *count -= 1;
                        (*count < MIN_HASH_ARRAY_MAP_SIZE)
                            .then(|| Self::pack_nodes(owner, children, *count))
                    }
                }
            }
        };
        if let Some(replacement) = replacement {
            *slot = replacement;
        }
        Removal::Kept
    }

    /// Rebuilds a full `ArrayLeaf` plus one new entry as a trie.
    fn create_nodes(owner: OwnerToken, existing: &Self, hash: u32, key: K, value: V) -> Child<K, V> {
        let mut root = ReferenceCounter::new(Self::value_leaf(owner, hash, key, value));
        if let HashBody::ArrayLeaf { entries } = &existing.body {
            trace!(entries = entries.len() + 1, "array leaf promoted to trie");
            for (entry_key, entry_value) in entries {
                Self::upsert(
                    &mut root,
                    owner,
                    0,
                    hash_key(entry_key),
                    entry_key.clone(),
                    entry_value.clone(),
                );
            }
        }
        root
    }

    /// Expands a full `BitmapIndexed` into a dense node holding one more child.
    fn expand_nodes(
        owner: OwnerToken,
        existing: &Self,
        shift: u32,
        hash: u32,
        key: K,
        value: V,
    ) -> Child<K, V> {
        let mut dense: Box<[Option<Child<K, V>>; BRANCHING_FACTOR]> =
            Box::new(std::array::from_fn(|_| None));
        let mut count = 1;
        if let HashBody::BitmapIndexed { bitmap, children } = &existing.body {
            let mut remaining = children.iter();
            for (position, cell) in dense.iter_mut().enumerate() {
                if bitmap & (1 << position) != 0 {
                    *cell = remaining.next().cloned();
                }
            }
            count += children.len();
        }
        dense[digit(hash, shift)] = Some(ReferenceCounter::new(Self::value_leaf(
            owner, hash, key, value,
        )));
        trace!(children = count, shift, "bitmap node promoted to hash array mapped node");
        ReferenceCounter::new(Self {
            owner,
            body: HashBody::HashArrayMapped {
                count,
                children: dense,
            },
        })
    }

    /// Packs the occupied slots of a dense node into a bitmap node.
    fn pack_nodes(
        owner: OwnerToken,
        dense: &[Option<Child<K, V>>; BRANCHING_FACTOR],
        count: usize,
    ) -> Child<K, V> {
        let mut bitmap = 0_u32;
        let mut children = Vec::with_capacity(count);
        for (position, cell) in dense.iter().enumerate() {
            if let Some(child) = cell {
                bitmap |= 1 << position;
                children.push(child.clone());
            }
        }
        trace!(children = count, "hash array mapped node packed into bitmap node");
        ReferenceCounter::new(Self {
            owner,
            body: HashBody::BitmapIndexed { bitmap, children },
        })
    }

    /// Builds the smallest subtree holding both `existing` (a leaf) and the
    /// new entry.
    fn merge_into_node(
        existing: Child<K, V>,
        existing_hash: u32,
        owner: OwnerToken,
        shift: u32,
        hash: u32,
        key: K,
        value: V,
    ) -> Child<K, V> {
        if existing_hash == hash {
            let mut entries: SmallVec<[(K, V); 2]> = existing
                .leaf_entries()
                .map(|(entry_key, entry_value)| (entry_key.clone(), entry_value.clone()))
                .collect();
            entries.push((key, value));
            trace!(hash, entries = entries.len(), "hash collision node created");
            return ReferenceCounter::new(Self {
                owner,
                body: HashBody::HashCollision { hash, entries },
            });
        }

        let existing_digit = digit(existing_hash, shift);
        let new_digit = digit(hash, shift);
        let children = if existing_digit == new_digit {
            vec![Self::merge_into_node(
                existing,
                existing_hash,
                owner,
                shift + BITS_PER_LEVEL,
                hash,
                key,
                value,
            )]
        } else {
            let leaf = ReferenceCounter::new(Self::value_leaf(owner, hash, key, value));
            if existing_digit < new_digit {
                vec![existing, leaf]
            } else {
                vec![leaf, existing]
            }
        };
        ReferenceCounter::new(Self {
            owner,
            body: HashBody::BitmapIndexed {
                bitmap: (1 << existing_digit) | (1 << new_digit),
                children,
            },
        })
    }
}

impl<K, V> HashNode<K, V> {
    /// Entries held directly by a leaf; empty for branches.
    fn leaf_entries(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        match &self.body {
            HashBody::ArrayLeaf { entries } => Box::new(entries.iter().map(|(k, v)| (k, v))),
            HashBody::HashCollision { entries, .. } => {
                Box::new(entries.iter().map(|(k, v)| (k, v)))
            }
            HashBody::ValueLeaf { key, value, .. } => Box::new(std::iter::once((key, value))),
            HashBody::BitmapIndexed { .. } | HashBody::HashArrayMapped { .. } => {
                Box::new(std::iter::empty())
            }
        }
    }
}

// =============================================================================
// Trie root
// =============================================================================

/// A hash trie root together with its entry count.
///
/// Both the persistent and the transient map handles are thin wrappers
/// around this type; the difference is only which token their writes use.
pub(crate) struct HashTrie<K, V> {
    root: Option<Child<K, V>>,
    length: usize,
}

impl<K, V> Clone for HashTrie<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
        }
    }
}

impl<K, V> HashTrie<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.length
    }

    pub(crate) fn root_kind(&self) -> Option<NodeKind> {
        self.root.as_deref().map(HashNode::kind)
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_hashed(hash_key(key), key)
    }

    fn get_hashed<Q>(&self, hash: u32, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.root.as_deref()?.get(0, hash, key)
    }

    pub(crate) fn iter(&self, reverse: bool) -> HashTrieIter<'_, K, V> {
        HashTrieIter {
            stack: self.root.as_deref().map(Frame::for_node).into_iter().collect(),
            remaining: self.length,
            reverse,
        }
    }

    /// Visits entries until `visit` breaks; returns how many were visited.
    pub(crate) fn iterate<F>(&self, reverse: bool, mut visit: F) -> usize
    where
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let mut visited = 0;
        for (key, value) in self.iter(reverse) {
            visited += 1;
            if visit(key, value).is_break() {
                break;
            }
        }
        visited
    }
}

impl<K: Clone + Eq + Hash, V: Clone + PartialEq> HashTrie<K, V> {
    pub(crate) fn upsert(&mut self, owner: OwnerToken, key: K, value: V) -> ChangeFlags {
        let hash = hash_key(&key);
        let flags = match self.get_hashed(hash, &key) {
            Some(current) if *current == value => return ChangeFlags::UNCHANGED,
            Some(_) => ChangeFlags::UPDATED,
            None => ChangeFlags::RESIZED,
        };
        if let Some(root) = self.root.as_mut() {
            HashNode::upsert(root, owner, 0, hash, key, value);
        } else {
            let mut entries = ArrayVec::new();
            entries.push((key, value));
            self.root = Some(ReferenceCounter::new(HashNode {
                owner,
                body: HashBody::ArrayLeaf { entries },
            }));
        }
        if flags.size_changed {
            self.length += 1;
        }
        flags
    }

    pub(crate) fn remove<Q>(&mut self, owner: OwnerToken, key: &Q) -> ChangeFlags
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash_key(key);
        if self.get_hashed(hash, key).is_none() {
            return ChangeFlags::UNCHANGED;
        }
        let Some(root) = self.root.as_mut() else {
            return ChangeFlags::UNCHANGED;
        };
        if HashNode::remove(root, owner, 0, hash, key) == Removal::Emptied {
            self.root = None;
        }
        self.length -= 1;
        ChangeFlags::RESIZED
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

enum Frame<'a, K, V> {
    Entries(std::slice::Iter<'a, (K, V)>),
    Children(std::slice::Iter<'a, Child<K, V>>),
    Dense(std::slice::Iter<'a, Option<Child<K, V>>>),
    Single(Option<(&'a K, &'a V)>),
}

impl<'a, K, V> Frame<'a, K, V> {
    fn for_node(node: &'a HashNode<K, V>) -> Self {
        match &node.body {
            HashBody::ArrayLeaf { entries } => Self::Entries(entries.iter()),
            HashBody::HashCollision { entries, .. } => Self::Entries(entries.iter()),
            HashBody::BitmapIndexed { children, .. } => Self::Children(children.iter()),
            HashBody::HashArrayMapped { children, .. } => Self::Dense(children.iter()),
            HashBody::ValueLeaf { key, value, .. } => Self::Single(Some((key, value))),
        }
    }
}

fn step<I: DoubleEndedIterator>(iterator: &mut I, reverse: bool) -> Option<I::Item> {
    if reverse {
        iterator.next_back()
    } else {
        iterator.next()
    }
}

/// Depth-first cursor over a hash trie, in bucket order or its reverse.
pub(crate) struct HashTrieIter<'a, K, V> {
    stack: Vec<Frame<'a, K, V>>,
    remaining: usize,
    reverse: bool,
}

impl<'a, K, V> Iterator for HashTrieIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reverse = self.reverse;
            let frame = self.stack.last_mut()?;
            let descend = match frame {
                Frame::Entries(entries) => {
                    if let Some((key, value)) = step(entries, reverse) {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((key, value));
                    }
                    None
                }
                Frame::Single(entry) => {
                    if let Some(entry) = entry.take() {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some(entry);
                    }
                    None
                }
                Frame::Children(children) => step(children, reverse).map(|child| &**child),
                Frame::Dense(cells) => {
                    let mut found = None;
                    while let Some(cell) = step(cells, reverse) {
                        if let Some(child) = cell {
                            found = Some(&**child);
                            break;
                        }
                    }
                    found
                }
            };
            match descend {
                Some(node) => self.stack.push(Frame::for_node(node)),
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for HashTrieIter<'_, K, V> {}

// =============================================================================
// Tests
// =============================================================================
