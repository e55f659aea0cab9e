//! Copy-on-write B-tree engine behind [`PersistentSortedMap`](super::PersistentSortedMap).
//!
//! Every node holds between `split_size` and `order - 1` sorted entries
//! (the root may hold fewer), and every internal node one more child than
//! it has entries. Entries found in internal nodes are never physically
//! removed: they become tombstones (a `None` value) until the tree is
//! packed again.

mod diagnostics;
mod packer;

use std::borrow::Borrow;
use std::ops::{Bound, ControlFlow};

use crate::error::CollectionResult;

use super::ReferenceCounter;
use super::owner::{ChangeFlags, Owned, OwnerToken, make_editable};

// =============================================================================
// Constants
// =============================================================================

/// Smallest order a B-tree may have.
pub(crate) const MIN_ORDER: usize = 3;

/// Order used when none is configured.
pub(crate) const DEFAULT_ORDER: usize = 33;

/// Minimum number of entries in a non-root node.
#[inline]
pub(crate) const fn split_size(order: usize) -> usize {
    (order - 1) / 2
}

// =============================================================================
// Rebalance statistics
// =============================================================================

/// Counts of the structural repairs performed by a mutation batch.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::TransientSortedMap;
///
/// let mut transient = TransientSortedMap::with_order(3).unwrap();
/// for key in 0..10 {
///     transient.insert(key, key);
/// }
/// assert!(transient.stats().splits > 0);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceStats {
    /// Nodes split after overflowing.
    pub splits: usize,
    /// Entries rotated in from a sibling to repair an underfull node.
    pub borrows: usize,
    /// Underfull nodes merged with a sibling.
    pub merges: usize,
}

// =============================================================================
// Node Definition
// =============================================================================

pub(crate) type Child<K, V> = ReferenceCounter<BTreeNode<K, V>>;

/// A sorted entry; `None` marks a tombstone.
pub(crate) type Entry<K, V> = (K, Option<V>);

/// A split's promoted entry and the new right sibling.
type Carry<K, V> = (Entry<K, V>, Child<K, V>);

/// A B-tree node. Leaves have no children.
#[derive(Clone)]
pub(crate) struct BTreeNode<K, V> {
    owner: OwnerToken,
    entries: Vec<Entry<K, V>>,
    children: Vec<Child<K, V>>,
}

impl<K: Clone, V: Clone> Owned for BTreeNode<K, V> {
    fn owner(&self) -> OwnerToken {
        self.owner
    }

    fn set_owner(&mut self, owner: OwnerToken) {
        self.owner = owner;
    }
}

impl<K, V> BTreeNode<K, V> {
    pub(crate) const fn new(
        owner: OwnerToken,
        entries: Vec<Entry<K, V>>,
        children: Vec<Child<K, V>>,
    ) -> Self {
        Self {
            owner,
            entries,
            children,
        }
    }

    #[inline]
    pub(crate) const fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn search<Q>(&self, key: &Q) -> Result<usize, usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries
            .binary_search_by(|(candidate, _)| candidate.borrow().cmp(key))
    }

    /// Smallest key stored in this subtree, tombstones included.
    fn first_key(&self) -> Option<&K> {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node.entries.first().map(|(key, _)| key)
    }

    /// Largest key stored in this subtree, tombstones included.
    fn last_key(&self) -> Option<&K> {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node.entries.last().map(|(key, _)| key)
    }
}

impl<K: Ord + Clone, V: Clone> BTreeNode<K, V> {
    fn upsert(
        &mut self,
        owner: OwnerToken,
        order: usize,
        key: K,
        value: V,
        stats: &mut RebalanceStats,
    ) -> (ChangeFlags, Option<Carry<K, V>>) {
        match self.search(&key) {
            Ok(index) => {
                let slot = &mut self.entries[index].1;
                let flags = if slot.is_some() {
                    ChangeFlags::UPDATED
                } else {
                    ChangeFlags::RESIZED
                };
                *slot = Some(value);
                (flags, None)
            }
            Err(index) if self.is_leaf() => {
                self.entries.insert(index, (key, Some(value)));
                (ChangeFlags::RESIZED, self.split_if_full(owner, order, stats))
            }
            Err(index) => {
                let child = make_editable(&mut self.children[index], owner);
                let (flags, carry) = child.upsert(owner, order, key, value, stats);
                let Some((entry, right)) = carry else {
                    return (flags, None);
                };
                self.entries.insert(index, entry);
                self.children.insert(index + 1, right);
                (flags, self.split_if_full(owner, order, stats))
            }
        }
    }

    /// Splits an overflowing node, keeping the first `split_size` entries.
    fn split_if_full(
        &mut self,
        owner: OwnerToken,
        order: usize,
        stats: &mut RebalanceStats,
    ) -> Option<Carry<K, V>> {
        if self.entries.len() < order {
            return None;
        }
        let split = split_size(order);
        let mut right_entries = self.entries.split_off(split);
        let promoted = right_entries.remove(0);
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(split + 1)
        };
        stats.splits += 1;
        tracing::trace!(
            order,
            left = self.entries.len(),
            right = right_entries.len(),
            leaf = right_children.is_empty(),
            "b-tree node split"
        );
        let right = Self::new(owner, right_entries, right_children);
        Some((promoted, ReferenceCounter::new(right)))
    }

    /// Removes a live key known to be present below this node.
    fn remove<Q>(&mut self, owner: OwnerToken, split: usize, key: &Q, stats: &mut RebalanceStats)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Ok(index) if self.is_leaf() => {
                self.entries.remove(index);
            }
            Ok(index) => self.entries[index].1 = None,
            Err(index) => {
                let Some(slot) = self.children.get_mut(index) else {
                    return;
                };
                let child = make_editable(slot, owner);
                child.remove(owner, split, key, stats);
                if child.entries.len() < split {
                    self.rebalance(owner, split, index, stats);
                }
            }
        }
    }

    /// Repairs the underfull child at `index` from one of its siblings.
    fn rebalance(
        &mut self,
        owner: OwnerToken,
        split: usize,
        index: usize,
        stats: &mut RebalanceStats,
    ) {
        let last = self.children.len() - 1;
        if last == 0 {
            return;
        }
        let from_left = match index {
            0 => false,
            index if index == last => true,
            index => self.children[index - 1].entries.len() >= self.children[index + 1].entries.len(),
        };
        let donor = if from_left { index - 1 } else { index + 1 };
        let separator = if from_left { index - 1 } else { index };
        let donor_len = self.children[donor].entries.len();

        if self.children[index].is_leaf() {
            // A tombstone separator is dropped rather than moved into a leaf.
            let tombstone = self.entries[separator].1.is_none();
            let reserve = split + usize::from(tombstone);
            match donor_len.checked_sub(reserve).filter(|&available| available > 0) {
                Some(available) => {
                    let count = available.div_ceil(2);
                    self.rotate(owner, index, from_left, count, !tombstone);
                    stats.borrows += 1;
                    tracing::trace!(index, from_left, count, leaf = true, "b-tree borrow");
                }
                None => {
                    self.merge(owner, separator, !tombstone);
                    stats.merges += 1;
                    tracing::trace!(index, with_left = from_left, leaf = true, "b-tree merge");
                }
            }
        } else {
            let available = (donor_len + 1).saturating_sub(split) / 2;
            if available > 0 {
                self.rotate(owner, index, from_left, available, true);
                stats.borrows += 1;
                tracing::trace!(index, from_left, count = available, leaf = false, "b-tree borrow");
            } else {
                // With two siblings the merge partner is the one not chosen as donor.
                let with_left = match index {
                    0 => false,
                    index if index == last => true,
                    _ => !from_left,
                };
                let separator = if with_left { index - 1 } else { index };
                self.merge(owner, separator, true);
                stats.merges += 1;
                tracing::trace!(index, with_left, leaf = false, "b-tree merge");
            }
        }
    }

    /// Moves `count` entries into the child at `index` from its neighbour,
    /// rotating them through the separator between the two.
    fn rotate(
        &mut self,
        owner: OwnerToken,
        index: usize,
        from_left: bool,
        count: usize,
        keep_separator: bool,
    ) {
        let moved = if keep_separator { count - 1 } else { count };
        let separator_index = if from_left { index - 1 } else { index };
        let donor_index = if from_left { index - 1 } else { index + 1 };

        let donor = make_editable(&mut self.children[donor_index], owner);
        if donor.entries.len() <= moved {
            return;
        }
        let internal = !donor.is_leaf();
        let (entries, children, separator) = if from_left {
            let at = donor.entries.len() - moved - 1;
            let entries = donor.entries.split_off(at + 1);
            let separator = donor.entries.remove(at);
            let children = if internal {
                let at = donor.children.len() - moved - 1;
                donor.children.split_off(at)
            } else {
                Vec::new()
            };
            (entries, children, separator)
        } else {
            let separator = donor.entries.remove(moved);
            let entries: Vec<_> = donor.entries.drain(..moved).collect();
            let children = if internal {
                donor.children.drain(..=moved).collect()
            } else {
                Vec::new()
            };
            (entries, children, separator)
        };

        let previous = std::mem::replace(&mut self.entries[separator_index], separator);
        let target = make_editable(&mut self.children[index], owner);
        if from_left {
            let mut prefix = entries;
            if keep_separator {
                prefix.push(previous);
            }
            target.entries.splice(0..0, prefix);
            target.children.splice(0..0, children);
        } else {
            if keep_separator {
                target.entries.push(previous);
            }
            target.entries.extend(entries);
            target.children.extend(children);
        }
    }

    /// Merges the children on either side of `separator` into the left one.
    fn merge(&mut self, owner: OwnerToken, separator: usize, keep_separator: bool) {
        let entry = self.entries.remove(separator);
        let right = self.children.remove(separator + 1);
        let right = ReferenceCounter::try_unwrap(right).unwrap_or_else(|shared| Self::clone(&shared));
        let left = make_editable(&mut self.children[separator], owner);
        if keep_separator {
            left.entries.push(entry);
        }
        left.entries.extend(right.entries);
        left.children.extend(right.children);
    }
}

// =============================================================================
// Tree root
// =============================================================================

/// The root, live-entry count and order of a B-tree.
pub(crate) struct BTree<K, V> {
    root: Option<Child<K, V>>,
    length: usize,
    order: usize,
}

impl<K, V> Clone for BTree<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            order: self.order,
        }
    }
}

impl<K, V> BTree<K, V> {
    /// Creates an empty tree; `order` must already be validated.
    pub(crate) const fn new(order: usize) -> Self {
        Self {
            root: None,
            length: 0,
            order,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub(crate) const fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of levels, or zero for an empty tree.
    pub(crate) fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            height += 1;
            node = current.children.first().map(|child| &**child);
        }
        height
    }

    pub(crate) fn iter(&self, reverse: bool) -> BTreeIter<'_, K, V> {
        BTreeIter {
            stack: self
                .root
                .iter()
                .map(|root| Frame {
                    node: &**root,
                    index: 0,
                })
                .collect(),
            reverse,
        }
    }

    /// Visits live entries until `visit` breaks; returns how many were visited.
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

impl<K: Ord, V> BTree<K, V> {
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self.root.as_deref()?;
        loop {
            match node.search(key) {
                Ok(index) => return node.entries[index].1.as_ref(),
                Err(index) => node = node.children.get(index).map(|child| &**child)?,
            }
        }
    }

    /// Returns a forward iterator positioned at the first live entry not
    /// below `start`.
    pub(crate) fn seek<Q>(&self, start: Bound<&Q>) -> BTreeIter<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut stack = Vec::new();
        let mut next = self.root.as_deref();
        while let Some(node) = next {
            next = None;
            let leaf = node.is_leaf();
            let index = match start {
                Bound::Unbounded => 0,
                Bound::Included(key) | Bound::Excluded(key) => match node.search(key) {
                    Ok(position) => {
                        let skip = usize::from(matches!(start, Bound::Excluded(_)));
                        if leaf {
                            position + skip
                        } else {
                            2 * position + 1 + skip
                        }
                    }
                    Err(position) if leaf => position,
                    Err(position) => {
                        next = node.children.get(position).map(|child| &**child);
                        2 * position + 1
                    }
                },
            };
            stack.push(Frame { node, index });
        }
        BTreeIter {
            stack,
            reverse: false,
        }
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> BTree<K, V> {
    /// Inserts or revives `key`.
    pub(crate) fn upsert(
        &mut self,
        owner: OwnerToken,
        key: K,
        value: V,
        stats: &mut RebalanceStats,
    ) -> ChangeFlags {
        if self.get(&key) == Some(&value) {
            return ChangeFlags::UNCHANGED;
        }
        let Some(root) = self.root.as_mut() else {
            let leaf = BTreeNode::new(owner, vec![(key, Some(value))], Vec::new());
            self.root = Some(ReferenceCounter::new(leaf));
            self.length = 1;
            return ChangeFlags::RESIZED;
        };
        let (flags, carry) = make_editable(root, owner).upsert(owner, self.order, key, value, stats);
        if let Some((entry, right)) = carry {
            if let Some(left) = self.root.take() {
                let root = BTreeNode::new(owner, vec![entry], vec![left, right]);
                self.root = Some(ReferenceCounter::new(root));
            }
        }
        if flags.size_changed {
            self.length += 1;
        }
        flags
    }

    /// Removes `key`, rebalancing after leaf removals.
    ///
    /// A key found in an internal node is tombstoned in place.
    pub(crate) fn remove<Q>(&mut self, owner: OwnerToken, key: &Q, stats: &mut RebalanceStats) -> ChangeFlags
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.get(key).is_none() {
            return ChangeFlags::UNCHANGED;
        }
        let split = split_size(self.order);
        if let Some(root) = self.root.as_mut() {
            make_editable(root, owner).remove(owner, split, key, stats);
        }
        self.length -= 1;
        self.collapse_root();
        ChangeFlags::RESIZED
    }

    /// Tombstones `key` wherever it is found, without rebalancing.
    pub(crate) fn fast_remove<Q>(&mut self, owner: OwnerToken, key: &Q) -> ChangeFlags
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.get(key).is_none() {
            return ChangeFlags::UNCHANGED;
        }
        let Some(root) = self.root.as_mut() else {
            return ChangeFlags::UNCHANGED;
        };
        let mut node = make_editable(root, owner);
        loop {
            match node.search(key) {
                Ok(index) => {
                    node.entries[index].1 = None;
                    break;
                }
                Err(index) => {
                    let Some(slot) = node.children.get_mut(index) else {
                        break;
                    };
                    node = make_editable(slot, owner);
                }
            }
        }
        self.length -= 1;
        self.collapse_root();
        ChangeFlags::RESIZED
    }

    fn collapse_root(&mut self) {
        if self.length == 0 {
            self.root = None;
            return;
        }
        let hollow = self.root.as_ref().is_some_and(|root| root.entries.is_empty());
        if hollow {
            self.root = self.root.as_ref().and_then(|root| root.children.first().cloned());
        }
    }

    /// Replaces the tree with a minimum-height tree holding `entries`.
    ///
    /// `entries` must be strictly increasing by key.
    pub(crate) fn pack<I>(&mut self, owner: OwnerToken, entries: I) -> CollectionResult<()>
    where
        I: ExactSizeIterator<Item = (K, V)>,
    {
        let length = entries.len();
        let root = packer::pack(self.order, owner, entries)?;
        self.root = root;
        self.length = length;
        Ok(())
    }

    pub(crate) fn clear(&mut self) -> bool {
        let altered = self.root.is_some();
        self.root = None;
        self.length = 0;
        altered
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A node being walked and the next step within it.
///
/// Leaves step through their entries. Internal nodes interleave children
/// and entries: even steps descend into a child, odd steps yield an entry.
struct Frame<'a, K, V> {
    node: &'a BTreeNode<K, V>,
    index: usize,
}

/// An in-order walk over the live entries of a B-tree.
pub(crate) struct BTreeIter<'a, K, V> {
    stack: Vec<Frame<'a, K, V>>,
    reverse: bool,
}

impl<'a, K, V> Iterator for BTreeIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.last_mut() {
            let node = frame.node;
            let index = frame.index;
            frame.index += 1;
            let entries = node.entries.len();

            if node.is_leaf() {
                if index < entries {
                    let position = if self.reverse { entries - 1 - index } else { index };
                    if let (key, Some(value)) = &node.entries[position] {
                        return Some((key, value));
                    }
                    continue;
                }
            } else if index <= 2 * entries {
                if index % 2 == 0 {
                    let child = index / 2;
                    let child = if self.reverse {
                        node.children.len() - 1 - child
                    } else {
                        child
                    };
                    if let Some(child) = node.children.get(child) {
                        self.stack.push(Frame {
                            node: child,
                            index: 0,
                        });
                    }
                    continue;
                }
                let position = (index - 1) / 2;
                let position = if self.reverse { entries - 1 - position } else { position };
                if let (key, Some(value)) = &node.entries[position] {
                    return Some((key, value));
                }
                continue;
            }
            self.stack.pop();
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
