//! Radix trie engine behind [`PersistentVector`](super::PersistentVector).
//!
//! Elements live in 32-slot leaves under 32-way branches. The last (up to)
//! 32 elements sit in a separate tail leaf so that appends and pops rarely
//! touch the trie. A window `[origin, capacity)` over the raw positions
//! lets both ends move cheaply: trimming drops whole subtrees instead of
//! shifting elements.

use std::ops::ControlFlow;

use crate::error::{CollectionError, CollectionResult};

use super::ReferenceCounter;
use super::owner::{Owned, OwnerToken, make_editable};

// =============================================================================
// Constants
// =============================================================================

/// Bits per level in the trie
const BITS_PER_LEVEL: u32 = 5;

/// Bit mask for extracting index within a node
const MASK: usize = (1 << BITS_PER_LEVEL) - 1;

/// Largest number of elements a vector may hold.
pub(crate) const MAX_LENGTH: usize = 1 << 31;

/// Bound on raw window coordinates; keeps every shift below overflow.
const MAX_COORDINATE: isize = isize::MAX >> 8;

/// Offset of the first raw position held by the tail.
const fn tail_offset(capacity: usize) -> usize {
    if capacity <= MASK {
        0
    } else {
        ((capacity - 1) >> BITS_PER_LEVEL) << BITS_PER_LEVEL
    }
}

/// Number of raw positions spanned by one child of a node at `level`.
const fn span(level: u32) -> usize {
    match 1_usize.checked_shl(level) {
        Some(span) => span,
        None => usize::MAX,
    }
}

// =============================================================================
// Node Definition
// =============================================================================

type Child<T> = ReferenceCounter<VectorNode<T>>;

#[derive(Clone)]
pub(crate) struct VectorNode<T> {
    owner: OwnerToken,
    body: VectorBody<T>,
}

/// Branches hold child slots; leaves hold element slots. A `None` slot in a
/// leaf is a position inside the window that was never assigned.
#[derive(Clone)]
enum VectorBody<T> {
    Branch(Vec<Option<Child<T>>>),
    Leaf(Vec<Option<T>>),
}

impl<T: Clone> Owned for VectorNode<T> {
    fn owner(&self) -> OwnerToken {
        self.owner
    }

    fn set_owner(&mut self, owner: OwnerToken) {
        self.owner = owner;
    }
}

impl<T> VectorNode<T> {
    /// An empty node of the kind that lives at `level`.
    const fn empty(owner: OwnerToken, level: u32) -> Self {
        let body = if level == 0 {
            VectorBody::Leaf(Vec::new())
        } else {
            VectorBody::Branch(Vec::new())
        };
        Self { owner, body }
    }

    const fn branch(owner: OwnerToken, children: Vec<Option<Child<T>>>) -> Self {
        Self {
            owner,
            body: VectorBody::Branch(children),
        }
    }

    const fn len(&self) -> usize {
        match &self.body {
            VectorBody::Branch(children) => children.len(),
            VectorBody::Leaf(values) => values.len(),
        }
    }

    fn child(&self, index: usize) -> Option<&Child<T>> {
        match &self.body {
            VectorBody::Branch(children) => children.get(index)?.as_ref(),
            VectorBody::Leaf(_) => None,
        }
    }

    fn value(&self, index: usize) -> Option<&T> {
        match &self.body {
            VectorBody::Leaf(values) => values.get(index)?.as_ref(),
            VectorBody::Branch(_) => None,
        }
    }

    /// Mutable access to a child slot, growing the branch to reach it.
    fn child_slot_mut(&mut self, index: usize) -> Option<&mut Option<Child<T>>> {
        match &mut self.body {
            VectorBody::Branch(children) => {
                if children.len() <= index {
                    children.resize_with(index + 1, || None);
                }
                children.get_mut(index)
            }
            VectorBody::Leaf(_) => None,
        }
    }

    /// Mutable access to an element slot, growing the leaf to reach it.
    fn value_slot_mut(&mut self, index: usize) -> Option<&mut Option<T>> {
        match &mut self.body {
            VectorBody::Leaf(values) => {
                if values.len() <= index {
                    values.resize_with(index + 1, || None);
                }
                values.get_mut(index)
            }
            VectorBody::Branch(_) => None,
        }
    }

    /// Reports whether anything below raw position `index` is stored here.
    fn has_before(&self, level: u32, index: usize) -> bool {
        if self.len() == 0 {
            return false;
        }
        let origin_index = (index >> level) & MASK;
        if origin_index > 0 || origin_index >= self.len() {
            return true;
        }
        level > 0
            && self
                .child(0)
                .is_some_and(|child| child.has_before(level - BITS_PER_LEVEL, index))
    }

    /// Reports whether anything at or above raw position `index` is stored here.
    fn has_after(&self, level: u32, index: usize) -> bool {
        if self.len() == 0 || index == 0 {
            return false;
        }
        let size_index = ((index - 1) >> level) & MASK;
        if size_index >= self.len() {
            return false;
        }
        if size_index + 1 < self.len() {
            return true;
        }
        level > 0
            && self
                .child(size_index)
                .is_some_and(|child| child.has_after(level - BITS_PER_LEVEL, index))
    }
}

impl<T: Clone> VectorNode<T> {
    /// Returns the node in `slot`, creating an empty one first if needed.
    fn editable_slot(slot: &mut Option<Child<T>>, owner: OwnerToken, level: u32) -> &mut Self {
        let node = slot.get_or_insert_with(|| ReferenceCounter::new(Self::empty(owner, level)));
        make_editable(node, owner)
    }

    /// Hangs `leaf` at raw position `offset`, creating or copying the
    /// branches on the way down.
    fn graft(&mut self, owner: OwnerToken, level: u32, offset: usize, leaf: Child<T>) {
        let index = (offset >> level) & MASK;
        let Some(slot) = self.child_slot_mut(index) else {
            return;
        };
        if level > BITS_PER_LEVEL {
            let child_level = level - BITS_PER_LEVEL;
            Self::editable_slot(slot, owner, child_level).graft(owner, child_level, offset, leaf);
        } else {
            *slot = Some(leaf);
        }
    }

    /// Drops every slot below raw position `index`.
    fn remove_before(slot: &mut Child<T>, owner: OwnerToken, level: u32, index: usize) {
        if !slot.has_before(level, index) {
            return;
        }
        let origin_index = (index >> level) & MASK;
        if origin_index >= slot.len() {
            *slot = ReferenceCounter::new(Self::empty(owner, level));
            return;
        }
        let node = make_editable(slot, owner);
        match &mut node.body {
            VectorBody::Branch(children) => {
                children[..origin_index].fill(None);
                if let Some(child) = children[origin_index].as_mut() {
                    Self::remove_before(child, owner, level.saturating_sub(BITS_PER_LEVEL), index);
                }
            }
            VectorBody::Leaf(values) => {
                for value in &mut values[..origin_index] {
                    *value = None;
                }
            }
        }
    }

    /// Drops every slot at or above raw position `index`.
    fn remove_after(slot: &mut Child<T>, owner: OwnerToken, level: u32, index: usize) {
        if !slot.has_after(level, index) {
            return;
        }
        let size_index = ((index - 1) >> level) & MASK;
        let node = make_editable(slot, owner);
        match &mut node.body {
            VectorBody::Branch(children) => {
                children.truncate(size_index + 1);
                if let Some(child) = children[size_index].as_mut() {
                    Self::remove_after(child, owner, level.saturating_sub(BITS_PER_LEVEL), index);
                }
            }
            VectorBody::Leaf(values) => values.truncate(size_index + 1),
        }
    }
}

// =============================================================================
// Trie root
// =============================================================================

/// The window, height, root and tail of a vector trie.
pub(crate) struct VectorTrie<T> {
    origin: usize,
    capacity: usize,
    level: u32,
    root: Option<Child<T>>,
    tail: Option<Child<T>>,
}

impl<T> Clone for VectorTrie<T> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            capacity: self.capacity,
            level: self.level,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T> VectorTrie<T> {
    pub(crate) const fn new() -> Self {
        Self {
            origin: 0,
            capacity: 0,
            level: BITS_PER_LEVEL,
            root: None,
            tail: None,
        }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.capacity - self.origin
    }

    #[cfg(test)]
    pub(crate) const fn level(&self) -> u32 {
        self.level
    }

    #[cfg(test)]
    pub(crate) const fn has_root(&self) -> bool {
        self.root.is_some()
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        fn same<T>(left: Option<&Child<T>>, right: Option<&Child<T>>) -> bool {
            match (left, right) {
                (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
                (None, None) => true,
                _ => false,
            }
        }
        self.origin == other.origin
            && self.capacity == other.capacity
            && same(self.root.as_ref(), other.root.as_ref())
            && same(self.tail.as_ref(), other.tail.as_ref())
    }

    /// Finds the leaf holding raw position `raw`.
    fn node_for(&self, raw: usize) -> Option<&VectorNode<T>> {
        if raw >= tail_offset(self.capacity) {
            return self.tail.as_deref();
        }
        if raw >= span(self.level + BITS_PER_LEVEL) {
            return None;
        }
        let mut node = self.root.as_deref()?;
        let mut level = self.level;
        while level > 0 {
            node = node.child((raw >> level) & MASK).map(|child| &**child)?;
            level -= BITS_PER_LEVEL;
        }
        Some(node)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let raw = index + self.origin;
        self.node_for(raw)?.value(raw & MASK)
    }

    pub(crate) fn iter(&self) -> VectorTrieIter<'_, T> {
        VectorTrieIter {
            trie: self,
            front: 0,
            back: self.len(),
            front_leaf: None,
            back_leaf: None,
        }
    }

    /// Visits slots until `visit` breaks; returns how many were visited.
    pub(crate) fn iterate<F>(&self, reverse: bool, mut visit: F) -> usize
    where
        F: FnMut(usize, Option<&T>) -> ControlFlow<()>,
    {
        let mut visited = 0;
        let length = self.len();
        let mut iterator = self.iter();
        while let Some(value) = if reverse {
            iterator.next_back()
        } else {
            iterator.next()
        } {
            let index = if reverse {
                length - visited - 1
            } else {
                visited
            };
            visited += 1;
            if visit(index, value).is_break() {
                break;
            }
        }
        visited
    }
}

impl<T: Clone + PartialEq> VectorTrie<T> {
    /// Stores `value` at `index`, which must lie inside the window.
    ///
    /// Returns `true` if the vector changed.
    pub(crate) fn set(&mut self, owner: OwnerToken, index: usize, value: T) -> bool {
        if index >= self.len() || self.get(index) == Some(&value) {
            return false;
        }
        let raw = index + self.origin;
        let leaf = if raw >= tail_offset(self.capacity) {
            VectorNode::editable_slot(&mut self.tail, owner, 0)
        } else {
            let mut level = self.level;
            let mut node = VectorNode::editable_slot(&mut self.root, owner, level);
            while level > 0 {
                let Some(slot) = node.child_slot_mut((raw >> level) & MASK) else {
                    return false;
                };
                level -= BITS_PER_LEVEL;
                node = VectorNode::editable_slot(slot, owner, level);
            }
            node
        };
        match leaf.value_slot_mut(raw & MASK) {
            Some(cell) => {
                *cell = Some(value);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone> VectorTrie<T> {
    pub(crate) fn clear(&mut self) -> bool {
        let altered = self.len() != 0 || self.root.is_some() || self.tail.is_some();
        *self = Self::new();
        altered
    }

    /// Moves the window to `[origin + begin, end')`.
    ///
    /// `end` is `None` to keep the capacity, negative to count back from the
    /// capacity, and otherwise relative to the current origin. Growing the
    /// window exposes empty slots; shrinking it discards whole subtrees.
    ///
    /// Returns `true` if the vector changed. On error the vector is left
    /// exactly as it was.
    pub(crate) fn set_bounds(
        &mut self,
        owner: OwnerToken,
        begin: isize,
        end: Option<isize>,
    ) -> CollectionResult<bool> {
        let (new_origin, new_capacity) = self.resolve_bounds(begin, end)?;
        let old_origin = self.origin.cast_signed();
        let old_capacity = self.capacity.cast_signed();
        if new_origin == old_origin && new_capacity == old_capacity {
            return Ok(false);
        }
        if new_origin >= new_capacity {
            return Ok(self.clear());
        }
        self.resize(owner, old_origin, old_capacity, new_origin, new_capacity);
        Ok(true)
    }

    fn resolve_bounds(&self, begin: isize, end: Option<isize>) -> CollectionResult<(isize, isize)> {
        let invalid = || CollectionError::InvalidBounds {
            origin: begin as i128,
            capacity: end.map_or(self.len() as i128, |end| end as i128),
        };
        let old_origin = isize::try_from(self.origin).map_err(|_| invalid())?;
        let old_capacity = isize::try_from(self.capacity).map_err(|_| invalid())?;
        let new_origin = old_origin.checked_add(begin).ok_or_else(invalid)?;
        let new_capacity = match end {
            None => Some(old_capacity),
            Some(end) if end < 0 => old_capacity.checked_add(end),
            Some(end) => old_origin.checked_add(end),
        }
        .ok_or_else(invalid)?;

        let within = |coordinate: isize| (-MAX_COORDINATE..=MAX_COORDINATE).contains(&coordinate);
        if !within(new_origin) || !within(new_capacity) {
            return Err(invalid());
        }
        if new_capacity > new_origin && (new_capacity - new_origin).unsigned_abs() > MAX_LENGTH {
            return Err(invalid());
        }
        Ok((new_origin, new_capacity))
    }

    #[allow(clippy::too_many_lines)]
    fn resize(
        &mut self,
        owner: OwnerToken,
        old_origin: isize,
        old_capacity: isize,
        new_origin: isize,
        new_capacity: isize,
    ) {
        let mut new_level = self.level;
        let mut new_root = self.root.take();
        let old_tail = self.tail.take();

        // Add levels on top until the new origin is no longer negative.
        let mut offset_shift: isize = 0;
        while new_origin + offset_shift < 0 {
            let children = match new_root.take() {
                Some(root) if root.len() > 0 => vec![None, Some(root)],
                _ => Vec::new(),
            };
            new_root = Some(ReferenceCounter::new(VectorNode::branch(owner, children)));
            new_level += BITS_PER_LEVEL;
            offset_shift += 1 << new_level;
        }

        // Every coordinate is non-negative from here on.
        let mut new_origin = (new_origin + offset_shift).unsigned_abs();
        let mut new_capacity = (new_capacity + offset_shift).unsigned_abs();
        let old_origin = (old_origin + offset_shift).unsigned_abs();
        let old_capacity = (old_capacity + offset_shift).unsigned_abs();

        let old_tail_offset = tail_offset(old_capacity);
        let new_tail_offset = tail_offset(new_capacity);

        // Add levels on top until the new tail offset is addressable.
        while new_tail_offset >= span(new_level + BITS_PER_LEVEL) {
            let children = match new_root.take() {
                Some(root) if root.len() > 0 => vec![Some(root)],
                _ => Vec::new(),
            };
            new_root = Some(ReferenceCounter::new(VectorNode::branch(owner, children)));
            new_level += BITS_PER_LEVEL;
        }

        let (mut new_tail, graft) = if new_tail_offset < old_tail_offset {
            let leaf = Self::leaf_in(new_root.as_ref(), new_level, new_capacity - 1);
            (leaf, None)
        } else if new_tail_offset > old_tail_offset {
            let graft = old_tail.filter(|tail| new_origin < old_capacity && tail.len() > 0);
            let fresh = ReferenceCounter::new(VectorNode::empty(owner, 0));
            (Some(fresh), graft)
        } else {
            (old_tail, None)
        };

        // The old tail now lies below the tail offset: hang it in the trie.
        if let Some(old_tail) = graft {
            let root = VectorNode::editable_slot(&mut new_root, owner, new_level);
            root.graft(owner, new_level, old_tail_offset, old_tail);
        }

        if new_capacity < old_capacity {
            if let Some(tail) = new_tail.as_mut() {
                VectorNode::remove_after(tail, owner, 0, new_capacity);
            }
        }

        if new_origin >= new_tail_offset {
            // The whole window fits in the tail.
            new_origin -= new_tail_offset;
            new_capacity -= new_tail_offset;
            new_level = BITS_PER_LEVEL;
            new_root = None;
            if let Some(tail) = new_tail.as_mut() {
                VectorNode::remove_before(tail, owner, 0, new_origin);
            }
        } else if new_origin > old_origin || new_tail_offset < old_tail_offset {
            // Drop top levels while a single child spans the window.
            let mut offset = 0;
            while new_level > 0 {
                let Some(root) = new_root.as_ref() else {
                    break;
                };
                let begin_index = (new_origin >> new_level) & MASK;
                if begin_index != (new_tail_offset >> new_level) & MASK {
                    break;
                }
                offset += begin_index << new_level;
                new_level -= BITS_PER_LEVEL;
                new_root = root.child(begin_index).cloned();
            }

            if new_origin > old_origin {
                if let Some(root) = new_root.as_mut() {
                    VectorNode::remove_before(root, owner, new_level, new_origin - offset);
                }
            }
            if new_tail_offset < old_tail_offset {
                if let Some(root) = new_root.as_mut() {
                    VectorNode::remove_after(root, owner, new_level, new_tail_offset - offset);
                }
            }
            new_origin -= offset;
            new_capacity -= offset;
        }

        self.origin = new_origin;
        self.capacity = new_capacity;
        self.level = new_level;
        self.root = new_root;
        self.tail = new_tail;
    }

    /// Finds the trie leaf holding raw position `raw`.
    fn leaf_in(root: Option<&Child<T>>, level: u32, raw: usize) -> Option<Child<T>> {
        let mut node = root?;
        let mut level = level;
        while level > 0 {
            node = node.child((raw >> level) & MASK)?;
            level -= BITS_PER_LEVEL;
        }
        Some(node.clone())
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A double-ended cursor over the slots of a vector trie.
///
/// Each end remembers the leaf it last read, so a full walk resolves each
/// leaf once.
pub(crate) struct VectorTrieIter<'a, T> {
    trie: &'a VectorTrie<T>,
    front: usize,
    back: usize,
    front_leaf: Option<(usize, Option<&'a VectorNode<T>>)>,
    back_leaf: Option<(usize, Option<&'a VectorNode<T>>)>,
}

impl<'a, T> VectorTrieIter<'a, T> {
    fn read(
        trie: &'a VectorTrie<T>,
        cache: &mut Option<(usize, Option<&'a VectorNode<T>>)>,
        index: usize,
    ) -> Option<&'a T> {
        let raw = index + trie.origin;
        let block = raw & !MASK;
        let leaf = match *cache {
            Some((cached, leaf)) if cached == block => leaf,
            _ => {
                let leaf = trie.node_for(raw);
                *cache = Some((block, leaf));
                leaf
            }
        };
        leaf?.value(raw & MASK)
    }
}

impl<'a, T> Iterator for VectorTrieIter<'a, T> {
    type Item = Option<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let value = Self::read(self.trie, &mut self.front_leaf, self.front);
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for VectorTrieIter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(Self::read(self.trie, &mut self.back_leaf, self.back))
    }
}

impl<T> ExactSizeIterator for VectorTrieIter<'_, T> {}

// =============================================================================
// Tests
// =============================================================================
