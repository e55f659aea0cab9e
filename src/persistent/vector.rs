//! Persistent (immutable) vector based on a windowed radix trie.
//!
//! This module provides [`PersistentVector`], an immutable indexed sequence
//! that uses structural sharing, and [`TransientVector`], its batch-mutation
//! counterpart.
//!
//! # Overview
//!
//! `PersistentVector` is a 32-way branching trie with a tail buffer. A window
//! over the trie's raw positions makes both ends cheap to move:
//!
//! - O(log32 N) random access and update
//! - amortized O(1) `push_back` and `pop_back` (tail buffer)
//! - O(log32 N) `push_front` and `pop_front`
//! - O(log32 N) `slice`, independent of the slice length
//! - O(1) len and `is_empty`
//!
//! Growing a vector with [`set_size`](PersistentVector::set_size) or by
//! setting an index past the end leaves holes: positions inside the vector
//! that hold no value. Holes read as `None`.
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new()
//!     .push_back(1)
//!     .push_back(2)
//!     .push_front(0);
//!
//! assert_eq!(vector.get(0), Some(&0));
//! assert_eq!(vector.get(2), Some(&2));
//!
//! // Structural sharing: the original vector is preserved
//! let sliced = vector.slice(1..);
//! assert_eq!(vector.len(), 3);
//! assert_eq!(sliced.len(), 2);
//! ```

use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::{Bound, ControlFlow, RangeBounds};
use std::rc::Rc;

use crate::error::CollectionResult;

use super::owner::OwnerToken;
use super::vector_trie::{MAX_LENGTH, VectorTrie, VectorTrieIter};

/// Converts a length into a window offset.
///
/// Lengths never exceed [`MAX_LENGTH`], so the fallback is unreachable in
/// practice; it saturates rather than wraps.
fn signed(length: usize) -> isize {
    isize::try_from(length).unwrap_or(isize::MAX)
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a windowed radix trie.
///
/// # Time Complexity
///
/// | Operation    | Complexity           |
/// |--------------|----------------------|
/// | `new`        | O(1)                 |
/// | `get`        | O(log32 N)           |
/// | `set`        | O(log32 N)           |
/// | `push_back`  | O(1) amortized       |
/// | `pop_back`   | O(1) amortized       |
/// | `push_front` | O(log32 N)           |
/// | `pop_front`  | O(log32 N)           |
/// | `slice`      | O(log32 N)           |
/// | `len`        | O(1)                 |
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (1..=5).collect();
/// assert_eq!(vector.len(), 5);
/// assert_eq!(vector.last(), Some(&5));
/// ```
pub struct PersistentVector<T> {
    trie: VectorTrie<T>,
}

impl<T> Clone for PersistentVector<T> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie.clone(),
        }
    }
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trie: VectorTrie::new(),
        }
    }

    /// Returns the number of positions in the vector, holes included.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len()
    }

    /// Returns `true` if the vector has no positions.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `index`.
    ///
    /// Returns `None` for an index past the end or for a hole.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..100).collect();
    /// assert_eq!(vector.get(42), Some(&42));
    /// assert_eq!(vector.get(100), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.trie.get(index)
    }

    /// Returns the element at `index`, or `default` if there is none.
    #[must_use]
    pub fn get_or<'a>(&'a self, index: usize, default: &'a T) -> &'a T {
        self.get(index).unwrap_or(default)
    }

    /// Returns `true` if `index` lies inside the vector.
    #[inline]
    #[must_use]
    pub const fn has(&self, index: usize) -> bool {
        index < self.len()
    }

    /// Returns the first element.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns the last element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Returns `true` if both vectors share the same trie nodes and window.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.trie.ptr_eq(&other.trie)
    }

    /// Returns an iterator over the positions of the vector.
    ///
    /// Each item is `Some(&value)`, or `None` for a hole. The iterator is
    /// double-ended; `iter().rev()` walks from the back.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_back(1).set(3, 4);
    /// let slots: Vec<Option<i32>> = vector.iter().map(|slot| slot.copied()).collect();
    /// assert_eq!(slots, vec![Some(1), None, None, Some(4)]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator {
            inner: self.trie.iter(),
        }
    }

    /// Returns an iterator over the stored values, skipping holes.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.iter().flatten()
    }

    /// Visits `(index, slot)` pairs until `visit` breaks.
    ///
    /// Returns the number of positions visited, including the one that
    /// stopped the walk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::ops::ControlFlow;
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// let visited = vector.iterate(true, |index, _| {
    ///     if index == 7 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    /// });
    /// assert_eq!(visited, 3);
    /// ```
    pub fn iterate<F>(&self, reverse: bool, visit: F) -> usize
    where
        F: FnMut(usize, Option<&T>) -> ControlFlow<()>,
    {
        self.trie.iterate(reverse, visit)
    }
}

impl<T: Clone + PartialEq> PersistentVector<T> {
    /// Creates a vector containing a single element.
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().push_back(element)
    }

    /// Stores `element` at `index`, returning a new vector.
    ///
    /// Setting an index past the end grows the vector; the positions in
    /// between become holes. Storing a value equal to the current one
    /// returns a vector sharing this vector's trie.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..3).collect();
    /// let updated = vector.set(1, 10);
    /// assert_eq!(updated.get(1), Some(&10));
    /// assert_eq!(vector.get(1), Some(&1));
    ///
    /// let grown = vector.set(5, 5);
    /// assert_eq!(grown.len(), 6);
    /// assert_eq!(grown.get(4), None);
    /// ```
    #[must_use]
    pub fn set(&self, index: usize, element: T) -> Self {
        self.with_mutations(|batch| {
            batch.set(index, element);
        })
    }

    /// Appends an element to the back of the vector.
    ///
    /// # Complexity
    ///
    /// O(1) amortized
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_back(1).push_back(2);
    /// assert_eq!(vector.len(), 2);
    /// assert_eq!(vector.get(1), Some(&2));
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        self.with_mutations(|batch| batch.push_back(element))
    }

    /// Appends every element of `elements`, in order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let extended = vector.push_back_all(4..=6);
    /// assert_eq!(extended.values().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    /// ```
    #[must_use]
    pub fn push_back_all<I>(&self, elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        self.with_mutations(|batch| batch.extend(elements))
    }

    /// Removes the last position, returning a new vector.
    ///
    /// Popping an empty vector returns an empty vector.
    #[must_use]
    pub fn pop_back(&self) -> Self {
        self.with_mutations(TransientVector::pop_back)
    }

    /// Prepends an element to the front of the vector.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_front(2).push_front(1);
    /// assert_eq!(vector.first(), Some(&1));
    /// assert_eq!(vector.last(), Some(&2));
    /// ```
    #[must_use]
    pub fn push_front(&self, element: T) -> Self {
        self.with_mutations(|batch| batch.push_front(element))
    }

    /// Prepends every element of `elements`, keeping their order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (4..=5).collect();
    /// let extended = vector.push_front_all(1..=3);
    /// assert_eq!(extended.values().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    /// ```
    #[must_use]
    pub fn push_front_all<I>(&self, elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        self.with_mutations(|batch| batch.push_front_all(elements))
    }

    /// Removes the first position, returning a new vector.
    ///
    /// Popping an empty vector returns an empty vector.
    #[must_use]
    pub fn pop_front(&self) -> Self {
        self.with_mutations(TransientVector::pop_front)
    }

    /// Returns the positions in `range`, clamped to the vector.
    ///
    /// # Complexity
    ///
    /// O(log32 N), independent of the slice length
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// let middle = vector.slice(3..6);
    /// assert_eq!(middle.values().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    /// assert!(vector.slice(8..20).len() == 2);
    /// ```
    #[must_use]
    pub fn slice<R>(&self, range: R) -> Self
    where
        R: RangeBounds<usize>,
    {
        self.with_mutations(|batch| batch.slice(range))
    }

    /// Returns a vector of exactly `size` positions.
    ///
    /// Shrinking drops positions from the back; growing appends holes.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidBounds`](crate::error::CollectionError::InvalidBounds)
    /// if `size` exceeds the maximum vector length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..5).collect();
    /// let grown = vector.set_size(8).unwrap();
    /// assert_eq!(grown.len(), 8);
    /// assert_eq!(grown.get(7), None);
    /// assert!(vector.set_size(usize::MAX).is_err());
    /// ```
    pub fn set_size(&self, size: usize) -> CollectionResult<Self> {
        let mut transient = self.clone().transient();
        transient.set_size(size)?;
        Ok(self.freeze(transient))
    }

    /// Moves the vector's window.
    ///
    /// `begin` is relative to the current first position and may be
    /// negative to prepend holes. `end` is `None` to keep the current end,
    /// negative to count back from the end, and otherwise relative to the
    /// current first position.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidBounds`](crate::error::CollectionError::InvalidBounds)
    /// if the window overflows or exceeds the maximum vector length.
    pub fn set_bounds(&self, begin: isize, end: Option<isize>) -> CollectionResult<Self> {
        let mut transient = self.clone().transient();
        transient.set_bounds(begin, end)?;
        Ok(self.freeze(transient))
    }

    /// Returns an empty vector.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    fn freeze(&self, transient: TransientVector<T>) -> Self {
        if transient.was_altered() {
            transient.persistent()
        } else {
            self.clone()
        }
    }

    /// Applies a batch of edits through a [`TransientVector`].
    ///
    /// If the batch changes nothing, the returned vector shares this
    /// vector's trie.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let base: PersistentVector<i32> = PersistentVector::new();
    /// let filled = base.with_mutations(|batch| {
    ///     for value in 0..1000 {
    ///         batch.push_back(value);
    ///     }
    /// });
    /// assert_eq!(filled.len(), 1000);
    /// assert!(base.is_empty());
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, body: F) -> Self
    where
        F: FnOnce(&mut TransientVector<T>),
    {
        let mut transient = self.clone().transient();
        body(&mut transient);
        self.freeze(transient)
    }

    /// Converts this vector into a transient vector for batch updates.
    #[must_use]
    pub fn transient(self) -> TransientVector<T> {
        TransientVector {
            trie: self.trie,
            owner: OwnerToken::mint(),
            altered: false,
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// TransientVector Definition
// =============================================================================

/// A mutable vector owning one mutation batch.
///
/// Trie nodes created or copied by this transient are edited in place by
/// later writes in the same batch. Nodes shared with persistent vectors are
/// never modified.
///
/// `TransientVector` is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::TransientVector;
///
/// let mut transient = TransientVector::new();
/// transient.push_back(1);
/// transient.push_back(2);
/// transient.push_front(0);
/// let vector = transient.persistent();
/// assert_eq!(vector.values().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
/// ```
pub struct TransientVector<T> {
    trie: VectorTrie<T>,
    owner: OwnerToken,
    altered: bool,
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientVector<i32>: Send, Sync);

impl<T> TransientVector<T> {
    /// Creates an empty transient vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: VectorTrie::new(),
            owner: OwnerToken::mint(),
            altered: false,
            _marker: PhantomData,
        }
    }

    /// Returns the number of positions in the vector, holes included.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len()
    }

    /// Returns `true` if the vector has no positions.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if any write in this batch changed the vector.
    #[inline]
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.trie.get(index)
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

    /// Ends the batch and freezes the vector.
    #[must_use]
    pub fn persistent(self) -> PersistentVector<T> {
        PersistentVector { trie: self.trie }
    }
}

impl<T: Clone + PartialEq> TransientVector<T> {
    /// Stores `element` at `index` in place, growing the vector if needed.
    ///
    /// Returns `true` if the vector changed.
    pub fn set(&mut self, index: usize, element: T) -> bool {
        if index >= self.len() {
            let Some(size) = index.checked_add(1) else {
                return false;
            };
            if self.set_size(size).is_err() {
                return false;
            }
        }
        let altered = self.trie.set(self.owner, index, element);
        self.altered |= altered;
        altered
    }

    /// Appends an element in place.
    ///
    /// A vector already holding the maximum number of positions is left
    /// unchanged.
    pub fn push_back(&mut self, element: T) {
        let index = self.len();
        if self.grow(0, Some(signed(index) + 1)) {
            self.set(index, element);
        }
    }

    /// Prepends an element in place.
    pub fn push_front(&mut self, element: T) {
        if self.grow(-1, None) {
            self.set(0, element);
        }
    }

    /// Prepends every element of `elements` in place, keeping their order.
    pub fn push_front_all<I>(&mut self, elements: I)
    where
        I: IntoIterator<Item = T>,
    {
        let elements: Vec<T> = elements.into_iter().collect();
        if elements.is_empty() || !self.grow(-signed(elements.len()), None) {
            return;
        }
        for (index, element) in elements.into_iter().enumerate() {
            self.set(index, element);
        }
    }

    /// Removes the last position in place.
    pub fn pop_back(&mut self) {
        if !self.is_empty() {
            self.grow(0, Some(-1));
        }
    }

    /// Removes the first position in place.
    pub fn pop_front(&mut self) {
        if !self.is_empty() {
            self.grow(1, None);
        }
    }

    /// Keeps only the positions in `range`, clamped to the vector.
    pub fn slice<R>(&mut self, range: R)
    where
        R: RangeBounds<usize>,
    {
        let length = self.len();
        let begin = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(length);
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => length,
        }
        .min(length);
        self.grow(signed(begin), Some(signed(end.max(begin))));
    }

    /// Resizes to exactly `size` positions in place.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidBounds`](crate::error::CollectionError::InvalidBounds)
    /// if `size` exceeds the maximum vector length; the vector is unchanged.
    pub fn set_size(&mut self, size: usize) -> CollectionResult<()> {
        let end = isize::try_from(size).unwrap_or(isize::MAX);
        self.set_bounds(0, Some(end))
    }

    /// Moves the window in place.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidBounds`](crate::error::CollectionError::InvalidBounds)
    /// if the window overflows or exceeds the maximum vector length; the
    /// vector is unchanged.
    pub fn set_bounds(&mut self, begin: isize, end: Option<isize>) -> CollectionResult<()> {
        let altered = self.trie.set_bounds(self.owner, begin, end)?;
        self.altered |= altered;
        Ok(())
    }

    /// Removes every position in place.
    pub fn clear(&mut self) {
        self.altered |= self.trie.clear();
    }

    /// Moves the window for an infallible operation.
    ///
    /// Returns `false` if the window was rejected.
    fn grow(&mut self, begin: isize, end: Option<isize>) -> bool {
        match self.set_bounds(begin, end) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, length = self.len(), max = MAX_LENGTH, "vector window rejected");
                false
            }
        }
    }
}

impl<T> Default for TransientVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> Extend<T> for TransientVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.push_back(element);
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the positions of a [`PersistentVector`].
///
/// Yields `Some(&value)` for stored values and `None` for holes.
pub struct PersistentVectorIterator<'a, T> {
    inner: VectorTrieIter<'a, T>,
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = Option<&'a T>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for PersistentVectorIterator<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut transient = TransientVector::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = Option<&'a T>;
    type IntoIter = PersistentVectorIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
