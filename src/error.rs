//! Error types for the persistent collections.
//!
//! Lookups never fail: an absent key or an out-of-range index is `None`.
//! The variants here cover configuration mistakes, bounds that cannot be
//! represented, and packer invariants that should never break.

use thiserror::Error;

/// Errors raised by collection operations.
///
/// A failed operation leaves the handle it was called on untouched.
///
/// # Examples
///
/// ```rust
/// use cowtrie::error::CollectionError;
///
/// let error = CollectionError::InvalidOrder { order: 2 };
/// assert_eq!(error.to_string(), "b-tree order must be at least 3, got 2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The sorted map options name a node shape other than `"btree"`.
    #[error("unsupported sorted map node type: {node_type:?}")]
    UnsupportedNodeShape {
        /// The rejected node type.
        node_type: String,
    },

    /// The requested B-tree order is below the minimum of 3.
    #[error("b-tree order must be at least 3, got {order}")]
    InvalidOrder {
        /// The rejected order.
        order: usize,
    },

    /// A pack plan failed verification or disagreed with its input stream.
    #[error("pack plan inconsistency: {reason}")]
    PlanConsistency {
        /// What went wrong.
        reason: String,
    },

    /// A vector window computation overflowed or exceeded the maximum length.
    #[error("invalid vector bounds: origin {origin}, capacity {capacity}")]
    InvalidBounds {
        /// The requested origin, relative to the current one.
        origin: i128,
        /// The requested capacity, relative to the current origin.
        capacity: i128,
    },
}

impl CollectionError {
    pub(crate) fn plan(reason: impl Into<String>) -> Self {
        Self::PlanConsistency {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// A B-tree invariant violation found by `check_consistency`.
///
/// Every violation carries a stable numeric [`code`](Self::code) so that
/// test failures can be compared across runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyViolation {
    /// The map holds a root node but reports a size of zero.
    #[error("root present on an empty map")]
    RootOnEmptyMap,
    /// The map has no root but reports a non-zero size.
    #[error("no root on a map of size {size}")]
    MissingRoot {
        /// The reported size.
        size: usize,
    },
    /// Iteration produced keys out of order.
    #[error("iteration out of order at position {position}")]
    IterationOrder {
        /// Position of the offending entry.
        position: usize,
    },
    /// The number of live entries differs from the reported size.
    #[error("found {found} live entries, map reports {size}")]
    SizeMismatch {
        /// Live entries found by iteration.
        found: usize,
        /// The reported size.
        size: usize,
    },
    /// A child slot is missing.
    #[error("missing node at depth {depth}")]
    MissingNode {
        /// Depth of the missing node.
        depth: usize,
    },
    /// A node holds no entries or more than `order - 1`.
    #[error("node at depth {depth} holds {entries} entries, order is {order}")]
    EntryCount {
        /// Depth of the node.
        depth: usize,
        /// Its entry count.
        entries: usize,
        /// Tree order.
        order: usize,
    },
    /// A non-root node holds fewer entries than the split size.
    #[error("node at depth {depth} holds {entries} entries, minimum is {minimum}")]
    Underfull {
        /// Depth of the node.
        depth: usize,
        /// Its entry count.
        entries: usize,
        /// The minimum fill.
        minimum: usize,
    },
    /// An internal node's child count is not its entry count plus one.
    #[error("node at depth {depth} has {children} children for {entries} entries")]
    ChildCount {
        /// Depth of the node.
        depth: usize,
        /// Its entry count.
        entries: usize,
        /// Its child count.
        children: usize,
    },
    /// Entries within a node are not strictly increasing.
    #[error("unsorted entries at depth {depth}, index {index}")]
    Unsorted {
        /// Depth of the node.
        depth: usize,
        /// Index of the first out-of-order entry.
        index: usize,
    },
    /// A child holds a key not greater than its left separator.
    #[error("child {child} at depth {depth} crosses its left separator")]
    LeftBound {
        /// Depth of the parent.
        depth: usize,
        /// Child index.
        child: usize,
    },
    /// A child holds a key not less than its right separator.
    #[error("child {child} at depth {depth} crosses its right separator")]
    RightBound {
        /// Depth of the parent.
        depth: usize,
        /// Child index.
        child: usize,
    },
    /// Two leaves sit at different depths.
    #[error("leaf at depth {depth}, expected {expected}")]
    LeafDepth {
        /// Depth of the offending leaf.
        depth: usize,
        /// Depth of the first leaf seen.
        expected: usize,
    },
    /// A leaf holds a tombstone.
    #[error("tombstone in leaf at depth {depth}, index {index}")]
    LeafTombstone {
        /// Depth of the leaf.
        depth: usize,
        /// Index of the tombstoned entry.
        index: usize,
    },
}

impl ConsistencyViolation {
    /// Returns the numeric code of this violation.
    ///
    /// Map-level problems use codes 1 to 4; node-level problems use 101 and up.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::RootOnEmptyMap => 1,
            Self::MissingRoot { .. } => 2,
            Self::IterationOrder { .. } => 3,
            Self::SizeMismatch { .. } => 4,
            Self::MissingNode { .. } => 101,
            Self::EntryCount { .. } => 102,
            Self::Underfull { .. } => 103,
            Self::ChildCount { .. } => 104,
            Self::Unsorted { .. } => 108,
            Self::LeftBound { .. } => 110,
            Self::RightBound { .. } => 111,
            Self::LeafDepth { .. } => 112,
            Self::LeafTombstone { .. } => 113,
        }
    }
}
