//! # cowtrie
//!
//! Persistent collections built on copy-on-write tries and B-trees.
//!
//! ## Overview
//!
//! Every collection has two faces. The persistent handle never changes:
//! writes return a new handle that shares all untouched nodes with the old
//! one. The transient handle owns one mutation batch and edits the nodes it
//! has already copied in place, which makes bulk construction cheap.
//!
//! - **Hash map**: hash array mapped trie with five node kinds
//! - **Vector**: 32-way radix trie with a tail and a movable origin
//! - **Sorted map**: B-tree with tombstones, range seeks and bulk packing
//!
//! ## Feature Flags
//!
//! - `persistent`: the collections (enabled by default)
//! - `arc`: use `Arc` instead of `Rc`, making persistent handles `Send + Sync`
//! - `serde`: deserialize [`SortedMapOptions`](persistent::SortedMapOptions)
//! - `fxhash` / `ahash`: alternative hashers for the hash map
//! - `full`: enable `persistent` and `serde`
//!
//! ## Example
//!
//! ```rust
//! use cowtrie::prelude::*;
//!
//! let map: PersistentHashMap<&str, i32> = PersistentHashMap::new().insert("a", 1);
//! let batch = map.with_mutations(|transient| {
//!     transient.insert("b", 2);
//!     transient.insert("c", 3);
//! });
//! assert_eq!(map.len(), 1);
//! assert_eq!(batch.len(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports the collection handles and the error types.
///
/// # Usage
///
/// ```rust
/// use cowtrie::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::*;

    #[cfg(feature = "persistent")]
    pub use crate::persistent::*;
}

pub mod error;

#[cfg(feature = "persistent")]
pub mod persistent;
