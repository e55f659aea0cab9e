//! Configuration for [`PersistentSortedMap`](super::PersistentSortedMap).

use crate::error::{CollectionError, CollectionResult};

use super::btree::{DEFAULT_ORDER, MIN_ORDER};

/// The only node shape sorted maps support.
pub const BTREE_NODE_TYPE: &str = "btree";

/// Options for a sorted map.
///
/// With the `serde` feature the options deserialize from any self-describing
/// format; missing fields take their defaults.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::SortedMapOptions;
///
/// let options = SortedMapOptions::default().with_order(7);
/// assert_eq!(options.btree_order, 7);
/// assert_eq!(options.node_type, "btree");
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct SortedMapOptions {
    /// Node shape; must be `"btree"`.
    #[cfg_attr(feature = "serde", serde(alias = "nodeType"))]
    pub node_type: String,
    /// Maximum number of children per node; at least 3.
    #[cfg_attr(feature = "serde", serde(alias = "btreeOrder"))]
    pub btree_order: usize,
}

impl SortedMapOptions {
    /// Returns these options with a different B-tree order.
    #[must_use]
    pub fn with_order(mut self, order: usize) -> Self {
        self.btree_order = order;
        self
    }

    /// Checks the node type and order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::UnsupportedNodeShape`] for a node type other
    /// than `"btree"`, or [`CollectionError::InvalidOrder`] for an order below 3.
    pub fn validate(&self) -> CollectionResult<()> {
        if self.node_type != BTREE_NODE_TYPE {
            return Err(CollectionError::UnsupportedNodeShape {
                node_type: self.node_type.clone(),
            });
        }
        if self.btree_order < MIN_ORDER {
            return Err(CollectionError::InvalidOrder {
                order: self.btree_order,
            });
        }
        Ok(())
    }
}

impl Default for SortedMapOptions {
    fn default() -> Self {
        Self {
            node_type: BTREE_NODE_TYPE.to_string(),
            btree_order: DEFAULT_ORDER,
        }
    }
}
