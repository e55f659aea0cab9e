//! Structural checks and a textual dump of a B-tree.

use std::fmt::{Debug, Write};

use crate::error::ConsistencyViolation;

use super::{BTree, BTreeNode, split_size};

impl<K: Ord, V> BTree<K, V> {
    /// Verifies every structural invariant, reporting the first violation.
    pub(crate) fn check_consistency(&self) -> Result<(), ConsistencyViolation> {
        match (&self.root, self.length) {
            (Some(_), 0) => return Err(ConsistencyViolation::RootOnEmptyMap),
            (None, size) if size > 0 => return Err(ConsistencyViolation::MissingRoot { size }),
            _ => {}
        }
        if let Some(root) = &self.root {
            let mut leaf_depth = None;
            check_node(root, 0, self.order, &mut leaf_depth)?;
        }

        let mut found = 0;
        let mut previous: Option<&K> = None;
        for (position, (key, _)) in self.iter(false).enumerate() {
            if previous.is_some_and(|previous| previous >= key) {
                return Err(ConsistencyViolation::IterationOrder { position });
            }
            previous = Some(key);
            found += 1;
        }
        if found != self.length {
            return Err(ConsistencyViolation::SizeMismatch {
                found,
                size: self.length,
            });
        }
        Ok(())
    }
}

fn check_node<K: Ord, V>(
    node: &BTreeNode<K, V>,
    depth: usize,
    order: usize,
    leaf_depth: &mut Option<usize>,
) -> Result<(), ConsistencyViolation> {
    let leaf = node.is_leaf();
    if leaf {
        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                return Err(ConsistencyViolation::LeafDepth { depth, expected });
            }
            Some(_) => {}
        }
    }

    let entries = node.entries.len();
    if entries == 0 || entries >= order {
        return Err(ConsistencyViolation::EntryCount {
            depth,
            entries,
            order,
        });
    }
    let minimum = split_size(order);
    if depth > 0 && entries < minimum {
        return Err(ConsistencyViolation::Underfull {
            depth,
            entries,
            minimum,
        });
    }
    if !leaf && node.children.len() != entries + 1 {
        return Err(ConsistencyViolation::ChildCount {
            depth,
            entries,
            children: node.children.len(),
        });
    }
    if leaf {
        if let Some(index) = node.entries.iter().position(|(_, value)| value.is_none()) {
            return Err(ConsistencyViolation::LeafTombstone { depth, index });
        }
    }
    if let Some(index) = node.entries.windows(2).position(|pair| pair[0].0 >= pair[1].0) {
        return Err(ConsistencyViolation::Unsorted { depth, index });
    }

    for (index, child) in node.children.iter().enumerate() {
        check_node(child, depth + 1, order, leaf_depth)?;
        let missing = ConsistencyViolation::MissingNode { depth: depth + 1 };
        let first = child.first_key().ok_or_else(|| missing.clone())?;
        let last = child.last_key().ok_or(missing)?;
        if index > 0 && node.entries[index - 1].0 >= *first {
            return Err(ConsistencyViolation::LeftBound { depth, child: index });
        }
        if index < entries && *last >= node.entries[index].0 {
            return Err(ConsistencyViolation::RightBound { depth, child: index });
        }
    }
    Ok(())
}

// =============================================================================
// Debug dump
// =============================================================================

const INDENT: &str = "    ";

impl<K: Debug, V> BTree<K, V> {
    /// Renders the tree one line per node or entry, stopping at `max_depth`.
    ///
    /// Internal nodes list their children as `+ NODE[i] (Ln)` or
    /// `+ LEAF[i] (Ln)` lines interleaved with `- ENTRY[i]: key` lines;
    /// tombstones print as `- REMOVED ENTRY[i]: key`.
    pub(crate) fn debug_tree(&self, max_depth: Option<usize>) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            render(root, 0, max_depth, &mut out);
        }
        out
    }
}

fn render<K: Debug, V>(node: &BTreeNode<K, V>, level: usize, max_depth: Option<usize>, out: &mut String) {
    if max_depth.is_some_and(|max| level >= max) {
        return;
    }
    if node.is_leaf() {
        for (index, (key, value)) in node.entries.iter().enumerate() {
            render_entry(out, level, index, key, value.is_none());
        }
        return;
    }
    for (index, child) in node.children.iter().enumerate() {
        let kind = if child.is_leaf() { "LEAF" } else { "NODE" };
        let _ = writeln!(out, "{}+ {kind}[{index}] (L{level})", INDENT.repeat(level));
        render(child, level + 1, max_depth, out);
        if let Some((key, value)) = node.entries.get(index) {
            render_entry(out, level, index, key, value.is_none());
        }
    }
}

fn render_entry<K: Debug>(out: &mut String, level: usize, index: usize, key: &K, removed: bool) {
    let prefix = if removed { "REMOVED " } else { "" };
    let _ = writeln!(out, "{}- {prefix}ENTRY[{index}]: {key:?}", INDENT.repeat(level));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::btree::RebalanceStats;
    use crate::persistent::owner::OwnerToken;
    use rstest::rstest;

    fn build(order: usize, count: i32) -> BTree<i32, i32> {
        let owner = OwnerToken::mint();
        let mut stats = RebalanceStats::default();
        let mut tree = BTree::new(order);
        for key in 1..=count {
            tree.upsert(owner, key, key, &mut stats);
        }
        tree
    }

    #[rstest]
    #[case(3, 0)]
    #[case(3, 50)]
    #[case(5, 200)]
    #[case(33, 2000)]
    fn test_inserted_trees_are_consistent(#[case] order: usize, #[case] count: i32) {
        assert_eq!(build(order, count).check_consistency(), Ok(()));
    }

    #[rstest]
    fn test_size_mismatch_is_reported() {
        let mut tree = build(5, 10);
        tree.length = 11;
        assert_eq!(
            tree.check_consistency().map_err(|violation| violation.code()),
            Err(4)
        );
    }

    #[rstest]
    fn test_root_on_empty_map_is_reported() {
        let mut tree = build(5, 3);
        tree.length = 0;
        assert_eq!(tree.check_consistency(), Err(ConsistencyViolation::RootOnEmptyMap));
    }

    #[rstest]
    fn test_missing_root_is_reported() {
        let mut tree: BTree<i32, i32> = BTree::new(5);
        tree.length = 2;
        assert_eq!(
            tree.check_consistency(),
            Err(ConsistencyViolation::MissingRoot { size: 2 })
        );
    }

    #[rstest]
    fn test_leaf_tombstone_is_reported() {
        let mut tree = build(5, 5);
        tree.fast_remove(OwnerToken::mint(), &1);
        assert_eq!(
            tree.check_consistency().map_err(|violation| violation.code()),
            Err(113)
        );
    }

    #[rstest]
    fn test_debug_tree_layout() {
        let mut tree = build(5, 5);
        tree.remove(OwnerToken::mint(), &3, &mut RebalanceStats::default());
        let expected = "\
+ LEAF[0] (L0)
    - ENTRY[0]: 1
    - ENTRY[1]: 2
- REMOVED ENTRY[0]: 3
+ LEAF[1] (L0)
    - ENTRY[0]: 4
    - ENTRY[1]: 5
";
        assert_eq!(tree.debug_tree(None), expected);
    }

    #[rstest]
    fn test_debug_tree_respects_max_depth() {
        let tree = build(5, 5);
        assert_eq!(tree.debug_tree(Some(1)), "+ LEAF[0] (L0)\n- ENTRY[0]: 3\n+ LEAF[1] (L0)\n");
        assert_eq!(tree.debug_tree(Some(0)), "");
    }

    #[rstest]
    fn test_debug_tree_of_empty_tree_is_empty() {
        let tree: BTree<i32, i32> = BTree::new(5);
        assert_eq!(tree.debug_tree(None), "");
    }
}
