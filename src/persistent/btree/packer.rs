//! Bulk loading of sorted entries into a minimum-height B-tree.
//!
//! Packing happens in two steps. A [`PackPlan`] first describes the shape of
//! the tree for a given order and entry count: which subtrees are complete,
//! how many of them sit side by side, and how the remainder is split. The
//! [`Packer`] then streams the entries through that plan, filling nodes
//! bottom-up on a per-level stack.
//!
//! Plans for small inputs recur constantly as sub-plans, so they are kept in
//! a bounded process-wide cache.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::error::{CollectionError, CollectionResult};
use crate::persistent::ReferenceCounter;
use crate::persistent::owner::OwnerToken;

use super::{BTreeNode, Child, split_size};

// =============================================================================
// Constants
// =============================================================================

/// Tallest complete subtree a plan may describe.
const MAX_PLAN_HEIGHT: usize = 20;

/// Plans are cached only for orders below this.
const CACHE_MAX_ORDER: usize = 100;

/// Plans are cached only for entry counts up to this.
const CACHE_MAX_ENTRIES: usize = 100;

/// Number of plans the cache retains before it stops admitting new ones.
const CACHE_CAPACITY: usize = 500;

// =============================================================================
// Plans
// =============================================================================

/// The shape of a packed subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PackPlan {
    /// `repeat` sibling subtrees of equal height, separated by single entries.
    ///
    /// A full build fills every node completely; a partial build is a lone
    /// leaf holding fewer than `order - 1` entries.
    Build {
        order: usize,
        height: usize,
        full: bool,
        repeat: usize,
        total: usize,
    },
    /// One node whose children are the subtrees built by `items`.
    Assemble {
        order: usize,
        height: usize,
        total: usize,
        items: Vec<Arc<PackPlan>>,
    },
}

impl PackPlan {
    pub(crate) const fn height(&self) -> usize {
        match self {
            Self::Build { height, .. } | Self::Assemble { height, .. } => *height,
        }
    }

    /// Number of entries the plan consumes.
    pub(crate) const fn total(&self) -> usize {
        match self {
            Self::Build { total, .. } | Self::Assemble { total, .. } => *total,
        }
    }
}

/// Number of entries in a complete tree of the given order and height.
///
/// # Errors
///
/// Returns [`CollectionError::PlanConsistency`] if `height` is outside
/// `1..=20` or the count overflows.
pub(crate) fn calc_plan_count(order: usize, height: usize) -> CollectionResult<usize> {
    if !(1..=MAX_PLAN_HEIGHT).contains(&height) {
        return Err(CollectionError::plan(format!(
            "plan height {height} outside 1..={MAX_PLAN_HEIGHT}"
        )));
    }
    let widest = order - 1;
    let mut count = widest;
    for _ in 1..height {
        count = grow(count, order)?;
    }
    Ok(count)
}

/// Entry count of a complete tree one level taller than one holding `count`.
fn grow(count: usize, order: usize) -> CollectionResult<usize> {
    count
        .checked_mul(order)
        .and_then(|count| count.checked_add(order - 1))
        .ok_or_else(|| CollectionError::plan(format!("plan size overflows for order {order}")))
}

/// Computes the plan that packs `count` entries at `order`.
pub(crate) fn prepare_plan(order: usize, count: usize) -> CollectionResult<PackPlan> {
    let mut capacity = order - 1;
    let mut subtree = 0;
    let mut height = 1;
    while capacity < count {
        subtree = capacity;
        capacity = grow(capacity, order)?;
        height += 1;
    }

    if capacity == count {
        return Ok(PackPlan::Build {
            order,
            height,
            full: true,
            repeat: 1,
            total: count,
        });
    }
    if height == 1 {
        return Ok(PackPlan::Build {
            order,
            height,
            full: false,
            repeat: 1,
            total: count,
        });
    }

    let root_order = 1 + count / (subtree + 1);
    if root_order < 2 {
        return Err(CollectionError::plan(format!(
            "root of {count} entries at order {order} would have a single child"
        )));
    }
    if root_order * subtree + root_order - 1 == count {
        let build = PackPlan::Build {
            order,
            height: height - 1,
            full: true,
            repeat: root_order,
            total: count,
        };
        return Ok(PackPlan::Assemble {
            order,
            height,
            total: count,
            items: vec![Arc::new(build)],
        });
    }

    let mut items = Vec::with_capacity(3);
    let mut remaining = count;
    if root_order > 2 {
        let repeat = root_order - 2;
        let total = repeat * subtree + repeat - 1;
        items.push(Arc::new(PackPlan::Build {
            order,
            height: height - 1,
            full: true,
            repeat,
            total,
        }));
        remaining -= total + 1;
    }
    // The last two subtrees share what is left, minus their separator.
    remaining -= 1;
    let half = remaining / 2;
    for part in [remaining - half, half] {
        if part > 0 {
            items.push(prepare_cached_plan(order, part)?);
        }
    }
    let total = items.iter().map(|item| item.total()).sum::<usize>() + items.len() - 1;
    Ok(PackPlan::Assemble {
        order,
        height,
        total,
        items,
    })
}

/// Checks that `plan` describes a valid tree when placed at `level`.
///
/// Level 0 is a root, which may hold fewer than `split_size` entries.
pub(crate) fn verify_plan(plan: &PackPlan, level: usize) -> CollectionResult<()> {
    match plan {
        PackPlan::Assemble {
            order,
            height,
            total,
            items,
        } => {
            if items.is_empty() {
                return Err(CollectionError::plan("assembly without items"));
            }
            let mut sum = 0;
            for item in items {
                if let PackPlan::Build { repeat, .. } = **item
                    && *order < repeat
                {
                    return Err(CollectionError::plan(format!(
                        "{repeat} repeated subtrees exceed order {order}"
                    )));
                }
                if item.height() + 1 != *height {
                    return Err(CollectionError::plan(format!(
                        "item of height {} under assembly of height {height}",
                        item.height()
                    )));
                }
                verify_plan(item, level + 1)?;
                sum += item.total();
            }
            if sum + items.len() - 1 != *total {
                return Err(CollectionError::plan(format!(
                    "assembly totals {} but declares {total}",
                    sum + items.len() - 1
                )));
            }
        }
        PackPlan::Build {
            order,
            height,
            full: true,
            repeat,
            total,
        } => {
            let count = calc_plan_count(*order, *height)?;
            if count * repeat + repeat - 1 != *total {
                return Err(CollectionError::plan(format!(
                    "full build of {repeat} x {count} declares {total}"
                )));
            }
        }
        PackPlan::Build {
            order,
            height,
            full: false,
            total,
            ..
        } => {
            if *height != 1 {
                return Err(CollectionError::plan(format!("partial build of height {height}")));
            }
            if *total >= order - 1 {
                return Err(CollectionError::plan(format!(
                    "partial leaf of {total} entries at order {order}"
                )));
            }
            if level > 0 && *total < split_size(*order) {
                return Err(CollectionError::plan(format!(
                    "underfull leaf of {total} entries at order {order}"
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Plan cache
// =============================================================================

#[derive(Default)]
struct PlanCache {
    plans: HashMap<(usize, usize), Arc<PackPlan>>,
}

impl PlanCache {
    fn get(&self, order: usize, count: usize) -> Option<Arc<PackPlan>> {
        self.plans.get(&(order, count)).cloned()
    }

    /// Retains `plan` if it is small enough and the cache is not yet full.
    fn admit(&mut self, order: usize, count: usize, plan: &Arc<PackPlan>) -> bool {
        let eligible = order < CACHE_MAX_ORDER && (order..=CACHE_MAX_ENTRIES).contains(&count);
        if !eligible || self.plans.len() >= CACHE_CAPACITY {
            return false;
        }
        self.plans.insert((order, count), Arc::clone(plan));
        if self.plans.len() == CACHE_CAPACITY {
            tracing::debug!(capacity = CACHE_CAPACITY, "pack plan cache full, no longer admitting plans");
        }
        true
    }
}

static PLAN_CACHE: LazyLock<Mutex<PlanCache>> = LazyLock::new(|| Mutex::new(PlanCache::default()));

/// Returns a verified plan, consulting the shared cache first.
pub(crate) fn prepare_cached_plan(order: usize, count: usize) -> CollectionResult<Arc<PackPlan>> {
    let cached = PLAN_CACHE.lock().get(order, count);
    if let Some(plan) = cached {
        tracing::trace!(order, count, "pack plan cache hit");
        return Ok(plan);
    }
    tracing::trace!(order, count, "pack plan cache miss");
    let plan = prepare_plan(order, count)?;
    verify_plan(&plan, 0)?;
    let plan = Arc::new(plan);
    PLAN_CACHE.lock().admit(order, count, &plan);
    Ok(plan)
}

// =============================================================================
// Packer
// =============================================================================

/// Streams sorted entries into nodes following a plan.
///
/// `stack[level]` is the node currently being filled at that level, leaves
/// at level 0. `level` is where the next entry goes: back to 0 after a
/// separator, up by one each time a node fills and is handed to its parent.
struct Packer<K, V, I> {
    order: usize,
    owner: OwnerToken,
    entries: I,
    consumed: usize,
    expected: usize,
    stack: Vec<Option<BTreeNode<K, V>>>,
    level: usize,
}

impl<K, V, I> Packer<K, V, I>
where
    I: Iterator<Item = (K, V)>,
{
    const fn new(order: usize, owner: OwnerToken, entries: I, expected: usize) -> Self {
        Self {
            order,
            owner,
            entries,
            consumed: 0,
            expected,
            stack: Vec::new(),
            level: 0,
        }
    }

    fn run(&mut self, plan: &PackPlan) -> CollectionResult<()> {
        match plan {
            PackPlan::Assemble { height, items, .. } => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.populate(1)?;
                    }
                    self.run(item)?;
                }
                self.flush(*height);
            }
            PackPlan::Build {
                height,
                repeat,
                total,
                ..
            } => {
                let per_subtree = (total + 1 - repeat) / repeat;
                for index in 0..*repeat {
                    if index > 0 {
                        self.populate(1)?;
                    }
                    self.populate(per_subtree)?;
                }
                self.flush(*height);
            }
        }
        Ok(())
    }

    fn populate(&mut self, count: usize) -> CollectionResult<()> {
        for _ in 0..count {
            let Some((key, value)) = self.entries.next() else {
                return Err(CollectionError::plan(format!(
                    "input ended after {} of {} entries",
                    self.consumed, self.expected
                )));
            };
            self.consumed += 1;
            let level = self.level;
            self.prepare(level).entries.push((key, Some(value)));
            if level > 0 {
                self.level = 0;
            } else if self.prepare(0).entries.len() == self.order - 1 {
                if let Some(leaf) = self.stack[0].take() {
                    self.add_node(1, ReferenceCounter::new(leaf));
                }
                self.level += 1;
            }
        }
        Ok(())
    }

    /// Hands every partially filled node below `height` to its parent.
    fn flush(&mut self, height: usize) {
        for level in 0..height {
            if let Some(node) = self.stack.get_mut(level).and_then(Option::take) {
                self.add_node(level + 1, ReferenceCounter::new(node));
            }
        }
        self.level = height;
    }

    fn add_node(&mut self, level: usize, node: Child<K, V>) {
        let widest = self.order - 1;
        let parent = self.prepare(level);
        parent.children.push(node);
        if parent.entries.len() == widest {
            if let Some(full) = self.stack[level].take() {
                self.add_node(level + 1, ReferenceCounter::new(full));
            }
            self.level += 1;
        }
    }

    fn prepare(&mut self, level: usize) -> &mut BTreeNode<K, V> {
        if self.stack.len() <= level {
            self.stack.resize_with(level + 1, || None);
        }
        let (order, owner) = (self.order, self.owner);
        self.stack[level].get_or_insert_with(|| {
            let children = if level > 0 {
                Vec::with_capacity(order)
            } else {
                Vec::new()
            };
            BTreeNode::new(owner, Vec::with_capacity(order - 1), children)
        })
    }

    /// The finished root, held as the only child of the node above it.
    fn finish(mut self) -> Option<Child<K, V>> {
        let top = self.stack.get_mut(self.level)?.take()?;
        top.children.into_iter().next()
    }
}

/// Packs `entries` following `plan`, requiring the stream to match it exactly.
fn pack_with_plan<K, V, I>(
    order: usize,
    owner: OwnerToken,
    plan: &PackPlan,
    entries: I,
) -> CollectionResult<Option<Child<K, V>>>
where
    I: Iterator<Item = (K, V)>,
{
    let mut packer = Packer::new(order, owner, entries, plan.total());
    packer.run(plan)?;
    if packer.entries.next().is_some() {
        return Err(CollectionError::plan(format!(
            "input continued past {} entries",
            packer.expected
        )));
    }
    Ok(packer.finish())
}

/// Builds a minimum-height tree from strictly increasing entries.
pub(super) fn pack<K, V, I>(order: usize, owner: OwnerToken, entries: I) -> CollectionResult<Option<Child<K, V>>>
where
    I: ExactSizeIterator<Item = (K, V)>,
{
    let count = entries.len();
    let plan = prepare_plan(order, count)?;
    verify_plan(&plan, 0)?;
    tracing::debug!(order, count, height = plan.height(), "packing b-tree");
    pack_with_plan(order, owner, &plan, entries)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn full_build(order: usize, height: usize, repeat: usize, total: usize) -> PackPlan {
        PackPlan::Build {
            order,
            height,
            full: true,
            repeat,
            total,
        }
    }

    fn depth(node: &BTreeNode<i32, i32>) -> usize {
        node.children.first().map_or(1, |child| 1 + depth(child))
    }

    #[rstest]
    #[case(3, 1, 2)]
    #[case(3, 2, 8)]
    #[case(5, 2, 24)]
    #[case(5, 3, 124)]
    #[case(33, 2, 1088)]
    fn test_calc_plan_count(#[case] order: usize, #[case] height: usize, #[case] expected: usize) {
        assert_eq!(calc_plan_count(order, height), Ok(expected));
    }

    #[rstest]
    #[case(5, 0)]
    #[case(5, 21)]
    #[case(100_000, 20)]
    fn test_calc_plan_count_rejects(#[case] order: usize, #[case] height: usize) {
        assert!(matches!(
            calc_plan_count(order, height),
            Err(CollectionError::PlanConsistency { .. })
        ));
    }

    #[rstest]
    fn test_prepare_plan_small_inputs_are_single_leaves() {
        assert_eq!(prepare_plan(5, 4), Ok(full_build(5, 1, 1, 4)));
        assert_eq!(
            prepare_plan(5, 3),
            Ok(PackPlan::Build {
                order: 5,
                height: 1,
                full: false,
                repeat: 1,
                total: 3,
            })
        );
        assert_eq!(prepare_plan(5, 0).map(|plan| plan.total()), Ok(0));
    }

    #[rstest]
    fn test_prepare_plan_exact_repeat() {
        // Three full leaves of four entries plus two separators.
        let expected = PackPlan::Assemble {
            order: 5,
            height: 2,
            total: 14,
            items: vec![Arc::new(full_build(5, 1, 3, 14))],
        };
        assert_eq!(prepare_plan(5, 14), Ok(expected));
    }

    #[rstest]
    fn test_prepare_plan_splits_remainder() {
        let plan = prepare_plan(5, 30).unwrap();
        let PackPlan::Assemble { height, total, items, .. } = &plan else {
            panic!("expected an assembly, got {plan:?}");
        };
        assert_eq!(*height, 3);
        assert_eq!(*total, 30);
        let totals: Vec<usize> = items.iter().map(|item| item.total()).collect();
        assert_eq!(totals, vec![15, 14]);
    }

    #[rstest]
    fn test_plans_verify_across_orders_and_sizes() {
        for order in 3..=50 {
            for count in 0..=5_000 {
                let plan = prepare_plan(order, count).unwrap();
                assert_eq!(plan.total(), count, "order {order}, count {count}");
                assert_eq!(verify_plan(&plan, 0), Ok(()), "order {order}, count {count}");
            }
        }
    }

    #[rstest]
    fn test_verify_rejects_oversized_partial_leaf() {
        let plan = PackPlan::Build {
            order: 5,
            height: 1,
            full: false,
            repeat: 1,
            total: 4,
        };
        assert!(verify_plan(&plan, 0).is_err());
    }

    #[rstest]
    fn test_verify_rejects_underfull_leaf_below_root() {
        let leaf = PackPlan::Build {
            order: 7,
            height: 1,
            full: false,
            repeat: 1,
            total: 1,
        };
        assert_eq!(verify_plan(&leaf, 0), Ok(()));
        assert!(verify_plan(&leaf, 1).is_err());
    }

    #[rstest]
    fn test_verify_rejects_wrong_totals() {
        assert!(verify_plan(&full_build(5, 1, 2, 8), 0).is_err());
        let assembly = PackPlan::Assemble {
            order: 5,
            height: 2,
            total: 10,
            items: vec![Arc::new(full_build(5, 1, 2, 9))],
        };
        assert!(verify_plan(&assembly, 0).is_err());
    }

    #[rstest]
    fn test_verify_rejects_height_mismatch() {
        let assembly = PackPlan::Assemble {
            order: 5,
            height: 3,
            total: 9,
            items: vec![Arc::new(full_build(5, 1, 2, 9))],
        };
        assert!(verify_plan(&assembly, 0).is_err());
    }

    #[rstest]
    fn test_cache_admission_rules() {
        let mut cache = PlanCache::default();
        let plan = Arc::new(full_build(5, 1, 1, 4));
        assert!(!cache.admit(5, 4, &plan));
        assert!(!cache.admit(5, 101, &plan));
        assert!(!cache.admit(100, 100, &plan));
        assert!(cache.admit(5, 50, &plan));
        assert!(cache.get(5, 50).is_some_and(|cached| Arc::ptr_eq(&cached, &plan)));
        assert!(cache.get(5, 51).is_none());
    }

    #[rstest]
    fn test_cache_stops_admitting_when_full() {
        let mut cache = PlanCache::default();
        let plan = Arc::new(full_build(3, 1, 1, 2));
        let mut admitted = 0;
        for order in 3..CACHE_MAX_ORDER {
            for count in order..=CACHE_MAX_ENTRIES {
                if cache.admit(order, count, &plan) {
                    admitted += 1;
                }
            }
        }
        assert_eq!(admitted, CACHE_CAPACITY);
        assert_eq!(cache.plans.len(), CACHE_CAPACITY);
    }

    #[rstest]
    fn test_cached_plan_matches_fresh_plan() {
        let cached = prepare_cached_plan(7, 60).unwrap();
        assert_eq!(*cached, prepare_plan(7, 60).unwrap());
    }

    #[rstest]
    #[case(5, 0, 0)]
    #[case(5, 3, 1)]
    #[case(5, 4, 1)]
    #[case(5, 24, 2)]
    #[case(5, 30, 3)]
    #[case(3, 100, 5)]
    fn test_pack_builds_expected_height(#[case] order: usize, #[case] count: i32, #[case] height: usize) {
        let owner = OwnerToken::mint();
        let root = pack(order, owner, (0..count).map(|key| (key, key))).unwrap();
        assert_eq!(root.as_deref().map_or(0, depth), height);
    }

    #[rstest]
    fn test_pack_fills_complete_tree() {
        let owner = OwnerToken::mint();
        let root = pack(5, owner, (0..24).map(|key| (key, key))).unwrap().unwrap();
        assert_eq!(root.entries.len(), 4);
        assert!(root.children.iter().all(|leaf| leaf.entries.len() == 4));
    }

    #[rstest]
    fn test_pack_rejects_short_input() {
        let owner = OwnerToken::mint();
        let plan = prepare_plan(5, 10).unwrap();
        let result = pack_with_plan(5, owner, &plan, (0..6).map(|key| (key, key)));
        assert!(matches!(result, Err(CollectionError::PlanConsistency { .. })));
    }

    #[rstest]
    fn test_pack_rejects_long_input() {
        let owner = OwnerToken::mint();
        let plan = prepare_plan(5, 10).unwrap();
        let result = pack_with_plan(5, owner, &plan, (0..11).map(|key| (key, key)));
        assert!(matches!(result, Err(CollectionError::PlanConsistency { .. })));
    }
}
