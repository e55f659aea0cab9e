//! Ownership tokens for in-place mutation batches.
//!
//! Every node remembers the token of the batch (or single write) that
//! created or last copied it. A write holding the same token may edit that
//! node in place, provided no other handle can still reach it; any other
//! write copies the node first and tags the copy with its own token.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use super::ReferenceCounter;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// An identity-only marker for one mutation batch.
///
/// Tokens come from a process-wide counter and are never reused, so two
/// tokens compare equal only if they were minted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OwnerToken(NonZeroU64);

impl OwnerToken {
    /// Mints a token distinct from every token minted before.
    pub(crate) fn mint() -> Self {
        let raw = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

/// What a single write did to a collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChangeFlags {
    /// The write changed a value or the structure.
    pub(crate) altered: bool,
    /// The write added or removed an entry.
    pub(crate) size_changed: bool,
}

impl ChangeFlags {
    pub(crate) const UNCHANGED: Self = Self {
        altered: false,
        size_changed: false,
    };

    pub(crate) const UPDATED: Self = Self {
        altered: true,
        size_changed: false,
    };

    pub(crate) const RESIZED: Self = Self {
        altered: true,
        size_changed: true,
    };
}

/// A node type that records the batch owning it.
pub(crate) trait Owned: Clone {
    fn owner(&self) -> OwnerToken;

    fn set_owner(&mut self, owner: OwnerToken);
}

/// Returns the node in `slot` ready for in-place editing under `owner`.
///
/// A node owned by another batch is shallow-copied first. A node owned by
/// this batch but shared with an older handle is copied as well.
pub(crate) fn make_editable<N: Owned>(slot: &mut ReferenceCounter<N>, owner: OwnerToken) -> &mut N {
    if slot.owner() != owner {
        let mut copy = N::clone(&**slot);
        copy.set_owner(owner);
        *slot = ReferenceCounter::new(copy);
    }
    ReferenceCounter::make_mut(slot)
}

/// Reports whether `slot` may be edited in place under `owner` without copying.
#[cfg(test)]
pub(crate) fn is_editable<N: Owned>(slot: &ReferenceCounter<N>, owner: OwnerToken) -> bool {
    slot.owner() == owner && ReferenceCounter::strong_count(slot) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Clone)]
    struct Cell {
        owner: OwnerToken,
        value: i32,
    }

    impl Owned for Cell {
        fn owner(&self) -> OwnerToken {
            self.owner
        }

        fn set_owner(&mut self, owner: OwnerToken) {
            self.owner = owner;
        }
    }

    #[rstest]
    fn test_minted_tokens_are_distinct() {
        let first = OwnerToken::mint();
        let second = OwnerToken::mint();
        assert_ne!(first, second);
        assert_eq!(first, first);
    }

    #[rstest]
    fn test_make_editable_copies_foreign_node() {
        let original = ReferenceCounter::new(Cell {
            owner: OwnerToken::mint(),
            value: 1,
        });
        let mut slot = original.clone();
        let batch = OwnerToken::mint();

        make_editable(&mut slot, batch).value = 2;

        assert_eq!(original.value, 1);
        assert_eq!(slot.value, 2);
        assert_eq!(slot.owner, batch);
        assert!(!ReferenceCounter::ptr_eq(&original, &slot));
    }

    #[rstest]
    fn test_make_editable_reuses_owned_unique_node() {
        let batch = OwnerToken::mint();
        let mut slot = ReferenceCounter::new(Cell {
            owner: batch,
            value: 1,
        });
        assert!(is_editable(&slot, batch));
        let before = ReferenceCounter::as_ptr(&slot);

        make_editable(&mut slot, batch).value = 5;

        assert_eq!(ReferenceCounter::as_ptr(&slot), before);
        assert_eq!(slot.value, 5);
    }

    #[rstest]
    fn test_make_editable_copies_shared_node_even_when_owned() {
        let batch = OwnerToken::mint();
        let snapshot = ReferenceCounter::new(Cell {
            owner: batch,
            value: 1,
        });
        let mut slot = snapshot.clone();
        assert!(!is_editable(&slot, batch));

        make_editable(&mut slot, batch).value = 9;

        assert_eq!(snapshot.value, 1);
        assert_eq!(slot.value, 9);
    }
}
