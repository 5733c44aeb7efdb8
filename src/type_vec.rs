//! `Type`: the sorted, immutable id list that identifies an archetype.
//!
//! Two tables have the same type iff they are the same table; that
//! invariant is enforced by the table map that keys on this sequence (kept
//! by callers of this crate, e.g. `IdRegistry` or a world layer), not here.
//! This module only guarantees the type itself is well-formed: sorted,
//! duplicate-free.

use smallvec::SmallVec;

use crate::error::{EcsError, Result};
use crate::id::Id;

/// Most archetypes carry a handful of ids; inline storage avoids a heap
/// allocation per table for the common case, the same tradeoff the teacher
/// makes for its own per-entity type-id lists in `component.rs`/`query.rs`.
type IdVec = SmallVec<[Id; 8]>;

/// A sorted, duplicate-free sequence of ids identifying an archetype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    ids: IdVec,
}

/// Boundaries discovered by scanning a `Type`, used to drive table-record
/// registration (see `table::init`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeScan {
    /// Index of the last plain (no flags, no pair) id, or `-1`.
    pub last_plain: i32,
    /// Index of the first pair id, or `-1`.
    pub first_pair: i32,
    /// Index of the first role-flagged non-pair id, or `-1`.
    pub first_role: i32,
}

impl Type {
    /// An empty type (the root archetype with no components).
    pub fn empty() -> Self {
        Type { ids: IdVec::new() }
    }

    /// Build a `Type` from an arbitrary id slice, sorting and validating
    /// that no id repeats. A repeated id is a caller bug (spec.md's
    /// `invalid_parameter` class), not an internal invariant violation, so
    /// it is reported rather than asserted.
    pub fn from_ids(ids: Vec<Id>) -> Result<Self> {
        let mut ids: IdVec = ids.into_iter().collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(EcsError::InvalidParameter("duplicate id in type".to_string()));
        }
        Ok(Type { ids })
    }

    /// Build a `Type` that is known to already be sorted and duplicate-free
    /// (e.g. produced by merging two already-valid types). Only use this
    /// when the caller can prove the invariant; prefer `from_ids`.
    pub fn from_sorted_unchecked(ids: Vec<Id>) -> Self {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        Type { ids: ids.into_iter().collect() }
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Index of `id` in the type, or `None`.
    pub fn index_of(&self, id: Id) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// A new type with `id` inserted (must not already be present).
    pub fn with_added(&self, id: Id) -> Self {
        debug_assert!(!self.contains(id));
        let mut ids = self.ids.clone();
        let pos = ids.binary_search(&id).unwrap_err();
        ids.insert(pos, id);
        Type { ids }
    }

    /// A new type with `id` removed (must be present).
    pub fn with_removed(&self, id: Id) -> Self {
        let mut ids = self.ids.clone();
        if let Ok(pos) = ids.binary_search(&id) {
            ids.remove(pos);
        }
        Type { ids }
    }

    /// Scan the type once to find the boundaries table init needs: last
    /// plain id, first pair, first role-flagged non-pair id. Grounded on
    /// `table.c`'s single scan loop in `flecs_table_init`.
    pub fn scan(&self) -> TypeScan {
        let mut scan = TypeScan {
            last_plain: -1,
            first_pair: -1,
            first_role: -1,
        };
        for (i, id) in self.ids.iter().enumerate() {
            let i = i as i32;
            if scan.first_pair == -1 && id.is_pair() {
                scan.first_pair = i;
            }
            if !id.is_pair() && !id.has_role() {
                scan.last_plain = i;
            } else if scan.first_role == -1 && !id.is_pair() {
                scan.first_role = i;
            }
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates() {
        let a = Id::plain(1);
        assert_eq!(
            Type::from_ids(vec![a, a]),
            Err(EcsError::InvalidParameter("duplicate id in type".to_string()))
        );
    }

    #[test]
    fn sorts_on_construction() {
        let t = Type::from_ids(vec![Id::plain(5), Id::plain(1), Id::plain(3)]).unwrap();
        assert_eq!(
            t.ids(),
            &[Id::plain(1), Id::plain(3), Id::plain(5)]
        );
    }

    #[test]
    fn scan_finds_boundaries() {
        let t = Type::from_ids(vec![
            Id::plain(1),
            Id::plain(2).with_toggle(),
            Id::pair(10, 20),
        ])
        .unwrap();
        let scan = t.scan();
        assert_eq!(scan.last_plain, 0);
        assert_eq!(scan.first_role, 1);
        assert_eq!(scan.first_pair, 2);
    }

    #[test]
    fn add_remove_roundtrip() {
        let t = Type::from_ids(vec![Id::plain(1), Id::plain(3)]).unwrap();
        let added = t.with_added(Id::plain(2));
        assert_eq!(
            added.ids(),
            &[Id::plain(1), Id::plain(2), Id::plain(3)]
        );
        let removed = added.with_removed(Id::plain(2));
        assert_eq!(removed, t);
    }
}
