//! The id-record cache: one record per distinct id that appears in at least
//! one table, plus the wildcard/role aggregates tables are registered under
//! so "find every table with `(Likes, *)`" or "find every table with a
//! `TOGGLE`-flagged id" is an index lookup rather than a linear scan.
//!
//! Grounded on `flecs_id_record_t` and the registration calls
//! `flecs_table_records_register` makes in table.c: every id in a table's
//! type gets its own record, and on top of that a non-wildcard pair also
//! registers against `(R, *)`, `(*, T)` and `(*, *)`; a role-flagged plain
//! id additionally registers against the synthetic `(Flag, base)` pair so a
//! single lookup answers "which tables have any toggle-tracked id" (see
//! the role-record decision in the grounding ledger).

use slotmap::SlotMap;

use crate::hooks::TypeInfo;
use crate::id::{well_known, Id};
use crate::table::TableId;

/// Minimal bitflags-style macro, mirroring the hand-rolled flags the teacher
/// uses for archetype/component flags rather than pulling in the `bitflags`
/// crate for four bits.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name($ty);

        impl $name {
            $(pub const $variant: $name = $name($value);)*
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl $name {
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }
    };
}

slotmap::new_key_type! {
    pub struct IdRecordId;
}

bitflags_lite! {
    /// Flags describing how an id-record participates in wildcard lookups.
    pub struct IdRecordFlags: u32 {
        const NONE = 0;
        const IS_WILDCARD = 1 << 0;
        const IS_PAIR = 1 << 1;
        const IS_ROLE_RECORD = 1 << 2;
    }
}

/// A table and the type-index at which an id appears in it, as seen from an
/// id-record's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCacheEntry {
    pub table: TableId,
    pub type_index: u32,
}

/// One entry in the id-record cache.
pub struct IdRecord {
    pub id: Id,
    pub flags: IdRecordFlags,
    /// Present for component ids; `None` for tags and pure relationship
    /// markers.
    pub type_info: Option<TypeInfo>,
    /// Every table that currently has this id in its type.
    tables: Vec<TableCacheEntry>,
    /// Outstanding claims held by table-records that reference this entry:
    /// one claimed per `add_table`, released per `remove_table`. Kept
    /// distinct from `tables.len()` rather than derived from it, since a
    /// claim is what keeps the record alive — tracking it separately is
    /// what lets `IdRegistry::remove_table` decide, without guessing,
    /// whether this was the release that should free the record.
    ref_count: u32,
}

impl IdRecord {
    fn new(id: Id, flags: IdRecordFlags) -> Self {
        IdRecord {
            id,
            flags,
            type_info: None,
            tables: Vec::new(),
            ref_count: 0,
        }
    }

    pub fn tables(&self) -> &[TableCacheEntry] {
        &self.tables
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    fn add_table(&mut self, table: TableId, type_index: u32) {
        self.tables.push(TableCacheEntry { table, type_index });
        self.claim();
    }

    /// Detach `table` and release the claim it held. Returns `true` once
    /// this was the last claim and no table references the record anymore
    /// — the caller (`IdRegistry::remove_table`) is then responsible for
    /// actually dropping the record.
    fn remove_table(&mut self, table: TableId) -> bool {
        let before = self.tables.len();
        self.tables.retain(|e| e.table != table);
        let removed = before - self.tables.len();
        debug_assert!(removed <= 1, "table registered against an id-record more than once");
        if removed > 0 {
            self.release();
        }
        self.ref_count == 0 && self.tables.is_empty()
    }

    fn claim(&mut self) {
        self.ref_count += 1;
    }

    fn release(&mut self) {
        debug_assert!(self.ref_count > 0, "released an id-record with no outstanding claims");
        self.ref_count = self.ref_count.saturating_sub(1);
    }
}

/// Interns id-records and keeps the wildcard/role aggregates in sync as
/// tables register and unregister.
#[derive(Default)]
pub struct IdRegistry {
    records: SlotMap<IdRecordId, IdRecord>,
    index: rustc_hash::FxHashMap<Id, IdRecordId>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Id) -> Option<IdRecordId> {
        self.index.get(&id).copied()
    }

    pub fn record(&self, handle: IdRecordId) -> &IdRecord {
        &self.records[handle]
    }

    pub fn record_mut(&mut self, handle: IdRecordId) -> &mut IdRecord {
        &mut self.records[handle]
    }

    /// Get or create the record for `id` itself (no wildcard expansion).
    pub fn ensure(&mut self, id: Id) -> IdRecordId {
        if let Some(&h) = self.index.get(&id) {
            return h;
        }
        let mut flags = IdRecordFlags::NONE;
        if id.is_pair() {
            flags |= IdRecordFlags::IS_PAIR;
        }
        let h = self.records.insert(IdRecord::new(id, flags));
        self.index.insert(id, h);
        h
    }

    /// Get or create the record, and if `id` is a pair or role-flagged,
    /// also ensure the wildcard/role aggregate records it participates in.
    /// Returns the handles touched, in the order a table registers against
    /// them: the id itself, then wildcards from most to least specific,
    /// matching `flecs_table_records_register`'s registration order.
    pub fn ensure_with_wildcards(&mut self, id: Id) -> Vec<IdRecordId> {
        let mut handles = vec![self.ensure(id)];

        if id.is_pair() {
            let first = id.first();
            let second = id.second();
            let rel_wildcard = Id::pair(first, well_known::WILDCARD as u32);
            let tgt_wildcard = Id::pair(well_known::WILDCARD as u32, second);
            let any_pair = Id::pair(well_known::WILDCARD as u32, well_known::WILDCARD as u32);
            for wc in [rel_wildcard, tgt_wildcard, any_pair] {
                if wc != id {
                    let h = self.ensure(wc);
                    self.records[h].flags |= IdRecordFlags::IS_WILDCARD | IdRecordFlags::IS_PAIR;
                    handles.push(h);
                }
            }
        } else if id.has_role() {
            // Non-pair, role-flagged id: also register a synthetic
            // (Flag, base) pair so "any toggle/override id" is one lookup.
            let base = id.stripped();
            let flag_pair = Id::pair(well_known::FLAG as u32, base.raw() as u32);
            let h = self.ensure(flag_pair);
            self.records[h].flags |= IdRecordFlags::IS_ROLE_RECORD | IdRecordFlags::IS_PAIR;
            handles.push(h);
        }

        handles
    }

    /// Attach `table` directly to the record `handle` points at, with no
    /// wildcard/role cascade, claiming a reference that the matching
    /// `remove_table` call releases. Used by callers (e.g. `table::init`)
    /// that build the full wildcard-expansion record list themselves and
    /// just need each individual `(id, table)` pair wired into its own
    /// cache.
    pub fn add_table(&mut self, handle: IdRecordId, table: TableId, type_index: u32) {
        self.records[handle].add_table(table, type_index);
    }

    /// Inverse of `add_table`: detach `table` from the single record
    /// `handle` points at and release the claim it held. Once that was the
    /// last claim and no table references the record anymore, the record
    /// (and its `index` entry) are dropped outright — the last release
    /// frees the id-record.
    pub fn remove_table(&mut self, handle: IdRecordId, table: TableId) {
        let (should_free, id) = {
            let record = &mut self.records[handle];
            (record.remove_table(table), record.id)
        };
        if should_free {
            self.index.remove(&id);
            self.records.remove(handle);
        }
    }

    /// Mark a record's flags, e.g. after `ensure`-ing a wildcard/role
    /// aggregate record that didn't previously exist.
    pub fn mark_flags(&mut self, handle: IdRecordId, flags: IdRecordFlags) {
        self.records[handle].flags |= flags;
    }

    /// Register `table` as containing `id` at `type_index`, expanding into
    /// the relevant wildcard/role records. This is the cascading
    /// convenience path for simple callers; `table::init` instead builds
    /// the explicit record list itself and calls `add_table` per record so
    /// every registration has a matching `TableRecord` the table can later
    /// use to unregister precisely.
    pub fn register_table(&mut self, id: Id, table: TableId, type_index: u32) {
        let handles = self.ensure_with_wildcards(id);
        for h in handles {
            self.add_table(h, table, type_index);
        }
    }

    /// Remove `table` from every record tracking `id` (id itself and its
    /// wildcard/role aggregates).
    pub fn unregister_table(&mut self, id: Id, table: TableId) {
        let handles = self.ensure_with_wildcards(id);
        for h in handles {
            self.remove_table(h, table);
        }
    }

    /// The `(ChildOf, target)` pair for `target`, or the synthetic
    /// `(ChildOf, 0)` root marker when `target` is the root sentinel.
    pub fn child_of(&mut self, target: u32) -> IdRecordId {
        self.ensure(Id::pair(well_known::CHILD_OF as u32, target))
    }
}
