//! Table identity: the type, id-record registration, column layout, and the
//! lifecycle/accessor surface built on top of `table_data::TableData`.
//!
//! Grounded on `table.c`: `flecs_table_init`'s single scan over the type to
//! build column/bitset maps and register id-records (including the
//! `(R, *)`/`(*, T)`/`(*, *)` wildcard expansion and the role-record
//! decision recorded in the grounding ledger), and the four destruction
//! variants `ecs_table_clear_data`/`_clear_entities`/`_delete_entities`/
//! `_free`, distinguished here by which of dtor-notification and
//! entity-index update each one performs.

use slotmap::SlotMap;

use crate::bitset_column::BitsetColumn;
use crate::column::Column;
use crate::entity_index::EntityIndex;
use crate::external::Observer;
use crate::hooks::TypeInfo;
use crate::id::{well_known, EntityId, Id};
use crate::id_record::{IdRecordFlags, IdRegistry};
use crate::scratch::Scratch;
use crate::table_data::TableData;
use crate::table_record::TableRecord;
use crate::type_vec::Type;

slotmap::new_key_type! {
    pub struct TableId;
}

/// Type-index sentinel used for the synthetic `(ChildOf, 0)` root marker a
/// table registers against when its own type has no real `ChildOf` pair:
/// it is not a real slot in the table's type, just a cleanup/grouping hook.
const SYNTHETIC_TYPE_INDEX: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFlags(u32);

impl TableFlags {
    pub const NONE: TableFlags = TableFlags(0);
    pub const HAS_TOGGLE: TableFlags = TableFlags(1 << 0);
    pub const HAS_PAIRS: TableFlags = TableFlags(1 << 1);
    pub const HAS_IS_A: TableFlags = TableFlags(1 << 2);
    pub const IS_COMPLEX: TableFlags = TableFlags(1 << 3);
    pub const HAS_CHILD_OF: TableFlags = TableFlags(1 << 4);
    pub const HAS_TRAVERSABLE: TableFlags = TableFlags(1 << 5);

    pub fn contains(self, other: TableFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TableFlags {
    type Output = TableFlags;
    fn bitor(self, rhs: TableFlags) -> TableFlags {
        TableFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TableFlags {
    fn bitor_assign(&mut self, rhs: TableFlags) {
        self.0 |= rhs.0;
    }
}

pub struct Table {
    pub id: TableId,
    ty: Type,
    pub data: TableData,
    records: Vec<TableRecord>,
    /// `type_index -> column index`, `-1` for tags/ids with no storage.
    column_map: Vec<i32>,
    /// `type_index -> bitset column index`, `-1` for non-toggle ids.
    bitset_map: Vec<i32>,
    /// `column index -> type_index`, the inverse of `column_map`.
    column_to_type: Vec<u32>,
    flags: TableFlags,
    /// Count of entities in other tables that reference a row of this table
    /// as the target of a traversable relationship. `HAS_TRAVERSABLE` is
    /// kept in lockstep: set iff this is greater than zero.
    traversable_count: i32,
}

impl Table {
    /// Build a table for `ty`. `type_info_of` supplies the component layout
    /// and hooks for ids that carry data; ids it returns `None` for are
    /// treated as tags (no storage). Registers the table and every id it
    /// contains with `registry`, plus the wildcard/role/global aggregates
    /// described in the data model's table-record section: one `(R, *)`
    /// per distinct relationship, one `(*, T)` per pair (duplicates
    /// allowed), one `(Flag, base)` per role-flagged non-pair id, the
    /// global `*`/`_` markers every table registers under, `(*, *)` when
    /// the table has any pairs, and the synthetic `(ChildOf, 0)` root
    /// marker when no real `ChildOf` pair is present. Every record this
    /// produces is explicit in `records()`, in this same order, so `free`
    /// can unregister each one directly without re-deriving the expansion.
    pub fn init(
        id: TableId,
        ty: Type,
        type_info_of: impl Fn(Id) -> Option<TypeInfo>,
        registry: &mut IdRegistry,
        scratch: &mut Scratch,
        observer: &mut dyn Observer,
    ) -> Table {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("table_init", type_len = ty.len()).entered();

        let mut columns = Vec::new();
        let mut bitset_columns = Vec::new();
        let mut column_map = vec![-1i32; ty.len()];
        let mut bitset_map = vec![-1i32; ty.len()];
        let mut column_to_type = Vec::new();
        let mut flags = TableFlags::NONE;

        // Scratch-backed destination for the record-init walk: sized to the
        // upper bound from the data model (`first_pair + 3 * (count -
        // first_pair) + 3 + 1`) so the append loop below can never
        // reallocate mid-registration. Reused and `reset()` between
        // `init` calls rather than freed, per the allocator discipline in
        // the design notes.
        let scan = ty.scan();
        let first_pair = if scan.first_pair >= 0 {
            scan.first_pair as usize
        } else {
            ty.len()
        };
        let record_cap = first_pair + 3 * (ty.len() - first_pair) + 3 + 1;

        // Confined to its own block: the bump `Vec` borrows `*scratch`
        // shared for as long as it's alive, and that borrow has to end
        // before `scratch.reset()` below can take `&mut *scratch`. The
        // block's tail expression copies into an owned `Vec`, and the bump
        // `Vec` is dropped at the closing brace, before `reset()` runs.
        let records: Vec<TableRecord> = {
            let mut records = bumpalo::collections::Vec::with_capacity_in(record_cap, scratch.arena());

            // 1. One record per id actually in the type.
            for (type_index, &item) in ty.ids().iter().enumerate() {
                let info = type_info_of(item);
                let column_index = info.map(|info| {
                    columns.push(Column::new(item, info));
                    column_to_type.push(type_index as u32);
                    if info.hooks.has_ctor_or_on_add() || info.hooks.has_dtor_or_on_remove() {
                        flags |= TableFlags::IS_COMPLEX;
                    }
                    (columns.len() - 1) as u32
                });
                if let Some(c) = column_index {
                    column_map[type_index] = c as i32;
                }

                let bitset_index = if item.has_toggle() {
                    flags |= TableFlags::HAS_TOGGLE;
                    bitset_columns.push(BitsetColumn::new(item));
                    Some((bitset_columns.len() - 1) as u32)
                } else {
                    None
                };
                if let Some(b) = bitset_index {
                    bitset_map[type_index] = b as i32;
                }

                if item.is_pair() {
                    flags |= TableFlags::HAS_PAIRS;
                    if item.first() == well_known::IS_A as u32 {
                        flags |= TableFlags::HAS_IS_A;
                    }
                    if item.first() == well_known::CHILD_OF as u32 {
                        flags |= TableFlags::HAS_CHILD_OF;
                    }
                }

                let id_record = registry.ensure(item);
                registry.add_table(id_record, id, type_index as u32);
                records.push(TableRecord::new(item, id_record, type_index as u32, column_index));
            }

            // 2. Role-expansion records: a role-flagged non-pair id also
            // registers a synthetic (Flag, base) pair (pairs themselves never
            // carry a role flag, see the grounding ledger's role-record
            // decision).
            for (type_index, &item) in ty.ids().iter().enumerate() {
                if item.has_role() {
                    let flag_pair = Id::pair(well_known::FLAG as u32, item.stripped().raw() as u32);
                    let h = registry.ensure(flag_pair);
                    registry.mark_flags(h, IdRecordFlags::IS_ROLE_RECORD | IdRecordFlags::IS_PAIR);
                    registry.add_table(h, id, type_index as u32);
                    records.push(TableRecord::new(flag_pair, h, type_index as u32, None));
                }
            }

            if flags.contains(TableFlags::HAS_PAIRS) {
                // 3. One (R, *) per distinct relationship, in first-occurrence
                // order.
                let mut seen_relationships: Vec<u32> = Vec::new();
                for (type_index, &item) in ty.ids().iter().enumerate() {
                    if item.is_pair() && !seen_relationships.contains(&item.first()) {
                        seen_relationships.push(item.first());
                        let rel_wc = Id::pair(item.first(), well_known::WILDCARD as u32);
                        let h = registry.ensure(rel_wc);
                        registry.mark_flags(h, IdRecordFlags::IS_WILDCARD | IdRecordFlags::IS_PAIR);
                        registry.add_table(h, id, type_index as u32);
                        records.push(TableRecord::new(rel_wc, h, type_index as u32, None));
                    }
                }

                // 4. One (*, T) per pair in type order; duplicates allowed
                // since several pairs may share a target.
                for (type_index, &item) in ty.ids().iter().enumerate() {
                    if item.is_pair() {
                        let tgt_wc = Id::pair(well_known::WILDCARD as u32, item.second());
                        let h = registry.ensure(tgt_wc);
                        registry.mark_flags(h, IdRecordFlags::IS_WILDCARD | IdRecordFlags::IS_PAIR);
                        registry.add_table(h, id, type_index as u32);
                        records.push(TableRecord::new(tgt_wc, h, type_index as u32, None));
                    }
                }

                // 5b. (*, *), the any-pair aggregate.
                let any_pair = Id::pair(well_known::WILDCARD as u32, well_known::WILDCARD as u32);
                let h = registry.ensure(any_pair);
                registry.mark_flags(h, IdRecordFlags::IS_WILDCARD | IdRecordFlags::IS_PAIR);
                registry.add_table(h, id, SYNTHETIC_TYPE_INDEX);
                records.push(TableRecord::new(any_pair, h, SYNTHETIC_TYPE_INDEX, None));
            }

            // 5a. The global `*`/`_` markers every table registers under,
            // regardless of whether it has pairs, so "match anything" queries
            // are an id-record lookup rather than a linear scan of all tables.
            for wc_id in [
                Id::plain(well_known::WILDCARD),
                Id::plain(well_known::ANY),
            ] {
                let h = registry.ensure(wc_id);
                registry.mark_flags(h, IdRecordFlags::IS_WILDCARD);
                registry.add_table(h, id, SYNTHETIC_TYPE_INDEX);
                records.push(TableRecord::new(wc_id, h, SYNTHETIC_TYPE_INDEX, None));
            }

            // 6. Synthetic (ChildOf, 0) root marker, only when no real ChildOf
            // pair is already present (O(1) root-scope lookup).
            if !flags.contains(TableFlags::HAS_CHILD_OF) {
                let root_child_of = Id::pair(well_known::CHILD_OF as u32, well_known::ROOT as u32);
                let h = registry.ensure(root_child_of);
                registry.mark_flags(h, IdRecordFlags::IS_PAIR);
                registry.add_table(h, id, SYNTHETIC_TYPE_INDEX);
                records.push(TableRecord::new(root_child_of, h, SYNTHETIC_TYPE_INDEX, None));
            }

            records.iter().copied().collect()
        };
        scratch.reset();

        let table = Table {
            id,
            ty,
            data: TableData::new(columns, bitset_columns),
            records,
            column_map,
            bitset_map,
            column_to_type,
            flags,
            traversable_count: 0,
        };

        observer.on_table_lifecycle(id, true);
        table
    }

    // -- accessors --------------------------------------------------------

    pub fn get_type(&self) -> &Type {
        &self.ty
    }

    pub fn get_type_index(&self, id: Id) -> Option<usize> {
        self.ty.index_of(id)
    }

    pub fn get_column_index(&self, type_index: usize) -> Option<usize> {
        match self.column_map.get(type_index) {
            Some(&c) if c >= 0 => Some(c as usize),
            _ => None,
        }
    }

    pub fn get_bitset_index(&self, type_index: usize) -> Option<usize> {
        match self.bitset_map.get(type_index) {
            Some(&b) if b >= 0 => Some(b as usize),
            _ => None,
        }
    }

    pub fn column_count(&self) -> usize {
        self.data.columns.len()
    }

    pub fn type_to_column_index(&self, id: Id) -> Option<usize> {
        self.get_type_index(id).and_then(|t| self.get_column_index(t))
    }

    pub fn column_to_type_index(&self, column: usize) -> Option<usize> {
        self.column_to_type.get(column).map(|&t| t as usize)
    }

    pub fn get_column(&self, column_index: usize) -> &Column {
        &self.data.columns[column_index]
    }

    pub fn get_column_mut(&mut self, column_index: usize) -> &mut Column {
        &mut self.data.columns[column_index]
    }

    pub fn get_id(&self, type_index: usize) -> Id {
        self.ty.ids()[type_index]
    }

    pub fn get_column_size(&self, column_index: usize) -> usize {
        self.data.columns[column_index].size
    }

    pub fn count(&self) -> usize {
        self.data.count()
    }

    pub fn has_id(&self, id: Id) -> bool {
        self.ty.contains(id)
    }

    pub fn has_flags(&self, flags: TableFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub fn traversable_count(&self) -> i32 {
        self.traversable_count
    }

    /// Add `delta` (positive or negative) to the traversable count, keeping
    /// `HAS_TRAVERSABLE` in sync. Never drives the count negative.
    pub fn adjust_traversable_count(&mut self, delta: i32) {
        self.traversable_count += delta;
        debug_assert!(self.traversable_count >= 0, "traversable_count went negative");
        if self.traversable_count > 0 {
            self.flags |= TableFlags::HAS_TRAVERSABLE;
        } else {
            self.flags.0 &= !TableFlags::HAS_TRAVERSABLE.0;
        }
    }

    /// Number of `(ChildOf, target)`-style ancestor links this table's own
    /// type carries directly for relationship `rel`. This is a direct,
    /// single-table count, not a transitive hierarchy walk: computing true
    /// depth across tables is the graph/query layer's job, out of scope
    /// here.
    pub fn get_depth(&self, rel: EntityId) -> u32 {
        self.ty
            .ids()
            .iter()
            .filter(|id| id.is_pair() && id.first() == rel as u32)
            .count() as u32
    }

    // -- row ops (delegated, with table-level bookkeeping) -----------------

    pub fn lock(&mut self) {
        self.data.lock();
    }

    pub fn unlock(&mut self) {
        self.data.unlock();
    }

    pub fn is_locked(&self) -> bool {
        self.data.is_locked()
    }

    pub fn mark_dirty(&mut self, column: Option<usize>) {
        self.data.mark_dirty(column);
    }

    pub fn dirty_count(&self, column: Option<usize>) -> i32 {
        self.data.dirty_count(column)
    }

    pub fn notify(&self, observer: &mut dyn Observer, id: Id, row: u32, count: u32, is_add: bool) {
        observer.emit(self.id, id, row, count, is_add);
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.data.swap_rows(a, b);
    }

    /// Append one row, firing the empty→non-empty transition notification
    /// when this is the table's first row.
    pub fn append(&mut self, entity: EntityId, construct: bool, on_add: bool, observer: &mut dyn Observer) -> u32 {
        let was_empty = self.data.is_empty();
        let row = self.data.append(entity, construct, on_add);
        if was_empty {
            observer.table_set_empty(self.id, false);
        }
        row
    }

    /// Remove `row`, firing the non-empty→empty transition notification
    /// when the table becomes empty as a result.
    pub fn delete(&mut self, row: usize, destruct: bool, observer: &mut dyn Observer) -> Option<EntityId> {
        let moved = self.data.delete(row, destruct);
        if self.data.is_empty() {
            observer.table_set_empty(self.id, true);
        }
        moved
    }

    /// Relocate one row from `src` to `dst`, delegating to
    /// `table_data::move_row` and flipping either table's empty/non-empty
    /// notification as its row count crosses that boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn move_row(
        dst: &mut Table,
        col_map: &[crate::table_data::ColumnMove],
        bitset_map: &[Option<usize>],
        src: &mut Table,
        src_row: usize,
        same_entity: bool,
        construct: bool,
        observer: &mut dyn Observer,
    ) -> (u32, Option<EntityId>) {
        let dst_was_empty = dst.data.is_empty();
        let src_was_empty = src.data.is_empty();

        let result = TableData::move_row(&mut dst.data, col_map, bitset_map, &mut src.data, src_row, same_entity, construct);

        if dst_was_empty && !dst.data.is_empty() {
            observer.table_set_empty(dst.id, false);
        }
        if same_entity && !src_was_empty && src.data.is_empty() {
            observer.table_set_empty(src.id, true);
        }
        result
    }

    /// Bulk-merge `src`'s rows into `dst`, delegating the column/bitset
    /// relocation to `table_data::merge` and additionally: transferring
    /// `traversable_count` from `src` to `dst` (spec'd merge step 4, zeroing
    /// `src`'s count and flag), and flipping either table's empty/non-empty
    /// notification as its row count crosses that boundary.
    pub fn merge(
        dst: &mut Table,
        src: &mut Table,
        col_map: &[crate::table_data::ColumnMove],
        bitset_map: &[Option<usize>],
        observer: &mut dyn Observer,
    ) {
        let dst_was_empty = dst.data.is_empty();
        let src_was_empty = src.data.is_empty();

        TableData::merge(&mut dst.data, col_map, bitset_map, &mut src.data);

        dst.adjust_traversable_count(src.traversable_count);
        src.traversable_count = 0;
        src.flags.0 &= !TableFlags::HAS_TRAVERSABLE.0;

        if dst_was_empty && !dst.data.is_empty() {
            observer.table_set_empty(dst.id, false);
        }
        if !src_was_empty && src.data.is_empty() {
            observer.table_set_empty(src.id, true);
        }
    }

    // -- destruction modes --------------------------------------------------

    /// Release every column's memory by running destructors, without
    /// notifying observers and without touching the entity index. The
    /// table remains registered and reusable (e.g. before re-populating it
    /// in bulk). The table is locked for the duration so a destructor or
    /// hook can't reenter and mutate the very row data being torn down.
    pub fn clear_data(&mut self) {
        self.data.lock();
        for col in &mut self.data.columns {
            col.destruct_all_and_clear();
        }
        for bc in &mut self.data.bitset_columns {
            bc.clear();
        }
        self.data.entities.clear();
        self.data.unlock();
        self.mark_dirty(None);
    }

    /// Shared body for `clear_entities`/`delete_entities`: emit an
    /// `on_remove` notification for every column id, run the destructors
    /// under `clear_data`'s lock, then update the entity index for every
    /// entity that was in the table. The index update runs after the
    /// destructors so an `on_remove` hook can still look up peer entities
    /// by their old location. `is_delete` selects how: `false` nulls each
    /// entity's record (still alive, just relocated by the caller next),
    /// `true` removes it outright (the entity is being destroyed).
    fn destruct_rows(&mut self, index: &mut dyn EntityIndex, observer: &mut dyn Observer, is_delete: bool) {
        let count = self.data.count() as u32;
        if count > 0 {
            for record in &self.records {
                if record.column.is_some() {
                    observer.emit(self.id, record.id, 0, count, false);
                }
            }
        }
        let entities: Vec<EntityId> = self.data.entities.clone();
        self.clear_data();
        for entity in entities {
            if is_delete {
                index.remove(entity);
            } else {
                index.null(entity);
            }
        }
        if count > 0 {
            observer.table_set_empty(self.id, true);
        }
    }

    /// Empties the table in place: every entity that was in it is still
    /// alive but has no current location until the caller relocates it.
    pub fn clear_entities(&mut self, index: &mut dyn EntityIndex, observer: &mut dyn Observer) {
        self.destruct_rows(index, observer, false);
    }

    /// Like `clear_entities`, but the entities are being destroyed outright
    /// rather than relocated, so they're removed from `index` instead of
    /// nulled.
    pub fn delete_entities(&mut self, index: &mut dyn EntityIndex, observer: &mut dyn Observer) {
        self.destruct_rows(index, observer, true);
    }

    /// Reset table bookkeeping (lock count, dirty counters) without
    /// touching row data. Used when a table is returned to a pool for
    /// reuse rather than freed.
    pub fn reset(&mut self) {
        while self.data.is_locked() {
            self.data.unlock();
        }
    }

    /// Tear the table down for good: release data, unregister every id
    /// (including wildcard/role aggregates and the synthetic `ChildOf`
    /// marker) from `registry`, and let `observer` drop any graph edges
    /// that pointed at this table. `quitting` suppresses the
    /// `OnTableDelete` notification: when the whole world is tearing down,
    /// nothing downstream is left to care about individual table lifetime.
    pub fn free(
        mut self,
        registry: &mut IdRegistry,
        index: &mut dyn EntityIndex,
        observer: &mut dyn Observer,
        quitting: bool,
    ) {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("table_free", table_count = self.count()).entered();

        if !quitting {
            observer.on_table_lifecycle(self.id, false);
        }
        // No `on_remove` (the table is going away, not shedding components)
        // and no "became empty" notification (nothing is left to observe
        // it), but the entity index still needs every one of these entities
        // gone for good — unlike `clear_entities`, they aren't coming back.
        // Index update runs after the destructors, same ordering as the
        // other destruction modes.
        let entities: Vec<EntityId> = self.data.entities.clone();
        self.clear_data();
        for entity in entities {
            index.remove(entity);
        }
        // `records` already enumerates every id-record this table touched,
        // own ids and every wildcard/role/global aggregate alike, so
        // unregistering is a direct per-record detach with no cascade to
        // re-derive.
        for record in &self.records {
            registry.remove_table(record.id_record, self.id);
        }
        observer.clear_edges(self.id);
    }
}

/// Owns every live table and the id-record cache they register against.
/// The table-graph traversal that decides *which* destination table an
/// add/remove of a single id leads to is a world/query-layer concern;
/// this store only creates, looks up and frees tables, and performs the
/// already-resolved cross-table moves `table_data::move_row` needs two
/// disjoint `&mut Table`s for.
#[derive(Default)]
pub struct TableStore {
    tables: SlotMap<TableId, Table>,
    registry: IdRegistry,
    scratch: Scratch,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IdRegistry {
        &mut self.registry
    }

    pub fn create_table(
        &mut self,
        ty: Type,
        type_info_of: impl Fn(Id) -> Option<TypeInfo>,
        observer: &mut dyn Observer,
    ) -> TableId {
        let registry = &mut self.registry;
        let scratch = &mut self.scratch;
        self.tables
            .insert_with_key(|id| Table::init(id, ty, type_info_of, registry, scratch, observer))
    }

    pub fn get(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn get_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id)
    }

    /// Borrow two distinct tables mutably at once, needed for
    /// `table_data::move_row`/`merge`. Returns `None` if `a == b` (callers
    /// never move a table into itself) or either id is stale.
    pub fn get_disjoint_mut(&mut self, a: TableId, b: TableId) -> Option<[&mut Table; 2]> {
        if a == b {
            return None;
        }
        self.tables.get_disjoint_mut([a, b])
    }

    /// `quitting` is forwarded to `Table::free` to suppress `OnTableDelete`
    /// when the whole store is being torn down at once.
    pub fn free_table(
        &mut self,
        id: TableId,
        index: &mut dyn EntityIndex,
        observer: &mut dyn Observer,
        quitting: bool,
    ) {
        if let Some(table) = self.tables.remove(id) {
            table.free(&mut self.registry, index, observer, quitting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ComponentHooks;
    use crate::table_data::ColumnMove;

    fn info(size: usize) -> TypeInfo {
        TypeInfo::new(size, 4, ComponentHooks::none())
    }

    #[test]
    fn init_builds_column_and_bitset_maps() {
        let mut registry = IdRegistry::new();
        let toggled = Id::plain(2).with_toggle();
        let ty = Type::from_ids(vec![Id::plain(1), toggled]).unwrap();

        let mut scratch = Scratch::new();
        let mut observer = crate::external::NullObserver;
        let table = Table::init(
            TableId::default(),
            ty,
            |id| if id.stripped() == Id::plain(1) { Some(info(4)) } else { None },
            &mut registry,
            &mut scratch,
            &mut observer,
        );

        assert_eq!(table.column_count(), 1);
        assert!(table.has_flags(TableFlags::HAS_TOGGLE));
        assert_eq!(table.get_column_index(0), Some(0));
        assert_eq!(table.get_bitset_index(1), Some(0));
    }

    #[test]
    fn store_creates_and_frees_tables() {
        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);
        assert!(store.get(id).is_some());

        let mut index = crate::entity_index::HashEntityIndex::new();
        store.free_table(id, &mut index, &mut observer, false);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn move_row_between_disjoint_tables() {
        let mut store = TableStore::new();
        let ty_a = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let ty_b = Type::from_ids(vec![Id::plain(1), Id::plain(2)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let a = store.create_table(ty_a, |_| Some(info(4)), &mut observer);
        let b = store.create_table(ty_b, |_| Some(info(4)), &mut observer);

        store.get_mut(a).unwrap().data.append(42, true, false);

        let [table_a, table_b] = store.get_disjoint_mut(a, b).unwrap();
        let col_map = [ColumnMove::Shared(0), ColumnMove::New];
        let (row, moved) = crate::table_data::TableData::move_row(
            &mut table_b.data,
            &col_map,
            &[],
            &mut table_a.data,
            0,
            true,
            true,
        );
        assert_eq!(row, 0);
        assert_eq!(moved, None);
        assert_eq!(table_b.count(), 1);
        assert_eq!(table_a.count(), 0);
    }

    #[test]
    fn init_registers_wildcard_and_role_records() {
        let mut registry = IdRegistry::new();
        let a = Id::plain(100);
        let likes_bob = Id::pair(10, 20);
        let likes_alice = Id::pair(10, 21);
        let child_of_root = Id::pair(well_known::CHILD_OF as u32, well_known::ROOT as u32);
        let ty = Type::from_ids(vec![a, likes_bob, likes_alice, child_of_root]).unwrap();

        let mut scratch = Scratch::new();
        let mut observer = crate::external::NullObserver;
        let table = Table::init(TableId::default(), ty, |_| None, &mut registry, &mut scratch, &mut observer);

        let ids: Vec<Id> = table.records().iter().map(|r| r.id).collect();
        for expected in [
            a,
            likes_bob,
            likes_alice,
            child_of_root,
            Id::pair(10, well_known::WILDCARD as u32),
            Id::pair(well_known::WILDCARD as u32, 20),
            Id::pair(well_known::WILDCARD as u32, 21),
            Id::pair(well_known::WILDCARD as u32, well_known::ROOT as u32),
            Id::plain(well_known::WILDCARD),
            Id::plain(well_known::ANY),
            Id::pair(well_known::WILDCARD as u32, well_known::WILDCARD as u32),
        ] {
            assert!(ids.contains(&expected), "missing record for {expected:?}");
        }
        // A real ChildOf pair is present, so the synthetic (ChildOf, 0)
        // root marker is not added a second time on top of it.
        assert_eq!(ids.iter().filter(|&&i| i == child_of_root).count(), 1);
    }

    #[derive(Default)]
    struct RecordingObserver {
        empty_events: Vec<(TableId, bool)>,
        lifecycle_events: Vec<(TableId, bool)>,
    }

    impl Observer for RecordingObserver {
        fn emit(&mut self, _table: TableId, _event_id: Id, _row: u32, _count: u32, _is_add: bool) {}
        fn table_set_empty(&mut self, table: TableId, is_empty: bool) {
            self.empty_events.push((table, is_empty));
        }
        fn emit_propagate_invalidate(&mut self, _table: TableId, _id: Id, _target: EntityId) {}
        fn clear_edges(&mut self, _table: TableId) {}
        fn on_table_lifecycle(&mut self, table: TableId, created: bool) {
            self.lifecycle_events.push((table, created));
        }
    }

    #[test]
    fn append_and_delete_notify_empty_transitions() {
        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = RecordingObserver::default();
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);

        let table = store.get_mut(id).unwrap();
        table.append(1, true, false, &mut observer);
        assert_eq!(observer.empty_events, vec![(id, false)]);

        table.delete(0, true, &mut observer);
        assert_eq!(observer.empty_events, vec![(id, false), (id, true)]);
    }

    #[test]
    fn merge_transfers_traversable_count_and_notifies() {
        let mut store = TableStore::new();
        let ty_a = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let ty_b = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = RecordingObserver::default();
        let a = store.create_table(ty_a, |_| Some(info(4)), &mut observer);
        let b = store.create_table(ty_b, |_| Some(info(4)), &mut observer);

        store.get_mut(a).unwrap().data.append(1, true, false);
        store.get_mut(a).unwrap().adjust_traversable_count(3);

        let [table_a, table_b] = store.get_disjoint_mut(a, b).unwrap();
        let col_map = [ColumnMove::Shared(0)];
        Table::merge(table_b, table_a, &col_map, &[], &mut observer);

        assert_eq!(table_b.traversable_count(), 3);
        assert!(table_b.has_flags(TableFlags::HAS_TRAVERSABLE));
        assert_eq!(table_a.traversable_count(), 0);
        assert!(!table_a.has_flags(TableFlags::HAS_TRAVERSABLE));
        assert!(observer.empty_events.contains(&(b, false)));
        assert!(observer.empty_events.contains(&(a, true)));
    }

    #[test]
    fn free_unregisters_every_record_including_wildcards() {
        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::pair(10, 20)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let id = store.create_table(ty, |_| None, &mut observer);

        let any = Id::pair(well_known::WILDCARD as u32, well_known::WILDCARD as u32);
        let rel_wc = Id::pair(10, well_known::WILDCARD as u32);
        assert_eq!(
            store.registry().record(store.registry().get(any).unwrap()).table_count(),
            1
        );

        let mut index = crate::entity_index::HashEntityIndex::new();
        store.free_table(id, &mut index, &mut observer, false);

        // That table was the only claim on every wildcard aggregate it
        // registered against, so the last release dropped each record
        // outright rather than leaving an empty entry behind.
        assert!(store.registry().get(any).is_none());
        assert!(store.registry().get(rel_wc).is_none());
    }

    #[test]
    fn create_and_free_emit_table_lifecycle_events_unless_quitting() {
        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = RecordingObserver::default();
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);
        assert_eq!(observer.lifecycle_events, vec![(id, true)]);

        let mut index = crate::entity_index::HashEntityIndex::new();
        store.free_table(id, &mut index, &mut observer, false);
        assert_eq!(observer.lifecycle_events, vec![(id, true), (id, false)]);
    }

    #[test]
    fn free_during_world_shutdown_suppresses_on_table_delete() {
        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = RecordingObserver::default();
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);

        let mut index = crate::entity_index::HashEntityIndex::new();
        store.free_table(id, &mut index, &mut observer, true);
        assert_eq!(observer.lifecycle_events, vec![(id, true)]);
    }

    #[test]
    fn clear_entities_nulls_rather_than_removes() {
        use crate::entity_index::{EntityRecord, HashEntityIndex};

        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);
        let mut index = HashEntityIndex::new();

        let table = store.get_mut(id).unwrap();
        table.append(1, true, false, &mut observer);
        table.append(2, true, false, &mut observer);
        index.set(1, EntityRecord::new(id, 0));
        index.set(2, EntityRecord::new(id, 1));

        table.clear_entities(&mut index, &mut observer);

        assert_eq!(table.count(), 0);
        // Still present in the index, but with no current location: the
        // caller is expected to relocate these entities, not that they no
        // longer exist.
        assert!(index.get(1).unwrap().is_null());
        assert!(index.get(2).unwrap().is_null());
    }

    #[test]
    fn delete_entities_removes_from_index() {
        use crate::entity_index::{EntityRecord, HashEntityIndex};

        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);
        let mut index = HashEntityIndex::new();

        let table = store.get_mut(id).unwrap();
        table.append(1, true, false, &mut observer);
        index.set(1, EntityRecord::new(id, 0));

        table.delete_entities(&mut index, &mut observer);

        assert_eq!(table.count(), 0);
        assert!(index.get(1).is_none());
    }

    #[test]
    fn free_removes_its_entities_from_the_index() {
        use crate::entity_index::{EntityRecord, HashEntityIndex};

        let mut store = TableStore::new();
        let ty = Type::from_ids(vec![Id::plain(1)]).unwrap();
        let mut observer = crate::external::NullObserver;
        let id = store.create_table(ty, |_| Some(info(4)), &mut observer);
        let mut index = HashEntityIndex::new();

        let table = store.get_mut(id).unwrap();
        table.append(1, true, false, &mut observer);
        index.set(1, EntityRecord::new(id, 0));

        store.free_table(id, &mut index, &mut observer, false);

        assert!(index.get(1).is_none());
    }
}
