//! Row-level storage for a single table: columns, toggle bitsets and the
//! entity list that ties a row index to an entity, plus the mutation
//! primitives every structural change compiles down to.
//!
//! Grounded on `table_data.c`: `append`/`appendN` (fast path when no
//! lifecycle hooks are registered, complex path when they are),
//! `delete` (swap-and-pop, with a last-row shortcut that skips the copy),
//! `move` (cross-table relocation, `same_entity` selecting move-and-destruct
//! versus copy-leaving-source-intact), `swap` (three-way memcpy, no ctor or
//! dtor involved) and `merge` (bulk structural change with a steal-if-empty
//! fast path). `table` (not this module) owns table identity, the type, and
//! id-record registration; this module only knows row indices and columns.

use crate::bitset_column::BitsetColumn;
use crate::column::Column;
use crate::id::EntityId;

/// How a destination column's data for a moved/merged row is obtained.
#[derive(Debug, Clone, Copy)]
pub enum ColumnMove {
    /// The id also exists at this column index in the source table.
    Shared(usize),
    /// No equivalent column in the source; construct a fresh default value.
    New,
}

/// Per-column, lazily allocated change counters. Index 0 tracks entity/
/// structural changes (append, delete, move); index `i + 1` tracks column
/// `i`. Seeded at 1 rather than 0 on first allocation, matching
/// `table_data.c`'s `dirty_state` initialization, so "never observed" and
/// "observed once at count 0" are distinguishable by a caching query.
#[derive(Default)]
struct DirtyState {
    counters: Vec<i32>,
}

impl DirtyState {
    fn ensure(&mut self, column_count: usize) -> &mut Vec<i32> {
        if self.counters.is_empty() {
            self.counters = vec![1; column_count + 1];
        }
        &mut self.counters
    }

    fn mark(&mut self, column_count: usize, index: Option<usize>) {
        let counters = self.ensure(column_count);
        let i = index.map_or(0, |c| c + 1);
        counters[i] = counters[i].wrapping_add(1);
    }

    fn get(&self, index: Option<usize>) -> i32 {
        let i = index.map_or(0, |c| c + 1);
        self.counters.get(i).copied().unwrap_or(0)
    }
}

/// The row storage owned by a table.
pub struct TableData {
    pub entities: Vec<EntityId>,
    pub columns: Vec<Column>,
    pub bitset_columns: Vec<BitsetColumn>,
    dirty: DirtyState,
    lock_count: i32,
}

impl TableData {
    pub fn new(columns: Vec<Column>, bitset_columns: Vec<BitsetColumn>) -> Self {
        TableData {
            entities: Vec::new(),
            columns,
            bitset_columns,
            dirty: DirtyState::default(),
            lock_count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    pub fn lock(&mut self) {
        self.lock_count += 1;
    }

    pub fn unlock(&mut self) {
        debug_assert!(self.lock_count > 0);
        self.lock_count -= 1;
    }

    /// `None` reads/marks the structural (entity-list) counter; `Some(i)`
    /// reads/marks column `i`'s counter.
    pub fn dirty_count(&self, column: Option<usize>) -> i32 {
        self.dirty.get(column)
    }

    pub fn mark_dirty(&mut self, column: Option<usize>) {
        let count = self.columns.len();
        self.dirty.mark(count, column);
    }

    /// Append one row for `entity`. `construct` selects whether new column
    /// slots run their constructor (the normal case) or stay uninitialized
    /// (a caller that's about to overwrite every byte itself); `on_add`
    /// selects whether each column's `on_add` hook fires for the new row.
    /// Returns the new row index.
    pub fn append(&mut self, entity: EntityId, construct: bool, on_add: bool) -> u32 {
        debug_assert!(!self.is_locked(), "mutating a locked table");
        for col in &mut self.columns {
            col.append(construct, on_add);
        }
        for bc in &mut self.bitset_columns {
            bc.push_enabled();
        }
        self.entities.push(entity);
        self.mark_dirty(None);
        (self.entities.len() - 1) as u32
    }

    /// Append `entities.len()` rows in one pass (the bulk-spawn path),
    /// firing each column's `on_add` hook once for the whole new tail when
    /// `on_add` is set. Returns the first new row index.
    pub fn append_n(&mut self, entities: &[EntityId], construct: bool, on_add: bool) -> u32 {
        debug_assert!(!self.is_locked(), "mutating a locked table");
        if entities.is_empty() {
            return self.entities.len() as u32;
        }
        let first_row = self.entities.len() as u32;
        for col in &mut self.columns {
            col.append_n(entities.len(), construct, on_add);
        }
        for bc in &mut self.bitset_columns {
            for _ in 0..entities.len() {
                bc.push_enabled();
            }
        }
        self.entities.extend_from_slice(entities);
        self.mark_dirty(None);
        first_row
    }

    /// Remove `row`. If a different entity occupied the last row, it is
    /// swapped into `row`'s slot and returned so the caller can repoint
    /// that entity's index record; `None` means `row` was already last
    /// (nothing to repoint). `destruct` runs each column's destructor on
    /// the removed row's old contents.
    pub fn delete(&mut self, row: usize, destruct: bool) -> Option<EntityId> {
        debug_assert!(!self.is_locked(), "mutating a locked table");
        let last = self.entities.len() - 1;
        for col in &mut self.columns {
            col.swap_remove(row, destruct);
        }
        for bc in &mut self.bitset_columns {
            bc.swap_remove(row);
        }
        let moved = if row != last {
            Some(self.entities[last])
        } else {
            None
        };
        self.entities.swap_remove(row);
        self.mark_dirty(None);
        moved
    }

    /// Swap two rows within this table (no ctor/dtor involved).
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        debug_assert!(!self.is_locked(), "mutating a locked table");
        if a == b {
            return;
        }
        self.entities.swap(a, b);
        for col in &mut self.columns {
            col.swap_rows(a, b);
        }
        for bc in &mut self.bitset_columns {
            bc.bits_swap(a, b);
        }
        self.mark_dirty(None);
    }

    /// Relocate `src_row` from `src` into a new row of `dst`. `col_map[i]`
    /// describes where destination column `i`'s data comes from;
    /// `bitset_map[j]` the same for destination bitset column `j`.
    /// `same_entity` selects move-and-destruct-source semantics (the usual
    /// case: the entity itself is changing tables) over
    /// copy-leaving-source-intact (cloning shared data onto a different,
    /// new entity). `construct` gates whether destination-only columns run
    /// their `ctor`; their `on_add` hook always fires, matching "only in
    /// destination: run add hooks". When `same_entity` is set, `src_row` is
    /// also removed from `src` as part of this call, and any entity swapped
    /// into its place is returned for the caller to repoint.
    #[allow(clippy::too_many_arguments)]
    pub fn move_row(
        dst: &mut TableData,
        col_map: &[ColumnMove],
        bitset_map: &[Option<usize>],
        src: &mut TableData,
        src_row: usize,
        same_entity: bool,
        construct: bool,
    ) -> (u32, Option<EntityId>) {
        debug_assert!(!dst.is_locked(), "mutating a locked table");
        debug_assert!(!src.is_locked(), "mutating a locked table");
        let entity = src.entities[src_row];
        let new_row = dst.entities.len();
        dst.entities.push(entity);

        for (i, mv) in col_map.iter().enumerate() {
            match mv {
                ColumnMove::Shared(src_idx) => {
                    dst.columns[i].append(false, false);
                    src.columns[*src_idx].move_out(src_row, &mut dst.columns[i], new_row, same_entity);
                }
                ColumnMove::New => dst.columns[i].append(construct, true),
            }
        }

        for (j, src_idx) in bitset_map.iter().enumerate() {
            match src_idx {
                Some(src_idx) => {
                    let enabled = src.bitset_columns[*src_idx].is_enabled(src_row);
                    dst.bitset_columns[j].push_value(enabled);
                }
                None => dst.bitset_columns[j].push_enabled(),
            }
        }

        dst.mark_dirty(None);

        if !same_entity {
            return (new_row as u32, None);
        }

        let shared_src_cols: Vec<usize> = col_map
            .iter()
            .filter_map(|m| match m {
                ColumnMove::Shared(i) => Some(*i),
                ColumnMove::New => None,
            })
            .collect();
        for (src_idx, col) in src.columns.iter_mut().enumerate() {
            if !shared_src_cols.contains(&src_idx) {
                col.destruct_in_place(src_row);
            }
        }

        let moved = src.delete(src_row, false);
        src.mark_dirty(None);
        (new_row as u32, moved)
    }

    /// Bulk-move every row of `src` into `dst`, consuming `src`'s storage.
    /// Shared columns with an empty destination steal the source's
    /// allocation outright (O(1)); otherwise rows are relocated one at a
    /// time through the same move semantics as `move_row`. Source columns
    /// and bitsets with no destination counterpart are destructed and
    /// cleared. `src` is left with zero rows (but its allocations may have
    /// been stolen rather than freed).
    pub fn merge(dst: &mut TableData, col_map: &[ColumnMove], bitset_map: &[Option<usize>], src: &mut TableData) {
        debug_assert!(!dst.is_locked(), "mutating a locked table");
        debug_assert!(!src.is_locked(), "mutating a locked table");
        let src_count = src.entities.len();
        if src_count == 0 {
            return;
        }

        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("table_data_merge", src_count).entered();
        let dst_was_empty = dst.entities.is_empty();

        for (i, mv) in col_map.iter().enumerate() {
            if let ColumnMove::Shared(src_idx) = mv {
                let steal = dst_was_empty && dst.columns[i].is_empty();
                if steal {
                    dst.columns[i].data.steal_from(&mut src.columns[*src_idx].data);
                } else {
                    for row in 0..src_count {
                        dst.columns[i].append(false, false);
                        let dst_row = dst.columns[i].len() - 1;
                        src.columns[*src_idx].move_out(row, &mut dst.columns[i], dst_row, true);
                    }
                    src.columns[*src_idx].data.force_set_len(0);
                }
            } else {
                dst.columns[i].append_n(src_count, true, false);
            }
        }

        let shared_src_cols: Vec<usize> = col_map
            .iter()
            .filter_map(|m| match m {
                ColumnMove::Shared(i) => Some(*i),
                ColumnMove::New => None,
            })
            .collect();
        for (src_idx, col) in src.columns.iter_mut().enumerate() {
            if !shared_src_cols.contains(&src_idx) {
                col.destruct_all_and_clear();
            }
        }

        for (j, src_idx) in bitset_map.iter().enumerate() {
            match src_idx {
                Some(src_idx) => {
                    for row in 0..src_count {
                        let enabled = src.bitset_columns[*src_idx].is_enabled(row);
                        dst.bitset_columns[j].push_value(enabled);
                    }
                }
                None => {
                    for _ in 0..src_count {
                        dst.bitset_columns[j].push_enabled();
                    }
                }
            }
        }
        for bc in &mut src.bitset_columns {
            bc.clear();
        }

        dst.entities.append(&mut src.entities);
        dst.mark_dirty(None);
        for i in 0..col_map.len() {
            dst.mark_dirty(Some(i));
        }
        src.mark_dirty(None);
    }

    /// Reclaim unused column/entity-vector capacity down to the current
    /// row count.
    pub fn shrink(&mut self) {
        self.entities.shrink_to_fit();
        for col in &mut self.columns {
            col.data.shrink_to_fit();
        }
    }
}
