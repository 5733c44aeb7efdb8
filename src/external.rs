//! Collaborators this engine calls out to but does not own: observer
//! notification and query-cache invalidation. Kept as a trait so the
//! storage core can be tested without a real event/query layer attached.

use crate::id::{EntityId, Id};
use crate::table::TableId;

/// Notifications a table emits on structural change. A stub no-op
/// implementation is enough to exercise every row operation in isolation;
/// a real world wires this to its event and query-cache machinery.
pub trait Observer {
    /// An id was added or removed for a run of entities starting at `row`.
    fn emit(&mut self, table: TableId, event_id: Id, row: u32, count: u32, is_add: bool);

    /// The table's count crossed the empty/non-empty boundary in either
    /// direction; used to keep "empty table" indices current.
    fn table_set_empty(&mut self, table: TableId, is_empty: bool);

    /// A structural change invalidated cached query state anywhere that
    /// referenced `table` through the given id (e.g. a `ChildOf` target
    /// losing a child), and that invalidation should propagate to
    /// dependents rather than stopping at `table`.
    fn emit_propagate_invalidate(&mut self, table: TableId, id: Id, target: EntityId);

    /// `table` is being freed; drop any graph edges query caches keep
    /// pointing at it.
    fn clear_edges(&mut self, table: TableId);

    /// `table` was just constructed (`created = true`, fired at the end of
    /// `table::init`) or is about to be torn down (`created = false`, fired
    /// by `table::free` unless the caller is tearing down the whole world).
    /// Backs `OnTableCreate`/`OnTableDelete`.
    fn on_table_lifecycle(&mut self, table: TableId, created: bool);
}

/// Does nothing. Useful for unit-testing `table_data`/`table` operations
/// without standing up a real observer.
#[derive(Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn emit(&mut self, _table: TableId, _event_id: Id, _row: u32, _count: u32, _is_add: bool) {}
    fn table_set_empty(&mut self, _table: TableId, _is_empty: bool) {}
    fn emit_propagate_invalidate(&mut self, _table: TableId, _id: Id, _target: EntityId) {}
    fn clear_edges(&mut self, _table: TableId) {}
    fn on_table_lifecycle(&mut self, _table: TableId, _created: bool) {}
}
