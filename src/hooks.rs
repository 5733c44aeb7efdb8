//! Component lifecycle hooks and per-component type info.
//!
//! Hooks are a struct of optional function pointers (never async/suspending,
//! per the storage engine's design notes) operating on raw byte ranges —
//! the storage layer only ever sees erased components.

use std::alloc::Layout;

/// Raw pointer to the start of a contiguous run of `count` elements.
pub type RawPtr = *mut u8;
pub type ConstRawPtr = *const u8;

/// Construct `count` default-valued elements starting at `ptr`.
pub type CtorFn = unsafe fn(ptr: RawPtr, count: usize);
/// Destruct `count` elements starting at `ptr`.
pub type DtorFn = unsafe fn(ptr: RawPtr, count: usize);
/// Copy-construct `count` elements from `src` into uninitialized `dst`.
pub type CopyCtorFn = unsafe fn(dst: RawPtr, src: ConstRawPtr, count: usize);
/// Move `count` already-live elements from `src` into uninitialized `dst`,
/// leaving `dst` live and `src` in a state that still requires destruction
/// by the caller (the source slot is not implicitly destructed).
pub type MoveCtorFn = unsafe fn(dst: RawPtr, src: RawPtr, count: usize);
/// Move `count` elements from `src` into uninitialized `dst`, and leave
/// `src` already destructed (no further cleanup needed on the source).
pub type MoveDtorFn = unsafe fn(dst: RawPtr, src: RawPtr, count: usize);
/// Combined move + source destruction used specifically for the realloc
/// path in `column::grow`: constructs `dst` from `src` and destructs `src`.
pub type CtorMoveDtorFn = unsafe fn(dst: RawPtr, src: RawPtr, count: usize);
/// Observer-style hook invoked on add/remove. Carries no payload beyond the
/// raw component pointer; entity ids and event routing are the caller's
/// concern, not this engine's (emission is out of scope, see `external`).
pub type OnAddRemoveFn = unsafe fn(ptr: RawPtr, count: usize);

/// Optional lifecycle operations for a component type. Fields left `None`
/// fall back to the "trivial" behavior documented on each `Column`/
/// `TableData` method that consumes them.
#[derive(Clone, Copy, Default)]
pub struct ComponentHooks {
    pub ctor: Option<CtorFn>,
    pub dtor: Option<DtorFn>,
    pub copy_ctor: Option<CopyCtorFn>,
    pub move_ctor: Option<MoveCtorFn>,
    pub move_dtor: Option<MoveDtorFn>,
    pub ctor_move_dtor: Option<CtorMoveDtorFn>,
    pub on_add: Option<OnAddRemoveFn>,
    pub on_remove: Option<OnAddRemoveFn>,
}

impl ComponentHooks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_ctor_or_on_add(&self) -> bool {
        self.ctor.is_some() || self.on_add.is_some()
    }

    pub fn has_dtor_or_on_remove(&self) -> bool {
        self.dtor.is_some() || self.on_remove.is_some()
    }
}

/// Size and lifecycle metadata for a component. Tags (zero-size, no hooks)
/// are represented as `None` type info in a column's id-record, per the
/// data model: "column_map[type_idx] == -1 iff id at type_idx has no type
/// info."
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub size: usize,
    pub align: usize,
    pub hooks: ComponentHooks,
}

impl TypeInfo {
    pub fn new(size: usize, align: usize, hooks: ComponentHooks) -> Self {
        debug_assert!(align > 0 && align.is_power_of_two());
        TypeInfo { size, align, hooks }
    }

    /// `TypeInfo` for a plain-old-data type of `T` with no hooks other than
    /// a trivial memcpy-safe layout. Convenience for tests and simple
    /// components that need no construct/destruct/move logic.
    pub fn trivial<T: Copy>() -> Self {
        TypeInfo {
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            hooks: ComponentHooks::none(),
        }
    }

    pub fn layout_of(&self, count: usize) -> Layout {
        Layout::from_size_align(self.size.checked_mul(count).expect("size overflow"), self.align)
            .expect("invalid layout")
    }
}
