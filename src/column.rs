//! `RawBuffer`: an untyped, growable byte buffer with element-at-a-time
//! lifecycle operations, and `Column`, the per-component storage built on
//! top of it.
//!
//! `RawBuffer` exists so the storage core calls a small, well-named API
//! (`reserve`/`push_uninit`/`swap_remove`/`move_in`/`dtor_range`) instead of
//! repeating pointer arithmetic at every call site — the same role
//! `ecs_vec_t` plays in original_source/, minus the reliance on pointers
//! staying valid across reallocation without an owner in sight.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::hooks::TypeInfo;
use crate::id::Id;

/// An untyped, growable buffer of fixed-size elements.
pub struct RawBuffer {
    ptr: NonNull<u8>,
    len: usize,
    cap: usize,
    elem_size: usize,
    elem_align: usize,
}

// SAFETY: RawBuffer has no interior mutability and the element type it holds
// is erased; callers are responsible for the Send/Sync-ness of the
// components they store, same as the teacher's ComponentColumn.
unsafe impl Send for RawBuffer {}
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    pub fn new(elem_size: usize, elem_align: usize) -> Self {
        debug_assert!(elem_align > 0 && elem_align.is_power_of_two());
        RawBuffer {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
            elem_size,
            elem_align,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    fn layout_for(&self, cap: usize) -> Layout {
        Layout::from_size_align(self.elem_size * cap, self.elem_align).expect("invalid layout")
    }

    /// Pointer to the element at `index`. Caller must ensure `index < len`.
    pub fn get_ptr(&self, index: usize) -> *const u8 {
        debug_assert!(index < self.len);
        unsafe { self.ptr.as_ptr().add(index * self.elem_size) }
    }

    pub fn get_mut_ptr(&mut self, index: usize) -> *mut u8 {
        debug_assert!(index < self.len);
        unsafe { self.ptr.as_ptr().add(index * self.elem_size) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Grow capacity to hold at least `min_cap` elements. If a realloc is
    /// needed and `ctor_move_dtor` is supplied, existing live elements are
    /// relocated through the hook (ctor into new storage, dtor of old)
    /// rather than a raw memcpy, matching `flecs_table_data_column_append`'s
    /// realloc path. Without a relocation hook a raw grow (alloc + memcpy +
    /// dealloc, or in-place `realloc`) is used since the type is assumed
    /// trivially relocatable in that case.
    pub fn reserve(
        &mut self,
        min_cap: usize,
        ctor_move_dtor: Option<unsafe fn(*mut u8, *mut u8, usize)>,
    ) {
        if min_cap <= self.cap {
            return;
        }
        let new_cap = min_cap.max(self.cap.saturating_mul(2)).max(4);
        if self.elem_size == 0 {
            self.cap = new_cap;
            return;
        }

        if self.cap == 0 {
            let layout = self.layout_for(new_cap);
            let new_ptr = unsafe { alloc::alloc(layout) };
            self.ptr = NonNull::new(new_ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout));
            self.cap = new_cap;
            return;
        }

        if let Some(hook) = ctor_move_dtor {
            if self.len > 0 {
                let new_layout = self.layout_for(new_cap);
                let new_ptr = unsafe { alloc::alloc(new_layout) };
                let new_ptr =
                    NonNull::new(new_ptr).unwrap_or_else(|| alloc::handle_alloc_error(new_layout));
                unsafe {
                    hook(new_ptr.as_ptr(), self.ptr.as_ptr(), self.len);
                    alloc::dealloc(self.ptr.as_ptr(), self.layout_for(self.cap));
                }
                self.ptr = new_ptr;
                self.cap = new_cap;
                return;
            }
        }

        let old_layout = self.layout_for(self.cap);
        let new_layout = self.layout_for(new_cap);
        let new_ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), old_layout, new_layout.size()) };
        self.ptr = NonNull::new(new_ptr).unwrap_or_else(|| alloc::handle_alloc_error(new_layout));
        self.cap = new_cap;
    }

    /// Grow by one uninitialized element and return a pointer to it. Does
    /// not run a constructor; caller decides whether to construct the slot
    /// or leave it uninitialized (the "fast path" for tables without
    /// lifecycle hooks).
    pub fn push_uninit(&mut self) -> *mut u8 {
        self.reserve(self.len + 1, None);
        let ptr = unsafe { self.ptr.as_ptr().add(self.len * self.elem_size) };
        self.len += 1;
        ptr
    }

    /// Grow by `n` uninitialized elements, relocating existing elements
    /// through `ctor_move_dtor` if a realloc is required. Returns a pointer
    /// to the first new element.
    pub fn push_uninit_n(
        &mut self,
        n: usize,
        ctor_move_dtor: Option<unsafe fn(*mut u8, *mut u8, usize)>,
    ) -> *mut u8 {
        self.reserve(self.len + n, ctor_move_dtor);
        let ptr = unsafe { self.ptr.as_ptr().add(self.len * self.elem_size) };
        self.len += n;
        ptr
    }

    /// Remove the last element without running a destructor. Caller must
    /// already have destructed it if needed.
    pub fn pop_uninit(&mut self) {
        debug_assert!(self.len > 0);
        self.len -= 1;
    }

    /// Copy raw bytes from `src` into the slot at `index`. `index` must be
    /// `< len`. Does not run ctor/dtor; used for the swap-and-pop shortcuts
    /// and cross-table moves that have already decided no hook applies.
    ///
    /// # Safety
    /// `src` must point to `elem_size` readable bytes that do not overlap
    /// the destination slot.
    pub unsafe fn move_in(&mut self, index: usize, src: *const u8) {
        debug_assert!(index < self.len);
        let dst = self.ptr.as_ptr().add(index * self.elem_size);
        std::ptr::copy_nonoverlapping(src, dst, self.elem_size);
    }

    /// Swap-remove the element at `index`: overwrite it with the raw bytes
    /// of the last element (no dtor), then shrink by one. Caller is
    /// responsible for having destructed the element at `index` first if it
    /// holds live state, and for the case `index == len - 1` (last row:
    /// just shrink, no copy needed).
    pub fn swap_remove_raw(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let last = self.len - 1;
        if index != last {
            unsafe {
                let src = self.ptr.as_ptr().add(last * self.elem_size);
                let dst = self.ptr.as_ptr().add(index * self.elem_size);
                std::ptr::copy_nonoverlapping(src, dst, self.elem_size);
            }
        }
        self.len -= 1;
    }

    /// Swap the elements at `a` and `b` via a three-way memcpy (through a
    /// temporary). No ctor/dtor is run; valid for any byte layout since it
    /// never duplicates a live value, only relocates it.
    pub fn swap_elements(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        debug_assert!(a < self.len && b < self.len);
        unsafe {
            let pa = self.ptr.as_ptr().add(a * self.elem_size);
            let pb = self.ptr.as_ptr().add(b * self.elem_size);
            std::ptr::swap_nonoverlapping(pa, pb, self.elem_size);
        }
    }

    /// Force `len` to an exact value without constructing or destructing
    /// anything. Used after a bulk move has already relocated every
    /// element out of this buffer, to mark it empty without a second dtor
    /// pass over now-dead bytes.
    pub fn force_set_len(&mut self, len: usize) {
        debug_assert!(len <= self.cap);
        self.len = len;
    }

    /// Run `dtor` over `count` elements starting at `start`.
    ///
    /// # Safety
    /// `[start, start+count)` must be within `len` and hold live values.
    pub unsafe fn dtor_range(&mut self, start: usize, count: usize, dtor: unsafe fn(*mut u8, usize)) {
        if count == 0 {
            return;
        }
        debug_assert!(start + count <= self.len);
        let ptr = self.ptr.as_ptr().add(start * self.elem_size);
        dtor(ptr, count);
    }

    /// Reclaim unused capacity down to `len`.
    pub fn shrink_to_fit(&mut self) {
        if self.elem_size == 0 || self.cap == self.len {
            return;
        }
        if self.len == 0 {
            if self.cap > 0 {
                unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout_for(self.cap)) };
            }
            self.ptr = NonNull::dangling();
            self.cap = 0;
            return;
        }
        let old_layout = self.layout_for(self.cap);
        let new_layout = self.layout_for(self.len);
        let new_ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), old_layout, new_layout.size()) };
        self.ptr = NonNull::new(new_ptr).unwrap_or_else(|| alloc::handle_alloc_error(new_layout));
        self.cap = self.len;
    }

    /// Steal the other buffer's allocation wholesale, leaving `other` empty.
    /// Used by `merge_column` when the destination column is empty.
    pub fn steal_from(&mut self, other: &mut RawBuffer) {
        debug_assert_eq!(self.elem_size, other.elem_size);
        self.ptr = other.ptr;
        self.len = other.len;
        self.cap = other.cap;
        other.ptr = NonNull::dangling();
        other.len = 0;
        other.cap = 0;
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        // RawBuffer never knows whether its contents are still live: Column
        // always destructs through dtor_range before dropping its buffer.
        // Here we only free the allocation itself.
        if self.cap > 0 && self.elem_size > 0 {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout_for(self.cap)) };
        }
    }
}

/// One component's storage: a raw byte buffer plus the id and type info
/// that describe how to interpret and manage it.
pub struct Column {
    pub id: Id,
    pub size: usize,
    pub type_info: TypeInfo,
    pub data: RawBuffer,
}

impl Column {
    pub fn new(id: Id, type_info: TypeInfo) -> Self {
        Column {
            id,
            size: type_info.size,
            data: RawBuffer::new(type_info.size.max(1), type_info.align),
            type_info,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow by one element. If `construct` is set and a ctor hook exists,
    /// run it on the new slot; if `on_add` is set and an on_add hook
    /// exists, it runs immediately after. Handles the realloc-aware
    /// relocation path via `ctor_move_dtor` automatically.
    pub fn append(&mut self, construct: bool, on_add: bool) {
        let hooks = self.type_info.hooks;
        let ptr = self.data.push_uninit_n(1, hooks.ctor_move_dtor);
        if construct {
            if let Some(ctor) = hooks.ctor {
                unsafe { ctor(ptr, 1) };
            }
        }
        if on_add {
            if let Some(on_add) = hooks.on_add {
                unsafe { on_add(ptr, 1) };
            }
        }
    }

    /// Grow by `n` elements, constructing them if `construct` is set and
    /// firing `on_add` once for the whole new tail if `on_add` is set.
    pub fn append_n(&mut self, n: usize, construct: bool, on_add: bool) {
        if n == 0 {
            return;
        }
        let hooks = self.type_info.hooks;
        let ptr = self.data.push_uninit_n(n, hooks.ctor_move_dtor);
        if construct {
            if let Some(ctor) = hooks.ctor {
                unsafe { ctor(ptr, n) };
            }
        }
        if on_add {
            if let Some(on_add) = hooks.on_add {
                unsafe { on_add(ptr, n) };
            }
        }
    }

    /// Drop the last row without moving anything: runs `on_remove` then the
    /// destructor (if `destruct`) then shrinks.
    pub fn pop_back(&mut self, destruct: bool) {
        let last = self.data.len() - 1;
        if destruct {
            let hooks = self.type_info.hooks;
            if let Some(on_remove) = hooks.on_remove {
                unsafe { on_remove(self.data.get_mut_ptr(last), 1) };
            }
            if let Some(dtor) = hooks.dtor {
                unsafe { self.data.dtor_range(last, 1, dtor) };
            }
        }
        self.data.pop_uninit();
    }

    /// Swap-remove `row`: if a move hook exists, move-destruct the last
    /// element into `row`'s slot (after running `on_remove`/destructing
    /// `row` if `destruct`); otherwise fall back to a raw memcpy (only
    /// valid for trivially relocatable types, i.e. no registered move
    /// hook).
    pub fn swap_remove(&mut self, row: usize, destruct: bool) {
        let last = self.data.len() - 1;
        if row == last {
            self.pop_back(destruct);
            return;
        }
        let hooks = self.type_info.hooks;
        if destruct {
            if let Some(on_remove) = hooks.on_remove {
                unsafe { on_remove(self.data.get_mut_ptr(row), 1) };
            }
            if let Some(dtor) = hooks.dtor {
                unsafe { self.data.dtor_range(row, 1, dtor) };
            }
        }
        if let Some(move_dtor) = hooks.move_dtor {
            let dst = self.data.get_mut_ptr(row);
            let src = self.data.get_mut_ptr(last);
            unsafe { move_dtor(dst, src, 1) };
            self.data.pop_uninit();
        } else {
            // No move hook: the type is trivially relocatable, so a raw
            // memcpy of the last element into `row` is equivalent to a move.
            // `swap_remove_raw` already performs the copy and shrinks `len`
            // by one; nothing further to do.
            self.data.swap_remove_raw(row);
        }
    }

    /// Move or copy the element at `row` into `dst`'s slot at `dst_row`
    /// (already reserved via `dst.append(false, false)`). `same_entity` selects
    /// move-and-destruct-source (the entity itself is relocating) versus
    /// copy-leaving-source-intact (cloning shared data onto a different
    /// entity, e.g. an override). Falls back to a raw memcpy when no
    /// matching hook is registered, valid for POD components.
    pub fn move_out(&mut self, row: usize, dst: &mut Column, dst_row: usize, same_entity: bool) {
        let src_ptr = self.data.get_mut_ptr(row);
        let dst_ptr = dst.data.get_mut_ptr(dst_row);
        if same_entity {
            if let Some(move_dtor) = self.type_info.hooks.move_dtor {
                unsafe { move_dtor(dst_ptr, src_ptr, 1) };
                return;
            }
        } else if let Some(copy_ctor) = self.type_info.hooks.copy_ctor {
            unsafe { copy_ctor(dst_ptr, src_ptr, 1) };
            return;
        }
        unsafe { std::ptr::copy_nonoverlapping(src_ptr, dst_ptr, self.size) };
    }

    /// Remove the element at `row` in place, without shrinking the column:
    /// runs `on_remove` then the destructor. Used when a cross-table move
    /// drops a component the destination table doesn't have; the row
    /// itself is removed afterwards by the caller's swap-and-pop of the
    /// source table.
    pub fn destruct_in_place(&mut self, row: usize) {
        let hooks = self.type_info.hooks;
        if let Some(on_remove) = hooks.on_remove {
            unsafe { on_remove(self.data.get_mut_ptr(row), 1) };
        }
        if let Some(dtor) = hooks.dtor {
            unsafe { self.data.dtor_range(row, 1, dtor) };
        }
    }

    /// Swap-remove `row` without running any destructor: the caller has
    /// already destructed or moved-out its contents.
    pub fn finish_remove(&mut self, row: usize) {
        self.data.swap_remove_raw(row);
    }

    /// Swap two rows in place (no ctor/dtor).
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.data.swap_elements(a, b);
    }

    /// Destruct every row, then mark the column empty without a second
    /// pass. Used by `merge` to retire a source column whose rows were
    /// never mapped into the destination.
    pub fn destruct_all_and_clear(&mut self) {
        let count = self.data.len();
        if count > 0 {
            if let Some(dtor) = self.type_info.hooks.dtor {
                unsafe { self.data.dtor_range(0, count, dtor) };
            }
        }
        self.data.force_set_len(0);
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let Some(dtor) = self.type_info.hooks.dtor {
            let count = self.data.len();
            if count > 0 {
                unsafe { self.data.dtor_range(0, count, dtor) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ComponentHooks;

    #[derive(Clone, Copy)]
    struct Pos {
        x: f32,
        y: f32,
    }

    fn pos_type_info() -> TypeInfo {
        TypeInfo::new(
            std::mem::size_of::<Pos>(),
            std::mem::align_of::<Pos>(),
            ComponentHooks::none(),
        )
    }

    #[test]
    fn append_and_read() {
        let mut col = Column::new(Id::plain(1), pos_type_info());
        col.append(false, false);
        unsafe {
            let ptr = col.data.get_mut_ptr(0) as *mut Pos;
            *ptr = Pos { x: 1.0, y: 2.0 };
        }
        let read = unsafe { *(col.data.get_ptr(0) as *const Pos) };
        assert_eq!(read.x, 1.0);
        assert_eq!(read.y, 2.0);
    }

    #[test]
    fn swap_remove_last_is_just_pop() {
        let mut col = Column::new(Id::plain(1), pos_type_info());
        col.append(false, false);
        col.append(false, false);
        assert_eq!(col.len(), 2);
        col.swap_remove(1, false);
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn swap_remove_middle_pulls_last_in() {
        let mut col = Column::new(Id::plain(1), pos_type_info());
        for i in 0..3 {
            col.append(false, false);
            unsafe {
                let ptr = col.data.get_mut_ptr(i) as *mut Pos;
                *ptr = Pos {
                    x: i as f32,
                    y: 0.0,
                };
            }
        }
        col.swap_remove(0, false);
        assert_eq!(col.len(), 2);
        let first = unsafe { *(col.data.get_ptr(0) as *const Pos) };
        assert_eq!(first.x, 2.0);
    }
}
