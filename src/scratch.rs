//! Arena-scoped scratch space for table initialization.
//!
//! Building a table's record list touches a handful of short-lived
//! `Vec<TableRecord>`/`Vec<IdRecordId>` buffers while scanning the type and
//! registering wildcard aggregates. Allocating and freeing those on every
//! `table::init` call would thrash the allocator once a world is creating
//! tables at any real rate, so a single arena is reused across calls and
//! reset rather than freed between them.

use bumpalo::Bump;

/// Owns a `bumpalo::Bump` and resets it between table-init calls instead of
/// deallocating. Intended to be held once per world/registry and threaded
/// into `table::init` as `&mut Scratch`.
#[derive(Default)]
pub struct Scratch {
    arena: Bump,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch { arena: Bump::new() }
    }

    pub fn arena(&self) -> &Bump {
        &self.arena
    }

    /// Drop everything allocated since the last reset. Safe to call between
    /// table-init calls because nothing borrowed from the arena is expected
    /// to outlive the call that produced it.
    pub fn reset(&mut self) {
        self.arena.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reclaims_capacity_without_freeing_chunk() {
        let mut scratch = Scratch::new();
        {
            let v = bumpalo::collections::Vec::<u32>::from_iter_in(0..64, scratch.arena());
            assert_eq!(v.len(), 64);
        }
        let cap_before = scratch.arena().allocated_bytes();
        scratch.reset();
        assert!(cap_before > 0);
    }
}
