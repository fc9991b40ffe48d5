//! The graph heap: a pair of semispaces plus the Cheney-style copying
//! collector that moves the live graph between them.
//!
//! Grounded on `examples/Starlight-JS-comet/src/semispace.rs` for the
//! from/to-space-pair shape and the forwarding-address-in-header technique,
//! and on `examples/original_source/interp/Storage.c`'s `collectGarbage`
//! for the actual algorithm: this collector is specific to the five fixed
//! node tags (spec.md §3.1), not generic over an arbitrary `Collectable`
//! trait object the way the teacher's own semispace is.

use std::mem::size_of;

use crate::bump_pointer_space::BumpPointerSpace;
use crate::error::GMachineError;
use crate::header::{Header, Mark, Tag};
use crate::node::{node_size, IndirectNode, NodePtr};

/// The 64 KiB (per spec.md §4.1, read as *per semispace*; see DESIGN.md's
/// resolution of the heap-size Open Question) default used when the driver
/// doesn't override it.
pub const DEFAULT_HEAP_SIZE: usize = 64 * 1024;

/// The root set a collection must walk, borrowed from the evaluator for the
/// duration of a single [`Heap::collect`] call. Order matches spec.md
/// §4.2's fixed, testable root enumeration order: globals, then the active
/// supercombinator, then the value stack.
pub struct Roots<'a> {
    pub globals: &'a mut [NodePtr],
    pub current_sc: &'a mut NodePtr,
    pub stack: &'a mut [NodePtr],
}

pub struct Heap {
    from_space: BumpPointerSpace,
    to_space: BumpPointerSpace,
}

impl Heap {
    pub fn new(heap_size: usize) -> Result<Self, GMachineError> {
        let from_space = BumpPointerSpace::try_new(heap_size)
            .map_err(|_| GMachineError::HeapInit("failed to map from-space"))?;
        let to_space = BumpPointerSpace::try_new(heap_size)
            .map_err(|_| GMachineError::HeapInit("failed to map to-space"))?;
        Ok(Heap { from_space, to_space })
    }

    /// Pure bump allocation in from-space. Never triggers GC itself (spec.md
    /// §4.1): the caller is responsible for invoking [`Heap::collect`] when
    /// this returns `None`.
    #[inline]
    pub fn allocate(&mut self, size: usize) -> Option<NodePtr> {
        self.from_space
            .bump(size)
            .map(|p| NodePtr::from_raw(p as *mut Header))
    }

    /// Runs a full Cheney collection: forwards every root (and, through
    /// them, every node reachable from a root), swaps the spaces, and
    /// satisfies `requested_size` atomically out of the newly-emptied
    /// from-space. Fails with [`GMachineError::OutOfHeap`] only if the
    /// triggering allocation still doesn't fit after the collection —
    /// matching spec.md §4.2, forwarding the live set itself can never
    /// overflow to-space, since to-space has the same capacity from-space
    /// had when the triggering allocation was attempted, and the live set
    /// is a subset of what from-space already held.
    pub fn collect(
        &mut self,
        roots: &mut Roots,
        requested_size: usize,
    ) -> Result<NodePtr, GMachineError> {
        self.to_space.reset();

        for slot in roots.globals.iter_mut() {
            if !slot.is_null() {
                *slot = self.copy(*slot);
            }
        }

        debug_assert_eq!(
            roots.current_sc.tag(),
            Tag::Supercomb,
            "the active supercombinator must never have been in-place rewritten to an Indirect"
        );
        *roots.current_sc = self.copy(*roots.current_sc);

        for slot in roots.stack.iter_mut() {
            *slot = self.copy(*slot);
        }

        self.reset_to_space_marks();

        std::mem::swap(&mut self.from_space, &mut self.to_space);

        self.from_space
            .bump(requested_size)
            .map(|p| NodePtr::from_raw(p as *mut Header))
            .ok_or(GMachineError::OutOfHeap)
    }

    /// Forwards a single node (and recursively, its children) into
    /// to-space, returning its new address. Mirrors `Storage.c`'s
    /// `copyNode`/`copy*Node` family: the per-tag "interior scan" runs
    /// inline, right after the `memcpy`, rather than during a later
    /// separate scan pass (spec.md §4.2's "interleaved implicitly").
    fn copy(&mut self, ptr: NodePtr) -> NodePtr {
        debug_assert!(!ptr.is_null());
        let header = ptr.header();
        if header.mark() == Mark::CopiedFrom {
            return header.forwarding_address();
        }

        let size = node_size(ptr);
        let dest_addr = self
            .to_space
            .bump(size)
            .expect("to-space cannot be smaller than the live set it must hold");
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr() as *const u8, dest_addr, size);
        }
        let dest = NodePtr::from_raw(dest_addr as *mut Header);

        header.set_mark(Mark::CopiedFrom);
        header.set_forwarding_address(dest);
        dest.header().set_mark(Mark::CopiedTo);

        match dest.tag() {
            Tag::Int | Tag::Supercomb => {}
            Tag::Ap => unsafe {
                let ap = dest.as_ap();
                (*ap).func = self.copy((*ap).func);
                (*ap).arg = self.copy((*ap).arg);
            },
            Tag::Indirect => unsafe {
                let ind: *mut IndirectNode = dest.as_indirect();
                // `dest` may still be null here: an `Alloc`-allocated cell
                // not yet filled in by its matching `Update` (spec.md
                // §4.3). Must not be dereferenced while null.
                if !(*ind).dest.is_null() {
                    (*ind).dest = self.copy((*ind).dest);
                }
            },
            Tag::Dump => unsafe {
                let d = dest.as_dump();
                debug_assert_eq!((*d).saved_sc.tag(), Tag::Supercomb);
                (*d).saved_sc = self.copy((*d).saved_sc);
            },
        }

        dest
    }

    /// Final housekeeping pass: walk to-space from its base up to the
    /// current copy pointer and reset every `CopiedTo` mark back to
    /// `Unreachable`. A well-formed collection never leaves any other
    /// mark in to-space by the time this runs, so this is defensive
    /// (spec.md §9's Open Question on `GC_UNREACHABLE`), matching
    /// `Storage.c`'s identical tail loop.
    fn reset_to_space_marks(&mut self) {
        let mut offset = 0usize;
        let used = self.to_space.used();
        while offset < used {
            let addr = unsafe { self.to_space.base().add(offset) } as *mut Header;
            let ptr = NodePtr::from_raw(addr);
            let size = node_size(ptr);
            ptr.header().set_mark(Mark::Unreachable);
            offset += size;
        }
    }
}
