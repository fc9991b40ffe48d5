//! Heap node layouts.
//!
//! Layouts mirror the reference interpreter's `Rts.h` structs field for
//! field (`IntNode`, `ApNode`, `IndirectNode`, `SupercombNode`, `DumpNode`),
//! translated into `#[repr(C)]` Rust with a [`Header`] prefix instead of the
//! C macro-expanded `NODE_HEADER`.
//!
//! Every node kind must be at least as large as [`IndirectNode`], since
//! `Update` may rewrite any local slot to an indirection in place
//! (spec.md §9) — the size table below guarantees this by construction.

use std::mem::size_of;

use crate::header::{Header, Tag};
use crate::instr::Instr;

/// A non-owning, possibly-null reference into the heap. Roots (the globals
/// table, `current_sc`, the value stack) are vectors of these; the heap is
/// the sole owner of the pointee.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodePtr(*mut Header);

impl NodePtr {
    pub const NULL: NodePtr = NodePtr(std::ptr::null_mut());

    #[inline(always)]
    pub fn from_raw(ptr: *mut Header) -> Self {
        NodePtr(ptr)
    }

    #[inline(always)]
    pub fn as_ptr(self) -> *mut Header {
        self.0
    }

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    #[inline(always)]
    pub fn header(self) -> &'static mut Header {
        debug_assert!(!self.is_null());
        unsafe { &mut *self.0 }
    }

    #[inline(always)]
    pub fn tag(self) -> Tag {
        self.header().tag()
    }

    #[inline(always)]
    pub fn as_int(self) -> *mut IntNode {
        self.0 as *mut IntNode
    }

    #[inline(always)]
    pub fn as_ap(self) -> *mut ApNode {
        self.0 as *mut ApNode
    }

    #[inline(always)]
    pub fn as_indirect(self) -> *mut IndirectNode {
        self.0 as *mut IndirectNode
    }

    #[inline(always)]
    pub fn as_supercomb(self) -> *mut SupercombNode {
        self.0 as *mut SupercombNode
    }

    #[inline(always)]
    pub fn as_dump(self) -> *mut DumpNode {
        self.0 as *mut DumpNode
    }

    /// Value of an `Int` node. Caller asserts the tag.
    #[inline(always)]
    pub fn int_value(self) -> i64 {
        unsafe { (*self.as_int()).value }
    }
}

#[repr(C)]
pub struct IntNode {
    pub header: Header,
    pub value: i64,
}

#[repr(C)]
pub struct ApNode {
    pub header: Header,
    pub func: NodePtr,
    pub arg: NodePtr,
}

#[repr(C)]
pub struct IndirectNode {
    pub header: Header,
    /// `NULL` transiently between `Alloc` and the `Update` that fills it;
    /// must not be dereferenced while null (spec.md §4.3, `Alloc`).
    pub dest: NodePtr,
}

#[repr(C)]
pub struct SupercombNode {
    pub header: Header,
    pub arity: i16,
    pub global_index: i16,
    pub num_instr: i32,
    // `num_instr` `Instr`s follow inline; see `code_ptr`/`code`.
}

impl SupercombNode {
    #[inline(always)]
    pub fn code_ptr(&self) -> *mut Instr {
        unsafe {
            (self as *const Self as *mut u8).add(size_of::<SupercombNode>()) as *mut Instr
        }
    }

    #[inline(always)]
    pub fn code(&self) -> &[Instr] {
        unsafe { std::slice::from_raw_parts(self.code_ptr(), self.num_instr as usize) }
    }

    /// Total size of this node including its trailing instruction array —
    /// the one node kind the per-tag size table (`fixed_node_size`) cannot
    /// cover on its own (spec.md §9).
    #[inline(always)]
    pub fn total_size(&self) -> usize {
        size_of::<SupercombNode>() + self.num_instr as usize * size_of::<Instr>()
    }
}

#[repr(C)]
pub struct DumpNode {
    pub header: Header,
    /// Index into the evaluator's stack to truncate back to on resumption
    /// (the Rust analogue of the reference's saved `Node **stackPtr`).
    pub saved_stack_base: u32,
    pub saved_sc: NodePtr,
    pub saved_pc_offset: i32,
    pub depth: i32,
}

/// Size, in bytes, of a node with this tag — *except* `Supercomb`, whose
/// size depends on `num_instr` and must be read from the object itself
/// (see [`SupercombNode::total_size`]). Callers must special-case `Supercomb`
/// before consulting this table.
pub fn fixed_node_size(tag: Tag) -> usize {
    match tag {
        Tag::Int => size_of::<IntNode>(),
        Tag::Ap => size_of::<ApNode>(),
        Tag::Indirect => size_of::<IndirectNode>(),
        Tag::Supercomb => size_of::<SupercombNode>(),
        Tag::Dump => size_of::<DumpNode>(),
    }
}

/// Size of the node currently at `ptr`, reading `num_instr` off it when it's
/// a `Supercomb`. Used uniformly by the collector and the allocator.
pub fn node_size(ptr: NodePtr) -> usize {
    let tag = ptr.tag();
    if tag == Tag::Supercomb {
        unsafe { (*ptr.as_supercomb()).total_size() }
    } else {
        fixed_node_size(tag)
    }
}
