//! A single contiguous bump-allocated region, backed by an anonymous
//! `memmap2` mapping. This is the from/to-space building block for
//! [`crate::heap::Heap`]'s Cheney collector.
//!
//! Grounded on `examples/Starlight-JS-comet/src/bump_pointer_space.rs`
//! (`BumpPointerSpace`'s bump-pointer-over-a-mapped-region shape), stripped
//! of its atomics and block/TLAB machinery: this interpreter is
//! single-threaded (spec.md §5) and the heap is one contiguous region with
//! no sub-block structure.

use memmap2::MmapMut;

/// A bump-allocated byte region of fixed capacity. Does not itself know
/// about GC marks or node layout — [`crate::heap::Heap`] is responsible for
/// interpreting the bytes it hands out.
pub struct BumpPointerSpace {
    map: MmapMut,
    /// Offset of the next free byte, relative to `map`'s base.
    cursor: usize,
}

impl BumpPointerSpace {
    pub fn try_new(capacity: usize) -> std::io::Result<Self> {
        let map = MmapMut::map_anon(capacity)?;
        Ok(BumpPointerSpace { map, cursor: 0 })
    }

    #[cfg(test)]
    pub fn new(capacity: usize) -> Self {
        Self::try_new(capacity).expect("failed to map bump pointer space")
    }

    #[inline(always)]
    pub fn base(&self) -> *mut u8 {
        self.map.as_ptr() as *mut u8
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    #[inline(always)]
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Resets the bump pointer to the base, discarding all prior
    /// allocations without zeroing the bytes. Used after a collection has
    /// copied everything out of this space (now the old from-space).
    #[inline(always)]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Sets the bump pointer to an absolute offset from the base. Used by
    /// the collector to resume copying exactly where it left off after the
    /// evaluator's triggering allocation has been satisfied atomically with
    /// the collection (spec.md §4.2).
    #[inline(always)]
    pub fn set_used(&mut self, used: usize) {
        debug_assert!(used <= self.capacity());
        self.cursor = used;
    }

    /// Bump-allocates `size` bytes, returning their base address, or `None`
    /// if doing so would cross the end of the region. Pure arithmetic: does
    /// not itself trigger or know about garbage collection (spec.md §4.1).
    #[inline(always)]
    pub fn bump(&mut self, size: usize) -> Option<*mut u8> {
        let new_cursor = self.cursor + size;
        if new_cursor > self.capacity() {
            return None;
        }
        let addr = unsafe { self.base().add(self.cursor) };
        self.cursor = new_cursor;
        Some(addr)
    }

    #[inline(always)]
    pub fn contains(&self, addr: *const u8) -> bool {
        let base = self.base() as usize;
        let p = addr as usize;
        p >= base && p < base + self.capacity()
    }
}
