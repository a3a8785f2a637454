//! The raw-allocator seam.
//!
//! The tracker treats the underlying allocator as an external collaborator:
//! it supplies raw, unchecked memory and is assumed correct. The trait exists
//! so tests can swap in a failing or call-counting allocator and prove, for
//! example, that overflow rejection never reaches the raw layer.

use std::alloc::Layout;

/// Alignment of every tracked block.
pub const BLOCK_ALIGN: usize = 16;

/// Source of raw, untracked memory.
pub trait RawAllocator {
    /// Allocates `layout.size()` bytes, or returns null on exhaustion.
    ///
    /// # Safety
    ///
    /// `layout` must have non-zero size.
    unsafe fn allocate(&self, layout: Layout) -> *mut u8;

    /// Releases a block previously returned by [`RawAllocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator with the same
    /// `layout`, and must not have been deallocated before.
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout);
}

/// The process's own allocator, via `std::alloc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRaw;

impl RawAllocator for SystemRaw {
    unsafe fn allocate(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller guarantees a non-zero layout size.
        unsafe { std::alloc::alloc(layout) }
    }

    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: caller guarantees ptr/layout came from allocate.
        unsafe { std::alloc::dealloc(ptr, layout) }
    }
}
