//! The tracked allocator.
//!
//! [`HeapTracker`] sits between the host program and a raw allocator. Every
//! allocation is padded with a trailing canary and registered in the
//! `heapward-core` ledger; every free is classified against the ledger and
//! the canary before the block goes back to the raw layer. The whole tracker
//! state is guarded by one mutex, so each operation is atomic and readers
//! observe a consistent snapshot.

use std::alloc::Layout;
use std::ptr::NonNull;

use parking_lot::Mutex;

use heapward_core::{
    AllocSite, FreeClass, HeavyHitter, Leak, Ledger, MemoryBug, Statistics, heavy_hitters,
};

use crate::canary::{CANARY_SIZE, Canary};
use crate::raw::{BLOCK_ALIGN, RawAllocator, SystemRaw};

/// Layout of the raw block backing a `size`-byte payload, or `None` when
/// `size + CANARY_SIZE` is not representable.
fn block_layout(size: usize) -> Option<Layout> {
    let total = size.checked_add(CANARY_SIZE)?;
    Layout::from_size_align(total, BLOCK_ALIGN).ok()
}

/// A canary-guarded, provenance-tracking allocator.
///
/// Construct one per process (or per test); all methods take `&self`.
/// Recoverable allocation failure is a `None` return; detected misuse is an
/// `Err(MemoryBug)` so the caller decides whether to terminate.
pub struct HeapTracker<R: RawAllocator = SystemRaw> {
    raw: R,
    ledger: Mutex<Ledger>,
}

impl HeapTracker<SystemRaw> {
    /// Creates a tracker over the process's own allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_raw(SystemRaw)
    }
}

impl Default for HeapTracker<SystemRaw> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawAllocator> HeapTracker<R> {
    /// Creates a tracker over a caller-supplied raw allocator.
    pub fn with_raw(raw: R) -> Self {
        Self {
            raw,
            ledger: Mutex::new(Ledger::new()),
        }
    }

    /// The raw allocator behind this tracker.
    pub fn raw(&self) -> &R {
        &self.raw
    }

    /// Allocates `size` bytes of uninitialized memory and registers the
    /// block.
    ///
    /// Returns `None` (and counts the failure) when the padded size is not
    /// representable or the raw allocator is exhausted; the failure counters
    /// record the *requested* size, not the padded one. `size == 0` still
    /// yields a unique, freeable pointer: the canary padding makes the raw
    /// request non-zero.
    pub fn allocate(&self, size: usize, site: AllocSite) -> Option<NonNull<u8>> {
        let Some(layout) = block_layout(size) else {
            self.ledger.lock().record_fail(size);
            return None;
        };

        // SAFETY: the canary padding makes the layout size non-zero.
        let ptr = unsafe { self.raw.allocate(layout) };
        if ptr.is_null() {
            self.ledger.lock().record_fail(size);
            return None;
        }

        let addr = ptr as usize;
        // SAFETY: the raw block spans size + CANARY_SIZE bytes.
        unsafe { Canary::for_block(addr, size).write(ptr, size) };

        self.ledger.lock().record_alloc(addr, size, site);
        NonNull::new(ptr)
    }

    /// Allocates a zero-filled array of `count` elements of `elem_size`
    /// bytes.
    ///
    /// Multiplication overflow is rejected before the raw allocator is ever
    /// consulted; the failure counters record the element size, the only
    /// representable operand of an unrepresentable request.
    pub fn allocate_zeroed(
        &self,
        count: usize,
        elem_size: usize,
        site: AllocSite,
    ) -> Option<NonNull<u8>> {
        let Some(total) = count.checked_mul(elem_size) else {
            self.ledger.lock().record_fail(elem_size);
            return None;
        };

        let ptr = self.allocate(total, site)?;
        // SAFETY: allocate returned a block valid for `total` writes.
        unsafe { ptr.as_ptr().write_bytes(0, total) };
        Some(ptr)
    }

    /// Releases a previously allocated, still-live pointer.
    ///
    /// Null is a no-op. Everything else is classified: a pointer in the
    /// freed set is a double free, a live pointer has its canary verified
    /// before the block returns to the raw allocator, and an unknown pointer
    /// is split on the heap bounds into "not in heap" / "not allocated".
    /// On `Err` no counters change and the block (if any) stays live.
    pub fn release(&self, ptr: *mut u8, site: AllocSite) -> Result<(), MemoryBug> {
        if ptr.is_null() {
            return Ok(());
        }
        let addr = ptr as usize;

        let mut ledger = self.ledger.lock();
        match ledger.classify_free(addr) {
            FreeClass::DoubleFree => Err(MemoryBug::DoubleFree { site, ptr: addr }),
            FreeClass::NotInHeap => Err(MemoryBug::NotInHeap { site, ptr: addr }),
            FreeClass::NotAllocated => Err(MemoryBug::NotAllocated { site, ptr: addr }),
            FreeClass::Live(record) => {
                let canary = Canary::for_block(addr, record.size);
                // SAFETY: the record is live, so the block is still valid for
                // record.size + CANARY_SIZE bytes of reads.
                let intact = unsafe { canary.check(ptr.cast_const(), record.size) };
                if !intact {
                    return Err(MemoryBug::WildWrite { site, ptr: addr });
                }

                ledger.finish_free(addr);
                let layout = block_layout(record.size).expect("valid layout");
                // SAFETY: the block came from our raw allocator with this
                // exact layout and was live until this point.
                unsafe { self.raw.deallocate(ptr, layout) };
                Ok(())
            }
        }
    }

    /// Snapshot of the aggregate counters and heap bounds.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.ledger.lock().statistics()
    }

    /// Every still-live allocation, ordered by address.
    #[must_use]
    pub fn leak_report(&self) -> Vec<Leak> {
        self.ledger.lock().leaks()
    }

    /// Allocation sites ranked by lifetime byte volume (freed blocks
    /// included).
    #[must_use]
    pub fn heavy_hitter_report(&self) -> Vec<HeavyHitter> {
        let ledger = self.ledger.lock();
        heavy_hitters(ledger.sites(), ledger.statistics().total_bytes)
    }

    /// Releases every still-live block back to the raw allocator and clears
    /// all tracking state (test isolation, clean shutdown under leak
    /// checkers).
    pub fn reset(&self) {
        let mut ledger = self.ledger.lock();
        for leak in ledger.leaks() {
            let layout = block_layout(leak.size).expect("valid layout");
            // SAFETY: every ledger record corresponds to a live raw block
            // allocated with this layout.
            unsafe { self.raw.deallocate(leak.addr as *mut u8, layout) };
        }
        ledger.reset();
    }
}

impl<R: RawAllocator> Drop for HeapTracker<R> {
    fn drop(&mut self) {
        self.reset();
    }
}
