//! Trailing canary write/verify protocol.
//!
//! Every block gets [`CANARY_SIZE`] sentinel bytes immediately past the
//! user-requested payload, written at allocation time and read back at free
//! time. The value is derived per block from the address and requested size,
//! so a stray constant sprayed by the host program cannot accidentally match
//! a neighbouring block's canary.
//!
//! This module centralizes the `base + size` raw-offset arithmetic; no other
//! code offsets into a block.

use std::ptr;

/// Width of the sentinel appended past every payload.
pub const CANARY_SIZE: usize = 8;

/// Fixed mixing seed for canary derivation.
const CANARY_SEED: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// The sentinel value guarding one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canary {
    value: [u8; CANARY_SIZE],
}

impl Canary {
    /// Derives the canary for a block at `addr` with payload size `size`.
    ///
    /// XOR-fold of the seed with the block parameters; cheap, deterministic,
    /// and distinct for neighbouring blocks.
    #[must_use]
    pub fn for_block(addr: usize, size: usize) -> Self {
        let mixed = (addr as u64) ^ (size as u64).rotate_left(32) ^ CANARY_SEED;
        let folded = mixed ^ mixed.rotate_left(29);
        Self {
            value: folded.to_le_bytes(),
        }
    }

    /// The raw sentinel bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; CANARY_SIZE] {
        self.value
    }

    /// Checks a byte slice against this canary.
    #[must_use]
    pub fn verify(&self, bytes: &[u8; CANARY_SIZE]) -> bool {
        self.value == *bytes
    }

    /// Writes the sentinel at byte offset `size` past `base`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for writes of `size + CANARY_SIZE` bytes.
    pub unsafe fn write(&self, base: *mut u8, size: usize) {
        // SAFETY: caller guarantees the block extends CANARY_SIZE bytes past
        // the payload.
        unsafe {
            let canary_ptr = base.add(size);
            ptr::copy_nonoverlapping(self.value.as_ptr(), canary_ptr, CANARY_SIZE);
        }
    }

    /// Reads the sentinel region back and compares it against `self`.
    ///
    /// Returns `false` when the region was overwritten while the block was
    /// live (a wild write).
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads of `size + CANARY_SIZE` bytes.
    #[must_use]
    pub unsafe fn check(&self, base: *const u8, size: usize) -> bool {
        let mut actual = [0u8; CANARY_SIZE];
        // SAFETY: caller guarantees the canary region is readable; copy into
        // a stack buffer before comparing.
        unsafe {
            ptr::copy_nonoverlapping(base.add(size), actual.as_mut_ptr(), CANARY_SIZE);
        }
        self.verify(&actual)
    }
}
