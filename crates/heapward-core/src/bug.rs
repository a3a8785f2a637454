//! Fatal misuse diagnostics.
//!
//! Heap misuse is reported as a value rather than aborted in place so tests
//! and the harness can observe it; the abi layer decides whether to
//! terminate the process. The `Display` strings are the literal diagnostic
//! contract: each names the free call site, the violation, and the offending
//! pointer.

use thiserror::Error;

use crate::site::AllocSite;

/// A detected heap-corruption or misuse bug.
///
/// These are disjoint from recoverable allocation failure (which is a plain
/// `None` return from the tracker): by the time one of these is produced the
/// host program has already violated a memory-safety invariant, and the only
/// safe continuation is to report and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryBug {
    /// The pointer was freed before and has not been reissued since.
    #[error("MEMORY BUG: {site}: invalid free of pointer {ptr:#x}, double free")]
    DoubleFree { site: AllocSite, ptr: usize },

    /// The trailing canary no longer matches: something wrote past the
    /// payload while the block was live.
    #[error("MEMORY BUG: {site}: detected wild write during free of pointer {ptr:#x}")]
    WildWrite { site: AllocSite, ptr: usize },

    /// The pointer lies outside every address the tracker ever returned.
    #[error("MEMORY BUG: {site}: invalid free of pointer {ptr:#x}, not in heap")]
    NotInHeap { site: AllocSite, ptr: usize },

    /// The pointer is inside the tracked heap range but was never the start
    /// of an allocation.
    #[error("MEMORY BUG: {site}: invalid free of pointer {ptr:#x}, not allocated")]
    NotAllocated { site: AllocSite, ptr: usize },
}

impl MemoryBug {
    /// The call site of the offending free.
    #[must_use]
    pub const fn site(&self) -> AllocSite {
        match self {
            Self::DoubleFree { site, .. }
            | Self::WildWrite { site, .. }
            | Self::NotInHeap { site, .. }
            | Self::NotAllocated { site, .. } => *site,
        }
    }

    /// The offending pointer value.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        match self {
            Self::DoubleFree { ptr, .. }
            | Self::WildWrite { ptr, .. }
            | Self::NotInHeap { ptr, .. }
            | Self::NotAllocated { ptr, .. } => *ptr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_free_message() {
        let bug = MemoryBug::DoubleFree {
            site: AllocSite::new("test014.c", 9),
            ptr: 0xffffffffffffff00,
        };
        assert_eq!(
            bug.to_string(),
            "MEMORY BUG: test014.c:9: invalid free of pointer 0xffffffffffffff00, double free"
        );
    }

    #[test]
    fn wild_write_message() {
        let bug = MemoryBug::WildWrite {
            site: AllocSite::new("test021.c", 10),
            ptr: 0x1000,
        };
        assert_eq!(
            bug.to_string(),
            "MEMORY BUG: test021.c:10: detected wild write during free of pointer 0x1000"
        );
    }

    #[test]
    fn invalid_free_messages_are_distinct() {
        let site = AllocSite::new("t.c", 1);
        let outside = MemoryBug::NotInHeap { site, ptr: 0x10 };
        let inside = MemoryBug::NotAllocated { site, ptr: 0x10 };
        assert!(outside.to_string().ends_with("not in heap"));
        assert!(inside.to_string().ends_with("not allocated"));
    }

    #[test]
    fn accessors_match_payload() {
        let site = AllocSite::new("t.c", 7);
        let bug = MemoryBug::NotAllocated { site, ptr: 0xabc };
        assert_eq!(bug.site(), site);
        assert_eq!(bug.pointer(), 0xabc);
    }
}
