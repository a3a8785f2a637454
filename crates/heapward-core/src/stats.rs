//! Aggregate allocation statistics.

use serde::{Deserialize, Serialize};

/// Immutable snapshot of the tracker's aggregate counters and heap bounds.
///
/// Safe to take at any time, including before the first allocation: until
/// then `heap_min` stays at its maximal sentinel and `heap_max` at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of currently live allocations.
    pub active_count: u64,
    /// Bytes currently live (payload sizes, canary overhead excluded).
    pub active_bytes: u64,
    /// Number of allocations ever made.
    pub total_count: u64,
    /// Bytes ever allocated.
    pub total_bytes: u64,
    /// Number of failed allocation attempts.
    pub fail_count: u64,
    /// Bytes requested by failed attempts.
    pub fail_bytes: u64,
    /// Smallest address ever returned.
    pub heap_min: usize,
    /// Largest payload-end address ever returned.
    pub heap_max: usize,
}

impl Statistics {
    /// The all-zero snapshot of a tracker that has never allocated.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            active_count: 0,
            active_bytes: 0,
            total_count: 0,
            total_bytes: 0,
            fail_count: 0,
            fail_bytes: 0,
            heap_min: usize::MAX,
            heap_max: 0,
        }
    }

    /// Renders the two-line `alloc count:` / `alloc size:` report.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "alloc count: active {:10}   total {:10}   fail {:10}\n\
             alloc size:  active {:10}   total {:10}   fail {:10}\n",
            self.active_count,
            self.total_count,
            self.fail_count,
            self.active_bytes,
            self.total_bytes,
            self.fail_bytes,
        )
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::empty()
    }
}
