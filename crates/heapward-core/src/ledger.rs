//! The metadata ledger: single source of truth for "is this pointer live,
//! and with what size and provenance".
//!
//! The ledger is pure bookkeeping. It never touches the memory it describes,
//! which is what lets the whole free-classification state machine be unit
//! tested with made-up addresses. The guard layer drives it around every raw
//! allocation and free.
//!
//! Per-address state machine: Unknown -> Live -> Freed. Freed -> Live happens
//! only when a fresh allocation legitimately reuses the address, at which
//! point the address leaves the freed set and a brand new record is created.

use std::collections::{HashMap, HashSet};

use crate::report::Leak;
use crate::site::{AllocSite, SiteTable};
use crate::stats::Statistics;

/// Metadata for one live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Caller-requested payload size in bytes. Immutable for the record's
    /// lifetime; canary overhead is not included.
    pub size: usize,
    /// Source location of the allocating call.
    pub site: AllocSite,
}

/// Classification of an incoming free, before any state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeClass {
    /// The address is live; the copied record is returned so the caller can
    /// verify the canary before committing the free.
    Live(AllocationRecord),
    /// The address sits in the freed set: double free.
    DoubleFree,
    /// The address lies outside every address range the tracker returned.
    NotInHeap,
    /// The address is inside the tracked heap range but is not the start of
    /// any live allocation.
    NotAllocated,
}

/// Address-keyed allocation metadata plus aggregate counters.
#[derive(Debug, Default)]
pub struct Ledger {
    records: HashMap<usize, AllocationRecord>,
    /// Addresses freed and not yet reissued by the raw allocator.
    freed: HashSet<usize>,
    heap_min: usize,
    heap_max: usize,
    total_count: u64,
    active_count: u64,
    total_bytes: u64,
    active_bytes: u64,
    fail_count: u64,
    fail_bytes: u64,
    sites: SiteTable,
}

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap_min: usize::MAX,
            ..Self::default()
        }
    }

    /// Registers a successful allocation of `size` bytes at `addr`.
    ///
    /// Clears `addr` from the freed set (the raw allocator may legitimately
    /// reissue an address), creates the record, widens the heap bounds, and
    /// bumps the allocation counters and the site's historical volume.
    pub fn record_alloc(&mut self, addr: usize, size: usize, site: AllocSite) {
        debug_assert!(
            !self.records.contains_key(&addr),
            "address {addr:#x} already live"
        );
        self.freed.remove(&addr);
        self.records.insert(addr, AllocationRecord { size, site });

        self.heap_min = self.heap_min.min(addr);
        self.heap_max = self.heap_max.max(addr + size);

        self.total_count += 1;
        self.active_count += 1;
        self.total_bytes += size as u64;
        self.active_bytes += size as u64;
        self.sites.record(site, size);
    }

    /// Registers a failed allocation attempt for `size` requested bytes.
    pub fn record_fail(&mut self, size: usize) {
        self.fail_count += 1;
        self.fail_bytes += size as u64;
    }

    /// Classifies an incoming free without changing any state.
    ///
    /// The freed set is consulted before the record map: an address that was
    /// freed and not reissued can never be live, and reporting it as a
    /// double free is strictly more useful than "not allocated".
    #[must_use]
    pub fn classify_free(&self, addr: usize) -> FreeClass {
        if self.freed.contains(&addr) {
            return FreeClass::DoubleFree;
        }
        if let Some(record) = self.records.get(&addr) {
            return FreeClass::Live(*record);
        }
        if addr < self.heap_min || addr > self.heap_max {
            FreeClass::NotInHeap
        } else {
            FreeClass::NotAllocated
        }
    }

    /// Commits the free of a live address: removes the record, moves the
    /// address into the freed set, and rolls the active counters back.
    ///
    /// Returns the removed record, or `None` if `addr` was not live (the
    /// caller should have classified first).
    pub fn finish_free(&mut self, addr: usize) -> Option<AllocationRecord> {
        let record = self.records.remove(&addr)?;
        self.active_count -= 1;
        self.active_bytes -= record.size as u64;
        self.freed.insert(addr);
        Some(record)
    }

    /// Looks up the live record for an address.
    #[must_use]
    pub fn record(&self, addr: usize) -> Option<&AllocationRecord> {
        self.records.get(&addr)
    }

    /// Number of currently live allocations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.records.len()
    }

    /// Snapshot of the aggregate counters and heap bounds.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            active_count: self.active_count,
            active_bytes: self.active_bytes,
            total_count: self.total_count,
            total_bytes: self.total_bytes,
            fail_count: self.fail_count,
            fail_bytes: self.fail_bytes,
            heap_min: self.heap_min,
            heap_max: self.heap_max,
        }
    }

    /// Every still-live allocation, ordered by address for deterministic
    /// reporting.
    #[must_use]
    pub fn leaks(&self) -> Vec<Leak> {
        let mut leaks: Vec<Leak> = self
            .records
            .iter()
            .map(|(&addr, record)| Leak {
                addr,
                size: record.size,
                site: record.site,
            })
            .collect();
        leaks.sort_by_key(|leak| leak.addr);
        leaks
    }

    /// The historical per-site volume table.
    #[must_use]
    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    /// Clears every record, the freed set, the bounds, the counters, and the
    /// site table (test isolation).
    pub fn reset(&mut self) {
        self.records.clear();
        self.freed.clear();
        self.heap_min = usize::MAX;
        self.heap_max = 0;
        self.total_count = 0;
        self.active_count = 0;
        self.total_bytes = 0;
        self.active_bytes = 0;
        self.fail_count = 0;
        self.fail_bytes = 0;
        self.sites.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> AllocSite {
        AllocSite::new("ledger_test.c", 1)
    }

    /// `active_bytes` must equal the sum of live record sizes and
    /// `active_count` the map population, at every step.
    fn assert_counter_invariant(ledger: &Ledger) {
        let stats = ledger.statistics();
        let live_bytes: u64 = ledger.leaks().iter().map(|l| l.size as u64).sum();
        assert_eq!(stats.active_bytes, live_bytes);
        assert_eq!(stats.active_count as usize, ledger.live_count());
    }

    #[test]
    fn stats_scenario_from_empty() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 100, site());
        ledger.record_alloc(0x2000, 50, site());
        assert_counter_invariant(&ledger);

        assert_eq!(ledger.classify_free(0x1000), FreeClass::Live(AllocationRecord {
            size: 100,
            site: site(),
        }));
        ledger.finish_free(0x1000).expect("live record");
        assert_counter_invariant(&ledger);

        let stats = ledger.statistics();
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.active_bytes, 50);
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.total_bytes, 150);
        assert_eq!(stats.fail_count, 0);
    }

    #[test]
    fn freed_address_classifies_as_double_free() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 8, site());
        ledger.finish_free(0x1000).unwrap();
        assert_eq!(ledger.classify_free(0x1000), FreeClass::DoubleFree);
    }

    #[test]
    fn reissued_address_leaves_the_freed_set() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 8, site());
        ledger.finish_free(0x1000).unwrap();

        // The raw allocator hands the same address out again.
        ledger.record_alloc(0x1000, 16, site());
        match ledger.classify_free(0x1000) {
            FreeClass::Live(record) => assert_eq!(record.size, 16),
            other => panic!("expected Live, got {other:?}"),
        }
    }

    #[test]
    fn unknown_pointers_split_on_heap_bounds() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 0x100, site());
        ledger.record_alloc(0x3000, 0x100, site());

        // Inside [heap_min, heap_max] but never the start of an allocation.
        assert_eq!(ledger.classify_free(0x2000), FreeClass::NotAllocated);
        // Outside the range entirely.
        assert_eq!(ledger.classify_free(0x10), FreeClass::NotInHeap);
        assert_eq!(ledger.classify_free(0x9000), FreeClass::NotInHeap);
    }

    #[test]
    fn bounds_only_widen_and_cover_payload_extent() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x2000, 0x80, site());
        let first = ledger.statistics();
        assert_eq!(first.heap_min, 0x2000);
        assert_eq!(first.heap_max, 0x2080);

        ledger.record_alloc(0x1000, 8, site());
        ledger.record_alloc(0x4000, 0x10, site());
        let stats = ledger.statistics();
        assert_eq!(stats.heap_min, 0x1000);
        assert_eq!(stats.heap_max, 0x4010);

        // Frees never shrink the bounds.
        ledger.finish_free(0x1000).unwrap();
        ledger.finish_free(0x4000).unwrap();
        let after = ledger.statistics();
        assert_eq!(after.heap_min, 0x1000);
        assert_eq!(after.heap_max, 0x4010);
    }

    #[test]
    fn failures_touch_only_the_failure_counters() {
        let mut ledger = Ledger::new();
        ledger.record_fail(1 << 40);
        ledger.record_fail(8);

        let stats = ledger.statistics();
        assert_eq!(stats.fail_count, 2);
        assert_eq!(stats.fail_bytes, (1 << 40) + 8);
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.active_count, 0);
        assert_counter_invariant(&ledger);
    }

    #[test]
    fn leaks_are_sorted_by_address() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x3000, 30, AllocSite::new("x.c", 5));
        ledger.record_alloc(0x1000, 10, AllocSite::new("x.c", 6));
        ledger.record_alloc(0x2000, 20, AllocSite::new("y.c", 7));

        let leaks = ledger.leaks();
        let addrs: Vec<usize> = leaks.iter().map(|l| l.addr).collect();
        assert_eq!(addrs, vec![0x1000, 0x2000, 0x3000]);
    }

    #[test]
    fn leak_report_only_names_live_blocks() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 10, AllocSite::new("x.c", 5));
        ledger.record_alloc(0x2000, 20, AllocSite::new("x.c", 6));
        ledger.finish_free(0x1000).unwrap();

        let leaks = ledger.leaks();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].addr, 0x2000);
        assert_eq!(leaks[0].size, 20);
        assert_eq!(leaks[0].site, AllocSite::new("x.c", 6));
    }

    #[test]
    fn reset_returns_to_the_empty_snapshot() {
        let mut ledger = Ledger::new();
        ledger.record_alloc(0x1000, 64, site());
        ledger.record_fail(4);
        ledger.reset();

        assert_eq!(ledger.statistics(), Statistics::empty());
        assert!(ledger.leaks().is_empty());
        assert!(ledger.sites().is_empty());
        // Post-reset, the old address is unknown again, not double-freed.
        assert_eq!(ledger.classify_free(0x1000), FreeClass::NotInHeap);
    }

    #[test]
    fn site_volume_survives_free() {
        let mut ledger = Ledger::new();
        let s = AllocSite::new("hot.c", 77);
        ledger.record_alloc(0x1000, 100, s);
        ledger.finish_free(0x1000).unwrap();

        let stats = ledger.sites().get(&s).expect("site recorded");
        assert_eq!(stats.bytes, 100);
        assert_eq!(stats.count, 1);
    }
}
