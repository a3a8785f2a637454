//! Allocation-site provenance and the historical per-site volume table.
//!
//! Every allocation request carries an [`AllocSite`] naming the source
//! location it came from. The [`SiteTable`] accumulates lifetime volume per
//! site (bytes and count, freed blocks included) and feeds the heavy-hitter
//! report; it is never decremented.

use std::collections::HashMap;
use std::fmt;

/// Source location of an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocSite {
    /// Source file of the allocating call.
    pub file: &'static str,
    /// Source line of the allocating call.
    pub line: u32,
}

impl AllocSite {
    /// Build a site from explicit file/line values.
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Capture the caller's own source location.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Lifetime allocation volume attributed to one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    /// Total bytes ever requested from this site.
    pub bytes: u64,
    /// Total number of allocations ever made from this site.
    pub count: u64,
}

/// Historical volume table, site -> [`SiteStats`].
///
/// Only successful allocations are recorded. Frees do not subtract: the
/// heavy-hitter report ranks lifetime volume, not live volume.
#[derive(Debug, Default)]
pub struct SiteTable {
    sites: HashMap<AllocSite, SiteStats>,
}

impl SiteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `bytes` (one allocation) to `site`.
    pub fn record(&mut self, site: AllocSite, bytes: usize) {
        let stats = self.sites.entry(site).or_default();
        stats.bytes += bytes as u64;
        stats.count += 1;
    }

    /// Looks up the accumulated stats for a site.
    #[must_use]
    pub fn get(&self, site: &AllocSite) -> Option<SiteStats> {
        self.sites.get(site).copied()
    }

    /// Iterates over every site with its accumulated stats.
    pub fn iter(&self) -> impl Iterator<Item = (&AllocSite, &SiteStats)> {
        self.sites.iter()
    }

    /// Number of distinct sites seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True if no allocation has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Drops every site (test isolation).
    pub fn clear(&mut self) {
        self.sites.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_per_site() {
        let mut table = SiteTable::new();
        let site = AllocSite::new("x.c", 5);
        table.record(site, 100);
        table.record(site, 50);

        let stats = table.get(&site).expect("site should exist");
        assert_eq!(stats.bytes, 150);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn distinct_sites_stay_separate() {
        let mut table = SiteTable::new();
        table.record(AllocSite::new("a.c", 1), 10);
        table.record(AllocSite::new("a.c", 2), 20);
        table.record(AllocSite::new("b.c", 1), 30);

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&AllocSite::new("a.c", 2)).unwrap().bytes, 20);
    }

    #[test]
    fn zero_size_allocations_still_count() {
        let mut table = SiteTable::new();
        let site = AllocSite::new("z.c", 9);
        table.record(site, 0);
        table.record(site, 0);

        let stats = table.get(&site).unwrap();
        assert_eq!(stats.bytes, 0);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn caller_captures_this_file() {
        let site = AllocSite::caller();
        assert!(site.file.ends_with("site.rs"));
        assert!(site.line > 0);
    }

    #[test]
    fn display_is_file_colon_line() {
        let site = AllocSite::new("main.c", 42);
        assert_eq!(site.to_string(), "main.c:42");
    }
}
