//! Leak and heavy-hitter report lines.
//!
//! Both reports are pure readers of accumulated ledger state. The leak
//! report walks the still-live records; the heavy-hitter report ranks
//! lifetime allocation volume per call site, freed blocks included.

use std::fmt;

use crate::site::{AllocSite, SiteTable};

/// Share of `total_bytes` above which a site is always reported.
pub const HEAVY_HITTER_SHARE_PCT: f64 = 20.0;

/// Number of leading sites reported regardless of share.
pub const HEAVY_HITTER_TOP_N: usize = 5;

/// One still-live allocation at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leak {
    /// Address returned to the caller.
    pub addr: usize,
    /// Caller-requested payload size.
    pub size: usize,
    /// Provenance of the allocating call.
    pub site: AllocSite,
}

impl fmt::Display for Leak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LEAK CHECK: {}: allocated object {:#x} with size {}",
            self.site, self.addr, self.size
        )
    }
}

/// One ranked allocation site in the heavy-hitter report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeavyHitter {
    /// The allocation site.
    pub site: AllocSite,
    /// Lifetime bytes attributed to the site.
    pub bytes: u64,
    /// Lifetime allocation count at the site.
    pub count: u64,
    /// Share of all bytes ever allocated, in percent.
    pub share_pct: f64,
}

impl fmt::Display for HeavyHitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HEAVY HITTER: {}: {} bytes (~{:.1}%) in {} allocations",
            self.site, self.bytes, self.share_pct, self.count
        )
    }
}

/// Ranks allocation sites by lifetime byte volume.
///
/// Inclusion policy: every site whose share of `total_bytes` is at least
/// [`HEAVY_HITTER_SHARE_PCT`], and never fewer than the top
/// [`HEAVY_HITTER_TOP_N`] sites when any exist. Ordered by descending bytes,
/// ties broken by site so the report is deterministic.
#[must_use]
pub fn heavy_hitters(sites: &SiteTable, total_bytes: u64) -> Vec<HeavyHitter> {
    let mut hitters: Vec<HeavyHitter> = sites
        .iter()
        .map(|(&site, stats)| HeavyHitter {
            site,
            bytes: stats.bytes,
            count: stats.count,
            share_pct: if total_bytes == 0 {
                0.0
            } else {
                stats.bytes as f64 * 100.0 / total_bytes as f64
            },
        })
        .collect();

    hitters.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.site.cmp(&b.site)));

    let mut keep = 0;
    for (idx, hitter) in hitters.iter().enumerate() {
        if idx < HEAVY_HITTER_TOP_N || hitter.share_pct >= HEAVY_HITTER_SHARE_PCT {
            keep = idx + 1;
        } else {
            break;
        }
    }
    hitters.truncate(keep);
    hitters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leak_line_matches_contract() {
        let leak = Leak {
            addr: 0x7f00aa10,
            size: 20,
            site: AllocSite::new("x.c", 5),
        };
        assert_eq!(
            leak.to_string(),
            "LEAK CHECK: x.c:5: allocated object 0x7f00aa10 with size 20"
        );
    }

    #[test]
    fn heavy_hitter_line_names_share_and_count() {
        let hitter = HeavyHitter {
            site: AllocSite::new("hot.c", 12),
            bytes: 4096,
            count: 8,
            share_pct: 40.0,
        };
        assert_eq!(
            hitter.to_string(),
            "HEAVY HITTER: hot.c:12: 4096 bytes (~40.0%) in 8 allocations"
        );
    }

    #[test]
    fn sites_are_ranked_by_descending_bytes() {
        let mut table = SiteTable::new();
        table.record(AllocSite::new("a.c", 1), 100);
        table.record(AllocSite::new("b.c", 2), 300);
        table.record(AllocSite::new("c.c", 3), 200);

        let ranked = heavy_hitters(&table, 600);
        let bytes: Vec<u64> = ranked.iter().map(|h| h.bytes).collect();
        assert_eq!(bytes, vec![300, 200, 100]);
        assert!((ranked[0].share_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn sites_over_the_share_threshold_survive_past_top_n() {
        let mut table = SiteTable::new();
        // Six sites, all equal: each holds ~16.7%, so only the top five
        // report. Then one dominant site must appear even in seventh place.
        for line in 1..=6 {
            table.record(AllocSite::new("even.c", line), 100);
        }
        let ranked = heavy_hitters(&table, 600);
        assert_eq!(ranked.len(), HEAVY_HITTER_TOP_N);

        // A site holding >= 20% reports no matter how many sites outrank the
        // cutoff position.
        let mut table = SiteTable::new();
        for line in 1..=8 {
            table.record(AllocSite::new("even.c", line), 1000);
        }
        table.record(AllocSite::new("big.c", 1), 999);
        let total = 8 * 1000 + 999;
        // big.c sits in ninth place with ~11%: excluded.
        let ranked = heavy_hitters(&table, total);
        assert!(ranked.iter().all(|h| h.site.file != "big.c"));

        table.record(AllocSite::new("big.c", 1), 9000);
        let ranked = heavy_hitters(&table, total + 9000);
        assert!(ranked.iter().any(|h| h.site.file == "big.c"));
    }

    #[test]
    fn ties_break_deterministically_by_site() {
        let mut table = SiteTable::new();
        table.record(AllocSite::new("b.c", 9), 50);
        table.record(AllocSite::new("a.c", 9), 50);
        table.record(AllocSite::new("a.c", 3), 50);

        let ranked = heavy_hitters(&table, 150);
        let sites: Vec<String> = ranked.iter().map(|h| h.site.to_string()).collect();
        assert_eq!(sites, vec!["a.c:3", "a.c:9", "b.c:9"]);
    }

    #[test]
    fn zero_total_bytes_reports_zero_shares() {
        let mut table = SiteTable::new();
        table.record(AllocSite::new("z.c", 1), 0);
        table.record(AllocSite::new("z.c", 2), 0);

        let ranked = heavy_hitters(&table, 0);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|h| h.share_pct == 0.0));
    }

    #[test]
    fn empty_table_reports_nothing() {
        assert!(heavy_hitters(&SiteTable::new(), 0).is_empty());
    }
}
