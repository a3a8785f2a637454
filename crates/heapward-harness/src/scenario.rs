//! Named allocation scenarios, each checking one property of the tracker.

use heapward_core::{AllocSite, MemoryBug};
use heapward_guard::HeapTracker;
use thiserror::Error;

/// Every scenario the harness knows how to run, in listing order.
pub const SCENARIOS: &[&str] = &[
    "stats",
    "leaks",
    "heavy-hitters",
    "double-free",
    "wild-write",
    "calloc-overflow",
];

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unknown scenario `{0}`")]
    Unknown(String),
    #[error("scenario `{name}` failed: {reason}")]
    Failed { name: &'static str, reason: String },
}

fn failed(name: &'static str, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::Failed {
        name,
        reason: reason.into(),
    }
}

/// Runs one scenario by name and returns the report lines it produced.
pub fn run(name: &str) -> Result<Vec<String>, ScenarioError> {
    match name {
        "stats" => stats(),
        "leaks" => leaks(),
        "heavy-hitters" => heavy_hitters(),
        "double-free" => double_free(),
        "wild-write" => wild_write(),
        "calloc-overflow" => calloc_overflow(),
        other => Err(ScenarioError::Unknown(other.to_owned())),
    }
}

/// Two allocations and one free must leave exactly one live block and the
/// matching byte counters.
fn stats() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "stats";
    let tracker = HeapTracker::new();
    let a = tracker
        .allocate(100, AllocSite::new("stats.c", 10))
        .ok_or_else(|| failed(NAME, "allocation of 100 bytes failed"))?;
    let _b = tracker
        .allocate(50, AllocSite::new("stats.c", 11))
        .ok_or_else(|| failed(NAME, "allocation of 50 bytes failed"))?;
    tracker
        .release(a.as_ptr(), AllocSite::new("stats.c", 12))
        .map_err(|bug| failed(NAME, format!("unexpected bug: {bug}")))?;

    let stats = tracker.statistics();
    let got = (
        stats.active_count,
        stats.active_bytes,
        stats.total_count,
        stats.total_bytes,
        stats.fail_count,
    );
    if got != (1, 50, 2, 150, 0) {
        return Err(failed(NAME, format!("counters off: {got:?}")));
    }
    Ok(stats.render().lines().map(str::to_owned).collect())
}

/// Freeing one of two blocks must leave the other, and only the other, in
/// the leak report.
fn leaks() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "leaks";
    let tracker = HeapTracker::new();
    let a = tracker
        .allocate(10, AllocSite::new("leaks.c", 5))
        .ok_or_else(|| failed(NAME, "allocation of 10 bytes failed"))?;
    let _b = tracker
        .allocate(20, AllocSite::new("leaks.c", 9))
        .ok_or_else(|| failed(NAME, "allocation of 20 bytes failed"))?;
    tracker
        .release(a.as_ptr(), AllocSite::new("leaks.c", 6))
        .map_err(|bug| failed(NAME, format!("unexpected bug: {bug}")))?;

    let leaks = tracker.leak_report();
    match leaks.as_slice() {
        [only] if only.size == 20 && only.site == AllocSite::new("leaks.c", 9) => {
            Ok(leaks.iter().map(|leak| leak.to_string()).collect())
        }
        other => Err(failed(NAME, format!("wrong leak set: {} entries", other.len()))),
    }
}

/// The dominant call site must come out first in the heavy hitter report
/// with a share above the reporting threshold.
fn heavy_hitters() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "heavy-hitters";
    let tracker = HeapTracker::new();
    let plan: &[(AllocSite, usize, usize)] = &[
        (AllocSite::new("parser.c", 42), 4096, 6),
        (AllocSite::new("io.c", 7), 512, 3),
        (AllocSite::new("util.c", 99), 128, 1),
    ];
    for &(site, size, count) in plan {
        for _ in 0..count {
            tracker
                .allocate(size, site)
                .ok_or_else(|| failed(NAME, format!("allocation of {size} bytes failed")))?;
        }
    }

    let report = tracker.heavy_hitter_report();
    let Some(top) = report.first() else {
        return Err(failed(NAME, "report came back empty"));
    };
    if top.site != AllocSite::new("parser.c", 42) || top.share_pct < 20.0 {
        return Err(failed(
            NAME,
            format!("wrong leader: {} at {:.1}%", top.site, top.share_pct),
        ));
    }
    Ok(report.iter().map(|hh| hh.to_string()).collect())
}

/// Releasing the same pointer twice must be classified as a double free
/// and must not disturb the counters.
fn double_free() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "double-free";
    let tracker = HeapTracker::new();
    let ptr = tracker
        .allocate(64, AllocSite::new("double_free.c", 8))
        .ok_or_else(|| failed(NAME, "allocation of 64 bytes failed"))?;
    tracker
        .release(ptr.as_ptr(), AllocSite::new("double_free.c", 9))
        .map_err(|bug| failed(NAME, format!("first free reported a bug: {bug}")))?;

    let bug = tracker
        .release(ptr.as_ptr(), AllocSite::new("double_free.c", 10))
        .err()
        .ok_or_else(|| failed(NAME, "second free of the same pointer succeeded"))?;
    if !matches!(bug, MemoryBug::DoubleFree { .. }) {
        return Err(failed(NAME, format!("misclassified as: {bug}")));
    }
    let stats = tracker.statistics();
    if stats.active_count != 0 || stats.total_count != 1 {
        return Err(failed(NAME, "double free disturbed the counters"));
    }
    Ok(vec![bug.to_string()])
}

/// Flipping a byte just past the payload must trip the canary check on
/// free.
fn wild_write() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "wild-write";
    let tracker = HeapTracker::new();
    let size = 24;
    let ptr = tracker
        .allocate(size, AllocSite::new("wild_write.c", 14))
        .ok_or_else(|| failed(NAME, "allocation of 24 bytes failed"))?;
    // SAFETY: the canary padding keeps the byte just past the payload
    // inside the underlying block.
    unsafe {
        let past_end = ptr.as_ptr().add(size);
        past_end.write(past_end.read() ^ 0x5A);
    }

    let bug = tracker
        .release(ptr.as_ptr(), AllocSite::new("wild_write.c", 15))
        .err()
        .ok_or_else(|| failed(NAME, "free of the corrupted block succeeded"))?;
    if !matches!(bug, MemoryBug::WildWrite { .. }) {
        return Err(failed(NAME, format!("misclassified as: {bug}")));
    }
    Ok(vec![bug.to_string()])
}

/// A count-times-size overflow must be refused and counted as a failed
/// request, never handed to the underlying allocator.
fn calloc_overflow() -> Result<Vec<String>, ScenarioError> {
    const NAME: &str = "calloc-overflow";
    let tracker = HeapTracker::new();
    let site = AllocSite::new("calloc_overflow.c", 3);
    if tracker.allocate_zeroed(usize::MAX, 2, site).is_some() {
        return Err(failed(NAME, "overflowing request was granted"));
    }

    let stats = tracker.statistics();
    if stats.fail_count != 1 || stats.fail_bytes != 2 || stats.total_count != 0 {
        return Err(failed(
            NAME,
            format!(
                "counters off: fail {}/{} total {}",
                stats.fail_count, stats.fail_bytes, stats.total_count
            ),
        ));
    }
    Ok(vec![format!(
        "refused {} x {} byte request, fail count {}",
        usize::MAX,
        2,
        stats.fail_count
    )])
}
