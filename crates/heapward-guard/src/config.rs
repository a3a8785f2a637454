//! Runtime bug-policy configuration.
//!
//! The policy is set via the `HEAPWARD_ON_BUG` environment variable:
//! - `abort` (default): the abi layer prints the diagnostic and terminates
//!   the process with non-zero status. A detected bug means the heap is
//!   already corrupt; there is no safe continuation.
//! - `report`: the diagnostic is printed but the process continues. For the
//!   harness and for test runners that must observe fatal conditions without
//!   dying.

use std::sync::atomic::{AtomicU8, Ordering};

/// What the interception surface does when a [`MemoryBug`] is detected.
///
/// [`MemoryBug`]: heapward_core::MemoryBug
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BugPolicy {
    /// Print the diagnostic and terminate the process (exit status 1).
    #[default]
    Abort,
    /// Print the diagnostic and continue.
    Report,
}

impl BugPolicy {
    /// Parse from string (case-insensitive). Unknown values fall back to
    /// `Abort`, the safe default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "report" | "observe" | "continue" => Self::Report,
            _ => Self::Abort,
        }
    }

    /// True if a detected bug ends the process.
    #[must_use]
    pub const fn terminates(self) -> bool {
        matches!(self, Self::Abort)
    }
}

// Atomic cache: 0=unresolved, 1=Abort, 2=Report, 255=resolving. A
// non-blocking state machine instead of OnceLock so a reentrant call during
// env resolution cannot deadlock; it sees RESOLVING and gets the default.
static CACHED_POLICY: AtomicU8 = AtomicU8::new(0);

const POLICY_UNRESOLVED: u8 = 0;
const POLICY_ABORT: u8 = 1;
const POLICY_REPORT: u8 = 2;
const POLICY_RESOLVING: u8 = 255;

fn policy_to_u8(policy: BugPolicy) -> u8 {
    match policy {
        BugPolicy::Abort => POLICY_ABORT,
        BugPolicy::Report => POLICY_REPORT,
    }
}

fn u8_to_policy(v: u8) -> BugPolicy {
    match v {
        POLICY_REPORT => BugPolicy::Report,
        _ => BugPolicy::Abort,
    }
}

/// The configured bug policy (reads the env var on first call, caches
/// thereafter).
#[must_use]
pub fn bug_policy() -> BugPolicy {
    let cached = CACHED_POLICY.load(Ordering::Relaxed);
    if cached != POLICY_UNRESOLVED && cached != POLICY_RESOLVING {
        return u8_to_policy(cached);
    }
    if cached == POLICY_RESOLVING {
        return BugPolicy::Abort;
    }

    if CACHED_POLICY
        .compare_exchange(
            POLICY_UNRESOLVED,
            POLICY_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        // Lost the race; whoever won either finished or is resolving.
        let now = CACHED_POLICY.load(Ordering::Relaxed);
        return if now == POLICY_RESOLVING || now == POLICY_UNRESOLVED {
            BugPolicy::Abort
        } else {
            u8_to_policy(now)
        };
    }

    let resolved = match std::env::var("HEAPWARD_ON_BUG") {
        Ok(raw) => BugPolicy::from_str_loose(&raw),
        Err(_) => BugPolicy::Abort,
    };
    CACHED_POLICY.store(policy_to_u8(resolved), Ordering::SeqCst);
    resolved
}

/// Overrides the policy for the rest of the process. Intended for the
/// harness and tests; later env changes are not re-read.
pub fn set_bug_policy(policy: BugPolicy) {
    CACHED_POLICY.store(policy_to_u8(policy), Ordering::SeqCst);
}
