//! # heapward-core
//!
//! Safe bookkeeping engine for the heapward debugging allocator.
//!
//! This crate holds everything about an allocation except the memory itself:
//! the metadata ledger keyed by address, the freed-address set used to tell a
//! double free from a pointer we have never seen, the heap bounds, the
//! aggregate counters, and the per-site volume table behind the heavy-hitter
//! report. No `unsafe` code is permitted at the crate level; raw memory and
//! the canary protocol live in `heapward-guard`.

#![deny(unsafe_code)]

pub mod bug;
pub mod ledger;
pub mod report;
pub mod site;
pub mod stats;

pub use bug::MemoryBug;
pub use ledger::{AllocationRecord, FreeClass, Ledger};
pub use report::{HeavyHitter, Leak, heavy_hitters};
pub use site::{AllocSite, SiteStats, SiteTable};
pub use stats::Statistics;
