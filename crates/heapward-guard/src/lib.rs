//! # heapward-guard
//!
//! The interception layer of the heapward debugging allocator. This crate
//! owns the memory: it pads every allocation with a trailing canary, drives
//! the `heapward-core` ledger around the raw allocator, and turns detected
//! misuse into [`MemoryBug`](heapward_core::MemoryBug) values for the caller
//! to act on.
//!
//! All raw-pointer arithmetic is confined to [`canary`]; everything else in
//! the workspace is safe code.

#![allow(unsafe_code)]

pub mod canary;
pub mod config;
pub mod raw;
pub mod tracker;

pub use canary::{CANARY_SIZE, Canary};
pub use config::{BugPolicy, bug_policy, set_bug_policy};
pub use raw::{RawAllocator, SystemRaw};
pub use tracker::HeapTracker;
