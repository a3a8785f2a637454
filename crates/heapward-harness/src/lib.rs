//! Scenario harness for the heapward allocator.
//!
//! Each scenario drives a fresh [`heapward_guard::HeapTracker`] through a
//! short allocation story and checks the property that story is meant to
//! demonstrate. Runs can emit JSONL evidence records sealed with a SHA-256
//! digest so a report can be checked for truncation after the fact.

pub mod evidence;
pub mod scenario;

pub use evidence::{EvidenceLog, EvidenceRecord, Outcome};
pub use scenario::{run, ScenarioError, SCENARIOS};
