//! # heapward-abi
//!
//! C-callable boundary for the heapward debugging allocator. A program
//! harness links these in place of `malloc`/`calloc`/`free` (typically via a
//! header that macro-expands call sites into `hw_malloc(sz, __FILE__,
//! __LINE__)` and friends), and gets every allocation routed through one
//! process-global [`HeapTracker`].
//!
//! Fatal diagnostics go to stderr in the `MEMORY BUG:` format; under the
//! default `abort` policy ([`heapward_guard::bug_policy`]) the process then
//! terminates with non-zero status. Unlike a `GlobalAlloc` replacement,
//! this layer does not intercept Rust's own allocator, so there is no
//! reentrancy hazard to guard against.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, OnceLock};

use libc::{c_char, c_long, c_void};

use heapward_core::{AllocSite, MemoryBug, Statistics};
use heapward_guard::{HeapTracker, bug_policy};

static TRACKER: OnceLock<HeapTracker> = OnceLock::new();

/// The process-global tracker behind the extern surface.
pub fn global_tracker() -> &'static HeapTracker {
    TRACKER.get_or_init(HeapTracker::new)
}

// File-name C strings arrive as pointers to static literals baked in by the
// call-site macros. Intern each distinct pointer once so records hold
// zero-copy `&'static str` provenance.
static FILE_NAMES: OnceLock<Mutex<HashMap<usize, &'static str>>> = OnceLock::new();

fn intern_file(file: *const c_char) -> &'static str {
    if file.is_null() {
        return "<unknown>";
    }
    let mut cache = FILE_NAMES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *cache.entry(file as usize).or_insert_with(|| {
        // SAFETY: caller passes a nul-terminated string (checked non-null
        // above) that outlives the call.
        let name = unsafe { CStr::from_ptr(file) };
        Box::leak(name.to_string_lossy().into_owned().into_boxed_str())
    })
}

fn site_from(file: *const c_char, line: c_long) -> AllocSite {
    AllocSite::new(intern_file(file), u32::try_from(line).unwrap_or(0))
}

fn report_bug(bug: MemoryBug) {
    eprintln!("{bug}");
    if bug_policy().terminates() {
        std::process::exit(1);
    }
}

/// Statistics snapshot in a C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwStatistics {
    pub active_count: u64,
    pub active_bytes: u64,
    pub total_count: u64,
    pub total_bytes: u64,
    pub fail_count: u64,
    pub fail_bytes: u64,
    pub heap_min: usize,
    pub heap_max: usize,
}

impl From<Statistics> for HwStatistics {
    fn from(s: Statistics) -> Self {
        Self {
            active_count: s.active_count,
            active_bytes: s.active_bytes,
            total_count: s.total_count,
            total_bytes: s.total_bytes,
            fail_count: s.fail_count,
            fail_bytes: s.fail_bytes,
            heap_min: s.heap_min,
            heap_max: s.heap_max,
        }
    }
}

/// Allocates `size` bytes of tracked, uninitialized memory.
///
/// Returns null on failure; the failure is counted. The allocation request
/// was at `file`:`line`.
///
/// # Safety
///
/// `file` must be null or a nul-terminated string that outlives the call.
/// The caller must eventually `hw_free` the returned pointer exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hw_malloc(size: usize, file: *const c_char, line: c_long) -> *mut c_void {
    match global_tracker().allocate(size, site_from(file, line)) {
        Some(ptr) => ptr.as_ptr().cast(),
        None => std::ptr::null_mut(),
    }
}

/// Allocates zero-filled memory for `count` elements of `size` bytes each.
///
/// Returns null if the multiplication overflows or allocation fails; either
/// way the failure is counted and the raw allocator is not consulted on
/// overflow.
///
/// # Safety
///
/// Same contract as [`hw_malloc`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hw_calloc(
    count: usize,
    size: usize,
    file: *const c_char,
    line: c_long,
) -> *mut c_void {
    match global_tracker().allocate_zeroed(count, size, site_from(file, line)) {
        Some(ptr) => ptr.as_ptr().cast(),
        None => std::ptr::null_mut(),
    }
}

/// Frees a pointer previously returned by [`hw_malloc`] / [`hw_calloc`].
///
/// Null is a no-op. Double frees, pointers outside the tracked heap,
/// untracked pointers inside it, and canary corruption all print a
/// `MEMORY BUG:` diagnostic; under the `abort` policy the process then
/// exits with status 1.
///
/// # Safety
///
/// `file` must be null or a nul-terminated string that outlives the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hw_free(ptr: *mut c_void, file: *const c_char, line: c_long) {
    if let Err(bug) = global_tracker().release(ptr.cast(), site_from(file, line)) {
        report_bug(bug);
    }
}

/// Stores the current statistics snapshot in `*out`.
///
/// # Safety
///
/// `out` must be a valid pointer to an `HwStatistics`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hw_get_statistics(out: *mut HwStatistics) {
    let stats = HwStatistics::from(global_tracker().statistics());
    // SAFETY: caller guarantees `out` points to writable HwStatistics.
    unsafe { out.write(stats) };
}

/// Prints the two-line statistics report to stdout.
#[unsafe(no_mangle)]
pub extern "C" fn hw_print_statistics() {
    print!("{}", global_tracker().statistics().render());
}

/// Prints one `LEAK CHECK:` line per still-live allocation, ordered by
/// address.
#[unsafe(no_mangle)]
pub extern "C" fn hw_print_leak_report() {
    for leak in global_tracker().leak_report() {
        println!("{leak}");
    }
}

/// Prints the `HEAVY HITTER:` ranking of allocation sites by lifetime byte
/// volume.
#[unsafe(no_mangle)]
pub extern "C" fn hw_print_heavy_hitter_report() {
    for hitter in global_tracker().heavy_hitter_report() {
        println!("{hitter}");
    }
}

/// Releases every live block and clears all tracking state.
#[unsafe(no_mangle)]
pub extern "C" fn hw_reset() {
    global_tracker().reset();
}
