//! Monotonic snapshot version counters
//!
//! Every cache build stamps its snapshot from a process-wide counter so
//! callers holding an older `Arc` can detect staleness without polling.
//!
//! # Memory Ordering
//!
//! Relaxed ordering is sufficient: the counters only need uniqueness and
//! monotonicity, they do not synchronize any other memory operations. The
//! sealed cache itself is published through the service's mutex.

use std::sync::atomic::{AtomicU64, Ordering};

static EFFECTIVE_VERSION: AtomicU64 = AtomicU64::new(0);
static CONTENT_VERSION: AtomicU64 = AtomicU64::new(0);

/// Next version for an effective-node-types snapshot
pub(crate) fn next_effective_version() -> u64 {
    EFFECTIVE_VERSION.fetch_add(1, Ordering::Relaxed) + 1
}

/// Next version for a content-types snapshot
pub(crate) fn next_content_version() -> u64 {
    CONTENT_VERSION.fetch_add(1, Ordering::Relaxed) + 1
}
