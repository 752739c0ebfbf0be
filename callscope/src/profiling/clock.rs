//! Profile clock and call ID source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::CallId;

/// Monotonic clock anchored at profile start.
#[derive(Debug, Clone, Copy)]
pub struct ProfileClock {
    start: Instant,
}

impl ProfileClock {
    /// Capture profile start.
    #[must_use]
    pub fn start_now() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds since profile start.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Thread-safe issuer of unique, increasing call IDs.
#[derive(Debug, Default)]
pub struct CallIdAllocator {
    next: AtomicU64,
}

impl CallIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> CallId {
        CallId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of IDs handed out so far.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
