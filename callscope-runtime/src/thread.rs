//! Stable thread identity.
//!
//! `std::thread::ThreadId` has no stable integer form, so each thread is
//! handed a process-unique `u64` key the first time it asks for one.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name reported for threads spawned without one.
pub const UNNAMED_THREAD: &str = "<unnamed>";

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static KEY: Cell<u64> = const { Cell::new(0) };
}

/// Key of the current thread. `0` only during thread-local teardown.
#[must_use]
pub fn current_key() -> u64 {
    KEY.try_with(|key| {
        if key.get() == 0 {
            key.set(NEXT_KEY.fetch_add(1, Ordering::Relaxed));
        }
        key.get()
    })
    .unwrap_or(0)
}

/// Name of the current thread as of now.
#[must_use]
pub fn current_name() -> String {
    std::thread::current().name().unwrap_or(UNNAMED_THREAD).to_string()
}
