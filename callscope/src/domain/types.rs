//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent passing a call ID where a thread ID is
//! expected, and make function signatures more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call ID
///
/// Unique per profiler instance, allocated in increasing order as calls are
/// observed. Used as the primary key of the record store and to link a call
/// to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread ID
///
/// Stable key the runtime hands each thread on first use. Not an OS thread
/// id: keys are small, dense and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tid(pub u64);

impl Tid {
    /// Key of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Tid(callscope_runtime::thread::current_key())
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Human-readable rendering of a duration given in seconds.
///
/// Sub-millisecond values are shown in microseconds, sub-second values in
/// milliseconds, everything else in seconds.
#[must_use]
pub fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs >= 1.0 {
        format!("{secs:.3}s")
    } else if secs >= 0.001 {
        format!("{:.3}ms", secs * 1_000.0)
    } else {
        format!("{:.1}µs", secs * 1_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_display() {
        assert_eq!(CallId(7).to_string(), "#7");
    }

    #[test]
    fn test_tid_display() {
        assert_eq!(Tid(3).to_string(), "TID:3");
    }

    #[test]
    fn test_current_tid_is_stable() {
        assert_eq!(Tid::current(), Tid::current());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1.5), "1.500s");
        assert_eq!(format_duration(0.0425), "42.500ms");
        assert_eq!(format_duration(0.000_012), "12.0µs");
        assert_eq!(format_duration(-1.0), "0.0µs");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&CallId(12)).unwrap(), "12");
        assert_eq!(serde_json::to_string(&Tid(2)).unwrap(), "2");
    }
}
