//! Call record data model
//!
//! This module contains the data structures shared by the profiler, the
//! analysis functions and the exporters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CallId, Tid};

/// Wire shape of a record:
/// `(id, parent_id, thread_id, start_time, end_time, qualified_name, file, line)`.
pub type WireRecord = (u64, Option<u64>, u64, f64, Option<f64>, String, String, u32);

/// One observed call.
///
/// Written by the hook on entry, finalized on return, and frozen when the
/// profiler stops (calls still open at that point are closed at the profile
/// duration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireRecord", from = "WireRecord")]
pub struct CallRecord {
    pub call_id: CallId,
    /// Enclosing call on the same thread, `None` for the roots of a thread.
    pub parent_id: Option<CallId>,
    pub thread_id: Tid,
    /// Seconds since profile start.
    pub start_time: f64,
    /// Seconds since profile start; `None` while the call is in progress.
    pub end_time: Option<f64>,
    /// `Type.method`, `function`, or `C:native`.
    pub qualified_name: String,
    pub file: String,
    pub line: u32,
}

impl CallRecord {
    /// Wall time spent in this call, if it has finished.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| (end - self.start_time).max(0.0))
    }

    /// Whether `other`'s interval lies within this record's interval.
    #[must_use]
    pub fn contains(&self, other: &CallRecord) -> bool {
        match (self.end_time, other.end_time) {
            (Some(end), Some(other_end)) => self.start_time <= other.start_time && other_end <= end,
            _ => false,
        }
    }

    /// `file:line` for display.
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

impl From<CallRecord> for WireRecord {
    fn from(r: CallRecord) -> Self {
        (
            r.call_id.0,
            r.parent_id.map(|p| p.0),
            r.thread_id.0,
            r.start_time,
            r.end_time,
            r.qualified_name,
            r.file,
            r.line,
        )
    }
}

impl From<WireRecord> for CallRecord {
    fn from(w: WireRecord) -> Self {
        let (call_id, parent_id, thread_id, start_time, end_time, qualified_name, file, line) = w;
        CallRecord {
            call_id: CallId(call_id),
            parent_id: parent_id.map(CallId),
            thread_id: Tid(thread_id),
            start_time,
            end_time,
            qualified_name,
            file,
            line,
        }
    }
}

/// Point-in-time copy of everything the profiler recorded.
///
/// All analysis functions read from a snapshot, never from the live store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSnapshot {
    /// All records ordered by call ID.
    pub records: Vec<CallRecord>,
    /// Thread names as captured when each thread was first observed.
    pub threads: BTreeMap<Tid, String>,
    /// Profile duration in seconds (elapsed so far for a running profiler).
    pub duration: f64,
    /// True once the profiler has stopped and every record is closed.
    pub finished: bool,
}

impl ProfileSnapshot {
    #[must_use]
    pub fn new(
        mut records: Vec<CallRecord>,
        threads: BTreeMap<Tid, String>,
        duration: f64,
        finished: bool,
    ) -> Self {
        records.sort_by_key(|r| r.call_id);
        Self { records, threads, duration, finished }
    }

    /// Thread name, or `<unknown>` for threads missing from the table.
    #[must_use]
    pub fn thread_name(&self, tid: Tid) -> &str {
        self.threads.get(&tid).map_or("<unknown>", String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, parent: Option<u64>, start: f64, end: Option<f64>) -> CallRecord {
        CallRecord {
            call_id: CallId(id),
            parent_id: parent.map(CallId),
            thread_id: Tid(1),
            start_time: start,
            end_time: end,
            qualified_name: format!("fn_{id}"),
            file: "src/lib.rs".to_string(),
            line: 10,
        }
    }

    #[test]
    fn test_serializes_as_tuple() {
        let json = serde_json::to_string(&record(3, Some(1), 0.5, None)).unwrap();
        assert_eq!(json, r#"[3,1,1,0.5,null,"fn_3","src/lib.rs",10]"#);
    }

    #[test]
    fn test_deserializes_from_tuple() {
        let rec: CallRecord =
            serde_json::from_str(r#"[4,null,2,0.25,0.75,"C:crc32","<C extension>",0]"#).unwrap();
        assert_eq!(rec.call_id, CallId(4));
        assert_eq!(rec.parent_id, None);
        assert_eq!(rec.thread_id, Tid(2));
        assert_eq!(rec.duration(), Some(0.5));
    }

    #[test]
    fn test_contains() {
        let outer = record(1, None, 0.0, Some(1.0));
        let inner = record(2, Some(1), 0.2, Some(0.4));
        let open = record(3, Some(1), 0.5, None);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&open));
    }

    #[test]
    fn test_snapshot_orders_by_call_id() {
        let snapshot = ProfileSnapshot::new(
            vec![record(5, None, 0.1, Some(0.2)), record(2, None, 0.3, Some(0.4))],
            BTreeMap::from([(Tid(1), "main".to_string())]),
            1.0,
            true,
        );
        let ids: Vec<_> = snapshot.records.iter().map(|r| r.call_id.0).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(snapshot.thread_name(Tid(1)), "main");
        assert_eq!(snapshot.thread_name(Tid(9)), "<unknown>");
    }
}
