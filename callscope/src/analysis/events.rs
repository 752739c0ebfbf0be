//! Per-thread grouping of call records.

use std::collections::BTreeMap;

use crate::domain::Tid;
use crate::trace_data::{CallRecord, ProfileSnapshot};

/// Records grouped by thread, each group ordered by start time with call ID
/// as tie-break. Threads that produced no record are absent.
#[must_use]
pub fn events_by_thread(snapshot: &ProfileSnapshot) -> BTreeMap<Tid, Vec<CallRecord>> {
    let mut by_thread: BTreeMap<Tid, Vec<CallRecord>> = BTreeMap::new();
    for record in &snapshot.records {
        by_thread.entry(record.thread_id).or_default().push(record.clone());
    }
    for records in by_thread.values_mut() {
        sort_by_start(records);
    }
    by_thread
}

/// Stable sort by `(start_time, call_id)`.
pub(crate) fn sort_by_start(records: &mut [CallRecord]) {
    records.sort_by(|a, b| a.start_time.total_cmp(&b.start_time).then(a.call_id.cmp(&b.call_id)));
}
