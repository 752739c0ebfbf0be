//! Per-thread call trees.
//!
//! ```text
//! HierarchicalStructure
//!   └─ TID:1 ─► ThreadCallTree
//!                 ├─ thread_info   { id, name, call_count, total_time, start_time }
//!                 ├─ root_calls    [#0, #7]            (parent_id == None)
//!                 ├─ children      #0 ─► [#1, #4]      (start-time order)
//!                 └─ records       #0 ─► CallRecord
//! ```
//!
//! Children are stored as an adjacency map so a tree widget can expand one
//! node at a time without walking the whole thread.

use serde::Serialize;
use std::collections::BTreeMap;

use super::events::events_by_thread;
use crate::domain::{CallId, Tid};
use crate::trace_data::{CallRecord, ProfileSnapshot};

/// Header line of a thread's tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadInfo {
    pub id: Tid,
    pub name: String,
    pub call_count: usize,
    /// Always the full profile duration, whatever the thread's own activity.
    pub total_time: f64,
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadCallTree {
    pub thread_info: ThreadInfo,
    pub root_calls: Vec<CallId>,
    pub children: BTreeMap<CallId, Vec<CallId>>,
    pub records: BTreeMap<CallId, CallRecord>,
}

impl ThreadCallTree {
    /// Direct children of `call_id` in start-time order.
    #[must_use]
    pub fn children_of(&self, call_id: CallId) -> &[CallId] {
        self.children.get(&call_id).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn record(&self, call_id: CallId) -> Option<&CallRecord> {
        self.records.get(&call_id)
    }

    #[must_use]
    pub fn has_children(&self, call_id: CallId) -> bool {
        !self.children_of(call_id).is_empty()
    }

    /// Records of the roots, in start-time order.
    pub fn roots(&self) -> impl Iterator<Item = &CallRecord> + '_ {
        self.root_calls.iter().filter_map(|id| self.records.get(id))
    }
}

pub type HierarchicalStructure = BTreeMap<Tid, ThreadCallTree>;

/// Build one call tree per thread that produced records.
///
/// A record whose parent is missing from the snapshot is treated as a root
/// so that nothing recorded is hidden.
#[must_use]
pub fn build_hierarchy(snapshot: &ProfileSnapshot) -> HierarchicalStructure {
    events_by_thread(snapshot)
        .into_iter()
        .map(|(tid, events)| (tid, thread_tree(snapshot, tid, events)))
        .collect()
}

fn thread_tree(snapshot: &ProfileSnapshot, tid: Tid, events: Vec<CallRecord>) -> ThreadCallTree {
    let records: BTreeMap<CallId, CallRecord> =
        events.iter().map(|r| (r.call_id, r.clone())).collect();

    let mut root_calls = Vec::new();
    let mut children: BTreeMap<CallId, Vec<CallId>> = BTreeMap::new();
    // `events` is start-time ordered, so pushing in order keeps every list sorted.
    for record in &events {
        match record.parent_id {
            Some(parent) if records.contains_key(&parent) => {
                children.entry(parent).or_default().push(record.call_id);
            }
            _ => root_calls.push(record.call_id),
        }
    }

    ThreadCallTree {
        thread_info: ThreadInfo {
            id: tid,
            name: snapshot.thread_name(tid).to_string(),
            call_count: events.len(),
            total_time: snapshot.duration,
            start_time: 0.0,
        },
        root_calls,
        children,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, parent: Option<u64>, tid: u64, start: f64, end: f64, name: &str) -> CallRecord {
        CallRecord {
            call_id: CallId(id),
            parent_id: parent.map(CallId),
            thread_id: Tid(tid),
            start_time: start,
            end_time: Some(end),
            qualified_name: name.to_string(),
            file: "src/app.rs".to_string(),
            line: 1,
        }
    }

    fn snapshot() -> ProfileSnapshot {
        let threads = BTreeMap::from([(Tid(1), "main".to_string()), (Tid(2), "worker".to_string())]);
        ProfileSnapshot::new(
            vec![
                record(0, None, 1, 0.0, 0.9, "main"),
                record(1, Some(0), 1, 0.5, 0.6, "late"),
                record(2, Some(0), 1, 0.1, 0.2, "early"),
                record(3, None, 2, 0.2, 0.4, "job"),
                record(4, Some(99), 2, 0.3, 0.35, "stray"),
            ],
            threads,
            1.5,
            true,
        )
    }

    #[test]
    fn test_thread_info_uses_full_duration() {
        let structure = build_hierarchy(&snapshot());
        let main = &structure[&Tid(1)].thread_info;
        assert_eq!(main.name, "main");
        assert_eq!(main.call_count, 3);
        assert!((main.total_time - 1.5).abs() < f64::EPSILON);
        assert!(main.start_time.abs() < f64::EPSILON);
    }

    #[test]
    fn test_children_sorted_by_start_time() {
        let structure = build_hierarchy(&snapshot());
        let tree = &structure[&Tid(1)];
        assert_eq!(tree.root_calls, vec![CallId(0)]);
        assert_eq!(tree.children_of(CallId(0)), &[CallId(2), CallId(1)]);
        assert!(tree.has_children(CallId(0)));
        assert!(!tree.has_children(CallId(2)));
        assert_eq!(tree.record(CallId(1)).map(|r| r.qualified_name.as_str()), Some("late"));
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let structure = build_hierarchy(&snapshot());
        let worker = &structure[&Tid(2)];
        assert_eq!(worker.root_calls, vec![CallId(3), CallId(4)]);
        assert_eq!(worker.roots().count(), 2);
    }

    #[test]
    fn test_deterministic() {
        let snap = snapshot();
        assert_eq!(build_hierarchy(&snap), build_hierarchy(&snap));
    }
}
