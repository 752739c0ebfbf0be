//! Caller/callee breakdown for a single function.
//!
//! Given a qualified name, answers three questions over a snapshot:
//!
//! - **Where** did it run? Totals per thread, relative to the profile.
//! - **Who** called it? Per caller name, how much of the callers' own time
//!   was spent in the target.
//! - **What** did it call? Per direct child name, how much of the target's
//!   time went to that child.
//!
//! Only closed calls take part. Calls still open in a snapshot taken while
//! profiling have no duration yet and are skipped.

// Percentage calculations intentionally convert usize to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{CallId, Tid};
use crate::trace_data::{CallRecord, ProfileSnapshot};

/// Duration statistics for a group of calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStats {
    pub n_calls: usize,
    pub total_duration: f64,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    /// Share of the group's reference time (0.0 - 100.0).
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadTotals {
    pub thread_name: String,
    #[serde(flatten)]
    pub stats: CallStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionAnalysis {
    /// Target calls per thread; percentage of the profile duration.
    pub totals_by_thread: BTreeMap<Tid, ThreadTotals>,
    /// Target calls per caller name; percentage of the distinct caller
    /// invocations' time.
    pub callers: BTreeMap<String, CallStats>,
    /// Direct children per name; percentage of the target's summed time.
    pub subcalls: BTreeMap<String, CallStats>,
}

impl FunctionAnalysis {
    /// True when the function never completed a call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals_by_thread.is_empty()
    }

    /// Number of completed calls across all threads.
    #[must_use]
    pub fn n_calls(&self) -> usize {
        self.totals_by_thread.values().map(|t| t.stats.n_calls).sum()
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    n_calls: usize,
    total: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn add(&mut self, duration: f64) {
        if self.n_calls == 0 {
            self.min = duration;
            self.max = duration;
        } else {
            self.min = self.min.min(duration);
            self.max = self.max.max(duration);
        }
        self.n_calls += 1;
        self.total += duration;
    }

    fn finish(&self, reference: f64) -> CallStats {
        CallStats {
            n_calls: self.n_calls,
            total_duration: self.total,
            avg_duration: if self.n_calls > 0 { self.total / self.n_calls as f64 } else { 0.0 },
            min_duration: self.min,
            max_duration: self.max,
            percentage: percentage(self.total, reference),
        }
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Analyze every completed call whose qualified name equals `name`.
#[must_use]
pub fn analyze_function(snapshot: &ProfileSnapshot, name: &str) -> FunctionAnalysis {
    let by_id: HashMap<CallId, &CallRecord> =
        snapshot.records.iter().map(|r| (r.call_id, r)).collect();
    let mut children: HashMap<CallId, Vec<&CallRecord>> = HashMap::new();
    for record in &snapshot.records {
        if let Some(parent) = record.parent_id {
            children.entry(parent).or_default().push(record);
        }
    }

    let targets: Vec<(&CallRecord, f64)> = snapshot
        .records
        .iter()
        .filter(|r| r.qualified_name == name)
        .filter_map(|r| r.duration().map(|d| (r, d)))
        .collect();
    if targets.is_empty() {
        return FunctionAnalysis::default();
    }

    let mut per_thread: BTreeMap<Tid, Accumulator> = BTreeMap::new();
    let mut per_caller: BTreeMap<String, (Accumulator, BTreeSet<CallId>)> = BTreeMap::new();
    let mut per_child: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut target_time = 0.0;

    for &(target, duration) in &targets {
        target_time += duration;
        per_thread.entry(target.thread_id).or_default().add(duration);

        let parent = target.parent_id.and_then(|p| by_id.get(&p));
        if let Some(parent) = parent.filter(|p| p.duration().is_some()) {
            let (acc, invocations) = per_caller.entry(parent.qualified_name.clone()).or_default();
            acc.add(duration);
            invocations.insert(parent.call_id);
        }

        for child in children.get(&target.call_id).into_iter().flatten() {
            if let Some(child_duration) = child.duration() {
                per_child.entry(child.qualified_name.clone()).or_default().add(child_duration);
            }
        }
    }

    let totals_by_thread = per_thread
        .into_iter()
        .map(|(tid, acc)| {
            let totals = ThreadTotals {
                thread_name: snapshot.thread_name(tid).to_string(),
                stats: acc.finish(snapshot.duration),
            };
            (tid, totals)
        })
        .collect();

    let callers = per_caller
        .into_iter()
        .map(|(caller, (acc, invocations))| {
            let caller_time: f64 = invocations
                .iter()
                .filter_map(|id| by_id.get(id).and_then(|r| r.duration()))
                .sum();
            (caller, acc.finish(caller_time))
        })
        .collect();

    let subcalls =
        per_child.into_iter().map(|(child, acc)| (child, acc.finish(target_time))).collect();

    FunctionAnalysis { totals_by_thread, callers, subcalls }
}
