//! Flat per-function summary across all threads.
//!
//! The table behind `print_summary`: every qualified name with its call
//! count, inclusive and exclusive time, and share of the profile.

// Percentage calculations intentionally convert usize to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::domain::{CallId, Tid};
use crate::trace_data::ProfileSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub n_calls: usize,
    /// Inclusive time in seconds.
    pub total_time: f64,
    /// Time not spent in recorded direct children, floored at zero.
    pub self_time: f64,
    pub avg_time: f64,
    /// Share of the profile duration (0.0 - 100.0).
    pub percentage: f64,
    /// Number of distinct threads the function ran on.
    pub threads: usize,
    pub file: String,
    pub line: u32,
}

#[derive(Default)]
struct Totals {
    n_calls: usize,
    total: f64,
    self_time: f64,
    threads: BTreeSet<Tid>,
    file: String,
    line: u32,
}

/// Aggregate completed calls by qualified name, most total time first.
#[must_use]
pub fn function_summaries(snapshot: &ProfileSnapshot) -> Vec<FunctionSummary> {
    let mut child_time: HashMap<CallId, f64> = HashMap::new();
    for record in &snapshot.records {
        if let (Some(parent), Some(duration)) = (record.parent_id, record.duration()) {
            *child_time.entry(parent).or_default() += duration;
        }
    }

    let mut functions: HashMap<&str, Totals> = HashMap::new();
    for record in &snapshot.records {
        let Some(duration) = record.duration() else {
            continue;
        };
        let totals = functions.entry(record.qualified_name.as_str()).or_insert_with(|| Totals {
            file: record.file.clone(),
            line: record.line,
            ..Totals::default()
        });
        totals.n_calls += 1;
        totals.total += duration;
        totals.self_time +=
            (duration - child_time.get(&record.call_id).copied().unwrap_or(0.0)).max(0.0);
        totals.threads.insert(record.thread_id);
    }

    let mut summaries: Vec<FunctionSummary> = functions
        .into_iter()
        .map(|(name, t)| FunctionSummary {
            name: name.to_string(),
            n_calls: t.n_calls,
            total_time: t.total,
            self_time: t.self_time,
            avg_time: t.total / t.n_calls as f64,
            percentage: if snapshot.duration > 0.0 {
                t.total / snapshot.duration * 100.0
            } else {
                0.0
            },
            threads: t.threads.len(),
            file: t.file,
            line: t.line,
        })
        .collect();

    summaries.sort_by(|a, b| b.total_time.total_cmp(&a.total_time).then_with(|| a.name.cmp(&b.name)));
    summaries
}
