//! Text rendering of call trees and summaries.
//!
//! Everything writes to a caller-supplied `io::Write`, so the same output
//! can go to stdout, a file or a buffer in tests.
//!
//! ```text
//! Thread TID:1 (main): 4 calls over 1.204s
//!   main                                  1.204s  src/main.rs:12
//!     parse                             310.442ms  src/parse.rs:40
//!       lex                              98.017ms  src/lex.rs:8
//!     render                            702.100ms  src/render.rs:3
//! ```

pub mod tree_view;

pub use tree_view::{CallTreeView, TreeRow};

use std::io::{self, Write};

use crate::analysis::{FunctionAnalysis, FunctionSummary, HierarchicalStructure};
use crate::analysis::events::sort_by_start;
use crate::domain::{format_duration, CallId};
use crate::trace_data::CallRecord;

const INDENT: &str = "  ";

/// Print `events` as an indented tree, one line per call.
///
/// `events` must be ordered by start time (as returned by
/// `events_by_thread`). Depth is derived from the `parent_id` chain by
/// keeping a stack of the calls that are still open at each line.
///
/// # Errors
/// Propagates write errors from `sink`.
pub fn print_hierarchical<W: Write>(events: &[CallRecord], sink: &mut W) -> io::Result<()> {
    let mut open: Vec<CallId> = Vec::new();
    for record in events {
        while let Some(&top) = open.last() {
            if Some(top) == record.parent_id {
                break;
            }
            open.pop();
        }
        writeln!(sink, "{}{}", INDENT.repeat(open.len() + 1), call_line(record))?;
        open.push(record.call_id);
    }
    Ok(())
}

fn call_line(record: &CallRecord) -> String {
    let duration = record.duration().map_or_else(|| "running".to_string(), format_duration);
    format!("{}  {}  {}", record.qualified_name, duration, record.location())
}

/// Print every thread's header followed by its call tree.
///
/// # Errors
/// Propagates write errors from `sink`.
pub fn print_thread_call_structures<W: Write>(
    structure: &HierarchicalStructure,
    sink: &mut W,
) -> io::Result<()> {
    if structure.is_empty() {
        writeln!(sink, "No calls recorded.")?;
        return Ok(());
    }
    for tree in structure.values() {
        let info = &tree.thread_info;
        writeln!(
            sink,
            "Thread {} ({}): {} calls over {}",
            info.id,
            info.name,
            info.call_count,
            format_duration(info.total_time)
        )?;
        let mut events: Vec<CallRecord> = tree.records.values().cloned().collect();
        sort_by_start(&mut events);
        print_hierarchical(&events, sink)?;
        writeln!(sink)?;
    }
    Ok(())
}

/// Print the `top_n` functions by total time.
///
/// # Errors
/// Propagates write errors from `sink`.
pub fn print_summary<W: Write>(
    summaries: &[FunctionSummary],
    duration: f64,
    top_n: usize,
    sink: &mut W,
) -> io::Result<()> {
    writeln!(sink, "Profile duration: {}", format_duration(duration))?;
    if summaries.is_empty() {
        writeln!(sink, "No completed calls recorded.")?;
        return Ok(());
    }

    let name_width = summaries.iter().take(top_n).map(|s| s.name.len()).max().unwrap_or(0).max(8);
    writeln!(
        sink,
        "{:<name_width$}  {:>7}  {:>12}  {:>12}  {:>12}  {:>6}  {:>7}  Location",
        "Function", "Calls", "Total", "Self", "Avg", "%", "Threads"
    )?;
    writeln!(sink, "{}", "─".repeat(name_width + 78))?;
    for s in summaries.iter().take(top_n) {
        writeln!(
            sink,
            "{:<name_width$}  {:>7}  {:>12}  {:>12}  {:>12}  {:>5.1}%  {:>7}  {}:{}",
            s.name,
            s.n_calls,
            format_duration(s.total_time),
            format_duration(s.self_time),
            format_duration(s.avg_time),
            s.percentage,
            s.threads,
            s.file,
            s.line
        )?;
    }
    if summaries.len() > top_n {
        writeln!(sink, "... {} more functions", summaries.len() - top_n)?;
    }
    Ok(())
}

/// Print the per-thread totals, callers and subcalls of one function.
///
/// # Errors
/// Propagates write errors from `sink`.
pub fn print_function_analysis<W: Write>(
    name: &str,
    analysis: &FunctionAnalysis,
    sink: &mut W,
) -> io::Result<()> {
    if analysis.is_empty() {
        writeln!(sink, "{name}: no completed calls")?;
        return Ok(());
    }
    writeln!(sink, "{name}: {} calls", analysis.n_calls())?;

    writeln!(sink, "{INDENT}By thread:")?;
    for (tid, totals) in &analysis.totals_by_thread {
        let s = &totals.stats;
        writeln!(
            sink,
            "{INDENT}{INDENT}{tid} ({}): {} calls, total {}, avg {}, min {}, max {} ({:.1}% of profile)",
            totals.thread_name,
            s.n_calls,
            format_duration(s.total_duration),
            format_duration(s.avg_duration),
            format_duration(s.min_duration),
            format_duration(s.max_duration),
            s.percentage
        )?;
    }

    for (title, group) in [("Called from:", &analysis.callers), ("Calls:", &analysis.subcalls)] {
        writeln!(sink, "{INDENT}{title}")?;
        if group.is_empty() {
            writeln!(sink, "{INDENT}{INDENT}(none)")?;
        }
        for (other, s) in group {
            writeln!(
                sink,
                "{INDENT}{INDENT}{other}: {} calls, total {} ({:.1}%)",
                s.n_calls,
                format_duration(s.total_duration),
                s.percentage
            )?;
        }
    }
    Ok(())
}
