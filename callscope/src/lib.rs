//! # callscope - Deterministic Cross-Thread Call Profiler
//!
//! callscope records the entry and exit of every instrumented function call
//! on every thread of a process, rebuilds per-thread call trees from those
//! events, and computes summaries for interactive inspection: flat tables,
//! per-thread call structures and per-function caller/callee breakdowns.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Instrumented Program                        │
//! │          probe!("parse") / probe_method!(Lexer, "next")         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ shadow frame push/pop (callscope-runtime)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          Process-wide hook slot (one ProfileHook)               │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ HookEvent { kind, frame, parents }
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   callscope (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Profiling  │──▶│ Record Store │──▶│   Snapshot   │         │
//! │  │ (hook+stack) │   │ (CallRecord) │   │              │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │                 │
//! │                    ┌──────────────┬───────────┴──┐              │
//! │                    ▼              ▼              ▼              │
//! │             ┌────────────┐ ┌────────────┐ ┌────────────┐        │
//! │             │  Analysis  │ │   Render   │ │   Export   │        │
//! │             │(trees,stats│ │ (text/tree)│ │(trace.json)│        │
//! │             └────────────┘ └────────────┘ └────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: lifecycle, the hook, per-thread stacks, the record store
//!   and the max-duration watchdog
//! - [`analysis`]: events by thread, hierarchical structure, function
//!   analysis and flat summaries, all pure functions over a snapshot
//! - [`render`]: indented text output and a lazy tree model for widgets
//! - [`export`]: Chrome Trace Event Format and a plain records dump
//! - [`preflight`]: runtime capability checks
//! - [`cli`]: arguments of the demo binary
//! - [`trace_data`]: call records and snapshots
//! - [`domain`]: IDs and error types
//!
//! ## Typical Usage
//!
//! ```no_run
//! use callscope::{probe, Profiler, ProfilerOptions};
//!
//! fn checksum(data: &[u8]) -> u32 {
//!     probe!("checksum");
//!     data.iter().map(|&b| u32::from(b)).sum()
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let profiler = Profiler::new(ProfilerOptions::new().with_max_depth(16))?;
//! profiler.start()?;
//! checksum(b"hello");
//! profiler.stop();
//!
//! profiler.print_summary(10, &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Backfill**: a thread first seen while already inside instrumented
//!   frames gets synthetic records for those frames, so its tree has a root
//! - **Depth limit**: frames deeper than `max_depth` are tracked (returns
//!   still pair up) but not recorded
//! - **Closing pass**: at stop, calls that never returned end at the profile
//!   duration

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod profiling;
pub mod render;
pub mod trace_data;

pub use callscope_runtime::{probe, probe_method, probe_native};
pub use domain::{CallId, ExportError, HookFault, ProfilerError, Tid};
pub use profiling::{FinishCallback, Profiler, ProfilerOptions, ProfilerState};
pub use trace_data::{CallRecord, ProfileSnapshot};
