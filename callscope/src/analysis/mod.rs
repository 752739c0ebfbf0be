//! Analysis logic for profiling data
//!
//! Pure functions over a [`ProfileSnapshot`](crate::trace_data::ProfileSnapshot),
//! separated from rendering and export. Nothing here touches the live store.

pub mod events;
pub mod function_analyzer;
pub mod hierarchy;
pub mod summary;

pub use events::events_by_thread;
pub use function_analyzer::{analyze_function, CallStats, FunctionAnalysis, ThreadTotals};
pub use hierarchy::{build_hierarchy, HierarchicalStructure, ThreadCallTree, ThreadInfo};
pub use summary::{function_summaries, FunctionSummary};
