//! Structured error types for callscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Tid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Unsupported runtime: missing {capability}")]
    UnsupportedRuntime { capability: &'static str },

    #[error("Invalid profiler option {option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("Another profiler is already active in this process")]
    HookSlotBusy,

    #[error("Profiler has already finished; construct a new one for another run")]
    AlreadyFinished,

    #[error(transparent)]
    Hook(#[from] HookFault),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure raised inside the profiling hook.
///
/// Cloneable so the profiler can keep the last one for inspection while
/// also reporting it to the runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookFault {
    #[error("Stack corruption on {thread}: expected return from {expected}, got {found}\nremaining stack:\n{stack}")]
    StackCorruption { thread: Tid, expected: String, found: String, stack: String },

    #[error("Profile hook panicked: {message}")]
    Panicked { message: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: profiler is still running")]
    StillRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
