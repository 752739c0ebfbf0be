//! Recording side: the hook, its per-thread stacks, the record store and
//! the lifecycle that ties them to a runtime.

mod clock;
mod hook;
mod options;
mod profiler;
mod store;
#[cfg(test)]
pub(crate) mod testing;
mod tracker;
mod watchdog;

pub use options::{FinishCallback, ProfilerOptions};
pub use profiler::{Profiler, ProfilerState};
