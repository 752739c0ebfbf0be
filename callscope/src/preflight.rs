//! Pre-flight checks for callscope
//!
//! Validates that a hook runtime offers everything the profiler relies on
//! before a profiler is bound to it, so a missing feature surfaces at
//! construction instead of as silently wrong records.

use callscope_runtime::HookRuntime;

use crate::domain::ProfilerError;

/// Check that `runtime` can install on all threads, walk parent frames and
/// provide a monotonic clock.
///
/// # Errors
/// [`ProfilerError::UnsupportedRuntime`] naming the first missing capability.
pub fn check_runtime(runtime: &dyn HookRuntime) -> Result<(), ProfilerError> {
    let capabilities = runtime.capabilities();
    if let Some(capability) = capabilities.missing() {
        log::debug!("runtime rejected: {capabilities:?}");
        return Err(ProfilerError::UnsupportedRuntime { capability });
    }
    Ok(())
}
