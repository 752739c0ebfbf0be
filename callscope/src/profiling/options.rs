//! Profiler options.

use std::fmt;
use std::time::Duration;

use crate::domain::ProfilerError;

/// Callback fired once when a profiler goes from active to inactive.
pub type FinishCallback = Box<dyn FnOnce() + Send + 'static>;

/// Options recognized by [`crate::Profiler`].
///
/// ```
/// use callscope::ProfilerOptions;
///
/// let options = ProfilerOptions::new()
///     .with_max_depth(8)
///     .with_max_duration(std::time::Duration::from_secs(2))
///     .with_on_finished(|| eprintln!("profile complete"));
/// assert_eq!(options.max_depth(), Some(8));
/// ```
#[derive(Default)]
pub struct ProfilerOptions {
    max_depth: Option<usize>,
    max_duration: Duration,
    pub(crate) on_finished: Option<FinishCallback>,
}

impl ProfilerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record frames up to `depth` levels deep per thread. Deeper frames are
    /// still tracked so returns pair up, but produce no record.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Stop automatically after `duration`. Zero disables the watchdog.
    #[must_use]
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    /// Same as [`Self::with_max_duration`], from fractional seconds.
    ///
    /// # Errors
    /// Rejects negative, infinite and NaN values.
    pub fn with_max_duration_secs(self, secs: f64) -> Result<Self, ProfilerError> {
        let duration = Duration::try_from_secs_f64(secs).map_err(|e| {
            ProfilerError::InvalidOption { option: "max_duration", reason: format!("{secs}: {e}") }
        })?;
        Ok(self.with_max_duration(duration))
    }

    #[must_use]
    pub fn with_on_finished(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_finished = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// # Errors
    /// `max_depth` must be positive when set.
    pub fn validate(&self) -> Result<(), ProfilerError> {
        if self.max_depth == Some(0) {
            return Err(ProfilerError::InvalidOption {
                option: "max_depth",
                reason: "must be a positive integer".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ProfilerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilerOptions")
            .field("max_depth", &self.max_depth)
            .field("max_duration", &self.max_duration)
            .field("on_finished", &self.on_finished.is_some())
            .finish()
    }
}

/// Whether a frame at `depth` (1 = outermost) gets a record.
pub(crate) fn within_depth(max_depth: Option<usize>, depth: usize) -> bool {
    !matches!(max_depth, Some(max) if depth > max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProfilerOptions::new();
        assert_eq!(options.max_depth(), None);
        assert_eq!(options.max_duration(), Duration::ZERO);
        assert!(options.on_finished.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = ProfilerOptions::new().with_max_depth(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(ProfilerOptions::new().with_max_duration_secs(-1.0).is_err());
        assert!(ProfilerOptions::new().with_max_duration_secs(f64::NAN).is_err());
        let options = ProfilerOptions::new().with_max_duration_secs(0.05).unwrap();
        assert_eq!(options.max_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_within_depth() {
        assert!(within_depth(None, 1000));
        assert!(within_depth(Some(2), 2));
        assert!(!within_depth(Some(2), 3));
    }

    #[test]
    fn test_debug_hides_callback() {
        let options = ProfilerOptions::new().with_on_finished(|| {});
        assert!(format!("{options:?}").contains("on_finished: true"));
    }
}
