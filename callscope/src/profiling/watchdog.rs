//! One-shot timer that stops a profiler after its maximum duration.
//!
//! Runs on a detached thread, which never keeps the process alive. The
//! profiler cancels it through a channel when it stops first.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::time::Duration;

use super::profiler::ProfilerCore;

pub(crate) struct Watchdog {
    cancel: Sender<()>,
}

impl Watchdog {
    pub(crate) fn spawn(core: Weak<ProfilerCore>, after: Duration) -> std::io::Result<Self> {
        let (cancel, cancelled) = bounded::<()>(1);
        std::thread::Builder::new().name("callscope-watchdog".to_string()).spawn(move || {
            match cancelled.recv_timeout(after) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(core) = core.upgrade() {
                        log::info!("max duration of {after:?} reached, stopping profiler");
                        core.stop();
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("watchdog cancelled");
                }
            }
        })?;
        Ok(Self { cancel })
    }

    /// Wake the timer thread so it exits without stopping anything.
    pub(crate) fn cancel(self) {
        let _ = self.cancel.try_send(());
    }
}
