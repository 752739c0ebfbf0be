//! # Profiler Lifecycle
//!
//! ```text
//!      new()
//! [Idle] ──start──► [Active] ──stop / watchdog──► [Stopped]
//!                      │
//!                      └──── hook failure ─────► [Failed]
//! ```
//!
//! `start` installs the hook into the runtime (every thread at once) and arms
//! the watchdog. `stop` is serialized by the lifecycle mutex: whichever of
//! the owner, the watchdog or a failing hook gets there first uninstalls the
//! hook, closes unfinished calls and fires `on_finished`; everyone else
//! returns immediately.
//!
//! A failing hook only halts the profiler. Logging the run and the
//! `on_finished` callback wait for
//! [`after_event`](callscope_runtime::ProfileHook::after_event), which the
//! runtime calls once the thread has left the hook scope.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use callscope_runtime::{HookRuntime, InstallError, ShadowRuntime};

use super::clock::{CallIdAllocator, ProfileClock};
use super::options::{FinishCallback, ProfilerOptions};
use super::store::RecordStore;
use super::watchdog::Watchdog;
use crate::analysis::{
    analyze_function, build_hierarchy, events_by_thread, function_summaries, FunctionAnalysis,
    FunctionSummary, HierarchicalStructure,
};
use crate::domain::{HookFault, ProfilerError, Tid};
use crate::preflight::check_runtime;
use crate::render;
use crate::trace_data::{CallRecord, ProfileSnapshot};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerState {
    Idle,
    Active,
    Stopped,
    /// Stopped by a hook failure; see [`Profiler::last_error`].
    Failed,
}

struct Lifecycle {
    state: ProfilerState,
    duration: Option<f64>,
    watchdog: Option<Watchdog>,
}

/// What is left to do after the profiler halted.
struct Finished {
    end: f64,
    closed: usize,
    watchdog: Option<Watchdog>,
    callback: Option<FinishCallback>,
}

/// Counters kept by the hook without doing any I/O; logged at stop.
#[derive(Debug, Default)]
pub(crate) struct HookCounters {
    pub(crate) backfilled: AtomicU64,
    pub(crate) orphan_returns: AtomicU64,
}

/// State shared between the owner, the installed hook and the watchdog.
pub(crate) struct ProfilerCore {
    pub(crate) session: u64,
    pub(crate) max_depth: Option<usize>,
    max_duration: std::time::Duration,
    runtime: Arc<dyn HookRuntime>,
    pub(crate) clock: OnceLock<ProfileClock>,
    pub(crate) ids: CallIdAllocator,
    pub(crate) store: RecordStore,
    pub(crate) counters: HookCounters,
    recording: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    on_finished: Mutex<Option<FinishCallback>>,
    last_error: Mutex<Option<HookFault>>,
    deferred: Mutex<Option<Finished>>,
    has_deferred: AtomicBool,
}

impl ProfilerCore {
    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    fn start(self: &Arc<Self>) -> Result<(), ProfilerError> {
        let mut lifecycle = lock(&self.lifecycle);
        match lifecycle.state {
            ProfilerState::Active => {
                log::debug!("profiler session {} already active", self.session);
                return Ok(());
            }
            ProfilerState::Stopped | ProfilerState::Failed => {
                return Err(ProfilerError::AlreadyFinished);
            }
            ProfilerState::Idle => {}
        }

        let hook: Arc<ProfilerCore> = Arc::clone(self);
        if let Err(err) = self.runtime.install(hook) {
            return Err(match err {
                InstallError::SlotOccupied => ProfilerError::HookSlotBusy,
            });
        }

        // Events delivered before `recording` flips are dropped by the hook.
        let _ = self.clock.set(ProfileClock::start_now());
        self.store.open();
        self.recording.store(true, Ordering::Release);
        lifecycle.state = ProfilerState::Active;

        if !self.max_duration.is_zero() {
            match Watchdog::spawn(Arc::downgrade(self), self.max_duration) {
                Ok(watchdog) => lifecycle.watchdog = Some(watchdog),
                Err(err) => {
                    drop(lifecycle);
                    self.stop();
                    return Err(err.into());
                }
            }
        }

        log::debug!(
            "profiler session {} started (max_depth={:?}, max_duration={:?})",
            self.session,
            self.max_depth,
            self.max_duration
        );
        Ok(())
    }

    pub(crate) fn stop(&self) {
        match self.halt() {
            Some(finished) => self.report(finished),
            None => self.finish_deferred(),
        }
    }

    /// Uninstall, seal the store and settle the final state. Returns `None`
    /// if the profiler was not active.
    fn halt(&self) -> Option<Finished> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state != ProfilerState::Active {
            return None;
        }
        self.recording.store(false, Ordering::Release);
        self.runtime.uninstall(self);
        let clock = self.clock.get();
        let sealed = self.store.seal(|| clock.map_or(0.0, ProfileClock::elapsed_secs));

        lifecycle.duration = Some(sealed.end);
        lifecycle.state = if lock(&self.last_error).is_some() {
            ProfilerState::Failed
        } else {
            ProfilerState::Stopped
        };

        Some(Finished {
            end: sealed.end,
            closed: sealed.closed,
            watchdog: lifecycle.watchdog.take(),
            callback: lock(&self.on_finished).take(),
        })
    }

    fn report(&self, finished: Finished) {
        log::debug!(
            "profiler session {} stopped after {:.6}s: {} calls, {} records, {} closed at stop, {} backfilled frames, {} orphan returns",
            self.session,
            finished.end,
            self.ids.allocated(),
            self.store.len(),
            finished.closed,
            self.counters.backfilled.load(Ordering::Relaxed),
            self.counters.orphan_returns.load(Ordering::Relaxed),
        );
        if let Some(watchdog) = finished.watchdog {
            watchdog.cancel();
        }
        if let Some(callback) = finished.callback {
            callback();
        }
    }

    /// Hook failure path: keep the fault and halt. Reporting is left to
    /// [`ProfilerCore::finish_deferred`].
    pub(crate) fn fail(&self, fault: HookFault) {
        *lock(&self.last_error) = Some(fault);
        let finished = self.halt();
        {
            let mut lifecycle = lock(&self.lifecycle);
            if lifecycle.state == ProfilerState::Stopped {
                lifecycle.state = ProfilerState::Failed;
            }
        }
        if let Some(finished) = finished {
            *lock(&self.deferred) = Some(finished);
            self.has_deferred.store(true, Ordering::Release);
        }
    }

    /// Run the report left behind by a failed hook, if any.
    pub(crate) fn finish_deferred(&self) {
        if !self.has_deferred.swap(false, Ordering::AcqRel) {
            return;
        }
        let finished = lock(&self.deferred).take();
        if let Some(finished) = finished {
            self.report(finished);
        }
    }

    fn snapshot(&self) -> ProfileSnapshot {
        let (records, threads) = self.store.snapshot();
        let lifecycle = lock(&self.lifecycle);
        let (duration, finished) = match lifecycle.duration {
            Some(duration) => (duration, true),
            None => (self.clock.get().map_or(0.0, ProfileClock::elapsed_secs), false),
        };
        ProfileSnapshot::new(records, threads, duration, finished)
    }
}

/// Deterministic cross-thread call profiler.
///
/// ```no_run
/// use callscope::{Profiler, ProfilerOptions};
/// use callscope::probe;
///
/// fn work() {
///     probe!("work");
/// }
///
/// let profiler = Profiler::new(ProfilerOptions::new()).unwrap();
/// profiler.start().unwrap();
/// work();
/// profiler.stop();
/// assert_eq!(profiler.records().len(), 1);
/// ```
pub struct Profiler {
    core: Arc<ProfilerCore>,
}

impl Profiler {
    /// Profiler bound to the process-wide shadow-stack runtime.
    ///
    /// # Errors
    /// Returns [`ProfilerError::InvalidOption`] for bad options.
    pub fn new(options: ProfilerOptions) -> Result<Self, ProfilerError> {
        Self::with_runtime(options, Arc::new(ShadowRuntime))
    }

    /// Profiler bound to `runtime`.
    ///
    /// # Errors
    /// Returns [`ProfilerError::UnsupportedRuntime`] if the runtime lacks a
    /// required capability, [`ProfilerError::InvalidOption`] for bad options.
    pub fn with_runtime(
        mut options: ProfilerOptions,
        runtime: Arc<dyn HookRuntime>,
    ) -> Result<Self, ProfilerError> {
        check_runtime(runtime.as_ref())?;
        options.validate()?;

        let core = ProfilerCore {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            max_depth: options.max_depth(),
            max_duration: options.max_duration(),
            runtime,
            clock: OnceLock::new(),
            ids: CallIdAllocator::new(),
            store: RecordStore::new(),
            counters: HookCounters::default(),
            recording: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle {
                state: ProfilerState::Idle,
                duration: None,
                watchdog: None,
            }),
            on_finished: Mutex::new(options.on_finished.take()),
            last_error: Mutex::new(None),
            deferred: Mutex::new(None),
            has_deferred: AtomicBool::new(false),
        };
        Ok(Self { core: Arc::new(core) })
    }

    /// Begin profiling every thread. A no-op when already active.
    ///
    /// # Errors
    /// [`ProfilerError::HookSlotBusy`] if another profiler is active,
    /// [`ProfilerError::AlreadyFinished`] after a completed run.
    pub fn start(&self) -> Result<(), ProfilerError> {
        self.core.start()
    }

    /// Stop profiling. Safe to call any number of times from any thread.
    pub fn stop(&self) {
        self.core.stop();
    }

    #[must_use]
    pub fn state(&self) -> ProfilerState {
        lock(&self.core.lifecycle).state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ProfilerState::Active
    }

    /// Profile duration in seconds, once stopped.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        lock(&self.core.lifecycle).duration
    }

    /// The fault that stopped this profiler, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<HookFault> {
        lock(&self.core.last_error).clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.core.snapshot()
    }

    /// All records ordered by call ID.
    #[must_use]
    pub fn records(&self) -> Vec<CallRecord> {
        self.snapshot().records
    }

    #[must_use]
    pub fn events_by_thread(&self) -> BTreeMap<Tid, Vec<CallRecord>> {
        events_by_thread(&self.snapshot())
    }

    #[must_use]
    pub fn hierarchical_structure(&self) -> HierarchicalStructure {
        build_hierarchy(&self.snapshot())
    }

    #[must_use]
    pub fn analyze_function(&self, name: &str) -> FunctionAnalysis {
        analyze_function(&self.snapshot(), name)
    }

    #[must_use]
    pub fn function_summaries(&self) -> Vec<FunctionSummary> {
        function_summaries(&self.snapshot())
    }

    /// Write each thread's call tree to `sink`.
    ///
    /// # Errors
    /// Propagates write errors from `sink`.
    pub fn print_thread_call_structures<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        render::print_thread_call_structures(&self.hierarchical_structure(), sink)
    }

    /// Write the `top_n` functions by total time to `sink`.
    ///
    /// # Errors
    /// Propagates write errors from `sink`.
    pub fn print_summary<W: Write>(&self, top_n: usize, sink: &mut W) -> io::Result<()> {
        let snapshot = self.snapshot();
        render::print_summary(&function_summaries(&snapshot), snapshot.duration, top_n, sink)
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        self.core.stop();
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("session", &self.core.session)
            .field("state", &self.state())
            .field("records", &self.core.store.len())
            .finish_non_exhaustive()
    }
}
