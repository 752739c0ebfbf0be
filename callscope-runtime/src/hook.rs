//! The process-wide profile hook slot.
//!
//! One slot per process. Installing a hook makes it visible to every thread
//! at once, including threads that were already running, because all of
//! them consult the same slot on every probe.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::frame::FrameInfo;

/// The four transitions a hook is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Entering a Rust function
    Call,
    /// Leaving a Rust function
    Return,
    /// Entering a native callable
    NativeCall,
    /// Leaving a native callable
    NativeReturn,
}

impl EventKind {
    #[must_use]
    pub fn is_call(self) -> bool {
        matches!(self, EventKind::Call | EventKind::NativeCall)
    }

    #[must_use]
    pub fn is_native(self) -> bool {
        matches!(self, EventKind::NativeCall | EventKind::NativeReturn)
    }
}

/// One call or return as seen by the hook.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub kind: EventKind,
    /// The frame being entered or left.
    pub frame: FrameInfo,
    /// Enclosing frames on the same thread, outermost first.
    pub parents: &'a [FrameInfo],
}

/// Error type a hook reports back to the runtime.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of call/return events, invoked synchronously on the thread that
/// entered or left the frame.
pub trait ProfileHook: Send + Sync {
    /// # Errors
    /// Any error is logged by the runtime; the hook is responsible for
    /// uninstalling itself when it can no longer trust its own state.
    fn on_event(&self, event: &HookEvent<'_>) -> Result<(), HookError>;

    /// Called on the same thread once the hook scope is released, including
    /// when `on_event` unwound. Probes and logging behave normally here.
    fn after_event(&self) {}
}

/// Features a runtime offers to a profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// One installation reaches every thread, existing ones included.
    pub all_threads: bool,
    /// The hook can read the enclosing frames of the current thread.
    pub frame_walk: bool,
    /// A monotonic high-resolution clock is available.
    pub monotonic_clock: bool,
}

impl Capabilities {
    pub const FULL: Capabilities =
        Capabilities { all_threads: true, frame_walk: true, monotonic_clock: true };

    /// Name of the first missing capability, if any.
    #[must_use]
    pub fn missing(&self) -> Option<&'static str> {
        if !self.all_threads {
            Some("profile hook installation on all threads")
        } else if !self.frame_walk {
            Some("parent frame inspection from inside the hook")
        } else if !self.monotonic_clock {
            Some("monotonic high-resolution clock")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    /// Another hook already owns the slot.
    SlotOccupied,
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallError::SlotOccupied => write!(f, "a profile hook is already installed"),
        }
    }
}

impl std::error::Error for InstallError {}

/// A place a profiler can install its hook into.
pub trait HookRuntime: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// # Errors
    /// Returns [`InstallError::SlotOccupied`] if a different hook is installed.
    fn install(&self, hook: Arc<dyn ProfileHook>) -> Result<(), InstallError>;

    /// Remove `hook` if it is the one installed. Returns whether it was.
    fn uninstall(&self, hook: &dyn ProfileHook) -> bool;
}

static SLOT: RwLock<Option<Arc<dyn ProfileHook>>> = RwLock::new(None);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// The runtime backed by the shadow frame stacks and the global slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowRuntime;

impl HookRuntime for ShadowRuntime {
    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn install(&self, hook: Arc<dyn ProfileHook>) -> Result<(), InstallError> {
        let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = slot.as_ref() {
            if same_hook(current.as_ref(), hook.as_ref()) {
                return Ok(());
            }
            return Err(InstallError::SlotOccupied);
        }
        *slot = Some(hook);
        INSTALLED.store(true, Ordering::Release);
        log::debug!("profile hook installed on all threads");
        Ok(())
    }

    fn uninstall(&self, hook: &dyn ProfileHook) -> bool {
        let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if same_hook(current.as_ref(), hook) => {
                INSTALLED.store(false, Ordering::Release);
                *slot = None;
                log::debug!("profile hook removed from all threads");
                true
            }
            Some(_) => {
                log::warn!("refusing to uninstall a profile hook owned by someone else");
                false
            }
            None => false,
        }
    }
}

/// Whether any hook currently owns the process-wide slot.
#[must_use]
pub fn hook_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Clone the installed hook out of the slot so the lock is not held while
/// the hook runs (the hook may uninstall itself).
pub(crate) fn installed_hook() -> Option<Arc<dyn ProfileHook>> {
    if !INSTALLED.load(Ordering::Acquire) {
        return None;
    }
    SLOT.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn same_hook(a: &dyn ProfileHook, b: &dyn ProfileHook) -> bool {
    std::ptr::eq(
        (a as *const dyn ProfileHook).cast::<()>(),
        (b as *const dyn ProfileHook).cast::<()>(),
    )
}

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is executing inside the hook.
#[must_use]
pub fn in_hook() -> bool {
    IN_HOOK.try_with(Cell::get).unwrap_or(true)
}

/// Marks the current thread as inside the hook until dropped.
pub(crate) struct HookScope(());

impl HookScope {
    pub(crate) fn enter() -> Option<HookScope> {
        IN_HOOK
            .try_with(|flag| {
                if flag.get() {
                    None
                } else {
                    flag.set(true);
                    Some(HookScope(()))
                }
            })
            .ok()
            .flatten()
    }
}

impl Drop for HookScope {
    fn drop(&mut self) {
        let _ = IN_HOOK.try_with(|flag| flag.set(false));
    }
}
