//! A hook runtime driven by hand, for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use callscope_runtime::{
    Capabilities, EventKind, FrameInfo, HookError, HookEvent, HookRuntime, InstallError,
    ProfileHook,
};

#[derive(Default)]
struct Slots {
    installed: Option<Arc<dyn ProfileHook>>,
    last: Option<Arc<dyn ProfileHook>>,
}

/// Captures the installed hook and replays scripted events on the calling
/// thread.
#[derive(Clone)]
pub(crate) struct ScriptedRuntime {
    capabilities: Capabilities,
    slots: Arc<Mutex<Slots>>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::with_capabilities(Capabilities::FULL)
    }
}

impl ScriptedRuntime {
    pub(crate) fn with_capabilities(capabilities: Capabilities) -> Self {
        Self { capabilities, slots: Arc::default() }
    }

    pub(crate) fn handle(&self) -> Arc<dyn HookRuntime> {
        Arc::new(self.clone())
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).installed.is_some()
    }

    pub(crate) fn last_hook(&self) -> Option<Arc<dyn ProfileHook>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).last.clone()
    }

    pub(crate) fn event(
        &self,
        kind: EventKind,
        frame: FrameInfo,
        parents: &[FrameInfo],
    ) -> Result<(), HookError> {
        let hook = self.slots.lock().unwrap_or_else(PoisonError::into_inner).installed.clone();
        let Some(hook) = hook else {
            return Ok(());
        };
        let result = hook.on_event(&HookEvent { kind, frame, parents });
        hook.after_event();
        result
    }

    pub(crate) fn call(&self, frame: FrameInfo, parents: &[FrameInfo]) -> Result<(), HookError> {
        self.event(EventKind::Call, frame, parents)
    }

    pub(crate) fn ret(&self, frame: FrameInfo, parents: &[FrameInfo]) -> Result<(), HookError> {
        self.event(EventKind::Return, frame, parents)
    }
}

impl HookRuntime for ScriptedRuntime {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn install(&self, hook: Arc<dyn ProfileHook>) -> Result<(), InstallError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.installed.is_some() {
            return Err(InstallError::SlotOccupied);
        }
        slots.last = Some(Arc::clone(&hook));
        slots.installed = Some(hook);
        Ok(())
    }

    fn uninstall(&self, _hook: &dyn ProfileHook) -> bool {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).installed.take().is_some()
    }
}
