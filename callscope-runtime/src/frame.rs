//! Thread-local shadow frame stack.
//!
//! `enter()` pushes a [`FrameInfo`] and returns a [`FrameGuard`]; dropping the
//! guard pops it. Both transitions are reported to the installed hook, if any.
//! Probes hit while the current thread is already inside the hook are not
//! tracked at all, so the hook never observes its own work.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crate::hook::{self, EventKind, HookEvent, HookScope};
use crate::thread;

/// File reported for frames that run native (foreign) code.
pub const NATIVE_FILE: &str = "<C extension>";

/// Prefix applied to the qualified name of native frames.
pub const NATIVE_PREFIX: &str = "C:";

/// Whether a frame runs Rust code or calls into a native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Rust,
    Native,
}

/// Static description of one instrumented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Function or method name as written at the probe site.
    pub name: &'static str,
    /// Full type path of the receiver for methods (from `std::any::type_name`).
    pub owner: Option<&'static str>,
    /// Source file of the probe site.
    pub file: &'static str,
    /// Source line of the probe site.
    pub line: u32,
    pub kind: FrameKind,
}

impl FrameInfo {
    #[must_use]
    pub const fn function(name: &'static str, file: &'static str, line: u32) -> Self {
        Self { name, owner: None, file, line, kind: FrameKind::Rust }
    }

    #[must_use]
    pub const fn method(
        owner: &'static str,
        name: &'static str,
        file: &'static str,
        line: u32,
    ) -> Self {
        Self { name, owner: Some(owner), file, line, kind: FrameKind::Rust }
    }

    /// A native frame carries no source location.
    #[must_use]
    pub const fn native(name: &'static str) -> Self {
        Self { name, owner: None, file: NATIVE_FILE, line: 0, kind: FrameKind::Native }
    }

    /// `Type.method` for methods, `C:name` for native frames, `name` otherwise.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match (self.kind, self.owner) {
            (FrameKind::Native, _) => format!("{NATIVE_PREFIX}{}", self.name),
            (FrameKind::Rust, Some(owner)) => format!("{}.{}", short_type_name(owner), self.name),
            (FrameKind::Rust, None) => self.name.to_string(),
        }
    }

    #[must_use]
    pub fn source_file(&self) -> &'static str {
        match self.kind {
            FrameKind::Native => NATIVE_FILE,
            FrameKind::Rust => self.file,
        }
    }

    #[must_use]
    pub fn source_line(&self) -> u32 {
        match self.kind {
            FrameKind::Native => 0,
            FrameKind::Rust => self.line,
        }
    }
}

/// Reduce a `std::any::type_name` path to its last segment, dropping generics.
///
/// `alloc::vec::Vec<u8>` becomes `Vec`, `my_app::render::Scene` becomes `Scene`.
#[must_use]
pub fn short_type_name(path: &str) -> &str {
    let base = path.split('<').next().unwrap_or(path);
    base.rsplit("::").next().unwrap_or(base)
}

thread_local! {
    static FRAMES: RefCell<Vec<FrameInfo>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for one shadow frame. Pops the frame on drop.
///
/// Not `Send`: a frame belongs to the stack of the thread that entered it.
#[must_use = "the frame is popped as soon as the guard drops; bind it with `let _frame = ...`"]
pub struct FrameGuard {
    tracked: bool,
    _not_send: PhantomData<*const ()>,
}

/// Push `frame` on the current thread's shadow stack and report the call.
pub fn enter(frame: FrameInfo) -> FrameGuard {
    if hook::in_hook() {
        return FrameGuard { tracked: false, _not_send: PhantomData };
    }

    let tracked = FRAMES.try_with(|frames| frames.borrow_mut().push(frame)).is_ok();
    // Build the guard first: if the hook unwinds, the frame is still popped.
    let guard = FrameGuard { tracked, _not_send: PhantomData };
    if tracked {
        notify(Transition::Enter);
    }
    guard
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.tracked {
            return;
        }
        // Pop before reporting so an unwinding hook cannot leave a stale frame.
        let Ok(Some(frame)) = FRAMES.try_with(|frames| frames.borrow_mut().pop()) else {
            return;
        };
        if std::thread::panicking() {
            // A second unwind out of a destructor aborts the process.
            if panic::catch_unwind(move || notify(Transition::Exit(frame))).is_err() {
                log::error!(
                    "profile hook panicked on thread {} while it was already unwinding",
                    thread::current_key()
                );
            }
        } else {
            notify(Transition::Exit(frame));
        }
    }
}

/// Copy of the current thread's shadow stack, outermost frame first.
#[must_use]
pub fn current_frames() -> Vec<FrameInfo> {
    FRAMES.try_with(|frames| frames.borrow().clone()).unwrap_or_default()
}

/// Number of frames on the current thread's shadow stack.
#[must_use]
pub fn stack_depth() -> usize {
    FRAMES.try_with(|frames| frames.borrow().len()).unwrap_or(0)
}

#[derive(Clone, Copy)]
enum Transition {
    /// The frame on top of the stack was just entered.
    Enter,
    /// This frame was just popped; the stack holds its parents.
    Exit(FrameInfo),
}

impl Transition {
    fn event_kind(self, kind: FrameKind) -> EventKind {
        match (self, kind) {
            (Transition::Enter, FrameKind::Rust) => EventKind::Call,
            (Transition::Exit(_), FrameKind::Rust) => EventKind::Return,
            (Transition::Enter, FrameKind::Native) => EventKind::NativeCall,
            (Transition::Exit(_), FrameKind::Native) => EventKind::NativeReturn,
        }
    }
}

/// Report a transition on the current thread to the installed hook, then
/// give the hook its `after_event` call outside the hook scope.
fn notify(transition: Transition) {
    let Some(hook) = hook::installed_hook() else {
        return;
    };
    let Some(scope) = HookScope::enter() else {
        return;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _scope = scope;
        FRAMES.try_with(|frames| {
            let frames = frames.borrow();
            let (frame, parents) = match transition {
                Transition::Exit(frame) => (frame, frames.as_slice()),
                Transition::Enter => match frames.split_last() {
                    Some((frame, parents)) => (*frame, parents),
                    None => return Ok(()),
                },
            };
            let event = HookEvent { kind: transition.event_kind(frame.kind), frame, parents };
            hook.on_event(&event)
        })
    }));
    hook.after_event();

    match outcome {
        Ok(Ok(Err(err))) => {
            log::error!("profile hook failed on thread {}: {err}", thread::current_key());
        }
        Ok(_) => {}
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let f = FrameInfo::function("parse", "src/parser.rs", 10);
        assert_eq!(f.qualified_name(), "parse");

        let m = FrameInfo::method("my_app::render::Scene", "draw", "src/render.rs", 42);
        assert_eq!(m.qualified_name(), "Scene.draw");

        let n = FrameInfo::native("crc32");
        assert_eq!(n.qualified_name(), "C:crc32");
        assert_eq!(n.source_file(), NATIVE_FILE);
        assert_eq!(n.source_line(), 0);
    }

    #[test]
    fn test_short_type_name_drops_generics() {
        assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec");
        assert_eq!(short_type_name("std::collections::HashMap<a::B, c::D>"), "HashMap");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_guard_pushes_and_pops() {
        assert_eq!(stack_depth(), 0);
        {
            let _outer = enter(FrameInfo::function("outer", file!(), line!()));
            {
                let _inner = enter(FrameInfo::function("inner", file!(), line!()));
                let names: Vec<_> = current_frames().iter().map(|f| f.name).collect();
                assert_eq!(names, vec!["outer", "inner"]);
            }
            assert_eq!(stack_depth(), 1);
        }
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn test_probe_macros_track_scope() {
        struct Widget;
        fn native_call() -> usize {
            crate::probe_native!("memcpy");
            current_frames().last().map_or(0, |f| f.line as usize)
        }

        crate::probe!("test_fn");
        crate::probe_method!(Widget, "paint");
        let frames = current_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].qualified_name(), "Widget.paint");
        assert_eq!(native_call(), 0);
        assert_eq!(stack_depth(), 2);
    }
}
