//! # Shadow Call Stacks and the Profile Hook Slot
//!
//! The instrumented side of callscope. Code that wants to be profiled marks
//! its functions with [`probe!`], [`probe_method!`] or [`probe_native!`];
//! each marker pushes a [`FrameInfo`] on a thread-local shadow stack and pops
//! it when the enclosing scope ends.
//!
//! A single process-wide slot holds at most one [`ProfileHook`]. While a hook
//! is installed, every push and pop on every thread is reported to it
//! synchronously, together with the chain of enclosing frames:
//!
//! ```text
//!   thread A            thread B             thread C
//!  ┌─────────┐         ┌─────────┐          ┌─────────┐
//!  │ main    │         │ worker  │          │ (idle)  │
//!  │ render  │         │ decode  │          └─────────┘
//!  │ layout ◄┼── push  │ C:crc32 ◄┼── pop
//!  └────┬────┘         └────┬────┘
//!       │ HookEvent         │ HookEvent
//!       ▼                   ▼
//!  ┌─────────────────────────────────────┐
//!  │   SLOT: Option<Arc<dyn ProfileHook>>│  (one for the whole process)
//!  └─────────────────────────────────────┘
//! ```
//!
//! The shadow stack is maintained whether or not a hook is installed, so a
//! hook installed while a thread is deep inside a call chain can still walk
//! the frames that thread entered earlier.
//!
//! ## Key Types
//!
//! - [`FrameInfo`] - Static description of one instrumented frame
//! - [`FrameGuard`] - RAII guard returned by [`enter`]
//! - [`HookEvent`] - What a hook receives on every call and return
//! - [`HookRuntime`] - Capability report plus install/uninstall
//! - [`ShadowRuntime`] - The runtime backed by the process-wide slot

mod frame;
mod hook;
pub mod thread;

pub use frame::{
    current_frames, enter, short_type_name, stack_depth, FrameGuard, FrameInfo, FrameKind,
    NATIVE_FILE, NATIVE_PREFIX,
};
pub use hook::{
    hook_installed, in_hook, Capabilities, EventKind, HookError, HookEvent, HookRuntime,
    InstallError, ProfileHook, ShadowRuntime,
};

/// Mark the current scope as an instrumented function.
///
/// ```ignore
/// fn parse(input: &str) -> Ast {
///     callscope_runtime::probe!("parse");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! probe {
    ($name:expr) => {
        let _callscope_frame =
            $crate::enter($crate::FrameInfo::function($name, file!(), line!()));
    };
}

/// Mark the current scope as a method of `$owner`, recorded as `Owner.name`.
#[macro_export]
macro_rules! probe_method {
    ($owner:ty, $name:expr) => {
        let _callscope_frame = $crate::enter($crate::FrameInfo::method(
            ::std::any::type_name::<$owner>(),
            $name,
            file!(),
            line!(),
        ));
    };
}

/// Mark the current scope as a call into native (foreign) code.
#[macro_export]
macro_rules! probe_native {
    ($name:expr) => {
        let _callscope_frame = $crate::enter($crate::FrameInfo::native($name));
    };
}
