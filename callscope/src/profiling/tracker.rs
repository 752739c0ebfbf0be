//! Per-thread stack of active call IDs.
//!
//! Each stack is only ever touched by its own thread, so it lives in
//! thread-local storage and needs no lock. A stack is tagged with the
//! profiler session that filled it: the first event of a new session on a
//! thread discards whatever an earlier session left behind.

use std::cell::RefCell;

use crate::domain::CallId;

thread_local! {
    static THREAD_STACK: RefCell<ThreadStack> = const { RefCell::new(ThreadStack::new()) };
}

#[derive(Debug)]
pub struct ThreadStack {
    session: u64,
    calls: Vec<CallId>,
}

impl ThreadStack {
    const fn new() -> Self {
        Self { session: 0, calls: Vec::new() }
    }

    /// Bind this stack to `session`. Returns true if the thread had not been
    /// observed by that session yet.
    pub fn adopt(&mut self, session: u64) -> bool {
        if self.session == session {
            return false;
        }
        self.session = session;
        self.calls.clear();
        true
    }

    #[must_use]
    pub fn belongs_to(&self, session: u64) -> bool {
        self.session == session
    }

    pub fn push(&mut self, call_id: CallId) {
        self.calls.push(call_id);
    }

    pub fn pop(&mut self) -> Option<CallId> {
        self.calls.pop()
    }

    #[must_use]
    pub fn top(&self) -> Option<CallId> {
        self.calls.last().copied()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Active calls, outermost first.
    #[must_use]
    pub fn calls(&self) -> &[CallId] {
        &self.calls
    }
}

/// Run `f` against the current thread's stack.
///
/// Returns `None` during thread-local teardown or if the stack is already
/// borrowed further up this thread's call chain.
pub fn with_thread_stack<R>(f: impl FnOnce(&mut ThreadStack) -> R) -> Option<R> {
    THREAD_STACK
        .try_with(|cell| cell.try_borrow_mut().ok().map(|mut stack| f(&mut stack)))
        .ok()
        .flatten()
}
