//! Compensation stack bound to the calling thread.
//!
//! Each thread lazily creates one stack on first access and returns the same
//! instance on every later access. The stack is never cleared implicitly,
//! including after a flow completes successfully: a thread that is pooled and
//! reused for an unrelated flow still holds the previous flow's applied
//! operations, and a later failure reverses them too. Call [`reset`] at the
//! boundary of every unit of work that runs on a reused thread, or use
//! [`Flow`](crate::Flow) instead.

use std::cell::RefCell;

use crate::audit::FlowAuditLog;
use crate::stack::CompensationStack;

#[derive(Default)]
struct ThreadState {
    stack: CompensationStack,
    audit: FlowAuditLog,
}

thread_local! {
    static CURRENT: RefCell<ThreadState> = RefCell::new(ThreadState::default());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut CompensationStack, &mut FlowAuditLog) -> R) -> R {
    CURRENT.with_borrow_mut(|state| f(&mut state.stack, &mut state.audit))
}

/// Number of applied operations on this thread's stack.
#[must_use]
pub fn depth() -> usize {
    CURRENT.with_borrow(|state| state.stack.len())
}

/// Names of the applied operations on this thread's stack, oldest first.
#[must_use]
pub fn operation_names() -> Vec<&'static str> {
    CURRENT.with_borrow(|state| state.stack.operation_names())
}

/// Copy of this thread's audit log.
#[must_use]
pub fn audit_log() -> FlowAuditLog {
    CURRENT.with_borrow(|state| state.audit.clone())
}

/// Start a fresh flow on this thread.
///
/// Applied operations are dropped without being reversed, and the audit log is
/// returned.
pub fn reset() -> FlowAuditLog {
    with_state(|stack, audit| {
        stack.clear();
        std::mem::take(audit)
    })
}
