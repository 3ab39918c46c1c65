use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gtx_core::{CompensationStack, FlowAuditLog};

use crate::compensation::AsyncCompensation;

tokio::task_local! {
    static FLOW: FlowHandle;
}

#[derive(Debug, Default)]
pub(crate) struct FlowState {
    pub(crate) stack: CompensationStack<AsyncCompensation>,
    pub(crate) audit: FlowAuditLog,
}

/// Shared handle to the compensation stack of one asynchronous flow.
///
/// Clones refer to the same stack; a handle never forks into independent
/// copies. The stack is guarded by a mutex that is only held while pushing or
/// popping, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct FlowHandle {
    state: Arc<Mutex<FlowState>>,
}

impl FlowHandle {
    /// Create a handle to a fresh, empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `future` with this handle as the current task's flow.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        FLOW.scope(self, future).await
    }

    /// Number of applied operations on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lock().stack.len()
    }

    /// Names of the applied operations, oldest first.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&'static str> {
        self.lock().stack.operation_names()
    }

    /// Copy of the flow's audit log.
    #[must_use]
    pub fn audit_log(&self) -> FlowAuditLog {
        self.lock().audit.clone()
    }

    /// Whether both handles refer to the same stack.
    #[must_use]
    pub fn same_flow(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    // A panic while holding the lock cannot leave the stack half-updated: every
    // critical section is a single push, pop or record.
    pub(crate) fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `future` as a new flow with a fresh, empty compensation stack.
///
/// Call this exactly once per inbound unit of work, before any operation runs.
pub async fn seed<F: Future>(future: F) -> F::Output {
    FlowHandle::new().scope(future).await
}

/// Handle to the current task's flow, if one was seeded.
#[must_use]
pub fn current() -> Option<FlowHandle> {
    FLOW.try_with(FlowHandle::clone).ok()
}
