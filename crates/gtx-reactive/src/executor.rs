use gtx_core::{
    DispatchMode, DrainSummary, ExecutorConfig, ReversalFailurePolicy, TransactionError,
};
use tokio::runtime::Handle;
use tracing::{Instrument, debug, error, warn};

use crate::compensation::AsyncCompensation;
use crate::context::{self, FlowHandle};
use crate::operation::AsyncReversibleOperation;

/// Non-blocking executor for operations within a seeded flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactiveExecutor {
    config: ExecutorConfig,
}

impl ReactiveExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one operation within the current task's flow.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NoFlowContext` without running the forward
    /// action if no flow was seeded for this task, and
    /// `TransactionError::Failed` if the forward action fails.
    pub async fn execute<O>(
        &self,
        operation: O,
        input: O::Input,
    ) -> Result<O::Output, TransactionError<O::Error>>
    where
        O: AsyncReversibleOperation,
        O::Error: std::error::Error + Send + Sync + 'static,
    {
        let Some(flow) = context::current() else {
            warn!(operation = operation.name(), "no compensation flow seeded for task");
            return Err(TransactionError::NoFlowContext);
        };
        self.execute_in(&flow, operation, input).await
    }

    /// Execute one operation within an explicitly provided flow.
    ///
    /// On success the operation is pushed onto the flow's stack. On failure
    /// the stack is drained according to the configured [`DispatchMode`]:
    /// with `Await` every reversal has finished when this returns, with
    /// `Detached` the reversals have only been spawned onto the current tokio
    /// runtime. Outside a tokio runtime there is nothing to spawn onto, and
    /// `Detached` falls back to awaiting. The stack is empty in every case.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Failed` wrapping the forward action's error.
    pub async fn execute_in<O>(
        &self,
        flow: &FlowHandle,
        mut operation: O,
        input: O::Input,
    ) -> Result<O::Output, TransactionError<O::Error>>
    where
        O: AsyncReversibleOperation,
        O::Error: std::error::Error + Send + Sync + 'static,
    {
        let name = operation.name();
        match operation.forward(input).await {
            Ok(output) => {
                let depth = {
                    let mut state = flow.lock();
                    let record = state.audit.record_applied(name);
                    state.stack.push(AsyncCompensation::new(record, operation));
                    state.stack.len()
                };
                debug!(operation = name, depth, "operation applied");
                Ok(output)
            }
            Err(cause) => {
                let depth = {
                    let mut state = flow.lock();
                    state.audit.record_failed(name);
                    state.stack.len()
                };
                warn!(operation = name, depth, "forward action failed");
                let policy = self.config.on_reversal_failure();
                let summary = match (self.config.dispatch(), Handle::try_current()) {
                    (DispatchMode::Await, _) => drain_awaiting(flow, policy).await,
                    (DispatchMode::Detached, Ok(runtime)) => drain_detached(flow, &runtime),
                    (DispatchMode::Detached, Err(_)) => {
                        warn!(
                            operation = name,
                            "no tokio runtime to detach onto, awaiting reversals"
                        );
                        drain_awaiting(flow, policy).await
                    }
                };
                summary.log(name);
                Err(TransactionError::Failed {
                    operation: name,
                    unwound: summary.unwound(),
                    cause,
                })
            }
        }
    }
}

// Operations a reversal applies through the same flow are not part of the
// unwind: whatever sits above the remaining entries once it returns is
// discarded without being reversed.
async fn drain_awaiting(flow: &FlowHandle, policy: ReversalFailurePolicy) -> DrainSummary {
    let mut summary = DrainSummary::default();

    loop {
        let next = {
            let mut state = flow.lock();
            state.stack.pop().map(|entry| (entry, state.stack.len()))
        };
        let Some((entry, remaining)) = next else {
            break;
        };
        let (record, name) = (entry.record(), entry.name());
        let result = entry.reverse().await;

        let mut state = flow.lock();
        let state = &mut *state;
        for nested in state.stack.drain_above(remaining) {
            debug!(
                operation = nested.name(),
                reversal = name,
                "operation applied during reversal discarded"
            );
            state.audit.record_discarded(nested.record());
        }
        match result {
            Ok(()) => {
                state.audit.record_reversed(record);
                summary.reversed += 1;
                debug!(operation = name, remaining = state.stack.len(), "operation reversed");
            }
            Err(err) => {
                state.audit.record_reversal_failed(record);
                summary.failed += 1;
                warn!(operation = name, error = %err.source, "reversal failed");
                if policy == ReversalFailurePolicy::Abort {
                    for skipped in state.stack.drain_lifo() {
                        error!(operation = skipped.name(), "operation discarded without reversal");
                        state.audit.record_discarded(skipped.record());
                        summary.discarded += 1;
                    }
                }
            }
        }
    }

    summary
}

// Each reversal runs on its own task, so completion order is not guaranteed
// and the caller is answered before any of them has finished.
fn drain_detached(flow: &FlowHandle, runtime: &Handle) -> DrainSummary {
    let mut summary = DrainSummary::default();

    let pending: Vec<AsyncCompensation> = {
        let mut state = flow.lock();
        let state = &mut *state;
        let pending: Vec<_> = state.stack.drain_lifo().collect();
        for entry in &pending {
            state.audit.record_dispatched(entry.record());
        }
        pending
    };

    for entry in pending {
        let (record, name) = (entry.record(), entry.name());
        let flow = flow.clone();
        runtime.spawn(
            async move {
                let result = entry.reverse().await;
                let mut state = flow.lock();
                match result {
                    Ok(()) => {
                        state.audit.record_reversed(record);
                        debug!(operation = name, "detached reversal finished");
                    }
                    Err(err) => {
                        state.audit.record_reversal_failed(record);
                        warn!(operation = name, error = %err.source, "detached reversal failed");
                    }
                }
            }
            .in_current_span(),
        );
        summary.dispatched += 1;
        debug!(operation = name, "reversal dispatched");
    }

    summary
}
