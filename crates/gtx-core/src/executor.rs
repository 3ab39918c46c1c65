use tracing::{debug, error, info, warn};

use crate::audit::{FlowAuditLog, RecordId};
use crate::compensation::Compensation;
use crate::config::{ExecutorConfig, ReversalFailurePolicy};
use crate::error::{ReversalError, TransactionError};
use crate::operation::ReversibleOperation;
use crate::stack::CompensationStack;
use crate::thread_bound;

/// Outcome of draining a compensation stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Reversal actions that completed.
    pub reversed: usize,
    /// Reversal actions that returned an error.
    pub failed: usize,
    /// Entries dropped without running their reversal.
    pub discarded: usize,
    /// Reversal actions handed to background tasks.
    pub dispatched: usize,
}

impl DrainSummary {
    /// Total number of entries popped from the stack.
    #[must_use]
    pub fn unwound(&self) -> usize {
        self.reversed + self.failed + self.discarded + self.dispatched
    }

    /// Emit the end-of-drain event.
    pub fn log(&self, failed_operation: &'static str) {
        info!(
            operation = failed_operation,
            reversed = self.reversed,
            failed = self.failed,
            discarded = self.discarded,
            dispatched = self.dispatched,
            "compensation stack drained"
        );
    }
}

/// Blocking executor backed by the calling thread's compensation stack.
///
/// The stack lives in thread-bound storage (see [`thread_bound`]), so every
/// operation executed on one thread belongs to the same flow until
/// [`thread_bound::reset`] is called. Use [`Flow`](crate::Flow) to pass the
/// stack explicitly instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
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

    /// Execute one operation within the current thread's flow.
    ///
    /// On success the operation is pushed onto the thread's stack and its
    /// output returned. On failure every operation on the stack is reversed,
    /// most recent first, and the original error is returned wrapped in
    /// [`TransactionError::Failed`].
    ///
    /// The forward and reversal actions run without the thread's stack being
    /// borrowed, so either may itself execute nested operations. Operations a
    /// reversal action applies are not part of the flow being unwound: they
    /// are discarded, un-reversed, as soon as that reversal returns, and the
    /// stack is empty when this returns an error.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Failed` if the forward action fails.
    pub fn execute<O>(
        &self,
        mut operation: O,
        input: O::Input,
    ) -> Result<O::Output, TransactionError<O::Error>>
    where
        O: ReversibleOperation + 'static,
        O::Error: std::error::Error + Send + Sync + 'static,
    {
        let name = operation.name();
        match operation.forward(input) {
            Ok(output) => {
                thread_bound::with_state(|stack, audit| record_applied(stack, audit, operation));
                Ok(output)
            }
            Err(cause) => {
                let depth = thread_bound::with_state(|stack, audit| {
                    audit.record_failed(name);
                    stack.len()
                });
                warn!(operation = name, depth, "forward action failed");
                let summary = drain_thread_bound(self.config.on_reversal_failure());
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

pub(crate) fn record_applied<O>(
    stack: &mut CompensationStack,
    audit: &mut FlowAuditLog,
    operation: O,
) where
    O: ReversibleOperation + 'static,
    O::Error: std::error::Error + Send + Sync + 'static,
{
    let name = operation.name();
    let record = audit.record_applied(name);
    stack.push(Compensation::new(record, operation));
    debug!(operation = name, depth = stack.len(), "operation applied");
}

/// Pop and reverse every entry of `stack`, most recent first.
///
/// The stack is empty when this returns, whatever the policy.
pub(crate) fn unwind(
    stack: &mut CompensationStack,
    audit: &mut FlowAuditLog,
    policy: ReversalFailurePolicy,
) -> DrainSummary {
    let mut summary = DrainSummary::default();

    while let Some(entry) = stack.pop() {
        let (record, name) = (entry.record(), entry.name());
        let abort = settle(audit, &mut summary, record, name, entry.reverse(), policy);
        if abort {
            discard_remaining(stack, audit, &mut summary);
        }
    }

    summary
}

// Pops under the thread's borrow and reverses with it released. Whatever sits
// above the flow's remaining entries once a reversal returns was applied by
// that reversal and is dropped.
fn drain_thread_bound(policy: ReversalFailurePolicy) -> DrainSummary {
    let mut summary = DrainSummary::default();

    loop {
        let next = thread_bound::with_state(|stack, _| {
            stack.pop().map(|entry| (entry, stack.len()))
        });
        let Some((entry, remaining)) = next else {
            break;
        };
        let (record, name) = (entry.record(), entry.name());
        let result = entry.reverse();

        thread_bound::with_state(|stack, audit| {
            for nested in stack.drain_above(remaining) {
                debug!(
                    operation = nested.name(),
                    reversal = name,
                    "operation applied during reversal discarded"
                );
                audit.record_discarded(nested.record());
            }
            if settle(audit, &mut summary, record, name, result, policy) {
                discard_remaining(stack, audit, &mut summary);
            }
        });
    }

    summary
}

// Returns whether the remaining entries must be abandoned.
fn settle(
    audit: &mut FlowAuditLog,
    summary: &mut DrainSummary,
    record: RecordId,
    name: &'static str,
    result: Result<(), ReversalError>,
    policy: ReversalFailurePolicy,
) -> bool {
    match result {
        Ok(()) => {
            audit.record_reversed(record);
            summary.reversed += 1;
            debug!(operation = name, "operation reversed");
            false
        }
        Err(err) => {
            audit.record_reversal_failed(record);
            summary.failed += 1;
            warn!(operation = name, error = %err.source, "reversal failed");
            policy == ReversalFailurePolicy::Abort
        }
    }
}

fn discard_remaining(
    stack: &mut CompensationStack,
    audit: &mut FlowAuditLog,
    summary: &mut DrainSummary,
) {
    for skipped in stack.drain_lifo() {
        error!(operation = skipped.name(), "operation discarded without reversal");
        audit.record_discarded(skipped.record());
        summary.discarded += 1;
    }
}
