use tracing::warn;

use crate::audit::FlowAuditLog;
use crate::config::ExecutorConfig;
use crate::error::TransactionError;
use crate::executor::{record_applied, unwind};
use crate::operation::ReversibleOperation;
use crate::stack::CompensationStack;

/// An explicit, flow-scoped compensation context.
///
/// Create one per logical flow and pass it by `&mut` through the call chain.
/// Nothing is shared with other flows or with the calling thread, so a
/// `Flow` is safe to use from pooled threads.
#[derive(Debug, Default)]
pub struct Flow {
    stack: CompensationStack,
    audit: FlowAuditLog,
    config: ExecutorConfig,
}

impl Flow {
    /// Start a new flow with an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Execute one operation within this flow.
    ///
    /// On success the operation is pushed onto the flow's stack. On failure
    /// the stack is drained, reversing every applied operation most recent
    /// first, before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Failed` wrapping the forward action's error.
    pub fn execute<O>(
        &mut self,
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
                record_applied(&mut self.stack, &mut self.audit, operation);
                Ok(output)
            }
            Err(cause) => {
                self.audit.record_failed(name);
                warn!(operation = name, depth = self.stack.len(), "forward action failed");
                let summary = unwind(
                    &mut self.stack,
                    &mut self.audit,
                    self.config.on_reversal_failure(),
                );
                summary.log(name);
                Err(TransactionError::Failed {
                    operation: name,
                    unwound: summary.unwound(),
                    cause,
                })
            }
        }
    }

    /// Number of applied operations on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn stack(&self) -> &CompensationStack {
        &self.stack
    }

    #[must_use]
    pub fn audit_log(&self) -> &FlowAuditLog {
        &self.audit
    }

    /// End the flow, keeping the applied operations un-reversed.
    #[must_use]
    pub fn finish(self) -> FlowAuditLog {
        self.audit
    }
}
