//! Compensating transactions for sequences of non-atomic remote operations.
//!
//! Every operation executed through this crate exposes a forward action and a
//! reversal action. Operations whose forward action succeeds are recorded on a
//! per-flow [`CompensationStack`]. When a later forward action fails, the stack
//! is drained in LIFO order, reversing every recorded operation, and the caller
//! receives a [`TransactionError`] wrapping the original failure.
//!
//! Two ways of locating the stack of the current flow are provided for
//! blocking code:
//!
//! - [`Flow`]: an explicit handle owning its stack, threaded through the call
//!   chain by `&mut`.
//! - [`Executor`]: looks the stack up in thread-bound storage (see
//!   [`thread_bound`] for the thread-reuse hazard this implies).
//!
//! Asynchronous flows live in the `gtx-reactive` crate, which reuses the stack,
//! audit log and error types defined here.

mod audit;
mod compensation;
mod config;
mod error;
mod executor;
mod flow;
mod operation;
mod stack;
pub mod thread_bound;

pub use audit::{FlowAuditLog, OperationRecord, OperationStatus, RecordId};
pub use compensation::Compensation;
pub use config::{DispatchMode, ExecutorConfig, ReversalFailurePolicy};
pub use error::{BoxError, ConfigError, ReversalError, TransactionError};
pub use executor::{DrainSummary, Executor};
pub use flow::Flow;
pub use operation::{FnOperation, ReversibleOperation, operation};
pub use stack::{CompensationStack, StackEntry};
