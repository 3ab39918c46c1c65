//! Compensating transactions for asynchronous flows.
//!
//! A flow's continuations may resume on any worker thread, so the compensation
//! stack cannot be tied to thread identity. Instead a [`FlowHandle`] is seeded
//! once into a task-local carrier at the boundary of the inbound unit of work
//! ([`seed`] or [`FlowHandle::scope`]), and every stage executed inside that
//! scope by a [`ReactiveExecutor`] finds the same stack.
//!
//! Tasks spawned with `tokio::spawn` do not inherit task-locals; re-enter the
//! flow explicitly with `handle.scope(..)` using a clone of the handle from
//! [`current`].

mod compensation;
mod context;
mod executor;
mod operation;

pub use compensation::AsyncCompensation;
pub use context::{FlowHandle, current, seed};
pub use executor::ReactiveExecutor;
pub use operation::AsyncReversibleOperation;

pub use gtx_core::{
    DispatchMode, ExecutorConfig, FlowAuditLog, OperationStatus, ReversalFailurePolicy,
    TransactionError,
};
