use std::fmt::Debug;
use std::path::PathBuf;

use thiserror::Error;

/// Type-erased error produced by a reversal action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error from a failed reversal action.
#[derive(Debug, Error)]
#[error("reversal of '{operation}' failed")]
pub struct ReversalError {
    /// Name of the operation whose reversal failed.
    pub operation: &'static str,
    /// The underlying error.
    #[source]
    pub source: BoxError,
}

/// Error returned to the caller once a flow has failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransactionError<E: Debug> {
    /// A forward action failed and the flow's compensation stack was drained.
    ///
    /// `unwound` counts the operations popped from the stack, whether they were
    /// reversed, failed to reverse, were discarded, or were dispatched.
    #[error("operation '{operation}' failed, unwound {unwound} prior operation(s)")]
    Failed {
        /// Name of the operation whose forward action failed.
        operation: &'static str,
        /// Number of previously applied operations popped during the drain.
        unwound: usize,
        /// The error raised by the forward action.
        #[source]
        cause: E,
    },

    /// No compensation stack was seeded for the current asynchronous flow.
    #[error("no compensation flow is bound to the current task")]
    NoFlowContext,
}

impl<E: Debug> TransactionError<E> {
    /// The original forward-action error, if the flow got far enough to run one.
    #[must_use]
    pub fn cause(&self) -> Option<&E> {
        match self {
            Self::Failed { cause, .. } => Some(cause),
            Self::NoFlowContext => None,
        }
    }

    /// Consume the error, returning the original forward-action error.
    #[must_use]
    pub fn into_cause(self) -> Option<E> {
        match self {
            Self::Failed { cause, .. } => Some(cause),
            Self::NoFlowContext => None,
        }
    }
}

/// Error loading an [`ExecutorConfig`](crate::ExecutorConfig).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse transaction config")]
    Parse(#[from] toml::de::Error),
}
