use std::fmt;

use async_trait::async_trait;
use gtx_core::{BoxError, RecordId, ReversalError, StackEntry};

use crate::operation::AsyncReversibleOperation;

#[async_trait]
trait AsyncReversal: Send {
    fn name(&self) -> &'static str;

    async fn reverse_erased(self: Box<Self>) -> Result<(), BoxError>;
}

struct Applied<O> {
    operation: O,
}

#[async_trait]
impl<O> AsyncReversal for Applied<O>
where
    O: AsyncReversibleOperation,
    O::Error: std::error::Error + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.operation.name()
    }

    async fn reverse_erased(self: Box<Self>) -> Result<(), BoxError> {
        self.operation.reverse().await.map_err(BoxError::from)
    }
}

/// An applied asynchronous operation, reduced to its reversal action.
pub struct AsyncCompensation {
    inner: Box<dyn AsyncReversal>,
    record: RecordId,
}

impl AsyncCompensation {
    /// Wrap an operation whose forward action has already succeeded and was
    /// logged as `record`.
    pub fn new<O>(record: RecordId, operation: O) -> Self
    where
        O: AsyncReversibleOperation,
        O::Error: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(Applied { operation }),
            record,
        }
    }

    #[must_use]
    pub fn record(&self) -> RecordId {
        self.record
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Run the reversal action, consuming the handle.
    ///
    /// # Errors
    ///
    /// Returns a [`ReversalError`] naming the operation if the reversal fails.
    pub async fn reverse(self) -> Result<(), ReversalError> {
        let operation = self.inner.name();
        self.inner
            .reverse_erased()
            .await
            .map_err(|source| ReversalError { operation, source })
    }
}

impl StackEntry for AsyncCompensation {
    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl fmt::Debug for AsyncCompensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AsyncCompensation")
            .field(&self.name())
            .finish()
    }
}
