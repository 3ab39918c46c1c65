use async_trait::async_trait;

/// Asynchronous counterpart of [`gtx_core::ReversibleOperation`].
///
/// Both actions may suspend, and the flow may resume on a different worker
/// thread afterwards, so operations and their associated types must be `Send`.
#[async_trait]
pub trait AsyncReversibleOperation: Send + Sized + 'static {
    /// Data passed to the forward action.
    type Input: Send;

    /// Data produced by the forward action.
    type Output: Send;

    /// Error type for forward and reversal failures.
    type Error: Send;

    /// Human-readable name for logging, audit records and error messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns an error if the forward action fails.
    async fn forward(&mut self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Undo the effects of a successful forward action.
    ///
    /// The default implementation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the reversal fails.
    async fn reverse(self) -> Result<(), Self::Error> {
        Ok(())
    }
}
