use std::fmt;

use crate::audit::RecordId;
use crate::error::{BoxError, ReversalError};
use crate::operation::ReversibleOperation;
use crate::stack::StackEntry;

trait Reversal {
    fn name(&self) -> &'static str;

    fn reverse_erased(self: Box<Self>) -> Result<(), BoxError>;
}

struct Applied<O> {
    operation: O,
}

impl<O> Reversal for Applied<O>
where
    O: ReversibleOperation,
    O::Error: std::error::Error + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.operation.name()
    }

    fn reverse_erased(self: Box<Self>) -> Result<(), BoxError> {
        self.operation.reverse().map_err(BoxError::from)
    }
}

/// An applied operation, reduced to its reversal action.
///
/// The compensation stack never re-runs a forward action, so it stores
/// operations of any type behind this uniform handle.
pub struct Compensation {
    inner: Box<dyn Reversal>,
    record: RecordId,
}

impl Compensation {
    /// Wrap an operation whose forward action has already succeeded and was
    /// logged as `record`.
    pub fn new<O>(record: RecordId, operation: O) -> Self
    where
        O: ReversibleOperation + 'static,
        O::Error: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(Applied { operation }),
            record,
        }
    }

    /// Audit record the reversal outcome settles.
    #[must_use]
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// Name of the wrapped operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Run the reversal action, consuming the handle.
    ///
    /// # Errors
    ///
    /// Returns a [`ReversalError`] naming the operation if the reversal fails.
    pub fn reverse(self) -> Result<(), ReversalError> {
        let operation = self.inner.name();
        self.inner
            .reverse_erased()
            .map_err(|source| ReversalError { operation, source })
    }
}

impl StackEntry for Compensation {
    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl fmt::Debug for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Compensation").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::audit::FlowAuditLog;

    fn record(name: &'static str) -> RecordId {
        FlowAuditLog::new().record_applied(name)
    }

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    struct Refund {
        refunded: Rc<Cell<u32>>,
        amount: u32,
    }

    impl ReversibleOperation for Refund {
        type Input = u32;
        type Output = ();
        type Error = TestError;

        fn name(&self) -> &'static str {
            "charge"
        }

        fn forward(&mut self, input: u32) -> Result<(), TestError> {
            self.amount = input;
            Ok(())
        }

        fn reverse(self) -> Result<(), TestError> {
            self.refunded.set(self.refunded.get() + self.amount);
            Ok(())
        }
    }

    struct Stuck;

    impl ReversibleOperation for Stuck {
        type Input = ();
        type Output = ();
        type Error = TestError;

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn forward(&mut self, (): ()) -> Result<(), TestError> {
            Ok(())
        }

        fn reverse(self) -> Result<(), TestError> {
            Err(TestError("cannot undo".to_string()))
        }
    }

    #[test]
    fn compensation_delegates_name() {
        let handle = Compensation::new(record("stuck"), Stuck);
        assert_eq!(handle.name(), "stuck");
        assert_eq!(format!("{handle:?}"), "Compensation(\"stuck\")");
    }

    #[test]
    fn compensation_reverses_with_state_captured_by_forward() {
        let refunded = Rc::new(Cell::new(0));
        let mut op = Refund {
            refunded: Rc::clone(&refunded),
            amount: 0,
        };
        op.forward(250).expect("forward succeeds");

        Compensation::new(record("charge"), op)
            .reverse()
            .expect("reverse succeeds");

        assert_eq!(refunded.get(), 250);
    }

    #[test]
    fn compensation_wraps_reversal_failure() {
        let err = Compensation::new(record("stuck"), Stuck)
            .reverse()
            .expect_err("reversal should fail");

        assert_eq!(err.operation, "stuck");
        assert_eq!(err.source.to_string(), "cannot undo");
    }
}
