use std::marker::PhantomData;

/// A unit of work with a forward action and a reversal action.
///
/// The forward action may capture whatever state the reversal needs (an id
/// returned by a remote service, a copy of the request it issued) in `self`.
/// The reversal consumes the operation, so it can run at most once, and the
/// executors only call it after `forward` returned `Ok` for the same instance.
///
/// # Type Parameters
///
/// - `Input`: Data passed to the forward action
/// - `Output`: Data returned to the caller on success
/// - `Error`: The error type for forward and reversal failures
pub trait ReversibleOperation: Sized {
    /// Data passed to the forward action.
    type Input;

    /// Data produced by the forward action.
    type Output;

    /// Error type for forward and reversal failures.
    type Error;

    /// Human-readable name for logging, audit records and error messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns an error if the forward action fails. The executor then drains
    /// the flow's compensation stack; this operation is not reversed.
    fn forward(&mut self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Undo the effects of a successful forward action.
    ///
    /// Best-effort: the original input is not available unless `forward`
    /// cached it. The default implementation is a no-op, suitable for
    /// read-only operations and for operations that always run first in a flow
    /// and therefore are never reversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the reversal fails.
    fn reverse(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A [`ReversibleOperation`] built from a pair of closures.
///
/// The forward closure returns the caller-visible output together with the
/// state the reversal closure needs. That state is kept until the operation is
/// reversed or dropped.
pub struct FnOperation<I, O, S, E, F, R> {
    name: &'static str,
    forward: F,
    reverse: R,
    state: Option<S>,
    _phantom: PhantomData<fn(I) -> Result<O, E>>,
}

/// Build a [`FnOperation`] from a forward closure and a reversal closure.
///
/// ```
/// use gtx_core::{Flow, operation};
///
/// let mut flow = Flow::new();
/// let reserve = operation(
///     "reserve",
///     |seats: u32| Ok::<_, std::io::Error>((seats, format!("hold-{seats}"))),
///     |hold: String| {
///         assert_eq!(hold, "hold-2");
///         Ok(())
///     },
/// );
///
/// let reserved = flow.execute(reserve, 2).expect("reservation succeeds");
/// assert_eq!(reserved, 2);
/// assert_eq!(flow.depth(), 1);
/// ```
pub fn operation<I, O, S, E, F, R>(
    name: &'static str,
    forward: F,
    reverse: R,
) -> FnOperation<I, O, S, E, F, R>
where
    F: FnMut(I) -> Result<(O, S), E>,
    R: FnOnce(S) -> Result<(), E>,
{
    FnOperation {
        name,
        forward,
        reverse,
        state: None,
        _phantom: PhantomData,
    }
}

impl<I, O, S, E, F, R> ReversibleOperation for FnOperation<I, O, S, E, F, R>
where
    F: FnMut(I) -> Result<(O, S), E>,
    R: FnOnce(S) -> Result<(), E>,
{
    type Input = I;
    type Output = O;
    type Error = E;

    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&mut self, input: I) -> Result<O, E> {
        let (output, state) = (self.forward)(input)?;
        self.state = Some(state);
        Ok(output)
    }

    fn reverse(self) -> Result<(), E> {
        match self.state {
            Some(state) => (self.reverse)(state),
            None => Ok(()),
        }
    }
}
