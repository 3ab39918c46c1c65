use crate::compensation::Compensation;

/// Anything that can sit on a [`CompensationStack`].
pub trait StackEntry {
    /// Name of the operation this entry reverses.
    fn name(&self) -> &'static str;
}

/// Ordered record of the operations applied within one logical flow.
///
/// Holds exactly the operations whose forward action succeeded and that have
/// not been reversed yet, in the order they were applied. The stack is not
/// synchronized; it belongs to a single flow.
#[derive(Debug)]
pub struct CompensationStack<C = Compensation> {
    entries: Vec<C>,
}

impl<C> Default for CompensationStack<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C> CompensationStack<C> {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied operation on top of the stack.
    pub fn push(&mut self, entry: C) {
        self.entries.push(entry);
    }

    /// Remove and return the most recently applied operation.
    pub fn pop(&mut self) -> Option<C> {
        self.entries.pop()
    }

    /// Number of applied operations awaiting possible reversal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry without reversing it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry, most recently applied first.
    pub fn drain_lifo(&mut self) -> impl Iterator<Item = C> + '_ {
        self.entries.drain(..).rev()
    }

    /// Remove the entries pushed after the stack was `len` deep, most recently
    /// applied first.
    pub fn drain_above(&mut self, len: usize) -> impl Iterator<Item = C> + '_ {
        let start = len.min(self.entries.len());
        self.entries.drain(start..).rev()
    }
}

impl<C: StackEntry> CompensationStack<C> {
    /// Names of the applied operations, oldest first.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(StackEntry::name).collect()
    }
}
