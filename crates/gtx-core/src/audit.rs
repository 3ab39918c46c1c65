use std::time::Instant;

/// Status of an operation in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationStatus {
    /// Forward action succeeded; the operation is on the compensation stack.
    Applied,
    /// Forward action failed.
    Failed,
    /// Reversal action completed.
    Reversed,
    /// Reversal action returned an error.
    ReversalFailed,
    /// Popped from the stack without being reversed.
    Discarded,
    /// Reversal handed to a background task; outcome not yet known.
    Dispatched,
}

/// Position of a record in a [`FlowAuditLog`].
///
/// Returned when an operation is recorded and carried by its stack entry, so
/// the reversal outcome settles exactly that record even when several
/// operations share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Record of one operation executed within a flow.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// Name of the operation.
    pub name: &'static str,
    /// Current status.
    pub status: OperationStatus,
    /// When the forward action completed.
    pub recorded_at: Instant,
    /// When the status last changed after the forward action.
    pub settled_at: Option<Instant>,
}

/// Audit log of every operation executed within one flow.
#[derive(Debug, Clone, Default)]
pub struct FlowAuditLog {
    records: Vec<OperationRecord>,
}

impl FlowAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation whose forward action succeeded.
    pub fn record_applied(&mut self, name: &'static str) -> RecordId {
        self.push(name, OperationStatus::Applied)
    }

    /// Record an operation whose forward action failed.
    pub fn record_failed(&mut self, name: &'static str) -> RecordId {
        self.push(name, OperationStatus::Failed)
    }

    pub fn record_reversed(&mut self, id: RecordId) {
        self.settle(id, OperationStatus::Reversed);
    }

    pub fn record_reversal_failed(&mut self, id: RecordId) {
        self.settle(id, OperationStatus::ReversalFailed);
    }

    pub fn record_discarded(&mut self, id: RecordId) {
        self.settle(id, OperationStatus::Discarded);
    }

    pub fn record_dispatched(&mut self, id: RecordId) {
        self.settle(id, OperationStatus::Dispatched);
    }

    /// Get one record.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&OperationRecord> {
        self.records.get(id.0)
    }

    /// Get all records in the order the forward actions ran.
    #[must_use]
    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Get a summary of the flow for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                OperationStatus::Applied => "✓",
                OperationStatus::Failed => "✗",
                OperationStatus::Reversed => "↩",
                OperationStatus::ReversalFailed => "⚠",
                OperationStatus::Discarded => "-",
                OperationStatus::Dispatched => "…",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }

    fn push(&mut self, name: &'static str, status: OperationStatus) -> RecordId {
        self.records.push(OperationRecord {
            name,
            status,
            recorded_at: Instant::now(),
            settled_at: None,
        });
        RecordId(self.records.len() - 1)
    }

    // Only pending records change; a failed forward action stays failed. Ids
    // from a log that has since been cleared match nothing.
    fn settle(&mut self, id: RecordId, status: OperationStatus) {
        let pending = self.records.get_mut(id.0).filter(|record| {
            matches!(
                record.status,
                OperationStatus::Applied | OperationStatus::Dispatched
            )
        });
        if let Some(record) = pending {
            record.status = status;
            record.settled_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_audit_log_is_empty() {
        let log = FlowAuditLog::new();
        assert!(log.records().is_empty());
    }

    #[test]
    fn record_applied_adds_pending_record() {
        let mut log = FlowAuditLog::new();
        let id = log.record_applied("reserve");

        assert_eq!(log.records().len(), 1);
        let record = log.get(id).expect("record exists");
        assert_eq!(record.name, "reserve");
        assert_eq!(record.status, OperationStatus::Applied);
        assert!(record.settled_at.is_none());
    }

    #[test]
    fn settling_targets_the_given_record_among_equal_names() {
        let mut log = FlowAuditLog::new();
        let first = log.record_applied("transfer");
        let second = log.record_applied("transfer");
        log.record_failed("notify");

        log.record_dispatched(second);
        log.record_dispatched(first);
        log.record_reversal_failed(second);
        log.record_reversed(first);

        assert_eq!(log.records()[0].status, OperationStatus::Reversed);
        assert_eq!(log.records()[1].status, OperationStatus::ReversalFailed);
        assert!(log.records()[1].settled_at.is_some());
    }

    #[test]
    fn dispatched_record_settles_later() {
        let mut log = FlowAuditLog::new();
        let id = log.record_applied("reserve");
        log.record_dispatched(id);
        assert_eq!(log.records()[0].status, OperationStatus::Dispatched);

        log.record_reversed(id);
        assert_eq!(log.records()[0].status, OperationStatus::Reversed);
    }

    #[test]
    fn failed_record_is_never_settled() {
        let mut log = FlowAuditLog::new();
        let id = log.record_failed("charge");
        log.record_reversed(id);

        assert_eq!(log.records()[0].status, OperationStatus::Failed);
    }

    #[test]
    fn settled_record_is_not_settled_again() {
        let mut log = FlowAuditLog::new();
        let id = log.record_applied("charge");
        log.record_reversal_failed(id);
        log.record_reversed(id);

        assert_eq!(log.records()[0].status, OperationStatus::ReversalFailed);
    }

    #[test]
    fn id_from_cleared_log_matches_nothing() {
        let mut log = FlowAuditLog::new();
        let stale = log.record_applied("charge");
        log.clear();

        log.record_reversed(stale);

        assert!(log.records().is_empty());
    }

    #[test]
    fn summary_formats_all_operations() {
        let mut log = FlowAuditLog::new();
        let reserve = log.record_applied("reserve");
        let hold = log.record_applied("hold");
        let pending = log.record_applied("pending");
        log.record_failed("charge");
        log.record_reversed(pending);
        log.record_discarded(hold);
        log.record_reversal_failed(reserve);

        let summary = log.summary();
        assert!(summary.contains("⚠ reserve"));
        assert!(summary.contains("- hold"));
        assert!(summary.contains("↩ pending"));
        assert!(summary.contains("✗ charge"));
    }
}
