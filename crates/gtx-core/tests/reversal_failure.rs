//! Reversal failures during a drain.
//!
//! The compensating-transaction pattern leaves open whether a failing reversal
//! should stop the drain. Here it is a configurable policy; these tests pin
//! down both behaviours and the guarantees they share: the stack ends empty and
//! the caller always receives the forward failure, never the reversal failure.

use std::cell::RefCell;
use std::rc::Rc;

use gtx_core::{
    ExecutorConfig, Flow, OperationStatus, ReversalFailurePolicy, ReversibleOperation,
    TransactionError,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

type Log = Rc<RefCell<Vec<&'static str>>>;

struct Step {
    name: &'static str,
    log: Log,
    forward_fails: bool,
    reverse_fails: bool,
}

fn step(name: &'static str, log: &Log) -> Step {
    Step {
        name,
        log: Rc::clone(log),
        forward_fails: false,
        reverse_fails: false,
    }
}

impl ReversibleOperation for Step {
    type Input = ();
    type Output = ();
    type Error = TestError;

    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&mut self, (): ()) -> Result<(), TestError> {
        if self.forward_fails {
            Err(TestError(format!("{} forward failed", self.name)))
        } else {
            Ok(())
        }
    }

    fn reverse(self) -> Result<(), TestError> {
        self.log.borrow_mut().push(self.name);
        if self.reverse_fails {
            Err(TestError(format!("{} reverse failed", self.name)))
        } else {
            Ok(())
        }
    }
}

fn run(policy: ReversalFailurePolicy) -> (Flow, Log, TransactionError<TestError>) {
    let log = Log::default();
    let mut flow = Flow::with_config(ExecutorConfig::default().with_reversal_failure(policy));

    flow.execute(step("a", &log), ()).expect("a");
    flow.execute(
        Step {
            reverse_fails: true,
            ..step("b", &log)
        },
        (),
    )
    .expect("b");
    flow.execute(step("c", &log), ()).expect("c");
    let err = flow
        .execute(
            Step {
                forward_fails: true,
                ..step("d", &log)
            },
            (),
        )
        .expect_err("d should fail");

    (flow, log, err)
}

#[test]
fn continue_policy_reverses_every_operation() {
    let (flow, log, err) = run(ReversalFailurePolicy::Continue);

    assert_eq!(*log.borrow(), vec!["c", "b", "a"]);
    assert_eq!(flow.depth(), 0);
    assert!(matches!(err, TransactionError::Failed { unwound: 3, .. }));

    let statuses: Vec<_> = flow
        .audit_log()
        .records()
        .iter()
        .map(|record| record.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            OperationStatus::Reversed,
            OperationStatus::ReversalFailed,
            OperationStatus::Reversed,
            OperationStatus::Failed,
        ]
    );
}

#[test]
fn abort_policy_stops_at_first_failing_reversal() {
    let (flow, log, err) = run(ReversalFailurePolicy::Abort);

    assert_eq!(*log.borrow(), vec!["c", "b"]);
    assert_eq!(flow.depth(), 0);
    assert!(matches!(err, TransactionError::Failed { unwound: 3, .. }));
    assert_eq!(
        flow.audit_log().records()[0].status,
        OperationStatus::Discarded
    );
}

#[test]
fn reversal_failure_never_replaces_forward_failure() {
    for policy in [ReversalFailurePolicy::Continue, ReversalFailurePolicy::Abort] {
        let (_, _, err) = run(policy);

        assert_eq!(
            err.cause().map(ToString::to_string),
            Some("d forward failed".to_string()),
            "{policy:?}"
        );
    }
}
