//! Integration tests for flow-scoped compensation behavior.

use std::cell::RefCell;
use std::rc::Rc;

use gtx_core::{Flow, OperationStatus, ReversibleOperation, TransactionError, operation};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

type Log = Rc<RefCell<Vec<String>>>;

struct TrackedStep {
    name: &'static str,
    log: Log,
    fail_forward: bool,
}

impl TrackedStep {
    fn ok(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            fail_forward: false,
        }
    }

    fn failing(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            fail_forward: true,
        }
    }
}

impl ReversibleOperation for TrackedStep {
    type Input = i32;
    type Output = i32;
    type Error = TestError;

    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&mut self, input: i32) -> Result<i32, TestError> {
        self.log.borrow_mut().push(format!("forward {}", self.name));
        if self.fail_forward {
            Err(TestError(format!("{} failed", self.name)))
        } else {
            Ok(input + 1)
        }
    }

    fn reverse(self) -> Result<(), TestError> {
        self.log.borrow_mut().push(format!("reverse {}", self.name));
        Ok(())
    }
}

const NAMES: [&str; 5] = ["s1", "s2", "s3", "s4", "s5"];

fn reversals(log: &Log) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|entry| entry.starts_with("reverse"))
        .cloned()
        .collect()
}

#[test]
fn failure_at_kth_step_reverses_previous_steps_in_reverse_order() {
    for k in 1..=NAMES.len() {
        let log = Log::default();
        let mut flow = Flow::new();

        for (index, &name) in NAMES.iter().enumerate().take(k) {
            let step = if index + 1 == k {
                TrackedStep::failing(name, &log)
            } else {
                TrackedStep::ok(name, &log)
            };
            let result = flow.execute(step, 0);
            assert_eq!(result.is_err(), index + 1 == k);
        }

        let expected: Vec<String> = NAMES[..k - 1]
            .iter()
            .rev()
            .map(|name| format!("reverse {name}"))
            .collect();
        assert_eq!(reversals(&log), expected, "failure at step {k}");
        assert_eq!(flow.depth(), 0);
    }
}

#[test]
fn successful_steps_are_never_reversed() {
    let log = Log::default();
    let mut flow = Flow::new();

    for name in NAMES {
        flow.execute(TrackedStep::ok(name, &log), 0)
            .expect("step should succeed");
    }

    assert!(reversals(&log).is_empty());
    assert_eq!(flow.depth(), NAMES.len());
}

#[test]
fn a_succeeds_b_fails_reverses_a_once_and_wraps_error() {
    let log = Log::default();
    let mut flow = Flow::new();

    flow.execute(TrackedStep::ok("a", &log), 0)
        .expect("a should succeed");
    let err = flow
        .execute(TrackedStep::failing("b", &log), 0)
        .expect_err("b should fail");

    assert_eq!(*log.borrow(), vec!["forward a", "forward b", "reverse a"]);
    match err {
        TransactionError::Failed {
            operation,
            unwound,
            cause,
        } => {
            assert_eq!(operation, "b");
            assert_eq!(unwound, 1);
            assert_eq!(cause.to_string(), "b failed");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(flow.depth(), 0);
}

#[test]
fn three_successful_steps_stay_on_stack_in_apply_order() {
    let log = Log::default();
    let mut flow = Flow::new();

    for name in ["a", "b", "c"] {
        flow.execute(TrackedStep::ok(name, &log), 0)
            .expect("step should succeed");
    }

    assert_eq!(flow.stack().operation_names(), vec!["a", "b", "c"]);
    assert!(reversals(&log).is_empty());
}

#[test]
fn first_step_failure_reverses_nothing() {
    let log = Log::default();
    let mut flow = Flow::new();

    let err = flow
        .execute(TrackedStep::failing("first", &log), 0)
        .expect_err("first should fail");

    assert!(matches!(err, TransactionError::Failed { unwound: 0, .. }));
    assert!(reversals(&log).is_empty());
}

#[test]
fn audit_log_tracks_applied_failed_and_reversed() {
    let log = Log::default();
    let mut flow = Flow::new();

    flow.execute(TrackedStep::ok("a", &log), 0)
        .expect("a should succeed");
    flow.execute(TrackedStep::ok("b", &log), 0)
        .expect("b should succeed");
    let _ = flow.execute(TrackedStep::failing("c", &log), 0);

    let audit = flow.finish();
    let statuses: Vec<_> = audit
        .records()
        .iter()
        .map(|record| (record.name, record.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a", OperationStatus::Reversed),
            ("b", OperationStatus::Reversed),
            ("c", OperationStatus::Failed),
        ]
    );
}

#[test]
fn closure_operations_reverse_exactly_what_forward_did() {
    let ledger = Rc::new(RefCell::new(Vec::<u32>::new()));
    let mut flow = Flow::new();

    let issue = {
        let ledger = Rc::clone(&ledger);
        let undo = Rc::clone(&ledger);
        operation(
            "issue_voucher",
            move |amount: u32| {
                ledger.borrow_mut().push(amount);
                let id = ledger.borrow().len() - 1;
                Ok::<_, TestError>((id, id))
            },
            move |id: usize| {
                undo.borrow_mut().remove(id);
                Ok(())
            },
        )
    };
    let reject = operation(
        "notify",
        |_: usize| Err::<((), ()), _>(TestError("mail server down".to_string())),
        |()| Ok(()),
    );

    let voucher = flow.execute(issue, 40).expect("voucher issued");
    assert_eq!(*ledger.borrow(), vec![40]);

    let err = flow.execute(reject, voucher).expect_err("notify fails");

    assert!(ledger.borrow().is_empty());
    assert_eq!(
        err.into_cause().map(|cause| cause.to_string()),
        Some("mail server down".to_string())
    );
}
