//! A three-step booking: reserve seats, charge the card, issue the ticket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gtx_core::{
    DispatchMode, ExecutorConfig, Flow, FlowAuditLog, OperationStatus, ReversibleOperation,
    TransactionError,
};
use gtx_reactive::{AsyncReversibleOperation, FlowHandle, ReactiveExecutor};
use tracing::{info, warn};

use crate::services::{ServiceError, Services, Snapshot};

const SETTLE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct Booking {
    pub seats: u32,
    pub price_cents: u64,
}

impl Booking {
    fn total_cents(self) -> Result<u64, ServiceError> {
        u64::from(self.seats)
            .checked_mul(self.price_cents)
            .ok_or(ServiceError::AmountOverflow {
                seats: self.seats,
                price_cents: self.price_cents,
            })
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub ticket: Result<u64, TransactionError<ServiceError>>,
    pub audit: FlowAuditLog,
    pub snapshot: Snapshot,
}

struct ReserveSeats {
    services: Arc<Services>,
    hold: Option<u64>,
}

struct ChargeCard {
    services: Arc<Services>,
    charge: Option<u64>,
}

struct IssueTicket {
    services: Arc<Services>,
    ticket: Option<u64>,
}

impl ReserveSeats {
    fn new(services: &Arc<Services>) -> Self {
        Self {
            services: Arc::clone(services),
            hold: None,
        }
    }

    fn apply(&mut self, seats: u32) -> Result<u64, ServiceError> {
        let hold = self.services.reserve(seats)?;
        self.hold = Some(hold);
        Ok(hold)
    }

    fn undo(self) -> Result<(), ServiceError> {
        self.hold.map_or(Ok(()), |hold| self.services.release(hold))
    }
}

impl ChargeCard {
    fn new(services: &Arc<Services>) -> Self {
        Self {
            services: Arc::clone(services),
            charge: None,
        }
    }

    fn apply(&mut self, booking: Booking) -> Result<u64, ServiceError> {
        let charge = self.services.charge(booking.total_cents()?)?;
        self.charge = Some(charge);
        Ok(charge)
    }

    fn undo(self) -> Result<(), ServiceError> {
        self.charge
            .map_or(Ok(()), |charge| self.services.refund(charge))
    }
}

impl IssueTicket {
    fn new(services: &Arc<Services>) -> Self {
        Self {
            services: Arc::clone(services),
            ticket: None,
        }
    }

    fn apply(&mut self, hold: u64) -> Result<u64, ServiceError> {
        let ticket = self.services.issue(hold)?;
        self.ticket = Some(ticket);
        Ok(ticket)
    }

    fn undo(self) -> Result<(), ServiceError> {
        self.ticket
            .map_or(Ok(()), |ticket| self.services.void(ticket))
    }
}

macro_rules! reversible {
    ($op:ty, $name:literal, $input:ty) => {
        impl ReversibleOperation for $op {
            type Input = $input;
            type Output = u64;
            type Error = ServiceError;

            fn name(&self) -> &'static str {
                $name
            }

            fn forward(&mut self, input: $input) -> Result<u64, ServiceError> {
                self.apply(input)
            }

            fn reverse(self) -> Result<(), ServiceError> {
                self.undo()
            }
        }

        #[async_trait]
        impl AsyncReversibleOperation for $op {
            type Input = $input;
            type Output = u64;
            type Error = ServiceError;

            fn name(&self) -> &'static str {
                $name
            }

            async fn forward(&mut self, input: $input) -> Result<u64, ServiceError> {
                tokio::task::yield_now().await;
                self.apply(input)
            }

            async fn reverse(self) -> Result<(), ServiceError> {
                tokio::task::yield_now().await;
                self.undo()
            }
        }
    };
}

reversible!(ReserveSeats, "reserve_seats", u32);
reversible!(ChargeCard, "charge_card", Booking);
reversible!(IssueTicket, "issue_ticket", u64);

/// Book through an explicit blocking [`Flow`].
pub fn run_blocking(services: &Arc<Services>, booking: Booking, config: ExecutorConfig) -> Outcome {
    let mut flow = Flow::with_config(config);
    let ticket = book_blocking(&mut flow, services, booking);
    Outcome {
        ticket,
        audit: flow.finish(),
        snapshot: services.snapshot(),
    }
}

fn book_blocking(
    flow: &mut Flow,
    services: &Arc<Services>,
    booking: Booking,
) -> Result<u64, TransactionError<ServiceError>> {
    let hold = flow.execute(ReserveSeats::new(services), booking.seats)?;
    flow.execute(ChargeCard::new(services), booking)?;
    flow.execute(IssueTicket::new(services), hold)
}

/// Book through the reactive executor inside a freshly seeded flow.
///
/// With detached dispatch, a failed booking waits up to `settle_timeout` for
/// the background reversals before taking the snapshot.
pub async fn run_reactive(
    services: &Arc<Services>,
    booking: Booking,
    config: ExecutorConfig,
    settle_timeout: Duration,
) -> Outcome {
    let flow = FlowHandle::new();
    let executor = ReactiveExecutor::with_config(config);

    let ticket = flow
        .clone()
        .scope(book_reactive(executor, Arc::clone(services), booking))
        .await;

    if ticket.is_err() && config.dispatch() == DispatchMode::Detached {
        wait_for_detached(&flow, settle_timeout).await;
    }

    Outcome {
        ticket,
        audit: flow.audit_log(),
        snapshot: services.snapshot(),
    }
}

async fn book_reactive(
    executor: ReactiveExecutor,
    services: Arc<Services>,
    booking: Booking,
) -> Result<u64, TransactionError<ServiceError>> {
    let hold = executor
        .execute(ReserveSeats::new(&services), booking.seats)
        .await?;
    executor
        .execute(ChargeCard::new(&services), booking)
        .await?;
    executor.execute(IssueTicket::new(&services), hold).await
}

fn pending_reversals(flow: &FlowHandle) -> usize {
    flow.audit_log()
        .records()
        .iter()
        .filter(|record| record.status == OperationStatus::Dispatched)
        .count()
}

/// Returns whether every detached reversal settled within `limit`.
async fn wait_for_detached(flow: &FlowHandle, limit: Duration) -> bool {
    let settled = tokio::time::timeout(limit, async {
        loop {
            let pending = pending_reversals(flow);
            if pending == 0 {
                return;
            }
            info!(pending, "waiting for detached reversals");
            tokio::time::sleep(SETTLE_POLL).await;
        }
    })
    .await
    .is_ok();

    if !settled {
        warn!(
            pending = pending_reversals(flow),
            timeout = ?limit,
            "detached reversals still running, snapshot may be mid-compensation"
        );
    }
    settled
}
