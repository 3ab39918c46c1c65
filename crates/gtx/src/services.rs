//! In-memory stand-ins for the remote services a booking touches.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use clap::ValueEnum;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Reserve,
    Charge,
    Issue,
}

impl Stage {
    fn service(self) -> &'static str {
        match self {
            Self::Reserve => "inventory",
            Self::Charge => "payments",
            Self::Issue => "ticketing",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("{service} service unavailable")]
    Unavailable { service: &'static str },

    #[error("only {available} seat(s) left, {requested} requested")]
    SoldOut { available: u32, requested: u32 },

    #[error("{service} has no record '{id}'")]
    UnknownRecord { service: &'static str, id: u64 },

    #[error("total for {seats} seat(s) at {price_cents} cents does not fit in a charge")]
    AmountOverflow { seats: u32, price_cents: u64 },
}

/// Which calls should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub fail_at: Option<Stage>,
    pub fail_reversal_of: Option<Stage>,
}

#[derive(Debug, Default)]
struct Ledger {
    next_id: u64,
    seats_left: u32,
    holds: BTreeMap<u64, u32>,
    charges: BTreeMap<u64, u64>,
    tickets: BTreeMap<u64, u64>,
}

/// Seat inventory, payment gateway and ticket desk sharing one ledger.
#[derive(Debug)]
pub struct Services {
    ledger: Mutex<Ledger>,
    faults: Faults,
}

impl Services {
    #[must_use]
    pub fn new(seats: u32, faults: Faults) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                next_id: 1,
                seats_left: seats,
                ..Ledger::default()
            }),
            faults,
        }
    }

    pub fn reserve(&self, seats: u32) -> Result<u64, ServiceError> {
        self.check(Stage::Reserve)?;
        let mut ledger = self.ledger();
        if ledger.seats_left < seats {
            return Err(ServiceError::SoldOut {
                available: ledger.seats_left,
                requested: seats,
            });
        }
        ledger.seats_left -= seats;
        let id = ledger.allocate();
        ledger.holds.insert(id, seats);
        Ok(id)
    }

    pub fn release(&self, hold: u64) -> Result<(), ServiceError> {
        self.check_reversal(Stage::Reserve)?;
        let mut ledger = self.ledger();
        let seats = ledger
            .holds
            .remove(&hold)
            .ok_or(ServiceError::UnknownRecord {
                service: "inventory",
                id: hold,
            })?;
        ledger.seats_left += seats;
        Ok(())
    }

    pub fn charge(&self, amount_cents: u64) -> Result<u64, ServiceError> {
        self.check(Stage::Charge)?;
        let mut ledger = self.ledger();
        let id = ledger.allocate();
        ledger.charges.insert(id, amount_cents);
        Ok(id)
    }

    pub fn refund(&self, charge: u64) -> Result<(), ServiceError> {
        self.check_reversal(Stage::Charge)?;
        self.ledger()
            .charges
            .remove(&charge)
            .map(|_| ())
            .ok_or(ServiceError::UnknownRecord {
                service: "payments",
                id: charge,
            })
    }

    pub fn issue(&self, hold: u64) -> Result<u64, ServiceError> {
        self.check(Stage::Issue)?;
        let mut ledger = self.ledger();
        let id = ledger.allocate();
        ledger.tickets.insert(id, hold);
        Ok(id)
    }

    pub fn void(&self, ticket: u64) -> Result<(), ServiceError> {
        self.check_reversal(Stage::Issue)?;
        self.ledger()
            .tickets
            .remove(&ticket)
            .map(|_| ())
            .ok_or(ServiceError::UnknownRecord {
                service: "ticketing",
                id: ticket,
            })
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let ledger = self.ledger();
        Snapshot {
            seats_left: ledger.seats_left,
            holds: ledger.holds.len(),
            charged_cents: ledger.charges.values().sum(),
            tickets: ledger.tickets.len(),
        }
    }

    fn check(&self, stage: Stage) -> Result<(), ServiceError> {
        if self.faults.fail_at == Some(stage) {
            return Err(ServiceError::Unavailable {
                service: stage.service(),
            });
        }
        Ok(())
    }

    fn check_reversal(&self, stage: Stage) -> Result<(), ServiceError> {
        if self.faults.fail_reversal_of == Some(stage) {
            return Err(ServiceError::Unavailable {
                service: stage.service(),
            });
        }
        Ok(())
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ledger {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Externally visible state of the services after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub seats_left: u32,
    pub holds: usize,
    pub charged_cents: u64,
    pub tickets: usize,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seats left: {}, holds: {}, charged: {}.{:02}, tickets: {}",
            self.seats_left,
            self.holds,
            self.charged_cents / 100,
            self.charged_cents % 100,
            self.tickets
        )
    }
}
