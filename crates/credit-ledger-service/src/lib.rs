//! Seller credit ledger engine.
//!
//! This crate provides the engine on top of the ledger store:
//!
//! - Charge processing (`ChargeProcessor`), one seller-locked unit per charge
//! - The credit request approval workflow, including bulk decisions
//! - Asynchronous charge delivery with retry of contention failures
//! - Balance reconciliation against the transaction log
//! - The `Ledger` facade an outer API layer holds
//!
//! # Idempotency
//!
//! Charges carry a caller-supplied id that doubles as the log entry id.
//! Delivering the same charge twice debits once; the second delivery reports
//! the recorded outcome.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatch;
pub mod ledger;
pub mod processor;
pub mod reconcile;
pub mod workflow;

pub use config::LedgerConfig;
pub use dispatch::{Accepted, ChargeDispatcher, DispatchPolicy};
pub use ledger::Ledger;
pub use processor::{ChargeCommand, ChargeOutcome, ChargeProcessor};
pub use reconcile::{reconcile, reconcile_all, Reconciliation};
pub use workflow::{CreditRequestWorkflow, DecisionOutcome, DecisionReport, DecisionResult};
