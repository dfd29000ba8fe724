//! Core types and utilities for the seller credit ledger.
//!
//! This crate provides the foundational types used throughout the ledger:
//!
//! - **Identifiers**: `SellerId`, `TransactionId`, `CreditRequestId`
//! - **Sellers**: `Seller` and its prepaid balance
//! - **Credit requests**: `CreditRequest`, `RequestStatus`, `Decision`
//! - **Charges**: `Charge`, `ChargeStatus`
//! - **Transaction log**: `TransactionLogEntry`, `TransactionType`
//! - **Values**: amount validation, `PhoneNumber`, `DateRange`
//!
//! # Amounts
//!
//! Amounts are `rust_decimal::Decimal` values with exactly two fraction
//! digits. A seller's balance always equals the sum of its log entries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod charge;
pub mod credits;
pub mod error;
pub mod ids;
pub mod money;
pub mod request;
pub mod seller;

pub use charge::{Charge, ChargeStatus};
pub use credits::{TransactionLogEntry, TransactionType};
pub use error::{LedgerError, Result};
pub use ids::{CreditRequestId, IdError, SellerId, TransactionId};
pub use money::{to_ledger_scale, validate_amount, DateRange, PhoneNumber, AMOUNT_SCALE};
pub use request::{CreditRequest, Decision, RequestStatus};
pub use seller::Seller;
