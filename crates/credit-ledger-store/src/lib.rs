//! `RocksDB` storage layer for the seller credit ledger.
//!
//! This crate provides persistent storage for sellers, credit requests,
//! charges and the transaction log using `RocksDB` with column families for
//! per-seller indexes.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `sellers`: Seller rows (including the balance), keyed by `seller_id`
//! - `credit_requests`: Credit requests, keyed by `request_id` (ULID)
//! - `credit_requests_by_seller`: Index for listing a seller's requests
//! - `charges`: Charge records, keyed by the caller-supplied charge id
//! - `charges_by_seller`: Chronological index of a seller's charges
//! - `transactions`: Transaction log entries, keyed by `transaction_id`
//! - `transactions_by_seller`: Chronological index of a seller's log
//!
//! # Atomic units
//!
//! Every balance change goes through a [`LedgerUnit`]: it holds the seller's
//! lock, stages writes, and commits them as one `WriteBatch`.
//!
//! ```no_run
//! use credit_ledger_core::{Seller, SellerId, TransactionId, TransactionLogEntry};
//! use credit_ledger_store::{RocksStore, Store, StoreError};
//! use rust_decimal::Decimal;
//!
//! let store = RocksStore::open("/tmp/credit-ledger-db").unwrap();
//!
//! let seller = Seller::new(SellerId::generate(), "Corner Shop");
//! store.create_seller(&seller).unwrap();
//!
//! let amount = Decimal::new(10000, 2);
//! store
//!     .with_seller_lock(&seller.id, |unit| -> Result<(), StoreError> {
//!         let balance = unit.increment_balance(amount)?;
//!         let entry = TransactionLogEntry::add_credit(
//!             TransactionId::generate_ordered(),
//!             seller.id,
//!             amount,
//!             balance,
//!         );
//!         unit.append_transaction(entry)?;
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod locks;
pub mod rocks;
pub mod schema;
pub mod unit;

pub use error::{Result, StoreError};
pub use locks::{SellerGuard, SellerLocks};
pub use rocks::{RocksStore, DEFAULT_LOCK_TIMEOUT};
pub use unit::{AppendOutcome, LedgerUnit};

use rust_decimal::Decimal;

use credit_ledger_core::{
    Charge, CreditRequest, CreditRequestId, DateRange, RequestStatus, Seller, SellerId,
    TransactionId, TransactionLogEntry, TransactionType,
};

/// The storage trait defining the read side and seller provisioning.
///
/// Writes that move money are not part of this trait; they go through a
/// seller-locked [`LedgerUnit`].
pub trait Store: Send + Sync {
    // =========================================================================
    // Seller Operations
    // =========================================================================

    /// Provision a seller with a zero balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyExists` if the seller id is taken.
    /// - `StoreError::ConstraintViolation` if the balance is not zero.
    fn create_seller(&self, seller: &Seller) -> Result<()>;

    /// Get a seller by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_seller(&self, seller_id: &SellerId) -> Result<Option<Seller>>;

    /// List every seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sellers(&self) -> Result<Vec<Seller>>;

    /// Delete a seller that nothing references.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the seller doesn't exist.
    /// - `StoreError::SellerInUse` if requests, charges or log entries
    ///   reference the seller.
    fn delete_seller(&self, seller_id: &SellerId) -> Result<()>;

    /// Current committed balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the seller doesn't exist.
    fn get_balance(&self, seller_id: &SellerId) -> Result<Decimal>;

    // =========================================================================
    // Credit Request Operations
    // =========================================================================

    /// Get a credit request by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_credit_request(&self, request_id: &CreditRequestId) -> Result<Option<CreditRequest>>;

    /// List a seller's credit requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_credit_requests_by_seller(&self, seller_id: &SellerId) -> Result<Vec<CreditRequest>>;

    /// List every credit request in the given status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_credit_requests_by_status(&self, status: RequestStatus) -> Result<Vec<CreditRequest>>;

    // =========================================================================
    // Charge Operations
    // =========================================================================

    /// Get a charge by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_charge(&self, charge_id: &TransactionId) -> Result<Option<Charge>>;

    /// List a seller's charges within `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_charges(&self, seller_id: &SellerId, range: DateRange) -> Result<Vec<Charge>>;

    // =========================================================================
    // Transaction Log Operations
    // =========================================================================

    /// Get a log entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogEntry>>;

    /// List a seller's log entries within `range`, oldest first, optionally
    /// restricted to one type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        seller_id: &SellerId,
        range: DateRange,
        transaction_type: Option<TransactionType>,
    ) -> Result<Vec<TransactionLogEntry>>;

    /// Sum of every log entry amount for a seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn sum_transactions(&self, seller_id: &SellerId) -> Result<Decimal>;
}
