//! The ledger engine facade.
//!
//! [`Ledger`] is what an outer API layer holds: it owns the store and exposes
//! seller provisioning, the credit request workflow, synchronous charge
//! processing, reads, and reconciliation.

use std::sync::Arc;

use rust_decimal::Decimal;

use credit_ledger_core::{
    Charge, CreditRequest, CreditRequestId, DateRange, Decision, LedgerError, RequestStatus, Result,
    Seller, SellerId, TransactionId, TransactionLogEntry, TransactionType,
};
use credit_ledger_store::{RocksStore, Store};

use crate::config::LedgerConfig;
use crate::dispatch::{ChargeDispatcher, DispatchPolicy};
use crate::processor::{ChargeCommand, ChargeOutcome, ChargeProcessor};
use crate::reconcile::{self, Reconciliation};
use crate::workflow::{CreditRequestWorkflow, DecisionOutcome, DecisionReport};

/// The credit ledger engine.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<RocksStore>,
    processor: ChargeProcessor,
    workflow: CreditRequestWorkflow,
}

impl Ledger {
    /// Open the store named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the database can't be opened.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        tracing::info!(path = %config.data_dir, "Opening RocksDB store");
        let store = RocksStore::open_with_lock_timeout(&config.data_dir, config.lock_timeout())?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Build the engine over an already opened store.
    #[must_use]
    pub fn with_store(store: Arc<RocksStore>) -> Self {
        Self {
            processor: ChargeProcessor::new(Arc::clone(&store)),
            workflow: CreditRequestWorkflow::new(Arc::clone(&store)),
            store,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<RocksStore> {
        &self.store
    }

    /// Start an asynchronous charge dispatcher over this ledger.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start_dispatcher(&self, policy: DispatchPolicy) -> ChargeDispatcher {
        ChargeDispatcher::start(Arc::clone(&self.store), policy)
    }

    // =========================================================================
    // Sellers
    // =========================================================================

    /// Provision a seller with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn create_seller(&self, name: &str) -> Result<Seller> {
        let seller = Seller::new(SellerId::generate(), name);
        self.store.create_seller(&seller)?;
        Ok(seller)
    }

    /// Get a seller.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerNotFound` if the seller doesn't exist.
    pub fn get_seller(&self, seller_id: &SellerId) -> Result<Seller> {
        self.store
            .get_seller(seller_id)?
            .ok_or_else(|| LedgerError::SellerNotFound {
                seller_id: seller_id.to_string(),
            })
    }

    /// List every seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_sellers(&self) -> Result<Vec<Seller>> {
        Ok(self.store.list_sellers()?)
    }

    /// Remove a seller nothing references.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerInUse` while ledger records reference it.
    pub fn delete_seller(&self, seller_id: &SellerId) -> Result<()> {
        Ok(self.store.delete_seller(seller_id)?)
    }

    /// Current balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerNotFound` if the seller doesn't exist.
    pub fn get_balance(&self, seller_id: &SellerId) -> Result<Decimal> {
        Ok(self.store.get_balance(seller_id)?)
    }

    // =========================================================================
    // Credit requests
    // =========================================================================

    /// Submit a credit request. See [`CreditRequestWorkflow::submit`].
    ///
    /// # Errors
    ///
    /// Returns validation, not-found and contention errors.
    pub fn submit_credit_request(&self, seller_id: &SellerId, amount: Decimal) -> Result<CreditRequest> {
        self.workflow.submit(seller_id, amount)
    }

    /// Decide a credit request. See [`CreditRequestWorkflow::decide`].
    ///
    /// # Errors
    ///
    /// Returns not-found, contention and constraint errors.
    pub fn decide(&self, request_id: &CreditRequestId, decision: Decision) -> Result<DecisionOutcome> {
        self.workflow.decide(request_id, decision)
    }

    /// Decide many credit requests independently.
    #[must_use]
    pub fn decide_all(&self, request_ids: &[CreditRequestId], decision: Decision) -> Vec<DecisionReport> {
        self.workflow.decide_all(request_ids, decision)
    }

    /// Get a credit request.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::CreditRequestNotFound` if it doesn't exist.
    pub fn get_credit_request(&self, request_id: &CreditRequestId) -> Result<CreditRequest> {
        self.store
            .get_credit_request(request_id)?
            .ok_or_else(|| LedgerError::CreditRequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// A seller's credit requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerNotFound` if the seller doesn't exist.
    pub fn list_credit_requests(&self, seller_id: &SellerId) -> Result<Vec<CreditRequest>> {
        self.get_seller(seller_id)?;
        Ok(self.store.list_credit_requests_by_seller(seller_id)?)
    }

    /// Every credit request in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_credit_requests_by_status(&self, status: RequestStatus) -> Result<Vec<CreditRequest>> {
        Ok(self.store.list_credit_requests_by_status(status)?)
    }

    // =========================================================================
    // Charges
    // =========================================================================

    /// Validate and process a charge synchronously.
    ///
    /// # Errors
    ///
    /// Returns validation errors for bad input and the errors of
    /// [`ChargeProcessor::process`].
    pub fn charge(
        &self,
        charge_id: TransactionId,
        seller_id: SellerId,
        amount: Decimal,
        phone_number: &str,
    ) -> Result<ChargeOutcome> {
        let command = ChargeCommand::new(charge_id, seller_id, amount, phone_number)?;
        self.processor.process(&command)
    }

    /// Get a charge record.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ChargeNotFound` if it doesn't exist.
    pub fn get_charge(&self, charge_id: &TransactionId) -> Result<Charge> {
        self.store
            .get_charge(charge_id)?
            .ok_or_else(|| LedgerError::ChargeNotFound {
                charge_id: charge_id.to_string(),
            })
    }

    /// A seller's charges within `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerNotFound` if the seller doesn't exist.
    pub fn list_charges(&self, seller_id: &SellerId, range: DateRange) -> Result<Vec<Charge>> {
        self.get_seller(seller_id)?;
        Ok(self.store.list_charges(seller_id, range)?)
    }

    // =========================================================================
    // Transaction log
    // =========================================================================

    /// A seller's log entries within `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SellerNotFound` if the seller doesn't exist.
    pub fn list_transactions(
        &self,
        seller_id: &SellerId,
        range: DateRange,
        transaction_type: Option<TransactionType>,
    ) -> Result<Vec<TransactionLogEntry>> {
        self.get_seller(seller_id)?;
        Ok(self.store.list_transactions(seller_id, range, transaction_type)?)
    }

    /// Check one seller's balance against its log.
    ///
    /// # Errors
    ///
    /// Returns not-found and contention errors.
    pub fn reconcile(&self, seller_id: &SellerId) -> Result<Reconciliation> {
        reconcile::reconcile(&self.store, seller_id)
    }

    /// Check every seller's balance against its log.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn reconcile_all(&self) -> Result<Vec<Reconciliation>> {
        reconcile::reconcile_all(&self.store)
    }
}
