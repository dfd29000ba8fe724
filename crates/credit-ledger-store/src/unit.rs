//! Seller-locked atomic units.
//!
//! A [`LedgerUnit`] holds one seller's lock and stages every write in memory.
//! [`LedgerUnit::commit`] turns the staged writes into a single `WriteBatch`;
//! dropping the unit without committing discards them. Either way the seller
//! lock is released when the unit goes away.

use std::collections::HashMap;

use chrono::Utc;
use rocksdb::WriteBatch;
use rust_decimal::Decimal;

use credit_ledger_core::{
    to_ledger_scale, Charge, CreditRequest, CreditRequestId, Seller, SellerId, TransactionId,
    TransactionLogEntry,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::SellerGuard;
use crate::rocks::{check_seller_row, RocksStore};
use crate::schema::cf;
use crate::Store;

/// Result of appending a transaction log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was staged and will be written on commit.
    Recorded,
    /// An entry with the same id already exists; nothing was staged.
    AlreadyRecorded,
}

/// An atomic unit of work over one seller's ledger row.
pub struct LedgerUnit<'a> {
    store: &'a RocksStore,
    _guard: SellerGuard,
    /// Balance read under the lock, before any staged change.
    opening_balance: Decimal,
    seller: Seller,
    transactions: Vec<TransactionLogEntry>,
    charges: Vec<Charge>,
    requests: HashMap<CreditRequestId, StagedRequest>,
}

struct StagedRequest {
    request: CreditRequest,
    is_new: bool,
}

impl<'a> LedgerUnit<'a> {
    pub(crate) fn new(store: &'a RocksStore, guard: SellerGuard, seller: Seller) -> Self {
        Self {
            store,
            _guard: guard,
            opening_balance: seller.balance,
            seller,
            transactions: Vec::new(),
            charges: Vec::new(),
            requests: HashMap::new(),
        }
    }

    /// The locked seller.
    #[must_use]
    pub fn seller_id(&self) -> &SellerId {
        &self.seller.id
    }

    /// The locked seller record, including staged balance changes.
    #[must_use]
    pub fn seller(&self) -> &Seller {
        &self.seller
    }

    /// Current balance as seen inside this unit.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.seller.balance
    }

    /// Set the seller's balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if `new_balance` is negative.
    pub fn set_balance(&mut self, new_balance: Decimal) -> Result<()> {
        let mut candidate = self.seller.clone();
        candidate.balance = to_ledger_scale(new_balance);
        check_seller_row(&candidate)?;

        self.seller.balance = candidate.balance;
        self.seller.updated_at = Utc::now();
        Ok(())
    }

    /// Add `delta` to the balance read under the lock and return the result.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the result would be negative.
    pub fn increment_balance(&mut self, delta: Decimal) -> Result<Decimal> {
        self.set_balance(self.seller.balance + delta)?;
        Ok(self.seller.balance)
    }

    /// Stage a transaction log entry for this seller.
    ///
    /// An id that is already recorded (or already staged) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the entry belongs to a
    /// different seller, or a storage error if the lookup fails.
    pub fn append_transaction(&mut self, entry: TransactionLogEntry) -> Result<AppendOutcome> {
        self.check_owner("transaction", &entry.seller_id)?;

        if self.transactions.iter().any(|staged| staged.id == entry.id)
            || self.store.get_transaction(&entry.id)?.is_some()
        {
            tracing::debug!(
                seller_id = %self.seller.id,
                transaction_id = %entry.id,
                "Transaction already recorded, skipping"
            );
            return Ok(AppendOutcome::AlreadyRecorded);
        }

        self.transactions.push(entry);
        Ok(AppendOutcome::Recorded)
    }

    /// Look up a charge, including charges staged in this unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get_charge(&self, charge_id: &TransactionId) -> Result<Option<Charge>> {
        if let Some(staged) = self.charges.iter().find(|charge| charge.id == *charge_id) {
            return Ok(Some(staged.clone()));
        }
        self.store.get_charge(charge_id)
    }

    /// Stage a new charge record. Its status is final.
    ///
    /// # Errors
    ///
    /// - `StoreError::ConstraintViolation` if the charge belongs to another seller.
    /// - `StoreError::AlreadyExists` if a charge with this id exists.
    pub fn insert_charge(&mut self, charge: Charge) -> Result<()> {
        self.check_owner("charge", &charge.seller_id)?;

        if self.get_charge(&charge.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "charge",
                id: charge.id.to_string(),
            });
        }

        self.charges.push(charge);
        Ok(())
    }

    /// Look up a credit request, including changes staged in this unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get_credit_request(&self, request_id: &CreditRequestId) -> Result<Option<CreditRequest>> {
        if let Some(staged) = self.requests.get(request_id) {
            return Ok(Some(staged.request.clone()));
        }
        self.store.get_credit_request(request_id)
    }

    /// Stage a new credit request for this seller.
    ///
    /// # Errors
    ///
    /// - `StoreError::ConstraintViolation` if the request belongs to another seller.
    /// - `StoreError::AlreadyExists` if a request with this id exists.
    pub fn insert_credit_request(&mut self, request: CreditRequest) -> Result<()> {
        self.check_owner("credit request", &request.seller_id)?;

        if self.get_credit_request(&request.id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                entity: "credit request",
                id: request.id.to_string(),
            });
        }

        self.requests.insert(
            request.id,
            StagedRequest {
                request,
                is_new: true,
            },
        );
        Ok(())
    }

    /// Stage an update of an existing credit request.
    ///
    /// # Errors
    ///
    /// - `StoreError::ConstraintViolation` if the request belongs to another seller.
    /// - `StoreError::NotFound` if the request doesn't exist.
    pub fn update_credit_request(&mut self, request: CreditRequest) -> Result<()> {
        self.check_owner("credit request", &request.seller_id)?;

        let is_new = match self.requests.get(&request.id) {
            Some(staged) => staged.is_new,
            None if self.store.get_credit_request(&request.id)?.is_some() => false,
            None => {
                return Err(StoreError::NotFound {
                    entity: "credit request",
                    id: request.id.to_string(),
                })
            }
        };

        self.requests
            .insert(request.id, StagedRequest { request, is_new });
        Ok(())
    }

    /// Write every staged change in one batch and release the seller lock.
    ///
    /// # Errors
    ///
    /// - `StoreError::ConstraintViolation` if the staged log entries don't
    ///   account for the balance change, the balance is negative, or an
    ///   inserted id was taken concurrently. Nothing is written.
    /// - `StoreError::Database` if the write fails. Nothing is written.
    pub fn commit(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        check_seller_row(&self.seller)?;
        self.check_accounting()?;

        let batch = self.build_batch()?;

        let _commit = self.store.lock_commits();
        for entry in &self.transactions {
            if self.store.key_exists(cf::TRANSACTIONS, &keys::transaction_key(&entry.id))? {
                return Err(self.duplicate("transaction", &entry.id));
            }
        }
        for charge in &self.charges {
            if self.store.key_exists(cf::CHARGES, &keys::transaction_key(&charge.id))? {
                return Err(self.duplicate("charge", &charge.id));
            }
        }
        self.store.write(batch)?;

        tracing::debug!(
            seller_id = %self.seller.id,
            balance = %self.seller.balance,
            transactions = self.transactions.len(),
            charges = self.charges.len(),
            requests = self.requests.len(),
            "Ledger unit committed"
        );
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.seller.balance == self.opening_balance
            && self.transactions.is_empty()
            && self.charges.is_empty()
            && self.requests.is_empty()
    }

    /// Every balance change must be explained by exactly the staged log entries.
    fn check_accounting(&self) -> Result<()> {
        let logged: Decimal = self.transactions.iter().map(|entry| entry.amount).sum();
        let moved = self.seller.balance - self.opening_balance;
        if logged != moved {
            tracing::error!(
                seller_id = %self.seller.id,
                opening_balance = %self.opening_balance,
                closing_balance = %self.seller.balance,
                logged = %logged,
                "Balance change does not match transaction log"
            );
            return Err(StoreError::ConstraintViolation(format!(
                "seller {} balance moved by {moved} but log entries sum to {logged}",
                self.seller.id
            )));
        }
        Ok(())
    }

    fn build_batch(&self) -> Result<WriteBatch> {
        let cf_sellers = self.store.cf(cf::SELLERS)?;
        let cf_tx = self.store.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_seller = self.store.cf(cf::TRANSACTIONS_BY_SELLER)?;
        let cf_charges = self.store.cf(cf::CHARGES)?;
        let cf_charges_by_seller = self.store.cf(cf::CHARGES_BY_SELLER)?;
        let cf_requests = self.store.cf(cf::CREDIT_REQUESTS)?;
        let cf_requests_by_seller = self.store.cf(cf::CREDIT_REQUESTS_BY_SELLER)?;

        let mut batch = WriteBatch::default();

        if self.seller.balance != self.opening_balance {
            batch.put_cf(
                &cf_sellers,
                keys::seller_key(&self.seller.id),
                RocksStore::serialize(&self.seller)?,
            );
        }

        for entry in &self.transactions {
            batch.put_cf(
                &cf_tx,
                keys::transaction_key(&entry.id),
                RocksStore::serialize(entry)?,
            );
            batch.put_cf(
                &cf_tx_by_seller,
                keys::timeline_key(&entry.seller_id, entry.created_at, &entry.id),
                b"",
            );
        }

        for charge in &self.charges {
            batch.put_cf(
                &cf_charges,
                keys::transaction_key(&charge.id),
                RocksStore::serialize(charge)?,
            );
            batch.put_cf(
                &cf_charges_by_seller,
                keys::timeline_key(&charge.seller_id, charge.created_at, &charge.id),
                b"",
            );
        }

        for staged in self.requests.values() {
            let request = &staged.request;
            batch.put_cf(
                &cf_requests,
                keys::credit_request_key(&request.id),
                RocksStore::serialize(request)?,
            );
            if staged.is_new {
                batch.put_cf(
                    &cf_requests_by_seller,
                    keys::seller_request_key(&request.seller_id, &request.id),
                    b"",
                );
            }
        }

        Ok(batch)
    }

    fn check_owner(&self, entity: &str, owner: &SellerId) -> Result<()> {
        if *owner != self.seller.id {
            return Err(StoreError::ConstraintViolation(format!(
                "{entity} for seller {owner} staged under the lock of seller {}",
                self.seller.id
            )));
        }
        Ok(())
    }

    fn duplicate(&self, entity: &str, id: &TransactionId) -> StoreError {
        tracing::error!(
            seller_id = %self.seller.id,
            id = %id,
            entity,
            "Duplicate id detected at commit"
        );
        StoreError::ConstraintViolation(format!("duplicate {entity} id {id}"))
    }
}
