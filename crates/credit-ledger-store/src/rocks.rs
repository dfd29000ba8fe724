//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait
//! and the entry points for seller-locked atomic units.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use rust_decimal::Decimal;

use credit_ledger_core::{
    Charge, CreditRequest, CreditRequestId, DateRange, RequestStatus, Seller, SellerId,
    TransactionId, TransactionLogEntry, TransactionType,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::SellerLocks;
use crate::schema::{all_column_families, cf};
use crate::unit::LedgerUnit;
use crate::Store;

/// Default bound on how long a unit waits for a seller lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: SellerLocks,
    /// Serializes the check-then-write step of commits and inserts.
    commit_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open or create a database, bounding seller lock waits by `lock_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: SellerLocks::new(lock_timeout),
            commit_lock: Mutex::new(()),
        })
    }

    /// Lock a seller and open an atomic unit over its ledger row.
    ///
    /// The balance is re-read after the lock is taken. Nothing is written
    /// until [`LedgerUnit::commit`]; dropping the unit rolls it back.
    ///
    /// # Errors
    ///
    /// - `StoreError::LockTimeout` if the lock is not acquired in time.
    /// - `StoreError::NotFound` if the seller doesn't exist.
    pub fn begin(&self, seller_id: &SellerId) -> Result<LedgerUnit<'_>> {
        let guard = self.locks.acquire(seller_id)?;
        let seller = self
            .get_seller(seller_id)?
            .ok_or_else(|| not_found("seller", seller_id))?;
        Ok(LedgerUnit::new(self, guard, seller))
    }

    /// Run `f` inside a seller-locked atomic unit.
    ///
    /// The unit commits if `f` returns `Ok` and rolls back otherwise. The
    /// seller lock is released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the error from acquiring the unit, from `f`, or from the commit.
    pub fn with_seller_lock<T, E, F>(&self, seller_id: &SellerId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut LedgerUnit<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut unit = self.begin(seller_id)?;
        let value = f(&mut unit)?;
        unit.commit()?;
        Ok(value)
    }

    /// Get a column family handle.
    pub(crate) fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    pub(crate) fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    pub(crate) fn key_exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(&cf, key)?.is_some())
    }

    pub(crate) fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    /// Serialize a value using CBOR.
    pub(crate) fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_record<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect index keys under `prefix`, starting at `start`.
    fn scan_index(&self, cf_name: &str, prefix: &[u8], start: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(start, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    fn has_index_entries(&self, cf_name: &str, prefix: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        match iter.next() {
            Some(item) => Ok(item?.0.starts_with(prefix)),
            None => Ok(false),
        }
    }

    /// Timeline ids for one seller within `range`, oldest first.
    fn timeline_ids(
        &self,
        cf_name: &str,
        seller_id: &SellerId,
        range: DateRange,
    ) -> Result<Vec<TransactionId>> {
        let prefix = keys::seller_prefix(seller_id);
        let start = keys::timeline_start(seller_id, range.from);

        let mut ids = Vec::new();
        for key in self.scan_index(cf_name, &prefix, &start)? {
            let (Some(at), Some(id)) = (keys::extract_timestamp(&key), keys::extract_transaction_id(&key)) else {
                return Err(StoreError::Database(format!("malformed index key in {cf_name}")));
            };
            if range.until.is_some_and(|until| at >= until) {
                break;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn scan_all<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(Self::deserialize(&value)?);
        }
        Ok(records)
    }
}

fn not_found(entity: &'static str, id: &impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Reject seller rows that would break the non-negative balance constraint.
pub(crate) fn check_seller_row(seller: &Seller) -> Result<()> {
    if seller.balance < Decimal::ZERO {
        tracing::error!(
            seller_id = %seller.id,
            balance = %seller.balance,
            "Rejected write of negative seller balance"
        );
        return Err(StoreError::ConstraintViolation(format!(
            "balance of seller {} would become negative ({})",
            seller.id, seller.balance
        )));
    }
    Ok(())
}

impl Store for RocksStore {
    // =========================================================================
    // Seller Operations
    // =========================================================================

    fn create_seller(&self, seller: &Seller) -> Result<()> {
        if !seller.balance.is_zero() {
            return Err(StoreError::ConstraintViolation(format!(
                "seller {} must be provisioned with a zero balance",
                seller.id
            )));
        }

        let key = keys::seller_key(&seller.id);
        let value = Self::serialize(seller)?;

        let _commit = self.lock_commits();
        if self.key_exists(cf::SELLERS, &key)? {
            return Err(StoreError::AlreadyExists {
                entity: "seller",
                id: seller.id.to_string(),
            });
        }
        let cf = self.cf(cf::SELLERS)?;
        self.db.put_cf(&cf, key, value)?;

        tracing::info!(seller_id = %seller.id, name = %seller.name, "Seller provisioned");
        Ok(())
    }

    fn get_seller(&self, seller_id: &SellerId) -> Result<Option<Seller>> {
        self.get_record(cf::SELLERS, &keys::seller_key(seller_id))
    }

    fn list_sellers(&self) -> Result<Vec<Seller>> {
        self.scan_all(cf::SELLERS)
    }

    fn delete_seller(&self, seller_id: &SellerId) -> Result<()> {
        let _guard = self.locks.acquire(seller_id)?;

        if self.get_seller(seller_id)?.is_none() {
            return Err(not_found("seller", seller_id));
        }

        let prefix = keys::seller_prefix(seller_id);
        for index in [
            cf::TRANSACTIONS_BY_SELLER,
            cf::CHARGES_BY_SELLER,
            cf::CREDIT_REQUESTS_BY_SELLER,
        ] {
            if self.has_index_entries(index, &prefix)? {
                return Err(StoreError::SellerInUse {
                    seller_id: seller_id.to_string(),
                });
            }
        }

        let cf = self.cf(cf::SELLERS)?;
        self.db.delete_cf(&cf, keys::seller_key(seller_id))?;

        tracing::info!(seller_id = %seller_id, "Seller removed");
        Ok(())
    }

    fn get_balance(&self, seller_id: &SellerId) -> Result<Decimal> {
        self.get_seller(seller_id)?
            .map(|seller| seller.balance)
            .ok_or_else(|| not_found("seller", seller_id))
    }

    // =========================================================================
    // Credit Request Operations
    // =========================================================================

    fn get_credit_request(&self, request_id: &CreditRequestId) -> Result<Option<CreditRequest>> {
        self.get_record(cf::CREDIT_REQUESTS, &keys::credit_request_key(request_id))
    }

    fn list_credit_requests_by_seller(&self, seller_id: &SellerId) -> Result<Vec<CreditRequest>> {
        let prefix = keys::seller_prefix(seller_id);
        let mut requests = Vec::new();
        for key in self.scan_index(cf::CREDIT_REQUESTS_BY_SELLER, &prefix, &prefix)? {
            let request_id = keys::extract_request_id(&key).ok_or_else(|| {
                StoreError::Database("malformed credit request index key".into())
            })?;
            if let Some(request) = self.get_credit_request(&request_id)? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    fn list_credit_requests_by_status(&self, status: RequestStatus) -> Result<Vec<CreditRequest>> {
        let mut requests: Vec<CreditRequest> = self.scan_all(cf::CREDIT_REQUESTS)?;
        requests.retain(|request| request.status == status);
        Ok(requests)
    }

    // =========================================================================
    // Charge Operations
    // =========================================================================

    fn get_charge(&self, charge_id: &TransactionId) -> Result<Option<Charge>> {
        self.get_record(cf::CHARGES, &keys::transaction_key(charge_id))
    }

    fn list_charges(&self, seller_id: &SellerId, range: DateRange) -> Result<Vec<Charge>> {
        let mut charges = Vec::new();
        for id in self.timeline_ids(cf::CHARGES_BY_SELLER, seller_id, range)? {
            if let Some(charge) = self.get_charge(&id)? {
                charges.push(charge);
            }
        }
        Ok(charges)
    }

    // =========================================================================
    // Transaction Log Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogEntry>> {
        self.get_record(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn list_transactions(
        &self,
        seller_id: &SellerId,
        range: DateRange,
        transaction_type: Option<TransactionType>,
    ) -> Result<Vec<TransactionLogEntry>> {
        let mut entries = Vec::new();
        for id in self.timeline_ids(cf::TRANSACTIONS_BY_SELLER, seller_id, range)? {
            if let Some(entry) = self.get_transaction(&id)? {
                if transaction_type.map_or(true, |t| t == entry.transaction_type) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn sum_transactions(&self, seller_id: &SellerId) -> Result<Decimal> {
        let total = self
            .list_transactions(seller_id, DateRange::all(), None)?
            .iter()
            .map(|entry| entry.amount)
            .sum::<Decimal>();
        Ok(credit_ledger_core::to_ledger_scale(total))
    }
}
