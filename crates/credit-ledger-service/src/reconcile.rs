//! Balance reconciliation.
//!
//! Checks the accounting identity: a seller's stored balance equals the sum
//! of its transaction log.

use rust_decimal::Decimal;
use serde::Serialize;

use credit_ledger_core::{Result, SellerId};
use credit_ledger_store::{RocksStore, Store};

/// Reconciliation result for one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// The seller checked.
    pub seller_id: SellerId,
    /// Stored balance.
    pub balance: Decimal,
    /// Sum of the seller's log entry amounts.
    pub log_sum: Decimal,
    /// Whether the two agree.
    pub balanced: bool,
}

/// Reconcile one seller.
///
/// The seller's lock is held while reading, so no unit for that seller is
/// in flight and the result is a quiescent snapshot.
///
/// # Errors
///
/// - `LedgerError::SellerNotFound` if the seller doesn't exist.
/// - `LedgerError::Contention` if the seller lock wasn't acquired in time.
pub fn reconcile(store: &RocksStore, seller_id: &SellerId) -> Result<Reconciliation> {
    let unit = store.begin(seller_id)?;
    let balance = unit.balance();
    let log_sum = store.sum_transactions(seller_id)?;
    drop(unit);

    let report = Reconciliation {
        seller_id: *seller_id,
        balance,
        log_sum,
        balanced: balance == log_sum,
    };

    if report.balanced {
        tracing::debug!(seller_id = %seller_id, balance = %balance, "Seller reconciled");
    } else {
        tracing::error!(
            seller_id = %seller_id,
            balance = %balance,
            log_sum = %log_sum,
            "Seller balance does not match transaction log"
        );
    }
    Ok(report)
}

/// Reconcile every seller.
///
/// # Errors
///
/// Returns the first error encountered.
pub fn reconcile_all(store: &RocksStore) -> Result<Vec<Reconciliation>> {
    store
        .list_sellers()?
        .iter()
        .map(|seller| reconcile(store, &seller.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_ledger_core::{Seller, TransactionId, TransactionLogEntry};
    use credit_ledger_store::StoreError;
    use tempfile::TempDir;

    #[test]
    fn fresh_and_funded_sellers_balance() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let idle = Seller::new(SellerId::generate(), "Idle");
        let funded = Seller::new(SellerId::generate(), "Funded");
        store.create_seller(&idle).unwrap();
        store.create_seller(&funded).unwrap();

        let amount = Decimal::new(12345, 2);
        store
            .with_seller_lock(&funded.id, |unit| -> std::result::Result<(), StoreError> {
                let balance = unit.increment_balance(amount)?;
                unit.append_transaction(TransactionLogEntry::add_credit(
                    TransactionId::generate_ordered(),
                    funded.id,
                    amount,
                    balance,
                ))?;
                Ok(())
            })
            .unwrap();

        let reports = reconcile_all(&store).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.balanced));

        let funded_report = reconcile(&store, &funded.id).unwrap();
        assert_eq!(funded_report.balance, amount);
        assert_eq!(funded_report.log_sum, amount);
    }

    #[test]
    fn unknown_seller_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        assert!(reconcile(&store, &SellerId::generate()).is_err());
    }
}
