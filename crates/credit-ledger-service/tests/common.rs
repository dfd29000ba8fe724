//! Common test utilities for credit ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::time::Duration;

use rust_decimal::Decimal;
use tempfile::TempDir;

use credit_ledger_core::{
    DateRange, Decision, LedgerError, SellerId, TransactionId, TransactionType,
};
use credit_ledger_service::{ChargeOutcome, DecisionOutcome, Ledger, LedgerConfig};

/// A valid destination number for test charges.
pub const PHONE: &str = "09121234567";

/// Test harness containing a ledger over a fresh database.
pub struct TestHarness {
    /// The engine under test.
    pub ledger: Ledger,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(30))
    }

    /// Create a harness whose seller lock waits are bounded by `timeout`.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = LedgerConfig {
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            lock_timeout_ms: u64::try_from(timeout.as_millis()).expect("timeout fits in u64"),
            ..LedgerConfig::default()
        };
        let ledger = Ledger::open(&config).expect("Failed to open ledger");

        Self {
            ledger,
            _temp_dir: temp_dir,
        }
    }

    /// Provision a seller with a zero balance.
    pub fn seller(&self, name: &str) -> SellerId {
        self.ledger.create_seller(name).expect("Failed to create seller").id
    }

    /// Add credit through the approval workflow.
    pub fn fund(&self, seller_id: &SellerId, amount: Decimal) {
        let request = self
            .ledger
            .submit_credit_request(seller_id, amount)
            .expect("Failed to submit credit request");
        let outcome = self
            .ledger
            .decide(&request.id, Decision::Approve)
            .expect("Failed to approve credit request");
        assert!(matches!(outcome, DecisionOutcome::Applied(_)));
    }

    /// Charge with a fresh id, retrying contention like a queue worker would.
    pub fn charge(&self, seller_id: &SellerId, amount: Decimal) -> ChargeOutcome {
        self.charge_with_id(TransactionId::generate(), seller_id, amount)
    }

    /// Charge under a given id, retrying contention.
    pub fn charge_with_id(
        &self,
        charge_id: TransactionId,
        seller_id: &SellerId,
        amount: Decimal,
    ) -> ChargeOutcome {
        loop {
            match self.ledger.charge(charge_id, *seller_id, amount, PHONE) {
                Ok(outcome) => return outcome,
                Err(LedgerError::Contention { .. }) => std::thread::yield_now(),
                Err(e) => panic!("charge failed: {e}"),
            }
        }
    }

    /// Sum of the seller's log, read straight from the log.
    pub fn log_sum(&self, seller_id: &SellerId) -> Decimal {
        self.ledger
            .list_transactions(seller_id, DateRange::all(), None)
            .expect("Failed to list transactions")
            .iter()
            .map(|entry| entry.amount)
            .sum()
    }

    /// Number of log entries of one type.
    pub fn log_count(&self, seller_id: &SellerId, transaction_type: TransactionType) -> usize {
        self.ledger
            .list_transactions(seller_id, DateRange::all(), Some(transaction_type))
            .expect("Failed to list transactions")
            .len()
    }

    /// Assert the accounting identity and non-negativity for a seller.
    pub fn assert_balanced(&self, seller_id: &SellerId) {
        let balance = self.ledger.get_balance(seller_id).expect("Failed to read balance");
        assert!(balance >= Decimal::ZERO, "negative balance {balance}");
        assert_eq!(balance, self.log_sum(seller_id));

        let report = self.ledger.reconcile(seller_id).expect("Failed to reconcile");
        assert!(report.balanced, "{report:?}");
    }
}

/// An amount in hundredths: `dec(10050)` is 100.50.
pub fn dec(units: i64) -> Decimal {
    Decimal::new(units, 2)
}
