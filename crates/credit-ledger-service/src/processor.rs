//! Charge processing.
//!
//! Each charge runs as one seller-locked atomic unit: re-read the balance,
//! decide completed or failed, write the charge record, and for completed
//! charges debit the balance and append a `charge_sale` log entry.
//!
//! The charge id is the idempotency key. It is used for both the charge
//! record and its log entry, so a redelivered charge finds its own record
//! and returns the recorded outcome instead of debiting again.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use credit_ledger_core::{
    validate_amount, Charge, ChargeStatus, LedgerError, PhoneNumber, Result, SellerId,
    TransactionId, TransactionLogEntry,
};
use credit_ledger_store::{AppendOutcome, LedgerUnit, RocksStore};

/// A validated charge, ready for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeCommand {
    /// Caller-supplied unique id.
    pub charge_id: TransactionId,
    /// Seller whose credit is spent.
    pub seller_id: SellerId,
    /// Amount to debit (positive, two fraction digits).
    pub amount: Decimal,
    /// Destination phone number.
    pub phone_number: PhoneNumber,
}

impl ChargeCommand {
    /// Validate the raw inputs of a charge.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the amount is not a valid positive
    /// amount or the phone number is malformed.
    pub fn new(
        charge_id: TransactionId,
        seller_id: SellerId,
        amount: Decimal,
        phone_number: &str,
    ) -> Result<Self> {
        Ok(Self {
            charge_id,
            seller_id,
            amount: validate_amount(amount)?,
            phone_number: PhoneNumber::parse(phone_number)?,
        })
    }
}

/// How a processed charge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChargeOutcome {
    /// The seller was debited.
    Completed {
        /// Balance after the debit.
        balance_after: Decimal,
    },
    /// The seller's balance did not cover the charge; nothing was debited.
    InsufficientFunds {
        /// Balance at processing time.
        balance: Decimal,
    },
    /// The charge id was processed before; this delivery changed nothing.
    AlreadyProcessed {
        /// Status recorded by the first delivery.
        status: ChargeStatus,
    },
}

impl ChargeOutcome {
    /// The charge record's status after this outcome.
    #[must_use]
    pub const fn status(&self) -> ChargeStatus {
        match self {
            Self::Completed { .. } => ChargeStatus::Completed,
            Self::InsufficientFunds { .. } => ChargeStatus::Failed,
            Self::AlreadyProcessed { status } => *status,
        }
    }
}

/// Runs charges against the ledger.
#[derive(Clone)]
pub struct ChargeProcessor {
    store: Arc<RocksStore>,
}

impl ChargeProcessor {
    /// Create a processor over the given store.
    #[must_use]
    pub const fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Process one charge as a single atomic unit.
    ///
    /// Insufficient funds and redelivery are outcomes, not errors. On any
    /// error nothing was written and the same command may be resubmitted.
    ///
    /// # Errors
    ///
    /// - `LedgerError::SellerNotFound` if the seller doesn't exist.
    /// - `LedgerError::Contention` if the seller lock wasn't acquired in time.
    /// - `LedgerError::AlreadyExists` if the id belongs to another seller's charge.
    /// - `LedgerError::ConstraintViolation` if a ledger invariant would break.
    pub fn process(&self, command: &ChargeCommand) -> Result<ChargeOutcome> {
        let result = self
            .store
            .with_seller_lock(&command.seller_id, |unit| Self::apply(unit, command));

        match &result {
            Ok(ChargeOutcome::Completed { balance_after }) => tracing::info!(
                charge_id = %command.charge_id,
                seller_id = %command.seller_id,
                amount = %command.amount,
                phone_number = %command.phone_number,
                balance_after = %balance_after,
                "Charge completed"
            ),
            Ok(ChargeOutcome::InsufficientFunds { balance }) => tracing::warn!(
                charge_id = %command.charge_id,
                seller_id = %command.seller_id,
                amount = %command.amount,
                balance = %balance,
                "Charge failed: insufficient credit"
            ),
            Ok(ChargeOutcome::AlreadyProcessed { status }) => tracing::debug!(
                charge_id = %command.charge_id,
                seller_id = %command.seller_id,
                status = ?status,
                "Charge already processed, skipping"
            ),
            Err(e) if e.is_defect() => tracing::error!(
                charge_id = %command.charge_id,
                seller_id = %command.seller_id,
                error = %e,
                "Charge rolled back on ledger invariant"
            ),
            Err(e) => tracing::warn!(
                charge_id = %command.charge_id,
                seller_id = %command.seller_id,
                error = %e,
                "Charge not processed"
            ),
        }

        result
    }

    fn apply(unit: &mut LedgerUnit<'_>, command: &ChargeCommand) -> Result<ChargeOutcome> {
        if let Some(existing) = unit.get_charge(&command.charge_id)? {
            if existing.seller_id != command.seller_id {
                return Err(LedgerError::AlreadyExists(format!(
                    "charge {} belongs to another seller",
                    command.charge_id
                )));
            }
            return Ok(ChargeOutcome::AlreadyProcessed {
                status: existing.status,
            });
        }

        let balance = unit.balance();
        if !unit.seller().has_sufficient_credit(command.amount) {
            unit.insert_charge(Charge::new(
                command.charge_id,
                command.seller_id,
                command.phone_number.clone(),
                command.amount,
                ChargeStatus::Failed,
            ))?;
            return Ok(ChargeOutcome::InsufficientFunds { balance });
        }

        let balance_after = balance - command.amount;
        unit.insert_charge(Charge::new(
            command.charge_id,
            command.seller_id,
            command.phone_number.clone(),
            command.amount,
            ChargeStatus::Completed,
        ))?;

        let entry = TransactionLogEntry::charge_sale(
            command.charge_id,
            command.seller_id,
            command.amount,
            command.phone_number.clone(),
            balance_after,
        );
        if unit.append_transaction(entry)? == AppendOutcome::AlreadyRecorded {
            // A log entry without its charge record means the id was reused.
            return Err(LedgerError::ConstraintViolation(format!(
                "log entry {} exists without a charge record",
                command.charge_id
            )));
        }

        unit.set_balance(balance_after)?;
        Ok(ChargeOutcome::Completed { balance_after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_ledger_core::{DateRange, Seller};
    use credit_ledger_store::Store;
    use tempfile::TempDir;

    fn setup() -> (ChargeProcessor, Arc<RocksStore>, TempDir, SellerId) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let seller = Seller::new(SellerId::generate(), "Processor Seller");
        store.create_seller(&seller).unwrap();
        (ChargeProcessor::new(Arc::clone(&store)), store, dir, seller.id)
    }

    fn dec(units: i64) -> Decimal {
        Decimal::new(units, 2)
    }

    fn fund(store: &RocksStore, seller_id: &SellerId, amount: Decimal) {
        store
            .with_seller_lock(seller_id, |unit| -> Result<()> {
                let balance = unit.increment_balance(amount)?;
                unit.append_transaction(TransactionLogEntry::add_credit(
                    TransactionId::generate_ordered(),
                    *seller_id,
                    amount,
                    balance,
                ))?;
                Ok(())
            })
            .unwrap();
    }

    fn command(seller_id: SellerId, amount: Decimal) -> ChargeCommand {
        ChargeCommand::new(TransactionId::generate(), seller_id, amount, "09121234567").unwrap()
    }

    #[test]
    fn command_validation() {
        let seller_id = SellerId::generate();
        let id = TransactionId::generate();

        assert!(matches!(
            ChargeCommand::new(id, seller_id, Decimal::ZERO, "09121234567"),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ChargeCommand::new(id, seller_id, dec(-100), "09121234567"),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ChargeCommand::new(id, seller_id, Decimal::new(1001, 3), "09121234567"),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ChargeCommand::new(id, seller_id, dec(100), "not-a-phone"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn sufficient_balance_completes() {
        let (processor, store, _dir, seller_id) = setup();
        fund(&store, &seller_id, dec(10000));

        let cmd = command(seller_id, dec(3000));
        let outcome = processor.process(&cmd).unwrap();

        assert_eq!(outcome, ChargeOutcome::Completed { balance_after: dec(7000) });
        assert_eq!(store.get_balance(&seller_id).unwrap(), dec(7000));

        let charge = store.get_charge(&cmd.charge_id).unwrap().unwrap();
        assert_eq!(charge.status, ChargeStatus::Completed);

        let entry = store.get_transaction(&cmd.charge_id).unwrap().unwrap();
        assert_eq!(entry.amount, dec(-3000));
        assert_eq!(entry.balance_after, dec(7000));
        assert_eq!(entry.phone_number, Some(cmd.phone_number.clone()));
    }

    #[test]
    fn exact_balance_completes_to_zero() {
        let (processor, store, _dir, seller_id) = setup();
        fund(&store, &seller_id, dec(5000));

        let outcome = processor.process(&command(seller_id, dec(5000))).unwrap();
        assert_eq!(outcome, ChargeOutcome::Completed { balance_after: dec(0) });
        assert_eq!(store.get_balance(&seller_id).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn insufficient_balance_fails_without_log_entry() {
        let (processor, store, _dir, seller_id) = setup();
        fund(&store, &seller_id, dec(1000));

        let cmd = command(seller_id, dec(3000));
        let outcome = processor.process(&cmd).unwrap();

        assert_eq!(outcome, ChargeOutcome::InsufficientFunds { balance: dec(1000) });
        assert_eq!(outcome.status(), ChargeStatus::Failed);
        assert_eq!(store.get_balance(&seller_id).unwrap(), dec(1000));
        assert_eq!(
            store.get_charge(&cmd.charge_id).unwrap().unwrap().status,
            ChargeStatus::Failed
        );
        assert!(store.get_transaction(&cmd.charge_id).unwrap().is_none());
        assert_eq!(store.list_transactions(&seller_id, DateRange::all(), None).unwrap().len(), 1);
    }

    #[test]
    fn redelivery_debits_once() {
        let (processor, store, _dir, seller_id) = setup();
        fund(&store, &seller_id, dec(10000));
        let cmd = command(seller_id, dec(3000));

        processor.process(&cmd).unwrap();
        let second = processor.process(&cmd).unwrap();

        assert_eq!(
            second,
            ChargeOutcome::AlreadyProcessed {
                status: ChargeStatus::Completed
            }
        );
        assert_eq!(store.get_balance(&seller_id).unwrap(), dec(7000));
        assert_eq!(store.sum_transactions(&seller_id).unwrap(), dec(7000));
    }

    #[test]
    fn failed_charge_stays_failed_after_top_up() {
        let (processor, store, _dir, seller_id) = setup();
        let cmd = command(seller_id, dec(3000));

        assert_eq!(processor.process(&cmd).unwrap().status(), ChargeStatus::Failed);
        fund(&store, &seller_id, dec(10000));

        let again = processor.process(&cmd).unwrap();
        assert_eq!(
            again,
            ChargeOutcome::AlreadyProcessed {
                status: ChargeStatus::Failed
            }
        );
        assert_eq!(store.get_balance(&seller_id).unwrap(), dec(10000));
    }

    #[test]
    fn charge_id_of_another_seller_is_refused() {
        let (processor, store, _dir, seller_id) = setup();
        let other = Seller::new(SellerId::generate(), "Other");
        store.create_seller(&other).unwrap();
        fund(&store, &seller_id, dec(10000));
        fund(&store, &other.id, dec(10000));

        let cmd = command(seller_id, dec(100));
        processor.process(&cmd).unwrap();

        let stolen = ChargeCommand {
            seller_id: other.id,
            ..cmd
        };
        assert!(matches!(processor.process(&stolen), Err(LedgerError::AlreadyExists(_))));
        assert_eq!(store.get_balance(&other.id).unwrap(), dec(10000));
    }

    #[test]
    fn unknown_seller_is_not_found() {
        let (processor, _store, _dir, _seller_id) = setup();
        let result = processor.process(&command(SellerId::generate(), dec(100)));
        assert!(matches!(result, Err(LedgerError::SellerNotFound { .. })));
    }

    #[test]
    fn held_seller_lock_is_contention() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            RocksStore::open_with_lock_timeout(dir.path(), std::time::Duration::from_millis(20)).unwrap(),
        );
        let seller = Seller::new(SellerId::generate(), "Busy");
        store.create_seller(&seller).unwrap();
        let processor = ChargeProcessor::new(Arc::clone(&store));

        let held = store.begin(&seller.id).unwrap();
        let result = processor.process(&command(seller.id, dec(100)));
        assert!(matches!(&result, Err(e) if e.is_retryable()));
        drop(held);

        assert!(processor.process(&command(seller.id, dec(100))).is_ok());
    }
}
