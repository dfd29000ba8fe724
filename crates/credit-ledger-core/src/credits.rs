//! Transaction log entries.
//!
//! Every balance change produces exactly one immutable log entry, and the sum
//! of a seller's entries always equals the seller's balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PhoneNumber, SellerId, TransactionId};

/// An immutable record of one balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    /// Unique id; a second append with the same id is a no-op.
    pub id: TransactionId,

    /// The seller whose balance was affected.
    pub seller_id: SellerId,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Signed amount. Positive = credit added, negative = charge sale.
    pub amount: Decimal,

    /// Destination phone number (charge sales only).
    pub phone_number: Option<PhoneNumber>,

    /// Seller balance right after this entry was applied.
    pub balance_after: Decimal,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl TransactionLogEntry {
    /// Create an `add_credit` entry for an approved credit request.
    #[must_use]
    pub fn add_credit(
        id: TransactionId,
        seller_id: SellerId,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id,
            seller_id,
            transaction_type: TransactionType::AddCredit,
            amount: amount.abs(),
            phone_number: None,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a `charge_sale` entry (debit) for a completed charge.
    #[must_use]
    pub fn charge_sale(
        id: TransactionId,
        seller_id: SellerId,
        amount: Decimal,
        phone_number: PhoneNumber,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id,
            seller_id,
            transaction_type: TransactionType::ChargeSale,
            amount: -amount.abs(), // Always negative for sales
            phone_number: Some(phone_number),
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Type of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credit added by an approved credit request.
    AddCredit,

    /// Credit spent on a completed charge.
    ChargeSale,
}
