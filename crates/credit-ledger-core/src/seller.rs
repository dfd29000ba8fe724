//! Seller records.
//!
//! A seller carries the prepaid credit balance that charges draw from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::to_ledger_scale;
use crate::SellerId;

/// A seller with a prepaid credit balance.
///
/// The balance is never negative. It is only changed inside a seller-locked
/// atomic unit, together with the transaction log entry that explains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seller {
    /// The seller ID.
    pub id: SellerId,

    /// Display name.
    pub name: String,

    /// Current credit balance, two fraction digits.
    pub balance: Decimal,

    /// When the seller was provisioned.
    pub created_at: DateTime<Utc>,

    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Seller {
    /// Create a new seller with a zero balance.
    #[must_use]
    pub fn new(id: SellerId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            balance: to_ledger_scale(Decimal::ZERO),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the seller can cover a debit of `amount`.
    #[must_use]
    pub fn has_sufficient_credit(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
