//! Charge records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PhoneNumber, SellerId, TransactionId};

/// One charge attempt against a seller's balance.
///
/// The record is written once, in the same atomic unit that decides its
/// outcome, and never revised afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Caller-supplied unique id, shared with the resulting log entry.
    pub id: TransactionId,

    /// The charged seller.
    pub seller_id: SellerId,

    /// Destination phone number.
    pub phone_number: PhoneNumber,

    /// Charged amount (always positive).
    pub amount: Decimal,

    /// Outcome of the charge.
    pub status: ChargeStatus,

    /// When the charge was recorded.
    pub created_at: DateTime<Utc>,
}

impl Charge {
    /// Create a charge record with the given status.
    #[must_use]
    pub fn new(
        id: TransactionId,
        seller_id: SellerId,
        phone_number: PhoneNumber,
        amount: Decimal,
        status: ChargeStatus,
    ) -> Self {
        Self {
            id,
            seller_id,
            phone_number,
            amount,
            status,
            created_at: Utc::now(),
        }
    }
}

/// Status of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Accepted but not yet processed.
    Pending,

    /// Balance debited.
    Completed,

    /// Rejected for insufficient balance.
    Failed,
}

impl ChargeStatus {
    /// Check if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
