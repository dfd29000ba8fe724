//! Credit requests and their approval state machine.
//!
//! A request starts `pending` and moves exactly once to `approved` or
//! `rejected`. Decided requests are frozen.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CreditRequestId, SellerId};

/// A seller's request to top up credit, awaiting an admin decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequest {
    /// Request ID (ULID for time-ordering).
    pub id: CreditRequestId,

    /// The requesting seller.
    pub seller_id: SellerId,

    /// Requested amount (always positive).
    pub amount: Decimal,

    /// Current status.
    pub status: RequestStatus,

    /// When the request was submitted.
    pub created_at: DateTime<Utc>,

    /// When the request was last changed.
    pub updated_at: DateTime<Utc>,
}

impl CreditRequest {
    /// Create a new pending request.
    #[must_use]
    pub fn new(seller_id: SellerId, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: CreditRequestId::generate(),
            seller_id,
            amount,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the request is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Apply a decision, returning `false` (and changing nothing) if the
    /// request was already decided.
    pub fn apply(&mut self, decision: Decision) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = decision.target_status();
        self.updated_at = Utc::now();
        true
    }
}

/// Status of a credit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting a decision.
    Pending,

    /// Approved; the credit was added to the seller's balance.
    Approved,

    /// Rejected; the balance was not touched.
    Rejected,
}

/// An admin decision on a pending credit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Add the requested credit.
    Approve,

    /// Decline the request.
    Reject,
}

impl Decision {
    /// The status a pending request ends up in.
    #[must_use]
    pub const fn target_status(self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_pending() {
        let request = CreditRequest::new(SellerId::generate(), Decimal::new(10000, 2));
        assert!(request.is_pending());
        assert_eq!(request.created_at, request.updated_at);
    }

    #[test]
    fn decision_applies_once() {
        let mut request = CreditRequest::new(SellerId::generate(), Decimal::new(10000, 2));

        assert!(request.apply(Decision::Approve));
        assert_eq!(request.status, RequestStatus::Approved);

        // A later rejection cannot move it backwards or sideways.
        assert!(!request.apply(Decision::Reject));
        assert_eq!(request.status, RequestStatus::Approved);
    }

    #[test]
    fn rejection_is_terminal() {
        let mut request = CreditRequest::new(SellerId::generate(), Decimal::new(500, 2));
        assert!(request.apply(Decision::Reject));
        assert!(!request.apply(Decision::Approve));
        assert_eq!(request.status, RequestStatus::Rejected);
    }
}
