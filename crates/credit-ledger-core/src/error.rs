//! Error types for the credit ledger.

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Insufficient funds and already-processed requests are normal outcomes and
/// are reported as values, not through this type.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Input rejected before it reached the ledger.
    #[error("validation error: {0}")]
    Validation(String),

    /// Seller not found.
    #[error("seller not found: {seller_id}")]
    SellerNotFound {
        /// The seller ID that was not found.
        seller_id: String,
    },

    /// Credit request not found.
    #[error("credit request not found: {request_id}")]
    CreditRequestNotFound {
        /// The request ID that was not found.
        request_id: String,
    },

    /// Charge not found.
    #[error("charge not found: {charge_id}")]
    ChargeNotFound {
        /// The charge ID that was not found.
        charge_id: String,
    },

    /// A seller lock could not be acquired in time. Safe to retry.
    #[error("contention on seller {seller_id}: lock wait timed out")]
    Contention {
        /// The contended seller.
        seller_id: String,
    },

    /// A storage invariant would have been broken; the unit was rolled back.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Seller still referenced by ledger records.
    #[error("seller {seller_id} is still referenced by ledger records")]
    SellerInUse {
        /// The referenced seller.
        seller_id: String,
    },

    /// A record with the same identity already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The engine is shutting down and no longer accepts work.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// Whether this error indicates a defect rather than bad input or load.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }
}
