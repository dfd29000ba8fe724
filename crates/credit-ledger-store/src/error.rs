//! Error types for ledger storage.

use credit_ledger_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// Timed out waiting for a seller lock.
    #[error("timed out waiting for lock on seller {seller_id}")]
    LockTimeout {
        /// The contended seller.
        seller_id: String,
    },

    /// A write would break a storage invariant (negative balance, duplicate id).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Seller cannot be removed while ledger records reference it.
    #[error("seller {seller_id} is referenced by ledger records")]
    SellerInUse {
        /// The referenced seller.
        seller_id: String,
    },

    /// Record already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// The duplicated identifier.
        id: String,
    },
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "seller", id } => Self::SellerNotFound { seller_id: id },
            StoreError::NotFound {
                entity: "credit request",
                id,
            } => Self::CreditRequestNotFound { request_id: id },
            StoreError::NotFound {
                entity: "charge",
                id,
            } => Self::ChargeNotFound { charge_id: id },
            StoreError::NotFound { entity, id } => Self::Storage(format!("{entity} not found: {id}")),
            StoreError::LockTimeout { seller_id } => Self::Contention { seller_id },
            StoreError::ConstraintViolation(msg) => Self::ConstraintViolation(msg),
            StoreError::SellerInUse { seller_id } => Self::SellerInUse { seller_id },
            StoreError::AlreadyExists { entity, id } => {
                Self::AlreadyExists(format!("{entity} {id}"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
