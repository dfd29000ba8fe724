//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Seller records, keyed by `seller_id`.
    pub const SELLERS: &str = "sellers";

    /// Credit requests, keyed by `request_id` (ULID).
    pub const CREDIT_REQUESTS: &str = "credit_requests";

    /// Index: credit requests by seller, keyed by `seller_id || request_id`.
    /// Value is empty (index only).
    pub const CREDIT_REQUESTS_BY_SELLER: &str = "credit_requests_by_seller";

    /// Charge records, keyed by `charge_id`.
    pub const CHARGES: &str = "charges";

    /// Index: charges by seller, keyed by `seller_id || created_at || charge_id`.
    /// Value is empty (index only).
    pub const CHARGES_BY_SELLER: &str = "charges_by_seller";

    /// Transaction log entries, keyed by `transaction_id`.
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by seller, keyed by `seller_id || created_at || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_SELLER: &str = "transactions_by_seller";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::SELLERS,
        cf::CREDIT_REQUESTS,
        cf::CREDIT_REQUESTS_BY_SELLER,
        cf::CHARGES,
        cf::CHARGES_BY_SELLER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_SELLER,
    ]
}
