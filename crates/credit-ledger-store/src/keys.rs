//! Key encoding utilities for `RocksDB`.
//!
//! Per-seller index keys are laid out as
//! `seller_id (16 bytes) || created_at micros (8 bytes, big-endian) || record_id (16 bytes)`,
//! so a prefix scan over one seller yields its records in chronological order.

use chrono::{DateTime, Utc};
use credit_ledger_core::{CreditRequestId, SellerId, TransactionId};

/// Length of a per-seller timeline index key.
pub const TIMELINE_KEY_LEN: usize = 40;

/// Create a seller key from a seller ID.
#[must_use]
pub fn seller_key(seller_id: &SellerId) -> Vec<u8> {
    seller_id.as_bytes().to_vec()
}

/// Create a credit request key from a request ID.
#[must_use]
pub fn credit_request_key(request_id: &CreditRequestId) -> Vec<u8> {
    request_id.to_bytes().to_vec()
}

/// Create a seller-request index key.
///
/// Format: `seller_id (16 bytes) || request_id (16 bytes)`
///
/// Since ULIDs are time-ordered, requests for a seller sort by submission time.
#[must_use]
pub fn seller_request_key(seller_id: &SellerId, request_id: &CreditRequestId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(seller_id.as_bytes());
    key.extend_from_slice(&request_id.to_bytes());
    key
}

/// Create a charge or transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.as_bytes().to_vec()
}

/// Create a per-seller timeline index key for a charge or log entry.
#[must_use]
pub fn timeline_key(
    seller_id: &SellerId,
    created_at: DateTime<Utc>,
    transaction_id: &TransactionId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(TIMELINE_KEY_LEN);
    key.extend_from_slice(seller_id.as_bytes());
    key.extend_from_slice(&timestamp_bytes(created_at));
    key.extend_from_slice(transaction_id.as_bytes());
    key
}

/// Lower bound for a timeline scan starting at `from` (or the seller's first record).
#[must_use]
pub fn timeline_start(seller_id: &SellerId, from: Option<DateTime<Utc>>) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(seller_id.as_bytes());
    if let Some(from) = from {
        key.extend_from_slice(&timestamp_bytes(from));
    }
    key
}

/// Create a prefix for iterating all index entries of a seller.
#[must_use]
pub fn seller_prefix(seller_id: &SellerId) -> Vec<u8> {
    seller_id.as_bytes().to_vec()
}

/// Extract the timestamp from a timeline index key.
///
/// Returns `None` if the key is shorter than a timeline key.
#[must_use]
pub fn extract_timestamp(key: &[u8]) -> Option<DateTime<Utc>> {
    let bytes: [u8; 8] = key.get(16..24)?.try_into().ok()?;
    let micros = i64::try_from(u64::from_be_bytes(bytes)).ok()?;
    DateTime::from_timestamp_micros(micros)
}

/// Extract the transaction ID from a timeline index key.
///
/// Returns `None` if the key is shorter than a timeline key.
#[must_use]
pub fn extract_transaction_id(key: &[u8]) -> Option<TransactionId> {
    let bytes: [u8; 16] = key.get(24..TIMELINE_KEY_LEN)?.try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Extract the request ID from a seller-request index key.
#[must_use]
pub fn extract_request_id(key: &[u8]) -> Option<CreditRequestId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(CreditRequestId::from_bytes(bytes))
}

fn timestamp_bytes(at: DateTime<Utc>) -> [u8; 8] {
    // Pre-epoch instants clamp to zero; ledger records are never that old.
    u64::try_from(at.timestamp_micros())
        .unwrap_or_default()
        .to_be_bytes()
}
