//! Per-seller exclusive locks with bounded wait.
//!
//! Every balance mutation happens while holding its seller's lock, so
//! operations on one seller are totally ordered and operations on different
//! sellers run in parallel.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use credit_ledger_core::SellerId;

use crate::error::{Result, StoreError};

/// Lock table keyed by seller.
///
/// Entries are created on first use and kept for the life of the table.
pub struct SellerLocks {
    locks: DashMap<SellerId, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Proof that the holder has exclusive access to one seller.
///
/// The lock is released when the guard is dropped, on every exit path.
pub struct SellerGuard {
    seller_id: SellerId,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl SellerGuard {
    /// The locked seller.
    #[must_use]
    pub const fn seller_id(&self) -> &SellerId {
        &self.seller_id
    }
}

impl SellerLocks {
    /// Create a lock table with the given wait bound.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Acquire the seller's lock, waiting at most the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if the lock is still held by someone
    /// else when the timeout expires.
    pub fn acquire(&self, seller_id: &SellerId) -> Result<SellerGuard> {
        // Clone the Arc out so the map shard is not held while waiting.
        let mutex = Arc::clone(
            self.locks
                .entry(*seller_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let guard = mutex.try_lock_arc_for(self.timeout).ok_or_else(|| {
            tracing::warn!(seller_id = %seller_id, timeout_ms = self.timeout.as_millis(), "Seller lock wait timed out");
            StoreError::LockTimeout {
                seller_id: seller_id.to_string(),
            }
        })?;

        Ok(SellerGuard {
            seller_id: *seller_id,
            _guard: guard,
        })
    }
}
