//! Credit request workflow.
//!
//! Sellers submit top-up requests; an admin approves or rejects each one
//! exactly once. The pending check happens under the seller's lock, so
//! repeated or racing decisions on the same request are harmless.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use credit_ledger_core::{
    validate_amount, CreditRequest, CreditRequestId, Decision, LedgerError, RequestStatus, Result,
    SellerId, TransactionId, TransactionLogEntry,
};
use credit_ledger_store::{AppendOutcome, LedgerUnit, RocksStore, Store};

/// Result of a single decision call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The request moved from pending to this status.
    Applied(RequestStatus),
    /// The request was already decided; nothing changed.
    AlreadyDecided(RequestStatus),
}

/// Per-request result of a bulk decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum DecisionResult {
    /// The request moved from pending to this status.
    Applied(RequestStatus),
    /// The request was already decided; nothing changed.
    AlreadyDecided(RequestStatus),
    /// The decision failed and was rolled back; the request is unchanged.
    Error(String),
}

impl From<Result<DecisionOutcome>> for DecisionResult {
    fn from(result: Result<DecisionOutcome>) -> Self {
        match result {
            Ok(DecisionOutcome::Applied(status)) => Self::Applied(status),
            Ok(DecisionOutcome::AlreadyDecided(status)) => Self::AlreadyDecided(status),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// One line of a bulk decision report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionReport {
    /// The request the decision was applied to.
    pub request_id: CreditRequestId,
    /// What happened to it.
    pub result: DecisionResult,
}

/// Submits and decides credit requests.
#[derive(Clone)]
pub struct CreditRequestWorkflow {
    store: Arc<RocksStore>,
}

impl CreditRequestWorkflow {
    /// Create a workflow over the given store.
    #[must_use]
    pub const fn new(store: Arc<RocksStore>) -> Self {
        Self { store }
    }

    /// Create a pending credit request.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if the amount is not a valid positive amount.
    /// - `LedgerError::SellerNotFound` if the seller doesn't exist.
    /// - `LedgerError::Contention` if the seller lock wasn't acquired in time.
    pub fn submit(&self, seller_id: &SellerId, amount: Decimal) -> Result<CreditRequest> {
        let amount = validate_amount(amount)?;
        let request = CreditRequest::new(*seller_id, amount);

        self.store.with_seller_lock(seller_id, |unit| {
            unit.insert_credit_request(request.clone())
                .map_err(LedgerError::from)
        })?;

        tracing::info!(
            request_id = %request.id,
            seller_id = %seller_id,
            amount = %amount,
            "Credit request submitted"
        );
        Ok(request)
    }

    /// Approve or reject a pending request.
    ///
    /// Approval adds the requested amount to the balance read under the
    /// lock and appends an `add_credit` log entry in the same atomic unit.
    /// A request that is no longer pending is left untouched.
    ///
    /// # Errors
    ///
    /// - `LedgerError::CreditRequestNotFound` if the request doesn't exist.
    /// - `LedgerError::Contention` if the seller lock wasn't acquired in time.
    /// - `LedgerError::ConstraintViolation` if a ledger invariant would break.
    ///
    /// On error the request stays pending and the call may be retried.
    pub fn decide(&self, request_id: &CreditRequestId, decision: Decision) -> Result<DecisionOutcome> {
        let seller_id = self
            .store
            .get_credit_request(request_id)?
            .map(|request| request.seller_id)
            .ok_or_else(|| LedgerError::CreditRequestNotFound {
                request_id: request_id.to_string(),
            })?;

        let result = self
            .store
            .with_seller_lock(&seller_id, |unit| Self::apply(unit, request_id, decision));

        match &result {
            Ok(DecisionOutcome::Applied(status)) => tracing::info!(
                request_id = %request_id,
                seller_id = %seller_id,
                status = ?status,
                "Credit request decided"
            ),
            Ok(DecisionOutcome::AlreadyDecided(status)) => tracing::debug!(
                request_id = %request_id,
                seller_id = %seller_id,
                status = ?status,
                "Credit request already decided, skipping"
            ),
            Err(e) if e.is_defect() => tracing::error!(
                request_id = %request_id,
                seller_id = %seller_id,
                error = %e,
                "Credit decision rolled back on ledger invariant"
            ),
            Err(e) => tracing::warn!(
                request_id = %request_id,
                seller_id = %seller_id,
                error = %e,
                "Credit decision failed"
            ),
        }

        result
    }

    /// Apply the same decision to many requests, each in its own unit.
    ///
    /// A failing request is reported and never stops the rest.
    #[must_use]
    pub fn decide_all(&self, request_ids: &[CreditRequestId], decision: Decision) -> Vec<DecisionReport> {
        request_ids
            .iter()
            .map(|request_id| DecisionReport {
                request_id: *request_id,
                result: self.decide(request_id, decision).into(),
            })
            .collect()
    }

    fn apply(
        unit: &mut LedgerUnit<'_>,
        request_id: &CreditRequestId,
        decision: Decision,
    ) -> Result<DecisionOutcome> {
        // Re-read under the lock; the pre-lock read only located the seller.
        let mut request = unit
            .get_credit_request(request_id)?
            .ok_or_else(|| LedgerError::CreditRequestNotFound {
                request_id: request_id.to_string(),
            })?;

        if !request.apply(decision) {
            return Ok(DecisionOutcome::AlreadyDecided(request.status));
        }

        if decision == Decision::Approve {
            let balance_after = unit.increment_balance(request.amount)?;
            let entry = TransactionLogEntry::add_credit(
                TransactionId::generate_ordered(),
                request.seller_id,
                request.amount,
                balance_after,
            );
            if unit.append_transaction(entry)? == AppendOutcome::AlreadyRecorded {
                return Err(LedgerError::ConstraintViolation(format!(
                    "generated log id collided while approving {request_id}"
                )));
            }
        }

        let status = request.status;
        unit.update_credit_request(request)?;
        Ok(DecisionOutcome::Applied(status))
    }
}
