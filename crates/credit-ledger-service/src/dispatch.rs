//! Asynchronous charge delivery.
//!
//! `submit` validates a charge, queues it and returns an acknowledgment
//! right away. A pool of workers delivers queued charges to the
//! [`ChargeProcessor`] at least once: contention failures are retried with
//! linear backoff, terminal outcomes are not. The outcome is observable
//! afterwards through the charge record.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use credit_ledger_core::{LedgerError, Result, SellerId, TransactionId};
use credit_ledger_store::{RocksStore, Store};

use crate::config::LedgerConfig;
use crate::processor::{ChargeCommand, ChargeProcessor};

/// Acknowledgment that a charge was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Accepted {
    /// Id under which the charge will be recorded.
    pub charge_id: TransactionId,
}

/// Worker pool and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Number of worker tasks.
    pub workers: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Attempts per charge, including the first.
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl From<&LedgerConfig> for DispatchPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            workers: config.dispatch_workers.max(1),
            queue_capacity: config.dispatch_queue_capacity.max(1),
            max_attempts: config.max_delivery_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl DispatchPolicy {
    /// Wait before retrying after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

/// Queue-backed charge dispatcher.
pub struct ChargeDispatcher {
    store: Arc<RocksStore>,
    sender: mpsc::Sender<ChargeCommand>,
    workers: Vec<JoinHandle<()>>,
}

impl ChargeDispatcher {
    /// Start the worker pool. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(store: Arc<RocksStore>, policy: DispatchPolicy) -> Self {
        let (sender, receiver) = mpsc::channel(policy.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let processor = ChargeProcessor::new(Arc::clone(&store));

        let workers = (0..policy.workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let processor = processor.clone();
                tokio::spawn(run_worker(worker, receiver, processor, policy))
            })
            .collect();

        tracing::info!(
            workers = policy.workers,
            queue_capacity = policy.queue_capacity,
            max_attempts = policy.max_attempts,
            "Charge dispatcher started"
        );

        Self {
            store,
            sender,
            workers,
        }
    }

    /// Validate and queue a charge.
    ///
    /// Without a `charge_id` a fresh one is generated and returned in the
    /// acknowledgment; resubmitting under that id is safe.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` for a bad amount or phone number.
    /// - `LedgerError::SellerNotFound` if the seller doesn't exist.
    /// - `LedgerError::Unavailable` if the dispatcher is shutting down.
    pub async fn submit(
        &self,
        charge_id: Option<TransactionId>,
        seller_id: SellerId,
        amount: Decimal,
        phone_number: &str,
    ) -> Result<Accepted> {
        let charge_id = charge_id.unwrap_or_else(TransactionId::generate);
        let command = ChargeCommand::new(charge_id, seller_id, amount, phone_number)?;

        let store = Arc::clone(&self.store);
        let seller = tokio::task::spawn_blocking(move || store.get_seller(&seller_id))
            .await
            .map_err(|e| LedgerError::Unavailable(format!("seller lookup task failed: {e}")))??;
        if seller.is_none() {
            return Err(LedgerError::SellerNotFound {
                seller_id: seller_id.to_string(),
            });
        }

        self.sender
            .send(command)
            .await
            .map_err(|_| LedgerError::Unavailable("charge queue is closed".into()))?;

        tracing::debug!(charge_id = %charge_id, seller_id = %seller_id, amount = %amount, "Charge accepted");
        Ok(Accepted { charge_id })
    }

    /// Stop accepting charges, drain the queue and wait for the workers.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Charge worker panicked");
            }
        }
        tracing::info!("Charge dispatcher stopped");
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ChargeCommand>>>,
    processor: ChargeProcessor,
    policy: DispatchPolicy,
) {
    loop {
        // Hold the receiver only while waiting for the next command.
        let next = receiver.lock().await.recv().await;
        let Some(command) = next else {
            break;
        };
        deliver(worker, &processor, command, policy).await;
    }
    tracing::debug!(worker, "Charge worker exiting");
}

async fn deliver(worker: usize, processor: &ChargeProcessor, command: ChargeCommand, policy: DispatchPolicy) {
    let command = Arc::new(command);

    for attempt in 1..=policy.max_attempts {
        let task_processor = processor.clone();
        let task_command = Arc::clone(&command);
        let result = tokio::task::spawn_blocking(move || task_processor.process(&task_command)).await;

        match result {
            Ok(Ok(_)) => return,
            Ok(Err(e)) if e.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(
                    worker,
                    charge_id = %command.charge_id,
                    attempt,
                    error = %e,
                    "Retrying charge after contention"
                );
                tokio::time::sleep(policy.backoff_after(attempt)).await;
            }
            Ok(Err(e)) => {
                tracing::error!(
                    worker,
                    charge_id = %command.charge_id,
                    seller_id = %command.seller_id,
                    attempt,
                    error = %e,
                    "Charge left unprocessed"
                );
                return;
            }
            Err(e) => {
                tracing::error!(worker, charge_id = %command.charge_id, error = %e, "Charge task failed");
                return;
            }
        }
    }
}
