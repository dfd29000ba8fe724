//! Credit Ledger - consistency check for the seller credit ledger.
//!
//! Opens the configured store, reconciles every seller's balance against its
//! transaction log, and exits non-zero if any seller is unbalanced.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_ledger_service::{Ledger, LedgerConfig};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,credit_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Reconciliation aborted");
            ExitCode::from(2)
        }
    }
}

fn run() -> credit_ledger_core::Result<bool> {
    let config = LedgerConfig::from_env()?;

    tracing::info!(
        data_dir = %config.data_dir,
        lock_timeout_ms = config.lock_timeout_ms,
        "Service configuration loaded"
    );

    let ledger = Ledger::open(&config)?;
    let reports = ledger.reconcile_all()?;
    let unbalanced = reports.iter().filter(|report| !report.balanced).count();

    tracing::info!(
        sellers = reports.len(),
        unbalanced,
        "Reconciliation finished"
    );
    Ok(unbalanced == 0)
}
