//! Engine configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use credit_ledger_core::{LedgerError, Result};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path to `RocksDB` data directory (default: "/data/credit-ledger").
    pub data_dir: String,

    /// Bound on a seller lock wait, in milliseconds (default: 5000).
    pub lock_timeout_ms: u64,

    /// Number of charge dispatch workers (default: 4).
    pub dispatch_workers: usize,

    /// Capacity of the charge queue (default: 1024).
    pub dispatch_queue_capacity: usize,

    /// Attempts per charge before a contention failure is given up on (default: 5).
    pub max_delivery_attempts: u32,

    /// Backoff unit between attempts, multiplied by the attempt number (default: 50).
    pub retry_backoff_ms: u64,
}

impl LedgerConfig {
    /// Load configuration from the environment.
    ///
    /// If `LEDGER_CONFIG_FILE` names a JSON file, it is read first and
    /// environment variables override its values.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the file can't be read or a
    /// value doesn't parse.
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var("LEDGER_CONFIG_FILE") {
            Ok(path) => {
                let config = Self::from_file(&path)?;
                tracing::info!(path = %path, "Loaded ledger configuration file");
                config
            }
            Err(_) => Self::default(),
        };
        base.overlay_env(|name| std::env::var(name).ok())
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the file can't be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            LedgerError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;
        config.validate()
    }

    /// Seller lock wait bound.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    fn overlay_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_dir) = lookup("DATA_DIR") {
            self.data_dir = data_dir;
        }
        parse_var(&lookup, "LOCK_TIMEOUT_MS", &mut self.lock_timeout_ms)?;
        parse_var(&lookup, "DISPATCH_WORKERS", &mut self.dispatch_workers)?;
        parse_var(&lookup, "DISPATCH_QUEUE_CAPACITY", &mut self.dispatch_queue_capacity)?;
        parse_var(&lookup, "MAX_DELIVERY_ATTEMPTS", &mut self.max_delivery_attempts)?;
        parse_var(&lookup, "RETRY_BACKOFF_MS", &mut self.retry_backoff_ms)?;
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.dispatch_workers == 0 {
            return Err(LedgerError::Configuration(
                "dispatch_workers must be at least 1".into(),
            ));
        }
        if self.dispatch_queue_capacity == 0 {
            return Err(LedgerError::Configuration(
                "dispatch_queue_capacity must be at least 1".into(),
            ));
        }
        if self.max_delivery_attempts == 0 {
            return Err(LedgerError::Configuration(
                "max_delivery_attempts must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| LedgerError::Configuration(format!("{name}={raw:?}: {e}")))?;
    }
    Ok(())
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/credit-ledger".into(),
            lock_timeout_ms: 5000,
            dispatch_workers: 4,
            dispatch_queue_capacity: 1024,
            max_delivery_attempts: 5,
            retry_backoff_ms: 50,
        }
    }
}
