//! # Reconciler Configuration
//!
//! Tunables for the reconciliation loop. Every field has a default, so an
//! empty configuration is valid; a TOML file and `REBALANCE__*` environment
//! variables can override any of them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rebalance_reconciler::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().requeue_interval();
//! # let _ = interval;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_DISPATCH_LEASE_TTL_SECONDS, DEFAULT_FAILED_TASKS_HISTORY_MAX_LENGTH,
    DEFAULT_REQUEUE_INTERVAL_SECONDS, DEFAULT_RETRY_BACKOFF_SECONDS,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Fixed requeue for steady-state waits (engine busy, task running)
    pub requeue_interval_seconds: u64,
    /// Minimum time after a failed attempt before it is retried
    pub retry_backoff_seconds: u64,
    pub failed_tasks_history_max_length: usize,
    /// How long a per-cluster dispatch lease stays valid without renewal
    pub dispatch_lease_ttl_seconds: u64,
    pub conflict_backoff: ConflictBackoffConfig,
    pub logging: LoggingConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_interval_seconds: DEFAULT_REQUEUE_INTERVAL_SECONDS,
            retry_backoff_seconds: DEFAULT_RETRY_BACKOFF_SECONDS,
            failed_tasks_history_max_length: DEFAULT_FAILED_TASKS_HISTORY_MAX_LENGTH,
            dispatch_lease_ttl_seconds: DEFAULT_DISPATCH_LEASE_TTL_SECONDS,
            conflict_backoff: ConflictBackoffConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_seconds)
    }

    pub fn retry_backoff(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.retry_backoff_seconds).unwrap_or(i64::MAX))
    }

    pub fn dispatch_lease_ttl(&self) -> Duration {
        Duration::from_secs(self.dispatch_lease_ttl_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.requeue_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "requeue_interval_seconds",
                self.requeue_interval_seconds,
                "must be greater than 0",
            ));
        }
        if self.failed_tasks_history_max_length == 0 {
            return Err(ConfigurationError::invalid_value(
                "failed_tasks_history_max_length",
                self.failed_tasks_history_max_length,
                "must keep at least one entry",
            ));
        }
        if self.dispatch_lease_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch_lease_ttl_seconds",
                self.dispatch_lease_ttl_seconds,
                "must be greater than 0",
            ));
        }
        self.conflict_backoff.validate()?;
        self.logging.validate()
    }
}

/// Backoff used when a status write is rejected as stale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictBackoffConfig {
    pub initial_delay_ms: u64,
    pub factor: f64,
    /// Fraction of each delay added as random jitter
    pub jitter: f64,
    /// Total number of write attempts
    pub steps: u32,
    pub max_delay_ms: u64,
}

impl Default for ConflictBackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 10,
            factor: 5.0,
            jitter: 0.1,
            steps: 5,
            max_delay_ms: 1000,
        }
    }
}

impl ConflictBackoffConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.steps == 0 {
            return Err(ConfigurationError::invalid_value(
                "conflict_backoff.steps",
                self.steps,
                "at least one attempt is required",
            ));
        }
        if self.factor.is_nan() || self.factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "conflict_backoff.factor",
                self.factor,
                "must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigurationError::invalid_value(
                "conflict_backoff.jitter",
                self.jitter,
                "must be between 0.0 and 1.0",
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigurationError::validation_error(format!(
                "conflict_backoff.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Overrides the environment-derived level when set
    pub level: Option<String>,
    pub json: bool,
}

impl LoggingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        match &self.level {
            Some(level) if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) => {
                Err(ConfigurationError::invalid_value(
                    "logging.level",
                    level,
                    "expected one of trace, debug, info, warn, error",
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.requeue_interval(), Duration::from_secs(10));
        assert_eq!(config.retry_backoff(), chrono::Duration::seconds(30));
        assert_eq!(config.failed_tasks_history_max_length, 50);
    }

    #[test]
    fn test_rejects_zero_history() {
        let config = ReconcilerConfig {
            failed_tasks_history_max_length: 0,
            ..ReconcilerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_backoff_validation() {
        let mut backoff = ConflictBackoffConfig {
            jitter: 1.5,
            ..ConflictBackoffConfig::default()
        };
        assert!(backoff.validate().is_err());

        backoff.jitter = 0.0;
        backoff.initial_delay_ms = 5000;
        assert!(matches!(
            backoff.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_log_level_validation() {
        let logging = LoggingConfig {
            level: Some("WARN".to_string()),
            json: false,
        };
        assert!(logging.validate().is_ok());

        let logging = LoggingConfig {
            level: Some("loud".to_string()),
            json: false,
        };
        assert!(logging.validate().is_err());
    }
}
