//! # Structured Logging Module
//!
//! Environment-aware structured logging for the reconciliation loop. Output
//! goes to stdout, either human-readable or as JSON lines.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::models::ObjectKey;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Later calls are no-ops.
///
/// `RUST_LOG` wins over the configured level, which in turn wins over the
/// environment default.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let json_layer = config.json.then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter())
        });
        let text_layer = (!config.json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter())
        });

        // A subscriber may already be installed by the embedding process
        if tracing_subscriber::registry()
            .with(json_layer)
            .with(text_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("REBALANCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a state change of an operation record
pub fn log_operation_event(
    action: &str,
    operation: &ObjectKey,
    task_id: Option<&str>,
    state: Option<&str>,
    details: Option<&str>,
) {
    tracing::info!(
        action = %action,
        operation = %operation,
        task_id = task_id,
        state = state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 OPERATION_EVENT"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_structured_logging(&config);
        init_structured_logging(&config);
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
