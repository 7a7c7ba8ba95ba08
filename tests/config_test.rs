//! Configuration loading from TOML files with environment-style overrides

use std::io::Write;

use config::Map;
use rebalance_reconciler::config::{ConfigManager, ConfigurationError, ReconcilerConfig};
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn test_file_values_and_overrides() {
    let file = toml_file(
        r#"
requeue_interval_seconds = 20
retry_backoff_seconds = 120
failed_tasks_history_max_length = 8

[conflict_backoff]
initial_delay_ms = 50
steps = 4

[logging]
level = "warn"
json = true
"#,
    );

    let mut overrides = Map::new();
    overrides.insert(
        "REBALANCE__RETRY_BACKOFF_SECONDS".to_string(),
        "90".to_string(),
    );

    let manager =
        ConfigManager::load_with_overrides(Some(file.path()), Some(overrides), "production")
            .unwrap();
    let config = manager.config();

    assert_eq!(config.requeue_interval_seconds, 20);
    assert_eq!(config.retry_backoff_seconds, 90, "override wins over the file");
    assert_eq!(config.failed_tasks_history_max_length, 8);
    assert_eq!(config.conflict_backoff.initial_delay_ms, 50);
    assert_eq!(config.conflict_backoff.steps, 4);
    assert_eq!(
        config.conflict_backoff.max_delay_ms,
        ReconcilerConfig::default().conflict_backoff.max_delay_ms,
        "unset fields keep their defaults"
    );
    assert_eq!(config.logging.level.as_deref(), Some("warn"));
    assert!(config.logging.json);
    assert_eq!(config.retry_backoff(), chrono::Duration::seconds(90));

    assert_eq!(manager.environment(), "production");
    assert_eq!(manager.config_path(), Some(file.path()));
}

#[test]
fn test_invalid_toml_is_reported() {
    let file = toml_file("requeue_interval_seconds = [unterminated");

    let err = ConfigManager::load_with_overrides(Some(file.path()), Some(Map::new()), "test")
        .unwrap_err();
    assert!(
        matches!(err, ConfigurationError::InvalidToml { .. }),
        "unexpected error: {err:?}"
    );
}

#[test]
fn test_out_of_range_values_fail_validation() {
    let file = toml_file(
        r#"
[conflict_backoff]
steps = 0
"#,
    );

    let err = ConfigManager::load_with_overrides(Some(file.path()), Some(Map::new()), "test")
        .unwrap_err();
    match err {
        ConfigurationError::InvalidValue { field, .. } => {
            assert_eq!(field, "conflict_backoff.steps");
        }
        other => panic!("expected an invalid value, got {other:?}"),
    }

    let mut overrides = Map::new();
    overrides.insert(
        "REBALANCE__FAILED_TASKS_HISTORY_MAX_LENGTH".to_string(),
        "0".to_string(),
    );
    let err = ConfigManager::load_with_overrides(None, Some(overrides), "test").unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
}

#[test]
fn test_wrong_value_type_is_a_parse_error() {
    let mut overrides = Map::new();
    overrides.insert(
        "REBALANCE__REQUEUE_INTERVAL_SECONDS".to_string(),
        "soon".to_string(),
    );
    let err = ConfigManager::load_with_overrides(None, Some(overrides), "test").unwrap_err();
    assert!(
        matches!(err, ConfigurationError::ParseError { .. }),
        "unexpected error: {err:?}"
    );
}
