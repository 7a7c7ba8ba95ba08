//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `REBALANCE__*`
//! environment overrides (double underscore separates nesting levels), then
//! validates the result.

use config::{Config, Environment, File, FileFormat, Map};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::ReconcilerConfig;

const ENV_PREFIX: &str = "REBALANCE";
const ENV_SEPARATOR: &str = "__";
const CONFIG_PATH_VAR: &str = "REBALANCE_CONFIG_PATH";

#[derive(Debug)]
pub struct ConfigManager {
    config: ReconcilerConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection. The file path is
    /// taken from `REBALANCE_CONFIG_PATH` when set.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::load_from_file(path.as_deref())
    }

    pub fn load_from_file(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_overrides(path, None, &environment)
    }

    /// Load with an explicit override map standing in for the process
    /// environment. Keys use the same `REBALANCE__SECTION__FIELD` form.
    /// Useful for tests that must not touch global environment variables.
    pub fn load_with_overrides(
        path: Option<&Path>,
        env_overrides: Option<Map<String, String>>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        debug!(
            environment = %environment,
            config_path = ?path,
            "Loading reconciler configuration"
        );

        let defaults = Config::try_from(&ReconcilerConfig::default())
            .map_err(|e| ConfigurationError::parse_error("built-in defaults", e))?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            let contents = Self::read_config_file(path)?;
            builder = builder.add_source(File::from_str(&contents, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env_overrides),
        );

        let file_label = path.map_or_else(|| "environment".to_string(), |p| p.display().to_string());
        let config: ReconcilerConfig = builder
            .build()
            .map_err(|e| match e {
                config::ConfigError::FileParse { cause, .. } => {
                    ConfigurationError::invalid_toml(file_label.clone(), cause)
                }
                other => ConfigurationError::parse_error(file_label.clone(), other),
            })?
            .try_deserialize()
            .map_err(|e| ConfigurationError::parse_error(file_label.clone(), e))?;

        config.validate()?;

        info!(
            environment = %environment,
            requeue_interval_seconds = config.requeue_interval_seconds,
            retry_backoff_seconds = config.retry_backoff_seconds,
            failed_tasks_history_max_length = config.failed_tasks_history_max_length,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_path: path.map(Path::to_path_buf),
        }))
    }

    /// Detect the current environment, defaulting to development
    pub fn detect_environment() -> String {
        env::var("REBALANCE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn read_config_file(path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigurationError::config_file_not_found(vec![
                path.to_path_buf()
            ]));
        }
        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }
}
