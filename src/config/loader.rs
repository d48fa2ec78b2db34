//! Configuration Loader
//!
//! Environment-aware layered loading built on the `config` crate:
//!
//! 1. Baseline for the environment ([`CompanionConfig::for_environment`])
//! 2. `{dir}/companion.toml` (optional)
//! 3. `{dir}/companion.{environment}.toml` (optional)
//! 4. Environment variables `COMPANION__SECTION__FIELD`
//!
//! Later layers win. The merged tree is validated before it is returned.

use super::error::{ConfigResult, ConfigurationError};
use super::CompanionConfig;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Variable holding the environment name
pub const ENVIRONMENT_VARIABLE: &str = "COMPANION_ENV";

/// Variable overriding the configuration directory
pub const CONFIG_DIR_VARIABLE: &str = "COMPANION_CONFIG_DIR";

/// Prefix for per-field overrides, e.g. `COMPANION__CACHE__MAX_ENTRIES=50`
pub const OVERRIDE_PREFIX: &str = "COMPANION";

const OVERRIDE_SEPARATOR: &str = "__";
const BASE_FILE_STEM: &str = "companion";

/// Layered configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_directory: PathBuf,
    environment: String,
    /// Replaces the process environment as override source when set
    overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Loader with environment auto-detection
    pub fn new() -> Self {
        Self {
            config_directory: Self::default_config_directory(),
            environment: Self::detect_environment(),
            overrides: None,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config_directory = directory.into();
        self
    }

    /// Use an explicit environment instead of `COMPANION_ENV`
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Read overrides from `variables` instead of the process environment
    pub fn with_overrides(mut self, variables: HashMap<String, String>) -> Self {
        self.overrides = Some(variables);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from `COMPANION_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var(ENVIRONMENT_VARIABLE)
            .ok()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn default_config_directory() -> PathBuf {
        env::var(CONFIG_DIR_VARIABLE)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Candidate files in merge order; missing files are skipped
    pub fn config_files(&self) -> Vec<PathBuf> {
        vec![
            self.config_directory
                .join(format!("{BASE_FILE_STEM}.toml")),
            self.config_directory
                .join(format!("{BASE_FILE_STEM}.{}.toml", self.environment)),
        ]
    }

    /// Load, merge and validate the configuration
    pub fn load(&self) -> ConfigResult<CompanionConfig> {
        debug!(
            environment = %self.environment,
            directory = %self.config_directory.display(),
            "Loading configuration"
        );

        let baseline = CompanionConfig::for_environment(&self.environment);
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&baseline).map_err(|e| {
                ConfigurationError::environment_config_error(&self.environment, e)
            })?,
        );

        let mut applied_files = Vec::new();
        for path in self.config_files() {
            if path.is_file() {
                applied_files.push(path.display().to_string());
            }
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }

        let overrides = config::Environment::with_prefix(OVERRIDE_PREFIX)
            .prefix_separator(OVERRIDE_SEPARATOR)
            .separator(OVERRIDE_SEPARATOR)
            .try_parsing(true)
            .source(self.overrides.clone());
        builder = builder.add_source(overrides);

        let mut config: CompanionConfig = builder.build()?.try_deserialize()?;
        config.environment = self.environment.clone();
        config.validate()?;

        info!(
            environment = %config.environment,
            files = ?applied_files,
            endpoint = %config.api.endpoint,
            storage = ?config.storage.backend,
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
