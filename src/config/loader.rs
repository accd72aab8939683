//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate: defaults, a base
//! TOML file, an environment TOML file, then environment variables.

use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::SlidegenConfig;

const BASE_FILE_STEM: &str = "slidegen";
const ENV_PREFIX: &str = "SLIDEGEN";
const ENV_SEPARATOR: &str = "__";

/// Pre-layering variables honored for pool sizes
const LEGACY_WORKER_VARS: &[(&str, &str, &str)] = &[
    (
        "MAX_DESCRIPTION_WORKERS",
        "SLIDEGEN__GENERATION__DESCRIPTION__MAX_WORKERS",
        "generation.description.max_workers",
    ),
    (
        "MAX_IMAGE_WORKERS",
        "SLIDEGEN__GENERATION__IMAGE__MAX_WORKERS",
        "generation.image.max_workers",
    ),
];

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: SlidegenConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_vars(config_dir, environment, env::vars().collect())
    }

    /// Load with an explicit variable set instead of the process environment
    pub fn load_with_vars(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment, vars)?;
        config.validate()?;

        info!(
            environment = environment,
            description_workers = config.generation.description.max_workers,
            image_workers = config.generation.image.max_workers,
            "⚙️ CONFIG: Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SlidegenConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    pub fn detect_environment() -> String {
        env::var("SLIDEGEN_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        vars: HashMap<String, String>,
    ) -> ConfigResult<SlidegenConfig> {
        let load_error =
            |error: config::ConfigError| ConfigurationError::load_error(environment, error);

        let defaults = Config::try_from(&SlidegenConfig::default()).map_err(load_error)?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(config_directory.join(format!("{BASE_FILE_STEM}.toml")))
                    .required(false),
            )
            .add_source(
                File::from(config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml")))
                    .required(false),
            );

        for (legacy, prefixed, key) in LEGACY_WORKER_VARS {
            if vars.contains_key(*prefixed) {
                continue;
            }
            if let Some(raw) = vars.get(*legacy) {
                let workers: i64 = raw.trim().parse().map_err(|_| {
                    ConfigurationError::invalid_value(*legacy, raw.as_str(), "expected an integer")
                })?;
                debug!("Applying legacy worker override {}={}", legacy, workers);
                builder = builder.set_override(*key, workers).map_err(load_error)?;
            }
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .build()
            .and_then(|config| config.try_deserialize::<SlidegenConfig>())
            .map_err(load_error)
    }
}
