//! # Slidegen Configuration
//!
//! Worker pool sizes, generation timeouts and orchestration tuning, loaded in
//! layers so deployments only override what they need.
//!
//! ## Layers (lowest to highest precedence)
//!
//! - Built-in defaults ([`SlidegenConfig::default`])
//! - `config/slidegen.toml`
//! - `config/slidegen.{environment}.toml`
//! - Legacy `MAX_DESCRIPTION_WORKERS` / `MAX_IMAGE_WORKERS` variables
//! - `SLIDEGEN__SECTION__KEY` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use slidegen_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let image_workers = manager.config().generation.image.max_workers;
//! # let _ = image_workers;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::system;
use crate::models::GenerationKind;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidegenConfig {
    pub generation: GenerationConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

/// One bounded worker pool per generation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub description: PoolConfig,
    pub image: PoolConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            description: PoolConfig {
                max_workers: system::DEFAULT_DESCRIPTION_WORKERS,
                timeout_seconds: system::DEFAULT_DESCRIPTION_TIMEOUT_SECONDS,
            },
            image: PoolConfig {
                max_workers: system::DEFAULT_IMAGE_WORKERS,
                timeout_seconds: system::DEFAULT_IMAGE_TIMEOUT_SECONDS,
            },
        }
    }
}

impl GenerationConfig {
    pub fn pool(&self, kind: GenerationKind) -> &PoolConfig {
        match kind {
            GenerationKind::Description => &self.description,
            GenerationKind::Image => &self.image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum concurrent generation calls of this kind
    pub max_workers: usize,
    /// Per-call timeout enforced by the job runner
    pub timeout_seconds: u64,
}

impl PoolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub completion_buffer_size: usize,
    pub poll_interval_ms: u64,
    pub job_retention_seconds: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            completion_buffer_size: system::DEFAULT_COMPLETION_BUFFER_SIZE,
            poll_interval_ms: system::DEFAULT_POLL_INTERVAL_MS,
            job_retention_seconds: system::DEFAULT_JOB_RETENTION_SECONDS,
        }
    }
}

impl OrchestrationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            level: None,
        }
    }
}

impl SlidegenConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        for kind in GenerationKind::ALL {
            let pool = self.generation.pool(kind);
            if pool.max_workers == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("generation.{kind}.max_workers"),
                    "0",
                    "worker pool size must be greater than 0",
                ));
            }
            if pool.timeout_seconds == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("generation.{kind}.timeout_seconds"),
                    "0",
                    "generation timeout must be greater than 0",
                ));
            }
        }

        if self.orchestration.completion_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.completion_buffer_size",
                "0",
                "completion buffer must hold at least one message",
            ));
        }

        if self.orchestration.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.poll_interval_ms",
                "0",
                "poll interval must be greater than 0",
            ));
        }

        // Jobs must outlive at least one poll or callers never see the outcome
        if self.orchestration.job_retention().as_millis()
            < u128::from(self.orchestration.poll_interval_ms)
        {
            return Err(ConfigurationError::validation_error(format!(
                "orchestration.job_retention_seconds ({}s) is shorter than poll_interval_ms ({}ms)",
                self.orchestration.job_retention_seconds, self.orchestration.poll_interval_ms
            )));
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigurationError::invalid_value(
                "logging.format",
                other,
                "expected 'pretty' or 'json'",
            )),
        }
    }
}
