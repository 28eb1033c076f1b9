use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use validator::{Validate, ValidationError};

use crate::application::services::retry_policy::RetryPolicy;
use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};
use crate::domain::value_objects::command::{timeout_from_secs, MAX_TIMEOUT_SECS};

pub const DEFAULT_NEXUS_URL: &str =
    "https://nexus.jackpinetech.com/nexus/service/local/artifact/maven/redirect";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Toolkit settings read from `conf/config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct KitConfig {
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    #[validate(nested)]
    pub commands: CommandSettings,

    #[validate(nested)]
    pub retry: RetrySettings,

    #[validate(nested)]
    pub nexus: NexusSettings,

    #[validate(nested)]
    pub slack: SlackSettings,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            commands: CommandSettings::default(),
            retry: RetrySettings::default(),
            nexus: NexusSettings::default(),
            slack: SlackSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CommandSettings {
    #[validate(custom(function = "validate_seconds"))]
    pub default_timeout_secs: f64,

    #[validate(custom(function = "validate_seconds"))]
    pub remote_timeout_secs: f64,

    #[validate(custom(function = "validate_seconds"))]
    pub service_timeout_secs: f64,

    #[validate(custom(function = "validate_seconds"))]
    pub service_pause_secs: f64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3600.0,
            remote_timeout_secs: 5.0,
            service_timeout_secs: 30.0,
            service_pause_secs: 3.0,
        }
    }
}

// Values that skipped validation fall back to the default for that field.
impl CommandSettings {
    pub fn default_timeout(&self) -> Duration {
        seconds_or(self.default_timeout_secs, 3600.0)
    }

    pub fn remote_timeout(&self) -> Duration {
        seconds_or(self.remote_timeout_secs, 5.0)
    }

    pub fn service_timeout(&self) -> Duration {
        seconds_or(self.service_timeout_secs, 30.0)
    }

    pub fn service_pause(&self) -> Duration {
        seconds_or(self.service_pause_secs, 3.0)
    }
}

fn seconds_or(seconds: f64, fallback: f64) -> Duration {
    timeout_from_secs("seconds", seconds)
        .unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetrySettings {
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    #[validate(range(max = 600))]
    pub delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 5,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NexusSettings {
    #[validate(url)]
    pub base_url: String,

    #[validate(nested)]
    pub retry: RetrySettings,
}

impl Default for NexusSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NEXUS_URL.to_string(),
            retry: RetrySettings {
                max_attempts: 6,
                delay_secs: 10,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SlackSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub webhook_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub icon_url: Option<String>,
}

fn validate_seconds(seconds: f64) -> Result<(), ValidationError> {
    if seconds.is_finite() && (0.0..=MAX_TIMEOUT_SECS).contains(&seconds) {
        Ok(())
    } else {
        Err(ValidationError::new("seconds_out_of_range"))
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_log_level"))
    }
}

/// Reads and writes [`KitConfig`] YAML files.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Loads and validates the config file, or returns defaults if it is absent.
    pub fn load(&self, path: &Path) -> Cons3rtResult<KitConfig> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(KitConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_filesystem_error("Unable to read config file", Some(path.to_path_buf()))?;
        let config = self.parse(&content).map_err(|e| match e {
            Cons3rtError::ConfigError { message, source } => Cons3rtError::ConfigError {
                message: format!("{} ({})", message, path.display()),
                source,
            },
            other => other,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(&self, content: &str) -> Cons3rtResult<KitConfig> {
        let config: KitConfig = if content.trim().is_empty() {
            KitConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| Cons3rtError::config_error_with_source("Invalid config YAML", e))?
        };
        config
            .validate()
            .map_err(|e| Cons3rtError::config_error_with_source("Invalid configuration", e))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path, config: &KitConfig) -> Cons3rtResult<()> {
        config
            .validate()
            .map_err(|e| Cons3rtError::config_error_with_source("Refusing to save invalid configuration", e))?;
        let yaml = serde_yaml::to_string(config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_filesystem_error("Unable to create config directory", Some(parent.to_path_buf()))?;
        }
        fs::write(path, yaml).with_filesystem_error("Unable to write config file", Some(path.to_path_buf()))
    }
}
