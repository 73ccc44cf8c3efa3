//! Harness Configuration (abicheck.toml)
//!
//! ```toml
//! [harness]
//! arg_buffer_size = 32768
//! max_args = 16
//!
//! [logging]
//! level = "warn"
//! json = false
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default call-engine argument capacity in bytes
pub const DEFAULT_ARG_BUFFER_SIZE: usize = 32_768;

/// Default value-table bound
pub const DEFAULT_MAX_ARGS: usize = 16;

/// Largest accepted value-table bound
pub const MAX_ARGS_LIMIT: usize = 255;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Accepted log levels
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration from abicheck.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Call engine and value table settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harness: Option<EngineConfig>,

    /// Logging settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// `[harness]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Argument capacity of the call engine in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_buffer_size: Option<usize>,

    /// Highest argument position the value tables cover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_args: Option<usize>,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Emit log events as JSON lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

impl HarnessConfig {
    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(engine) = &self.harness {
            if engine.arg_buffer_size == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "harness.arg_buffer_size".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }

            if let Some(max_args) = engine.max_args {
                if !(1..=MAX_ARGS_LIMIT).contains(&max_args) {
                    return Err(ConfigError::InvalidValue {
                        field: "harness.max_args".to_string(),
                        reason: format!("{} is outside 1..={}", max_args, MAX_ARGS_LIMIT),
                    });
                }
            }
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if !is_valid_level(level) {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    reason: format!("unknown level '{}'", level),
                });
            }
        }

        Ok(())
    }

    /// Effective argument capacity
    pub fn arg_buffer_size(&self) -> usize {
        self.harness
            .as_ref()
            .and_then(|h| h.arg_buffer_size)
            .unwrap_or(DEFAULT_ARG_BUFFER_SIZE)
    }

    /// Effective value-table bound
    pub fn max_args(&self) -> usize {
        self.harness
            .as_ref()
            .and_then(|h| h.max_args)
            .unwrap_or(DEFAULT_MAX_ARGS)
    }

    /// Configured log level, if any
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// Merge another config into this one
    /// Other config takes precedence for values it sets
    pub fn merge(&mut self, other: &HarnessConfig) {
        if let Some(theirs) = &other.harness {
            let ours = self.harness.get_or_insert_with(Default::default);
            if theirs.arg_buffer_size.is_some() {
                ours.arg_buffer_size = theirs.arg_buffer_size;
            }
            if theirs.max_args.is_some() {
                ours.max_args = theirs.max_args;
            }
        }
        if let Some(theirs) = &other.logging {
            let ours = self.logging.get_or_insert_with(Default::default);
            if theirs.level.is_some() {
                ours.level = theirs.level.clone();
            }
            if theirs.json.is_some() {
                ours.json = theirs.json;
            }
        }
    }
}

/// Check if a log level name is accepted
pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}
