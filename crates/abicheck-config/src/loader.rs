//! Configuration Loader
//!
//! Finds abicheck.toml and applies environment overrides on top of it.

use crate::harness::{EngineConfig, HarnessConfig, LoggingConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration file name looked up in each directory
pub const CONFIG_FILE_NAME: &str = "abicheck.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. abicheck.toml
/// 3. Environment variables (ABICHECK_*)
/// 4. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    skip_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Settings after environment overrides
    pub harness: HarnessConfig,

    /// The file the settings came from, if one was found
    pub source: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore ABICHECK_* environment variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find abicheck.toml. A missing file is
    /// not an error; defaults are used instead.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (source, file_config) = self.find_config(start_dir)?;
        let harness = self.apply_env_overrides(file_config)?;
        Ok(Config { harness, source })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let file_config = HarnessConfig::load_from_file(config_path)?;
        let harness = self.apply_env_overrides(file_config)?;
        Ok(Config {
            harness,
            source: Some(config_path.to_path_buf()),
        })
    }

    fn find_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, HarnessConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = HarnessConfig::load_from_file(&config_path)?;
                return Ok((Some(config_path), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, HarnessConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables follow the pattern: ABICHECK_<KEY>
    /// Example: ABICHECK_MAX_ARGS=24
    fn apply_env_overrides(&self, mut config: HarnessConfig) -> ConfigResult<HarnessConfig> {
        if self.skip_env {
            return Ok(config);
        }

        if let Ok(size) = env::var("ABICHECK_ARG_BUFFER_SIZE") {
            let size = parse_usize("ABICHECK_ARG_BUFFER_SIZE", &size)?;
            config
                .harness
                .get_or_insert_with(EngineConfig::default)
                .arg_buffer_size = Some(size);
        }

        if let Ok(max_args) = env::var("ABICHECK_MAX_ARGS") {
            let max_args = parse_usize("ABICHECK_MAX_ARGS", &max_args)?;
            config
                .harness
                .get_or_insert_with(EngineConfig::default)
                .max_args = Some(max_args);
        }

        if let Ok(level) = env::var("ABICHECK_LOG_LEVEL") {
            config
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .level = Some(level.to_ascii_lowercase());
        }

        if let Ok(json) = env::var("ABICHECK_LOG_JSON") {
            let json = matches!(json.to_lowercase().as_str(), "true" | "1" | "yes");
            config
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .json = Some(json);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_usize(field: &str, value: &str) -> ConfigResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a non-negative integer", value),
        })
}

impl Config {
    pub fn arg_buffer_size(&self) -> usize {
        self.harness.arg_buffer_size()
    }

    pub fn max_args(&self) -> usize {
        self.harness.max_args()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.harness.log_level()
    }

    pub fn log_json(&self) -> bool {
        self.harness.log_json()
    }

    /// Path of the file the settings came from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config_file(temp_dir.path(), "[harness]\nmax_args = 9\n");
        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .load_from_directory(&sub_dir)
            .unwrap();

        assert_eq!(config.max_args(), 9);
        assert_eq!(config.source(), Some(config_path.as_path()));
    }

    #[test]
    #[serial]
    fn test_env_override_max_args() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[harness]\nmax_args = 9\n");

        env::set_var("ABICHECK_MAX_ARGS", "30");
        let config = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("ABICHECK_MAX_ARGS");

        assert_eq!(config.unwrap().max_args(), 30);
    }

    #[test]
    #[serial]
    fn test_env_override_must_parse() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("ABICHECK_ARG_BUFFER_SIZE", "lots");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("ABICHECK_ARG_BUFFER_SIZE");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "ABICHECK_ARG_BUFFER_SIZE"
        ));
    }

    #[test]
    #[serial]
    fn test_env_override_is_validated() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("ABICHECK_LOG_LEVEL", "chatty");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("ABICHECK_LOG_LEVEL");

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join(CONFIG_FILE_NAME);

        let result = ConfigLoader::new().without_env().load_from_file(&missing);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
