//! Configuration module for Choreo
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/choreo/choreo.toml)
//! - User configuration (~/.choreo.toml)
//! - Project configuration (./choreo.toml)
//! - An explicit `--config` path
//! - Environment variables (`CHOREO_*`)
//!
//! Later sources win, key by key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::executor::playbook::Strategy;
use crate::executor::ExecutorConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default execution settings
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Gather facts unless a play says otherwise
    pub gather_facts: bool,

    /// Strategy for plays that do not name one
    pub strategy: String,

    /// Per-task timeout (e.g. "30s", "5m")
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub task_timeout: Option<Duration>,

    /// Reject condition expressions that are not understood
    pub strict_conditions: bool,

    /// Only run tasks with these tags
    pub tags: Vec<String>,

    /// Skip tasks with these tags
    pub skip_tags: Vec<String>,

    /// Ask the runner not to make changes
    pub check_mode: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            gather_facts: true,
            strategy: "linear".to_string(),
            task_timeout: None,
            strict_conditions: true,
            tags: Vec::new(),
            skip_tags: Vec::new(),
            check_mode: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level when neither `-v` nor `RUST_LOG` is given
    pub level: String,

    /// Output format: "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

/// A partially specified configuration file; only present keys override.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    #[serde(default)]
    defaults: toml::Table,
    #[serde(default)]
    logging: toml::Table,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest priority first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/choreo/choreo.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".choreo.toml"));
        }

        paths.push(PathBuf::from("choreo.toml"));

        if let Some(path) = explicit_path {
            paths.push(path.clone());
        }

        paths
    }

    /// Layer the keys present in a file over this configuration
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        self.merge_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn merge_str(&self, content: &str) -> Result<Self> {
        let layer: ConfigLayer = toml::from_str(content)?;

        let mut base = toml::Value::try_from(self)?;
        if let toml::Value::Table(root) = &mut base {
            for (section, overrides) in [("defaults", layer.defaults), ("logging", layer.logging)] {
                if let Some(toml::Value::Table(table)) = root.get_mut(section) {
                    table.extend(overrides);
                }
            }
        }

        Ok(base.try_into()?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // CHOREO_GATHER_FACTS
        if let Ok(value) = std::env::var("CHOREO_GATHER_FACTS") {
            if let Some(b) = parse_bool(&value) {
                self.defaults.gather_facts = b;
            }
        }

        // CHOREO_STRATEGY
        if let Ok(strategy) = std::env::var("CHOREO_STRATEGY") {
            self.defaults.strategy = strategy;
        }

        // CHOREO_TASK_TIMEOUT
        if let Ok(timeout) = std::env::var("CHOREO_TASK_TIMEOUT") {
            if let Ok(d) = humantime_serde::re::humantime::parse_duration(&timeout) {
                self.defaults.task_timeout = Some(d);
            }
        }

        // CHOREO_STRICT_CONDITIONS
        if let Ok(value) = std::env::var("CHOREO_STRICT_CONDITIONS") {
            if let Some(b) = parse_bool(&value) {
                self.defaults.strict_conditions = b;
            }
        }

        // CHOREO_LOG_FORMAT
        if let Ok(format) = std::env::var("CHOREO_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Executor settings derived from this configuration
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            gather_facts: self.defaults.gather_facts,
            strategy: Strategy::from(self.defaults.strategy.clone()),
            task_timeout: self.defaults.task_timeout,
            check_mode: self.defaults.check_mode,
            strict_conditions: self.defaults.strict_conditions,
            tags: self.defaults.tags.clone(),
            skip_tags: self.defaults.skip_tags.clone(),
        }
    }

    /// Load from a specific file only
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.defaults.gather_facts);
        assert!(config.defaults.strict_conditions);
        assert_eq!(config.defaults.strategy, "linear");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_merge_keeps_unset_keys() {
        let base = Config::default()
            .merge_str("[defaults]\ngather_facts = false\ntask_timeout = \"30s\"\n")
            .unwrap();
        assert!(!base.defaults.gather_facts);
        assert_eq!(base.defaults.task_timeout, Some(Duration::from_secs(30)));

        let merged = base
            .merge_str("[defaults]\ntags = [\"web\"]\n[logging]\nformat = \"json\"\n")
            .unwrap();
        assert!(!merged.defaults.gather_facts);
        assert_eq!(merged.defaults.tags, vec!["web".to_string()]);
        assert_eq!(merged.logging.format, "json");
        assert_eq!(merged.logging.level, "warn");
    }

    #[test]
    fn test_from_file_and_executor_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\nstrategy = \"free\"\nskip_tags = [\"slow\"]").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let executor = config.executor_config();
        assert_eq!(executor.strategy, Strategy::Other("free".to_string()));
        assert_eq!(executor.skip_tags, vec!["slow".to_string()]);
        assert!(executor.gather_facts);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ngather_facts = \"sometimes\"").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config file"));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides() {
        std::env::set_var("CHOREO_STRATEGY", "free");
        std::env::set_var("CHOREO_TASK_TIMEOUT", "2m");
        std::env::set_var("CHOREO_GATHER_FACTS", "no");

        let mut config = Config::default();
        config.apply_env_overrides();

        std::env::remove_var("CHOREO_STRATEGY");
        std::env::remove_var("CHOREO_TASK_TIMEOUT");
        std::env::remove_var("CHOREO_GATHER_FACTS");

        assert_eq!(config.defaults.strategy, "free");
        assert_eq!(config.defaults.task_timeout, Some(Duration::from_secs(120)));
        assert!(!config.defaults.gather_facts);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
