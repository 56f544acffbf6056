//! Subcommands module for Choreo CLI

pub mod graph;
pub mod run;

use anyhow::{Context, Result};
use choreo::config::Config;
use choreo::vars::Vars;
use serde_json::Value as JsonValue;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context
    pub fn new(config: Config, verbosity: u8) -> Self {
        Self { config, verbosity }
    }
}

/// Parse `key=value` and `@file.yml` extra vars; later entries win.
pub fn parse_extra_vars(raw: &[String]) -> Result<Vars> {
    let mut vars = Vars::new();

    for var in raw {
        if let Some(file_path) = var.strip_prefix('@') {
            let content = std::fs::read_to_string(file_path)
                .with_context(|| format!("Failed to read extra vars file: {}", file_path))?;
            let file_vars: Vars = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid extra vars file: {}", file_path))?;
            vars.extend(file_vars);
        } else if let Some((key, value)) = var.split_once('=') {
            let parsed: JsonValue = serde_yaml::from_str(value)
                .unwrap_or_else(|_| JsonValue::String(value.to_string()));
            vars.insert(key.trim().to_string(), parsed);
        } else {
            anyhow::bail!("Extra var '{}' is not key=value or @file", var);
        }
    }

    Ok(vars)
}
