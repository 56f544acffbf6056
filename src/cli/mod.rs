//! CLI module for Choreo
//!
//! Argument parsing and subcommand dispatch for the `choreo` launcher.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Choreo - declarative orchestration core
#[derive(Parser, Debug, Clone)]
#[command(name = "choreo")]
#[command(version)]
#[command(about = "Drive playbooks through the Choreo orchestration core", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "CHOREO_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// One JSON object per line
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a playbook with the dry-run runner
    Run(commands::run::RunArgs),

    /// Print the resolved order of a role file
    Graph(commands::graph::GraphArgs),
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}
