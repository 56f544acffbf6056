//! Choreo - declarative orchestration core
//!
//! This is the main entry point for the `choreo` launcher.

mod cli;

use anyhow::Result;
use choreo::config::Config;
use cli::commands::CommandContext;
use cli::{Cli, Commands, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {:#}", e);
        Config::default()
    });

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.logging.format.eq_ignore_ascii_case("json"),
    };
    init_logging(cli.verbosity(), &config.logging.level, json);

    let mut ctx = CommandContext::new(config, cli.verbosity());

    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await?,
        Commands::Graph(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, base_level: &str, json: bool) {
    let filter = match verbosity {
        0 => base_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(verbosity >= 3))
            .init();
    }
}
