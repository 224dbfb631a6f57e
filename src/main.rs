//! netrm - network resource modules
//!
//! This is the main entry point for the netrm CLI.

mod cli;

use anyhow::Result;
use cli::commands::{CommandContext, Runnable};
use cli::{Cli, Commands};
use netrm::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {:#}", e);
        Config::default()
    });

    // Initialize logging based on verbosity and configuration
    init_logging(cli.verbosity(), &config.logging);

    if cli.verbosity() >= 2 {
        eprintln!("netrm v{}", VERSION);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Parse(args) => args.run(&mut ctx)?,
        Commands::Render(args) => args.run(&mut ctx)?,
        Commands::Generate(args) => args.run(&mut ctx)?,
        Commands::List(args) => args.run(&mut ctx)?,
        Commands::PopAce(args) => args.run(&mut ctx)?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging; `-v` flags take precedence over the configured level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
