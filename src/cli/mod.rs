//! CLI module for netrm
//!
//! This module provides the command-line interface for netrm,
//! including argument parsing and subcommand handling.

pub mod commands;

use clap::{Parser, Subcommand};
use netrm::config::OutputFormat;
use std::path::PathBuf;

/// netrm - network resource modules
///
/// Parse device configuration into structured facts and generate the
/// commands that reconcile it with a desired configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "netrm")]
#[command(version)]
#[command(about = "Declarative network resource reconciliation", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format (defaults to the configured one)
    #[arg(short = 'o', long, global = true, value_parser = parse_output)]
    pub output: Option<OutputFormat>,

    /// Path to configuration file
    #[arg(short = 'c', long = "config-file", global = true, env = "NETRM_CONFIG")]
    pub config: Option<PathBuf>,
}

fn parse_output(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse running configuration into facts
    Parse(commands::resource::ParseArgs),

    /// Render commands for a desired configuration without a device
    Render(commands::resource::RenderArgs),

    /// Generate the commands that reconcile a configuration under a state
    Generate(commands::resource::GenerateArgs),

    /// List the available resources
    List(commands::resource::ListArgs),

    /// Remove access control entries from ACL facts
    #[command(name = "pop-ace")]
    PopAce(commands::pop_ace::PopAceArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "netrm",
            "generate",
            "ios_interfaces",
            "--state",
            "replaced",
            "--config",
            "want.yml",
            "--running-config",
            "running.cfg",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.resource, "ios_interfaces");
                assert_eq!(args.state.as_deref(), Some("replaced"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["netrm", "-vvvv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_output_flag() {
        let cli = Cli::try_parse_from(["netrm", "-o", "yaml", "list"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Yaml));
        assert!(Cli::try_parse_from(["netrm", "-o", "xml", "list"]).is_err());
    }

    #[test]
    fn test_pop_ace_args() {
        let cli = Cli::try_parse_from([
            "netrm",
            "pop-ace",
            "--data",
            "acls.yml",
            "--criteria",
            "match.yml",
            "--remove",
            "all",
            "--match-all",
        ])
        .unwrap();
        match cli.command {
            Commands::PopAce(args) => {
                assert!(args.match_all);
                assert_eq!(args.remove, "all");
                assert_eq!(args.failed_when, "missing");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
