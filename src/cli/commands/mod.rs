//! Subcommands module for netrm CLI
//!
//! This module contains all the subcommand implementations.

pub mod pop_ace;
pub mod resource;

use anyhow::{Context, Result};
use netrm::config::{Config, OutputFormat};
use std::io::Write;
use std::path::Path;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Effective output format
    pub output: OutputFormat,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = cli.output.unwrap_or(config.defaults.output);
        Self {
            config,
            output,
            verbosity: cli.verbosity(),
        }
    }

    /// Write a result to stdout in the configured format
    pub fn emit(&self, value: &serde_json::Value) -> Result<()> {
        let rendered = match self.output {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", rendered.trim_end())?;
        Ok(())
    }
}

/// Trait for runnable commands
pub trait Runnable {
    /// Execute the command, returning the process exit code
    fn run(&self, ctx: &mut CommandContext) -> Result<i32>;
}

/// Read a YAML or JSON document; the format follows the file extension
pub fn load_structured(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?,
    };
    Ok(value)
}

/// Read configuration text
pub fn load_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
