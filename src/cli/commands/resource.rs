//! Resource commands: parse, render, generate, list
//!
//! Every command goes through the module registry with a device built from
//! the given running configuration, so the CLI sees exactly what a module
//! caller sees. Nothing is ever sent: commands are run in check mode.

use super::{load_structured, load_text, CommandContext, Runnable};
use anyhow::{anyhow, Result};
use clap::Parser;
use netrm::modules::network::{network_module_names, StaticConfigDevice};
use netrm::modules::{ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Arguments for the parse command
#[derive(Parser, Debug, Clone)]
pub struct ParseArgs {
    /// Resource name (see `netrm list`)
    pub resource: String,

    /// Running configuration file
    #[arg(long, short = 'r')]
    pub running_config: PathBuf,
}

/// Arguments for the render command
#[derive(Parser, Debug, Clone)]
pub struct RenderArgs {
    /// Resource name (see `netrm list`)
    pub resource: String,

    /// Desired configuration (YAML or JSON)
    #[arg(long)]
    pub config: PathBuf,
}

/// Arguments for the generate command
#[derive(Parser, Debug, Clone)]
pub struct GenerateArgs {
    /// Resource name (see `netrm list`)
    pub resource: String,

    /// State mode (defaults to the configured one)
    #[arg(long, short = 's')]
    pub state: Option<String>,

    /// Desired configuration (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Running configuration file
    #[arg(long, short = 'r')]
    pub running_config: PathBuf,
}

/// Arguments for the list command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {}

fn execute(resource: &str, params: ModuleParams, running_config: Option<String>) -> Result<ModuleOutput> {
    let registry = ModuleRegistry::with_builtins();
    if !registry.contains(resource) {
        return Err(anyhow!(
            "Unknown resource '{}'. Available: {}",
            resource,
            registry.names().join(", ")
        ));
    }

    let mut context = ModuleContext::new().with_check_mode(true);
    if let Some(text) = running_config {
        context = context.with_device(Arc::new(StaticConfigDevice::new("running-config", text)));
    }

    debug!(resource, "executing resource module");
    Ok(registry.execute(resource, &params, &context)?)
}

fn params(state: &str, config: Option<Value>, running_config: Option<&str>) -> ModuleParams {
    let mut params = ModuleParams::new();
    params.insert("state".to_string(), json!(state));
    if let Some(config) = config {
        params.insert("config".to_string(), config);
    }
    if let Some(text) = running_config {
        params.insert("running_config".to_string(), json!(text));
    }
    params
}

/// Result payload: the output data plus `changed`
fn payload(output: ModuleOutput) -> Value {
    let mut map: serde_json::Map<String, Value> = output.data.into_iter().collect();
    map.insert("changed".to_string(), json!(output.changed));
    Value::Object(map)
}

impl Runnable for ParseArgs {
    fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        let text = load_text(&self.running_config)?;
        let output = execute(&self.resource, params("parsed", None, Some(&text)), None)?;
        ctx.emit(&payload(output))?;
        Ok(0)
    }
}

impl Runnable for RenderArgs {
    fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        let config = load_structured(&self.config)?;
        let output = execute(&self.resource, params("rendered", Some(config), None), None)?;
        ctx.emit(&payload(output))?;
        Ok(0)
    }
}

impl Runnable for GenerateArgs {
    fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        let state = self
            .state
            .clone()
            .unwrap_or_else(|| ctx.config.defaults.state.to_string());
        let config = self.config.as_deref().map(load_structured).transpose()?;
        let text = load_text(&self.running_config)?;
        let output = execute(&self.resource, params(&state, config, None), Some(text))?;
        ctx.emit(&payload(output))?;
        Ok(0)
    }
}

impl Runnable for ListArgs {
    fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.emit(&json!(network_module_names()))?;
        Ok(0)
    }
}
