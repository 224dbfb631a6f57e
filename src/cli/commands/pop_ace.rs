//! pop-ace command
//!
//! Runs the `pop_ace` filter over ACL facts read from a file.

use super::{load_structured, CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;
use netrm::plugins::filter::pop_ace_value;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the pop-ace command
#[derive(Parser, Debug, Clone)]
pub struct PopAceArgs {
    /// ACL facts (YAML or JSON)
    #[arg(long)]
    pub data: PathBuf,

    /// Match criteria, one mapping or a list of them (YAML or JSON)
    #[arg(long)]
    pub criteria: PathBuf,

    /// Remove the first match per ACL or every match
    #[arg(long, default_value = "first", value_parser = ["first", "all"])]
    pub remove: String,

    /// Require every criterion to match
    #[arg(long)]
    pub match_all: bool,

    /// Fail when nothing was removed (`missing`) or never
    #[arg(long, default_value = "missing", value_parser = ["missing", "never"])]
    pub failed_when: String,
}

impl Runnable for PopAceArgs {
    fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        let data = load_structured(&self.data)?;
        let criteria = load_structured(&self.criteria)?;
        let options = json!({
            "remove": self.remove,
            "failed_when": self.failed_when,
            "match_all": self.match_all,
        });
        let result = pop_ace_value(&data, Some(&options), &criteria)?;
        ctx.emit(&result.to_json())?;
        Ok(0)
    }
}
