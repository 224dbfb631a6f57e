//! Resource engine
//!
//! A network resource turns device configuration text into a fact tree,
//! compares it with a desired tree and produces the commands that
//! reconcile the two. Every resource shares the same pieces:
//!
//! - [`template`]: ordered parser tables and command rendering
//! - [`compare`]: the structural differ
//! - [`facts`]: facts assembly and list keying
//! - [`ranges`]: VLAN/instance range strings
//!
//! and implements [`Resource`] to declare its rules and comparators.

pub mod compare;
pub mod facts;
pub mod node;
pub mod ranges;
pub mod state;
pub mod template;

pub use compare::{Changes, Differ};
pub use node::{Node, NodeMap, Obj};
pub use state::State;
pub use template::{Match, ParserTable, Rule};

use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

/// A configuration domain managed as a whole
pub trait Resource: Send + Sync {
    /// Resource name (`ios_interfaces`)
    fn name(&self) -> &'static str;

    /// Parser table used for facts and rendering
    fn table(&self) -> &'static ParserTable;

    /// Bring a parsed or supplied tree into keyed form
    fn normalize(&self, tree: Node) -> Result<Node>;

    /// Normalise desired configuration. Defaults and deprecated field
    /// rewrites belong here; they never run on facts.
    fn normalize_want(&self, want: Node) -> Result<Node> {
        self.normalize(want)
    }

    /// Whether `purged` removes whole blocks for this resource
    fn supports_purged(&self) -> bool {
        false
    }

    /// Business-rule checks against the current facts
    fn validate(&self, _want: &Node, _have: &Node, _state: State) -> Result<()> {
        Ok(())
    }

    /// Commands that move `have` to `want` under `state`
    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes>;
}

/// Outcome of one resource run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gathered: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Vec<String>>,
    pub changed: bool,
}

impl RunResult {
    /// Commands produced by the run, rendered ones included
    pub fn command_list(&self) -> &[String] {
        self.commands
            .as_deref()
            .or(self.rendered.as_deref())
            .unwrap_or(&[])
    }
}

/// Desired configuration converted from caller input
pub fn want_from_json<R: Resource + ?Sized>(resource: &R, config: Option<&serde_json::Value>) -> Result<Node> {
    let tree = config.and_then(Node::from_json).unwrap_or_default();
    resource.normalize_want(tree).map(Node::prune)
}

/// Run `resource` under `state`.
///
/// `provider` is only called for states that need device facts.
/// `running_config` is the text parsed under `parsed`.
pub fn run<R, F>(
    resource: &R,
    state: State,
    config: Option<&serde_json::Value>,
    running_config: Option<&str>,
    provider: F,
) -> Result<RunResult>
where
    R: Resource + ?Sized,
    F: FnOnce() -> Result<String>,
{
    let missing = |param: &str| Error::MissingParameter {
        resource: resource.name().to_string(),
        param: param.to_string(),
        state: state.to_string(),
    };

    if state.requires_config() && config.map_or(true, serde_json::Value::is_null) {
        return Err(missing("config"));
    }

    if state == State::Purged && !resource.supports_purged() {
        return Err(Error::invalid_config(
            resource.name(),
            "state 'purged' is not supported",
        ));
    }

    let mut result = RunResult::default();
    match state {
        State::Parsed => {
            let text = running_config.ok_or_else(|| missing("running_config"))?;
            result.parsed = Some(facts::parse_facts(resource, text)?);
        }
        State::Gathered => {
            result.gathered = Some(facts::get_facts(resource, provider)?);
        }
        State::Rendered => {
            let want = want_from_json(resource, config)?;
            let have = Node::map();
            resource.validate(&want, &have, state)?;
            let changes = resource.generate_commands(&want, &have, state)?;
            result.warnings = changes.warnings;
            result.rendered = Some(changes.commands);
        }
        _ => {
            let want = want_from_json(resource, config)?;
            let have = facts::get_facts(resource, provider)?;
            resource.validate(&want, &have, state)?;
            let changes = resource.generate_commands(&want, &have, state)?;
            info!(
                resource = resource.name(),
                state = %state,
                commands = changes.commands.len(),
                "reconciled"
            );
            result.changed = !changes.commands.is_empty();
            result.warnings = changes.warnings;
            result.commands = Some(changes.commands);
            result.before = Some(have);
        }
    }
    debug!(resource = resource.name(), state = %state, changed = result.changed, "run complete");
    Ok(result)
}
