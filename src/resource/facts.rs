//! Facts assembly
//!
//! Raw text comes from a provider (a device or a literal string), goes
//! through the resource's parser table and is then normalised so that list
//! shaped fields are keyed maps the differ can match by key.

use super::node::{Node, NodeMap};
use super::Resource;
use crate::error::{Error, Result};
use tracing::debug;

/// Fetch configuration text from `provider` and build the fact tree
pub fn get_facts<R, F>(resource: &R, provider: F) -> Result<Node>
where
    R: Resource + ?Sized,
    F: FnOnce() -> Result<String>,
{
    let text = provider()?;
    parse_facts(resource, &text)
}

/// Build the fact tree from configuration text
pub fn parse_facts<R: Resource + ?Sized>(resource: &R, text: &str) -> Result<Node> {
    let tree = resource.table().parse(text);
    let facts = resource.normalize(tree)?.prune();
    debug!(
        resource = resource.name(),
        entries = facts.as_map().map_or(0, |m| m.len()),
        "assembled facts"
    );
    Ok(facts)
}

/// Key a list of entries by the values of `fields`.
///
/// The key is the present field values joined by `_`. A keyed map is
/// accepted as well; its entries are re-keyed the same way and, when the
/// first field is missing from an entry, it is filled from the map key.
/// An entry with no key fields at all is rejected.
pub fn list_to_dict(resource: &str, node: Option<Node>, fields: &[&str]) -> Result<NodeMap> {
    let mut out = NodeMap::new();
    let Some(node) = node else {
        return Ok(out);
    };

    let entries: Vec<(Option<String>, Node)> = match node {
        Node::List(items) => items.into_iter().map(|item| (None, item)).collect(),
        Node::Map(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        other => {
            return Err(Error::invalid_config(
                resource,
                format!("expected a list of entries keyed by '{}', got {:?}", fields.join("', '"), other),
            ))
        }
    };

    for (given, mut entry) in entries {
        if let (Some(given), Some(first)) = (given.as_ref(), fields.first()) {
            if entry.get(first).is_none() {
                entry.insert(*first, Node::Str(given.clone()));
            }
        }
        let key = entry_key(&entry, fields).or(given).ok_or_else(|| {
            Error::invalid_config(resource, format!("entry is missing key field '{}'", fields.join("', '")))
        })?;
        match out.get_mut(&key) {
            Some(existing) => existing.merge(entry),
            None => {
                out.insert(key, entry);
            }
        }
    }
    Ok(out)
}

/// Composite key of an entry, or `None` when no key field is present
pub fn entry_key(entry: &Node, fields: &[&str]) -> Option<String> {
    let parts: Vec<String> = fields.iter().filter_map(|f| entry.opt(f)).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("_"))
    }
}

/// Replace the list at `path` inside `node` with its keyed form
pub fn key_field(resource: &str, node: &mut Node, path: &str, fields: &[&str]) -> Result<()> {
    let Some(slot) = node.get_path_mut(path) else {
        return Ok(());
    };
    let keyed = list_to_dict(resource, Some(std::mem::take(slot)), fields)?;
    *slot = Node::Map(keyed);
    Ok(())
}

/// Apply `f` to every entry of the keyed map at `path`
pub fn for_each_entry<F>(node: &mut Node, path: &str, mut f: F) -> Result<()>
where
    F: FnMut(&mut Node) -> Result<()>,
{
    if let Some(map) = node.get_path_mut(path).and_then(Node::as_map_mut) {
        for entry in map.values_mut() {
            f(entry)?;
        }
    }
    Ok(())
}
