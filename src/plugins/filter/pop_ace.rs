//! ACE removal filter.
//!
//! `pop_ace` takes ACL facts (a list of `{afi, acls: [{name, aces}]}`) and
//! removes the access control entries that match a set of criteria.
//!
//! # Options
//!
//! - `remove`: `first` (default) removes at most one ACE per ACL, the one with
//!   the lowest sequence; `all` removes every match
//! - `failed_when`: `missing` (default) fails when nothing was removed;
//!   `never` returns the data untouched
//! - `match_all`: when true every given criterion must hold, otherwise any
//!   one is enough (default false)
//!
//! # Criteria
//!
//! `afi`, `acl_name`, `source`, `destination`, `sequence`, `protocol`,
//! `grant`. Source and destination match `any`, a host or an address.
//!
//! # Examples
//!
//! ```jinja2
//! {{ acls | pop_ace(filter_options={'match_all': true}, match_criteria={'acl_name': '101', 'grant': 'deny'}) }}
//! ```

use crate::error::{Error, Result};
use minijinja::value::Kwargs;
use minijinja::{Environment, ErrorKind, Value};
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use tracing::debug;

const PLUGIN: &str = "pop_ace";

/// Register the filter with the given environment.
pub fn register_filters(env: &mut Environment<'static>) {
    env.add_filter("pop_ace", pop_ace_filter);
}

/// Which matches are removed from an ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remove {
    #[default]
    First,
    All,
}

/// When an empty result is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedWhen {
    #[default]
    Missing,
    Never,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterOptions {
    pub remove: Remove,
    pub failed_when: FailedWhen,
    pub match_all: bool,
}

/// One set of match criteria; absent fields are not checked
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchCriteria {
    pub afi: Option<String>,
    pub acl_name: Option<Json>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub sequence: Option<Json>,
    pub protocol: Option<String>,
    pub grant: Option<String>,
}

/// Entries left after removal and the entries that were removed
#[derive(Debug, Clone, PartialEq)]
pub struct PopAce {
    pub clean_acls: Json,
    pub removed_aces: Json,
}

impl PopAce {
    pub fn to_json(&self) -> Json {
        json!({"clean_acls": self.clean_acls, "removed_aces": self.removed_aces})
    }
}

fn filter_error(message: impl Into<String>) -> Error {
    Error::Filter {
        plugin: PLUGIN.to_string(),
        message: message.into(),
    }
}

fn scalar(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether an endpoint map (`{any}`, `{host}`, `{address, wildcard_bits}`)
/// matches `wanted`
fn endpoint_matches(endpoint: Option<&Json>, wanted: &str) -> bool {
    let Some(endpoint) = endpoint else {
        return false;
    };
    if wanted == "any" {
        return endpoint.get("any").and_then(Json::as_bool).unwrap_or(false);
    }
    ["host", "address"]
        .iter()
        .filter_map(|k| endpoint.get(*k).and_then(scalar))
        .any(|v| v == wanted)
}

impl MatchCriteria {
    fn is_empty(&self) -> bool {
        self.afi.is_none()
            && self.acl_name.is_none()
            && self.source.is_none()
            && self.destination.is_none()
            && self.sequence.is_none()
            && self.protocol.is_none()
            && self.grant.is_none()
    }

    fn matches(&self, afi: &str, acl_name: &str, ace: &Json, match_all: bool) -> bool {
        if self.is_empty() {
            return false;
        }
        let field = |key: &str| ace.get(key).and_then(scalar);
        let checks = [
            self.afi.as_ref().map(|w| w == afi),
            self.acl_name.as_ref().and_then(scalar).map(|w| w == acl_name),
            self.source
                .as_ref()
                .map(|w| endpoint_matches(ace.get("source"), w)),
            self.destination
                .as_ref()
                .map(|w| endpoint_matches(ace.get("destination"), w)),
            self.sequence
                .as_ref()
                .and_then(scalar)
                .map(|w| field("sequence").as_deref() == Some(w.as_str())),
            self.protocol
                .as_ref()
                .map(|w| field("protocol").as_deref() == Some(w.as_str())),
            self.grant
                .as_ref()
                .map(|w| field("grant").as_deref() == Some(w.as_str())),
        ];
        let mut given = checks.iter().flatten();
        if match_all {
            given.all(|ok| *ok)
        } else {
            given.any(|ok| *ok)
        }
    }
}

fn as_list(value: Json) -> Vec<Json> {
    match value {
        Json::Array(items) => items,
        Json::Null => Vec::new(),
        other => vec![other],
    }
}

fn sequence_of(ace: &Json) -> i64 {
    ace.get("sequence")
        .and_then(|s| s.as_i64().or_else(|| s.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(i64::MAX)
}

/// Remove the ACEs of `data` that match `criteria`.
pub fn pop_ace(data: &Json, options: &FilterOptions, criteria: &[MatchCriteria]) -> Result<PopAce> {
    let families = match data.get("acls") {
        Some(_) if data.get("afi").is_none() => as_list(data["acls"].clone()),
        _ => as_list(data.clone()),
    };

    let mut clean = Vec::new();
    let mut removed = Vec::new();
    let mut removed_count = 0usize;

    for family in families {
        let afi = family.get("afi").and_then(scalar).unwrap_or_default();
        let acls = as_list(family.get("acls").cloned().unwrap_or(Json::Null));
        let mut clean_acls = Vec::new();
        let mut removed_acls = Vec::new();

        for mut acl in acls {
            let name = acl.get("name").and_then(scalar).unwrap_or_default();
            let aces = as_list(acl.get("aces").cloned().unwrap_or(Json::Null));

            let mut order: Vec<usize> = (0..aces.len()).collect();
            order.sort_by_key(|&i| sequence_of(&aces[i]));

            let mut hits = Vec::new();
            for i in order {
                if criteria
                    .iter()
                    .any(|c| c.matches(&afi, &name, &aces[i], options.match_all))
                {
                    hits.push(i);
                    if options.remove == Remove::First {
                        break;
                    }
                }
            }

            if hits.is_empty() {
                clean_acls.push(acl);
                continue;
            }

            let (gone, kept): (Vec<_>, Vec<_>) = aces
                .into_iter()
                .enumerate()
                .partition(|(i, _)| hits.contains(i));
            let gone: Vec<Json> = gone.into_iter().map(|(_, ace)| ace).collect();
            let kept: Vec<Json> = kept.into_iter().map(|(_, ace)| ace).collect();
            debug!(afi = %afi, acl = %name, removed = gone.len(), "popped aces");
            removed_count += gone.len();

            removed_acls.push(json!({"name": name, "aces": gone}));
            if let Some(obj) = acl.as_object_mut() {
                if kept.is_empty() {
                    // an emptied ACL keeps only its name
                    let mut only_name = Map::new();
                    if let Some(n) = obj.remove("name") {
                        only_name.insert("name".to_string(), n);
                    }
                    *obj = only_name;
                } else {
                    obj.insert("aces".to_string(), Json::Array(kept));
                }
            }
            clean_acls.push(acl);
        }

        let mut clean_family = family.as_object().cloned().unwrap_or_default();
        clean_family.insert("acls".to_string(), Json::Array(clean_acls));
        clean.push(Json::Object(clean_family));
        if !removed_acls.is_empty() {
            removed.push(json!({"afi": afi, "acls": removed_acls}));
        }
    }

    if removed_count == 0 && options.failed_when == FailedWhen::Missing {
        return Err(filter_error("no entries removed on the provided match_criteria"));
    }

    Ok(PopAce {
        clean_acls: json!({ "acls": clean }),
        removed_aces: json!({ "acls": removed }),
    })
}

/// Parse loosely typed options and criteria, then run [`pop_ace`]
pub fn pop_ace_value(data: &Json, filter_options: Option<&Json>, match_criteria: &Json) -> Result<PopAce> {
    let options: FilterOptions = match filter_options {
        Some(Json::Null) | None => FilterOptions::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| filter_error(format!("invalid filter_options: {}", e)))?,
    };
    let criteria = as_list(match_criteria.clone())
        .into_iter()
        .map(serde_json::from_value::<MatchCriteria>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| filter_error(format!("invalid match_criteria: {}", e)))?;
    if criteria.is_empty() {
        return Err(filter_error("match_criteria is required"));
    }
    pop_ace(data, &options, &criteria)
}

fn pop_ace_filter(data: Value, kwargs: Kwargs) -> std::result::Result<Value, minijinja::Error> {
    let invalid = |msg: String| minijinja::Error::new(ErrorKind::InvalidOperation, msg);

    let filter_options: Option<Value> = kwargs.get("filter_options")?;
    let match_criteria: Option<Value> = kwargs.get("match_criteria")?;
    kwargs.assert_all_used()?;

    let to_json = |v: &Value| serde_json::to_value(v).map_err(|e| invalid(e.to_string()));
    let data = to_json(&data)?;
    let options = filter_options.as_ref().map(to_json).transpose()?;
    let criteria = match match_criteria.as_ref() {
        Some(v) => to_json(v)?,
        None => Json::Null,
    };

    let result = pop_ace_value(&data, options.as_ref(), &criteria).map_err(|e| invalid(e.to_string()))?;
    Ok(Value::from_serialize(result.to_json()))
}
