//! Tests for the `pop_ace` filter plugin.
//!
//! Covers the library entry points and the filter as seen from templates.

use minijinja::{context, Environment};
use netrm::plugins::filter::{
    pop_ace, pop_ace_value, FailedWhen, FilterOptions, FilterRegistry, MatchCriteria, Remove,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

// ============================================================================
// Fixtures
// ============================================================================

fn acl_facts() -> Value {
    json!([
        {
            "afi": "ipv4",
            "acls": [
                {
                    "name": "test_acl",
                    "aces": [
                        {"sequence": 10, "grant": "deny", "protocol": "tcp",
                         "source": {"host": "192.0.2.1"}, "destination": {"any": true}},
                        {"sequence": 20, "grant": "permit", "protocol": "ip",
                         "source": {"address": "198.51.100.0", "wildcard_bits": "0.0.0.255"},
                         "destination": {"any": true}},
                        {"sequence": 30, "grant": "deny", "protocol": "ip",
                         "source": {"any": true}, "destination": {"host": "203.0.113.9"}}
                    ]
                },
                {
                    "name": "edge",
                    "aces": [
                        {"sequence": 5, "grant": "deny", "protocol": "tcp",
                         "source": {"host": "192.0.2.1"}, "destination": {"any": true}}
                    ]
                }
            ]
        },
        {
            "afi": "ipv6",
            "acls": [
                {
                    "name": "R1_TRAFFIC",
                    "aces": [
                        {"sequence": 10, "grant": "deny", "protocol": "tcp",
                         "source": {"any": true}, "destination": {"any": true}}
                    ]
                }
            ]
        }
    ])
}

fn criteria(v: Value) -> MatchCriteria {
    serde_json::from_value(v).unwrap()
}

fn names(families: &Value) -> Vec<String> {
    families["acls"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|family| family["acls"].as_array().cloned().unwrap_or_default())
        .filter_map(|acl| acl["name"].as_str().map(str::to_string))
        .collect()
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn test_match_all_removes_first_match_per_acl() {
    let options = FilterOptions {
        match_all: true,
        ..Default::default()
    };
    let c = [criteria(json!({"afi": "ipv4", "source": "192.0.2.1", "destination": "any"}))];
    let result = pop_ace(&acl_facts(), &options, &c).unwrap();

    assert_eq!(names(&result.removed_aces), vec!["test_acl", "edge"]);
    let test_acl = &result.clean_acls["acls"][0]["acls"][0];
    let left: Vec<i64> = test_acl["aces"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["sequence"].as_i64())
        .collect();
    assert_eq!(left, vec![20, 30]);
    assert_eq!(result.clean_acls["acls"][0]["acls"][1], json!({"name": "edge"}));
}

#[test]
fn test_match_all_requires_every_field() {
    let options = FilterOptions {
        match_all: true,
        failed_when: FailedWhen::Never,
        ..Default::default()
    };
    let c = [criteria(json!({"afi": "ipv6", "source": "192.0.2.1"}))];
    let result = pop_ace(&acl_facts(), &options, &c).unwrap();
    assert!(names(&result.removed_aces).is_empty());
}

#[test]
fn test_any_field_matches_without_match_all() {
    let options = FilterOptions {
        remove: Remove::All,
        ..Default::default()
    };
    let c = [criteria(json!({"acl_name": "R1_TRAFFIC"}))];
    let result = pop_ace(&acl_facts(), &options, &c).unwrap();
    assert_eq!(names(&result.removed_aces), vec!["R1_TRAFFIC"]);
    assert_eq!(result.clean_acls["acls"][1]["acls"][0], json!({"name": "R1_TRAFFIC"}));
}

#[test]
fn test_several_criteria() {
    let options = FilterOptions {
        remove: Remove::All,
        match_all: true,
        ..Default::default()
    };
    let c = [
        criteria(json!({"acl_name": "test_acl", "grant": "deny"})),
        criteria(json!({"acl_name": "edge", "sequence": 5})),
    ];
    let result = pop_ace(&acl_facts(), &options, &c).unwrap();
    let remaining = result.clean_acls["acls"][0]["acls"][0]["aces"].as_array().unwrap().clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["grant"], json!("permit"));
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_nothing_removed_fails_by_default() {
    let c = [criteria(json!({"acl_name": "missing"}))];
    let err = pop_ace(&acl_facts(), &FilterOptions::default(), &c).unwrap_err();
    assert!(err.to_string().contains("no entries removed"));
}

#[test]
fn test_value_entry_point_accepts_single_mapping() {
    let result = pop_ace_value(
        &acl_facts(),
        Some(&json!({"remove": "all", "failed_when": "never"})),
        &json!({"grant": "permit"}),
    )
    .unwrap();
    assert_eq!(names(&result.removed_aces), vec!["test_acl"]);
}

#[test]
fn test_value_entry_point_rejects_unknown_option() {
    let err = pop_ace_value(&acl_facts(), Some(&json!({"strategy": "all"})), &json!({"grant": "deny"}))
        .unwrap_err();
    assert!(err.to_string().contains("filter_options"));
}

#[test]
fn test_value_entry_point_requires_criteria() {
    assert!(pop_ace_value(&acl_facts(), None, &Value::Null).is_err());
}

// ============================================================================
// Template filter
// ============================================================================

#[test]
fn test_filter_in_template() {
    let mut env = Environment::new();
    FilterRegistry::register_all(&mut env);
    env.add_template(
        "t",
        "{{ (acls | pop_ace(match_criteria={'acl_name': 'edge'}, filter_options={'remove': 'all'})).clean_acls.acls[0].acls[1].name }}",
    )
    .unwrap();
    let out = env
        .get_template("t")
        .unwrap()
        .render(context! { acls => acl_facts() })
        .unwrap();
    assert_eq!(out, "edge");
}

#[test]
fn test_filter_error_surfaces_in_template() {
    let mut env = Environment::new();
    FilterRegistry::register_all(&mut env);
    env.add_template("t", "{{ acls | pop_ace(match_criteria={'acl_name': 'nope'}) }}")
        .unwrap();
    let err = env
        .get_template("t")
        .unwrap()
        .render(context! { acls => acl_facts() })
        .unwrap_err();
    assert!(err.to_string().contains("no entries removed"));
}
