//! Cisco IOS resource modules
//!
//! Each submodule declares the parser table for one configuration domain and
//! the comparators that reconcile it. They all run through the shared engine
//! in [`crate::resource`].

pub mod bgp_address_family;
pub mod evpn_ethernet;
pub mod interfaces;
pub mod l2_interfaces;
pub mod line;
pub mod logging_global;
pub mod ospf_interfaces;
pub mod prefix_lists;
pub mod spanning_tree;

use crate::error::{Error, Result};
use crate::resource::facts::list_to_dict;
use crate::resource::{Node, NodeMap, Obj, Resource, Rule};
use std::sync::Arc;

pub use bgp_address_family::BgpAddressFamily;
pub use evpn_ethernet::EvpnEthernet;
pub use interfaces::Interfaces;
pub use l2_interfaces::L2Interfaces;
pub use line::Line;
pub use logging_global::LoggingGlobal;
pub use ospf_interfaces::OspfInterfaces;
pub use prefix_lists::PrefixLists;
pub use spanning_tree::SpanningTree;

/// Every IOS resource, in registration order
pub fn resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(Interfaces),
        Arc::new(L2Interfaces),
        Arc::new(EvpnEthernet),
        Arc::new(SpanningTree),
        Arc::new(BgpAddressFamily),
        Arc::new(OspfInterfaces),
        Arc::new(PrefixLists),
        Arc::new(LoggingGlobal),
        Arc::new(Line),
    ]
}

/// Full interface type names, tried in order against an abbreviation
const INTERFACE_TYPES: &[&str] = &[
    "GigabitEthernet",
    "TenGigabitEthernet",
    "FastEthernet",
    "Ethernet",
    "Loopback",
    "Vlan",
    "Port-channel",
    "Tunnel",
    "Serial",
    "TwentyFiveGigE",
    "FortyGigabitEthernet",
    "HundredGigE",
    "BDI",
    "nve",
];

/// Expand an abbreviated interface name (`gi0/1` becomes `GigabitEthernet0/1`).
///
/// Names whose type matches nothing are returned unchanged.
pub fn normalize_interface(name: &str) -> String {
    let name = name.trim();
    let split = name.find(|c: char| c.is_ascii_digit()).unwrap_or(name.len());
    let (kind, rest) = name.split_at(split);
    if kind.is_empty() {
        return name.to_string();
    }
    let kind_lc = kind.trim_end().to_ascii_lowercase();
    INTERFACE_TYPES
        .iter()
        .find(|full| full.to_ascii_lowercase().starts_with(&kind_lc))
        .map(|full| format!("{}{}", full, rest.trim_start()))
        .unwrap_or_else(|| name.to_string())
}

/// `interface <name>` block anchor shared by interface-scoped resources
pub(crate) fn interface_anchor() -> Rule {
    Rule::new("name", r"^interface\s(?P<name>\S+)$", |m| {
        m.scope(&["name"], Obj::new().with("name", m.get("name")).build())
    })
    .setval(|v| Ok(format!("interface {}", v.req("name")?)))
    .shared()
}

/// Key interface entries by their expanded name
pub(crate) fn key_interfaces(resource: &str, node: Option<Node>) -> Result<NodeMap> {
    let keyed = list_to_dict(resource, node, &["name"])?;
    let mut out = NodeMap::new();
    for (_, mut entry) in keyed {
        let name = entry
            .str_at("name")
            .map(normalize_interface)
            .ok_or_else(|| Error::invalid_config(resource, "interface entry is missing 'name'"))?;
        entry.insert("name", Node::Str(name.clone()));
        match out.get_mut(&name) {
            Some(existing) => existing.merge(entry),
            None => {
                out.insert(name, entry);
            }
        }
    }
    Ok(out)
}

/// Mapping of configuration AFI names to IOS command keywords
pub(crate) fn afi_keyword(afi: &str) -> &'static str {
    match afi {
        "ipv6" => "ipv6",
        _ => "ip",
    }
}

/// Mapping of IOS command keywords to AFI names
pub(crate) fn afi_name(keyword: &str) -> &'static str {
    match keyword {
        "ipv6" => "ipv6",
        _ => "ipv4",
    }
}

/// Sorted, de-duplicated word list from a list or a space separated string
pub(crate) fn word_list(node: &Node) -> Node {
    let mut words: Vec<String> = match node {
        Node::List(items) => items.iter().filter_map(Node::scalar_string).collect(),
        other => other
            .scalar_string()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    };
    words.sort();
    words.dedup();
    Node::List(words.into_iter().map(Node::Str).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_interface() {
        assert_eq!(normalize_interface("gi0/1"), "GigabitEthernet0/1");
        assert_eq!(normalize_interface("Te1/0/1"), "TenGigabitEthernet1/0/1");
        assert_eq!(normalize_interface("lo 0"), "Loopback0");
        assert_eq!(normalize_interface("po10"), "Port-channel10");
        assert_eq!(normalize_interface("GigabitEthernet3"), "GigabitEthernet3");
        assert_eq!(normalize_interface("mgmt0"), "mgmt0");
    }

    #[test]
    fn test_key_interfaces_merges_aliases() {
        let list = Node::from_json(&json!([
            {"name": "gi1", "description": "a"},
            {"name": "GigabitEthernet1", "mtu": 1500}
        ]));
        let keyed = key_interfaces("ios_interfaces", list).unwrap();
        assert_eq!(keyed.len(), 1);
        assert_eq!(keyed["GigabitEthernet1"].str_at("description"), Some("a"));
        assert_eq!(keyed["GigabitEthernet1"].int_at("mtu"), Some(1500));
    }

    #[test]
    fn test_word_list() {
        let sorted = word_list(&Node::from("telnet ssh telnet"));
        assert_eq!(sorted, Node::List(vec![Node::from("ssh"), Node::from("telnet")]));
    }

    #[test]
    fn test_all_resources_have_unique_names() {
        let mut names: Vec<_> = resources().iter().map(|r| r.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
