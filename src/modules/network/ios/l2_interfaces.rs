//! `ios_l2_interfaces`: switchport mode, access/voice VLANs and trunk
//! settings.
//!
//! Trunk allowed and pruning VLANs are range sets. Running configuration
//! may split them over several `... vlan add` lines; facts join them into a
//! single canonical range string.

use super::{interface_anchor, key_interfaces};
use crate::error::{Error, Result};
use crate::resource::compare::reconcile_entries;
use crate::resource::ranges::{self, RangeSet};
use crate::resource::{Changes, Differ, Node, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_l2_interfaces",
        vec![
            interface_anchor(),
            Rule::new(
                "mode",
                r"^\s+switchport\smode\s(?P<mode>access|trunk|dot1q-tunnel|dynamic\s(?:auto|desirable)|private-vlan\s(?:host|promiscuous|trunk))$",
                |m| m.scope(&["name"], Obj::new().with("mode", m.get("mode").map(mode_from_cli)).build()),
            )
            .setval(|v| Ok(format!("switchport mode {}", mode_to_cli(&v.req("mode")?)))),
            Rule::new("access", r"^\s+switchport\saccess\svlan\s(?P<vlan>\d+)$", |m| {
                m.scope(&["name"], Node::nest(&["access"], Obj::new().with("vlan", m.int("vlan")).build()))
            })
            .setval(|v| Ok(format!("switchport access vlan {}", v.req("access.vlan")?)))
            .compval("access.vlan"),
            Rule::new("voice", r"^\s+switchport\svoice\svlan\s(?P<vlan>\d+)$", |m| {
                m.scope(&["name"], Node::nest(&["voice"], Obj::new().with("vlan", m.int("vlan")).build()))
            })
            .setval(|v| Ok(format!("switchport voice vlan {}", v.req("voice.vlan")?)))
            .remval(|_| Ok("no switchport voice vlan".to_string()))
            .compval("voice.vlan"),
            Rule::new(
                "trunk.encapsulation",
                r"^\s+switchport\strunk\sencapsulation\s(?P<encap>dot1q|isl|negotiate)$",
                |m| m.scope(&["name"], Node::nest(&["trunk"], Obj::new().with("encapsulation", m.get("encap")).build())),
            )
            .setval(|v| Ok(format!("switchport trunk encapsulation {}", v.req("trunk.encapsulation")?))),
            Rule::new(
                "trunk.native_vlan",
                r"^\s+switchport\strunk\snative\svlan\s(?P<vlan>\d+)$",
                |m| m.scope(&["name"], Node::nest(&["trunk"], Obj::new().with("native_vlan", m.int("vlan")).build())),
            )
            .setval(|v| Ok(format!("switchport trunk native vlan {}", v.req("trunk.native_vlan")?))),
            Rule::new(
                "trunk.allowed_vlans",
                r"^\s+switchport\strunk\sallowed\svlan\s(?:add\s)?(?P<vlans>[\d,-]+)$",
                |m| m.scope(&["name"], vlan_list("allowed_vlans", m.get("vlans"))),
            )
            .setval(|v| Ok(format!("switchport trunk allowed vlan {}", v.req("trunk.allowed_vlans")?)))
            .remval(|_| Ok("no switchport trunk allowed vlan".to_string())),
            Rule::new(
                "trunk.pruning_vlans",
                r"^\s+switchport\strunk\spruning\svlan\s(?:add\s)?(?P<vlans>[\d,-]+)$",
                |m| m.scope(&["name"], vlan_list("pruning_vlans", m.get("vlans"))),
            )
            .setval(|v| Ok(format!("switchport trunk pruning vlan {}", v.req("trunk.pruning_vlans")?)))
            .remval(|_| Ok("no switchport trunk pruning vlan".to_string())),
        ],
    )
});

const PARSERS: &[&str] = &["trunk.encapsulation", "mode", "access", "voice", "trunk.native_vlan"];

/// Trunk VLAN range fields and their command keyword
const VLAN_FIELDS: &[(&str, &str)] = &[("allowed_vlans", "allowed"), ("pruning_vlans", "pruning")];

fn vlan_list(field: &str, vlans: Option<&str>) -> Node {
    match vlans {
        Some(v) => Node::nest(&["trunk", field], Node::List(vec![Node::from(v)])),
        None => Node::map(),
    }
}

fn mode_from_cli(mode: &str) -> String {
    mode.replace(['-', ' '], "_")
}

fn mode_to_cli(mode: &str) -> String {
    match mode {
        "dot1q_tunnel" => "dot1q-tunnel".to_string(),
        m if m.starts_with("private_vlan_") => m.replacen("private_vlan_", "private-vlan ", 1),
        m if m.starts_with("dynamic_") => m.replacen('_', " ", 1),
        m => m.to_string(),
    }
}

/// Join a list or string of VLAN ranges into one canonical string
fn canonical_vlans(node: &Node) -> std::result::Result<String, String> {
    let parts: Vec<String> = match node {
        Node::List(items) => items.iter().filter_map(Node::scalar_string).collect(),
        other => other.scalar_string().into_iter().collect(),
    };
    ranges::union_all(parts.iter().map(String::as_str))
        .map(|set| ranges::render(&set))
        .map_err(|e| e.to_string())
}

fn vlan_set(node: &Node, path: &str) -> Result<RangeSet> {
    node.str_at(path).map_or_else(|| Ok(RangeSet::new()), ranges::parse)
}

/// L2 switchport resource
#[derive(Debug, Clone, Copy, Default)]
pub struct L2Interfaces;

impl L2Interfaces {
    fn compare_interface(d: &mut Differ<'_>, name: &str, want: &Node, have: &Node) -> Result<()> {
        d.block(&[format!("interface {}", name)], |d| {
            d.compare(PARSERS, want, have)?;
            for (field, keyword) in VLAN_FIELDS {
                Self::compare_vlans(d, field, keyword, want, have)?;
            }
            Ok(())
        })
    }

    /// Trunk VLAN sets: merged adds the missing members, other states
    /// re-assert the full wanted set or remove the list.
    fn compare_vlans(d: &mut Differ<'_>, field: &str, keyword: &str, want: &Node, have: &Node) -> Result<()> {
        let path = format!("trunk.{}", field);
        let w = vlan_set(want, &path)?;
        let h = vlan_set(have, &path)?;
        if w == h {
            return Ok(());
        }
        match d.state() {
            State::Merged => {
                let added: RangeSet = w.difference(&h).copied().collect();
                if added.is_empty() {
                    return Ok(());
                }
                if h.is_empty() {
                    d.addcmd(want, &path, false)?;
                } else {
                    d.push(format!("switchport trunk {} vlan add {}", keyword, ranges::render(&added)));
                }
            }
            _ if w.is_empty() => d.addcmd(have, &path, true)?,
            _ => d.addcmd(want, &path, false)?,
        }
        Ok(())
    }
}

impl Resource for L2Interfaces {
    fn name(&self) -> &'static str {
        "ios_l2_interfaces"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut keyed = key_interfaces(self.name(), Some(tree))?;
        for entry in keyed.values_mut() {
            entry.coerce_int("access.vlan");
            entry.coerce_int("voice.vlan");
            entry.coerce_int("trunk.native_vlan");
            if let Some(mode) = entry.str_at("mode").map(mode_from_cli) {
                entry.insert("mode", Node::Str(mode));
            }
            for (field, _) in VLAN_FIELDS {
                let path = format!("trunk.{}", field);
                if let Some(slot) = entry.get_path_mut(&path) {
                    let joined = canonical_vlans(slot)
                        .map_err(|e| Error::invalid_config(self.name(), format!("{}: {}", path, e)))?;
                    *slot = Node::Str(joined);
                }
            }
        }
        Ok(Node::Map(keyed))
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for (name, entry) in want.as_map().into_iter().flatten() {
            if entry.get("access").is_some() && entry.str_at("mode").is_some_and(|m| m == "trunk") {
                return Err(Error::invalid_config(
                    self.name(),
                    format!("{}: access vlan cannot be set with mode trunk", name),
                ));
            }
        }
        Ok(())
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        reconcile_entries(&mut d, want, have, Self::compare_interface)?;
        Ok(d.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const RUNNING: &str = "\
interface GigabitEthernet0/1
 switchport access vlan 20
 switchport voice vlan 40
 switchport mode access
interface GigabitEthernet0/2
 switchport trunk encapsulation dot1q
 switchport trunk native vlan 10
 switchport trunk allowed vlan 10-20,40
 switchport trunk allowed vlan add 60
 switchport mode trunk
";

    fn facts() -> Node {
        L2Interfaces.normalize(TABLE.parse(RUNNING)).unwrap().prune()
    }

    fn want(v: serde_json::Value) -> Node {
        L2Interfaces.normalize_want(Node::from_json(&v).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_joins_allowed_vlans() {
        let f = facts();
        let gi2 = f.get("GigabitEthernet0/2").unwrap();
        assert_eq!(gi2.str_at("trunk.allowed_vlans"), Some("10-20,40,60"));
        assert_eq!(gi2.int_at("trunk.native_vlan"), Some(10));
        assert_eq!(gi2.str_at("mode"), Some("trunk"));
        let gi1 = f.get("GigabitEthernet0/1").unwrap();
        assert_eq!(gi1.int_at("access.vlan"), Some(20));
    }

    #[test]
    fn test_merged_adds_only_new_vlans() {
        let w = want(json!([{"name": "GigabitEthernet0/2", "trunk": {"allowed_vlans": ["15-25"]}}]));
        let changes = L2Interfaces.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(
            changes.commands,
            vec!["interface GigabitEthernet0/2", "switchport trunk allowed vlan add 21-25"]
        );
    }

    #[test]
    fn test_replaced_voice_uses_remval() {
        let w = want(json!([{"name": "GigabitEthernet0/1", "mode": "access", "access": {"vlan": 20}}]));
        let changes = L2Interfaces.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(changes.commands, vec!["interface GigabitEthernet0/1", "no switchport voice vlan"]);
    }

    #[test]
    fn test_replaced_trunk_vlans() {
        let w = want(json!([{
            "name": "GigabitEthernet0/2",
            "mode": "trunk",
            "trunk": {"encapsulation": "dot1q", "native_vlan": 10, "allowed_vlans": "10,11"}
        }]));
        let changes = L2Interfaces.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(
            changes.commands,
            vec!["interface GigabitEthernet0/2", "switchport trunk allowed vlan 10-11"]
        );
    }

    #[test]
    fn test_deleted_all() {
        let changes = L2Interfaces.generate_commands(&Node::map(), &facts(), State::Deleted).unwrap();
        assert_eq!(
            changes.commands,
            vec![
                "interface GigabitEthernet0/1",
                "no switchport mode access",
                "no switchport access vlan 20",
                "no switchport voice vlan",
                "interface GigabitEthernet0/2",
                "no switchport trunk encapsulation dot1q",
                "no switchport mode trunk",
                "no switchport trunk native vlan 10",
                "no switchport trunk allowed vlan",
            ]
        );
    }

    #[test]
    fn test_mode_round_trip() {
        assert_eq!(mode_from_cli("dynamic auto"), "dynamic_auto");
        assert_eq!(mode_to_cli("dynamic_auto"), "dynamic auto");
        assert_eq!(mode_to_cli("private_vlan_host"), "private-vlan host");
        assert_eq!(mode_to_cli("dot1q_tunnel"), "dot1q-tunnel");
        assert_eq!(mode_to_cli("trunk"), "trunk");
    }

    #[test]
    fn test_access_with_trunk_is_rejected() {
        let w = want(json!([{"name": "Gi0/3", "mode": "trunk", "access": {"vlan": 5}}]));
        assert!(L2Interfaces.validate(&w, &Node::map(), State::Merged).is_err());
    }
}
