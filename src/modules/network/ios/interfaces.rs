//! `ios_interfaces`: interface description, speed, MTU, duplex and
//! administrative state.
//!
//! ```yaml
//! config:
//!   - name: GigabitEthernet3
//!     description: uplink
//!     speed: 100
//!     duplex: full
//!     enabled: false
//! ```

use super::{interface_anchor, key_interfaces};
use crate::error::Result;
use crate::resource::compare::{reconcile_entries, selected};
use crate::resource::{Changes, Differ, Node, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_interfaces",
        vec![
            interface_anchor(),
            Rule::new("description", r"^\s+description\s(?P<description>.+)$", |m| {
                m.scope(&["name"], Obj::new().with("description", m.get("description")).build())
            })
            .setval(|v| Ok(format!("description {}", v.req("description")?))),
            Rule::new("speed", r"^\s+speed\s(?P<speed>\S+)$", |m| {
                m.scope(&["name"], Obj::new().with("speed", m.get("speed")).build())
            })
            .setval(|v| Ok(format!("speed {}", v.req("speed")?))),
            Rule::new("mtu", r"^\s+mtu\s(?P<mtu>\d+)$", |m| {
                m.scope(&["name"], Obj::new().with("mtu", m.int("mtu")).build())
            })
            .setval(|v| Ok(format!("mtu {}", v.req("mtu")?))),
            Rule::new("duplex", r"^\s+duplex\s(?P<duplex>full|half|auto)$", |m| {
                m.scope(&["name"], Obj::new().with("duplex", m.get("duplex")).build())
            })
            .setval(|v| Ok(format!("duplex {}", v.req("duplex")?))),
            Rule::new("enabled", r"^\s+(?P<shutdown>shutdown)$", |m| {
                m.scope(&["name"], Obj::new().with("enabled", !m.matched("shutdown")).build())
            })
            .setval(|_| Ok("shutdown".to_string())),
        ],
    )
});

const PARSERS: &[&str] = &["description", "speed", "mtu", "duplex"];

/// Interface attributes resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Interfaces;

impl Interfaces {
    fn compare_interface(d: &mut Differ<'_>, name: &str, want: &Node, have: &Node) -> Result<()> {
        d.block(&[format!("interface {}", name)], |d| {
            d.compare(PARSERS, want, have)?;

            // `enabled` renders as `shutdown`, negated as `no shutdown`
            let w = want.get("enabled").and_then(Node::as_bool);
            let h = have.get("enabled").and_then(Node::as_bool);
            if w != h {
                match w {
                    Some(true) => d.addcmd(want, "enabled", true)?,
                    Some(false) => d.addcmd(want, "enabled", false)?,
                    None if h == Some(false) => d.addcmd(have, "enabled", true)?,
                    None => {}
                }
            }
            Ok(())
        })
    }
}

impl Resource for Interfaces {
    fn name(&self) -> &'static str {
        "ios_interfaces"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut keyed = key_interfaces(self.name(), Some(tree))?;
        for entry in keyed.values_mut() {
            entry.coerce_str("speed");
            entry.coerce_int("mtu");
            if entry.get("enabled").is_none() {
                entry.insert("enabled", Node::Bool(true));
            }
        }
        Ok(Node::Map(keyed))
    }

    fn supports_purged(&self) -> bool {
        true
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        if state == State::Purged {
            for (name, _) in selected(want, have) {
                d.push(format!("no interface {}", name));
            }
        } else {
            reconcile_entries(&mut d, want, have, Self::compare_interface)?;
        }
        Ok(d.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const RUNNING: &str = "\
interface GigabitEthernet1
 description Management
 speed 1000
 mtu 1500
 duplex full
interface GigabitEthernet2
 description Uplink
 shutdown
interface GigabitEthernet3
 no ip address
";

    fn facts() -> Node {
        Interfaces.normalize(TABLE.parse(RUNNING)).unwrap().prune()
    }

    fn want(v: serde_json::Value) -> Node {
        Interfaces.normalize_want(Node::from_json(&v).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_interfaces() {
        let f = facts();
        let gi1 = f.get("GigabitEthernet1").unwrap();
        assert_eq!(gi1.str_at("description"), Some("Management"));
        assert_eq!(gi1.str_at("speed"), Some("1000"));
        assert_eq!(gi1.int_at("mtu"), Some(1500));
        assert!(gi1.flag("enabled"));
        assert_eq!(f.get("GigabitEthernet2").and_then(|n| n.get("enabled")), Some(&Node::Bool(false)));
        assert!(f.get("GigabitEthernet3").is_some());
    }

    #[test]
    fn test_merged_adds_fields_and_shutdown_last() {
        let w = want(json!([{"name": "GigabitEthernet3", "description": "X", "speed": 100, "duplex": "full", "enabled": false}]));
        let changes = Interfaces.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(
            changes.commands,
            vec!["interface GigabitEthernet3", "description X", "speed 100", "duplex full", "shutdown"]
        );
    }

    #[test]
    fn test_replaced_negates_unlisted_fields() {
        let w = want(json!([{"name": "GigabitEthernet1", "description": "Management"}]));
        let changes = Interfaces.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(
            changes.commands,
            vec!["interface GigabitEthernet1", "no speed 1000", "no mtu 1500", "no duplex full"]
        );
    }

    #[test]
    fn test_replaced_reenables() {
        let w = want(json!([{"name": "GigabitEthernet2", "description": "Uplink"}]));
        let changes = Interfaces.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(changes.commands, vec!["interface GigabitEthernet2", "no shutdown"]);
    }

    #[test]
    fn test_deleted_selected_interface() {
        let w = want(json!([{"name": "GigabitEthernet2"}]));
        let changes = Interfaces.generate_commands(&w, &facts(), State::Deleted).unwrap();
        assert_eq!(
            changes.commands,
            vec!["interface GigabitEthernet2", "no description Uplink", "no shutdown"]
        );
    }

    #[test]
    fn test_purged() {
        let w = want(json!([{"name": "gi3"}]));
        let changes = Interfaces.generate_commands(&w, &facts(), State::Purged).unwrap();
        assert_eq!(changes.commands, vec!["no interface GigabitEthernet3"]);
    }

    #[test]
    fn test_idempotent() {
        let f = facts();
        for state in [State::Merged, State::Replaced, State::Overridden] {
            assert!(Interfaces.generate_commands(&f, &f, state).unwrap().is_empty());
        }
    }

    #[test]
    fn test_rendered() {
        let w = want(json!([{"name": "GigabitEthernet9", "mtu": "9000"}]));
        let changes = Interfaces.generate_commands(&w, &Node::map(), State::Rendered).unwrap();
        assert_eq!(changes.commands, vec!["interface GigabitEthernet9", "mtu 9000", "no shutdown"]);
    }
}
