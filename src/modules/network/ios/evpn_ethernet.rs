//! `ios_evpn_ethernet`: L2VPN EVPN ethernet segments.

use crate::error::{Error, Result};
use crate::resource::compare::{reconcile_entries, selected};
use crate::resource::facts::list_to_dict;
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Node, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_evpn_ethernet",
        vec![
            Rule::new("segment", r"^l2vpn\sevpn\sethernet-segment\s(?P<segment>\d+)$", |m| {
                m.scope(&["segment"], Obj::new().with("segment", m.get("segment")).build())
            })
            .setval(|v| Ok(format!("l2vpn evpn ethernet-segment {}", v.req("segment")?)))
            .shared(),
            Rule::new(
                "identifier",
                r"^\s+identifier\stype\s(?P<type>0|3)\s(?:system-mac\s)?(?P<esi>\S+)$",
                |m| {
                    m.scope(
                        &["segment"],
                        Node::nest(
                            &["identifier"],
                            Obj::new()
                                .with("identifier_type", m.get("type"))
                                .with("esi_value", m.get("esi"))
                                .build(),
                        ),
                    )
                },
            )
            .setval(render_identifier),
            Rule::new("redundancy", r"^\s+redundancy\s(?P<mode>all-active|single-active)$", |m| {
                let flag = match m.get("mode") {
                    Some("all-active") => "all_active",
                    _ => "single_active",
                };
                m.scope(&["segment"], Node::nest(&["redundancy", flag], Node::Bool(true)))
            })
            .setval(render_redundancy),
            Rule::new("df_election.preempt_time", r"^\s+df-election\spreempt-time\s(?P<t>\d+)$", |m| {
                m.scope(&["segment"], Node::nest(&["df_election"], Obj::new().with("preempt_time", m.int("t")).build()))
            })
            .setval(|v| Ok(format!("df-election preempt-time {}", v.req("df_election.preempt_time")?))),
            Rule::new("df_election.wait_time", r"^\s+df-election\swait-time\s(?P<t>\d+)$", |m| {
                m.scope(&["segment"], Node::nest(&["df_election"], Obj::new().with("wait_time", m.int("t")).build()))
            })
            .setval(|v| Ok(format!("df-election wait-time {}", v.req("df_election.wait_time")?))),
        ],
    )
});

const PARSERS: &[&str] = &[
    "identifier",
    "redundancy",
    "df_election.preempt_time",
    "df_election.wait_time",
];

fn render_identifier(v: &Node) -> std::result::Result<String, MissingField> {
    let esi = v.req("identifier.esi_value")?;
    match v.req("identifier.identifier_type")?.as_str() {
        "3" => Ok(format!("identifier type 3 system-mac {}", esi)),
        _ => Ok(format!("identifier type 0 {}", esi)),
    }
}

fn render_redundancy(v: &Node) -> std::result::Result<String, MissingField> {
    if v.flag("redundancy.all_active") {
        Ok("redundancy all-active".to_string())
    } else if v.flag("redundancy.single_active") {
        Ok("redundancy single-active".to_string())
    } else {
        Err(MissingField("redundancy".to_string()))
    }
}

/// Redundancy modes are exclusive: a desired mode clears the other one, so
/// a merge onto existing facts cannot leave both modes set.
fn complete_redundancy(entry: &mut Node) {
    let Some(redundancy) = entry.get_path_mut("redundancy") else {
        return;
    };
    for (set, other) in [("all_active", "single_active"), ("single_active", "all_active")] {
        if redundancy.flag(set) && redundancy.get(other).is_none() {
            redundancy.insert(other, Node::Bool(false));
        }
    }
}

/// Segment with cleared redundancy modes removed, ready to compare with facts
fn without_cleared_modes(entry: &Node) -> Node {
    let mut entry = entry.clone();
    let cleared = match entry.get_path_mut("redundancy").and_then(Node::as_map_mut) {
        Some(redundancy) => {
            redundancy.retain(|_, v| v.as_bool() != Some(false));
            redundancy.is_empty()
        }
        None => false,
    };
    if cleared {
        entry.remove("redundancy");
    }
    entry
}

/// EVPN ethernet segment resource
#[derive(Debug, Clone, Copy, Default)]
pub struct EvpnEthernet;

impl EvpnEthernet {
    fn compare_segment(d: &mut Differ<'_>, segment: &str, want: &Node, have: &Node) -> Result<()> {
        let want = without_cleared_modes(want);
        d.block(&[format!("l2vpn evpn ethernet-segment {}", segment)], |d| {
            d.compare(PARSERS, &want, have)
        })
    }
}

impl Resource for EvpnEthernet {
    fn name(&self) -> &'static str {
        "ios_evpn_ethernet"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut keyed = list_to_dict(self.name(), Some(tree), &["segment"])?;
        for entry in keyed.values_mut() {
            entry.coerce_str("segment");
            entry.coerce_str("identifier.identifier_type");
            entry.coerce_int("df_election.preempt_time");
            entry.coerce_int("df_election.wait_time");
        }
        Ok(Node::Map(keyed))
    }

    fn normalize_want(&self, want: Node) -> Result<Node> {
        let mut want = self.normalize(want)?;
        if let Some(segments) = want.as_map_mut() {
            segments.values_mut().for_each(complete_redundancy);
        }
        Ok(want)
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for (segment, entry) in want.as_map().into_iter().flatten() {
            if let Some(kind) = entry.str_at("identifier.identifier_type") {
                if kind != "0" && kind != "3" {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("segment {}: identifier_type must be 0 or 3, got '{}'", segment, kind),
                    ));
                }
            }
            if entry.flag("redundancy.all_active") && entry.flag("redundancy.single_active") {
                return Err(Error::invalid_config(
                    self.name(),
                    format!("segment {}: redundancy all_active and single_active are mutually exclusive", segment),
                ));
            }
        }
        Ok(())
    }

    fn supports_purged(&self) -> bool {
        true
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        if state == State::Purged {
            for (_, entry) in selected(want, have) {
                d.addcmd(entry, "segment", true)?;
            }
        } else {
            reconcile_entries(&mut d, want, have, Self::compare_segment)?;
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
l2vpn evpn ethernet-segment 1
 identifier type 0 00.00.00.00.00.00.00.00.01
 redundancy single-active
l2vpn evpn ethernet-segment 2
 identifier type 3 system-mac 0000.0000.0002
 redundancy all-active
 df-election wait-time 3
l2vpn evpn ethernet-segment 3
 redundancy single-active
l2vpn evpn ethernet-segment 4
 df-election preempt-time 10
";

    fn facts() -> Node {
        EvpnEthernet.normalize(TABLE.parse(RUNNING)).unwrap().prune()
    }

    fn want(v: serde_json::Value) -> Node {
        EvpnEthernet.normalize_want(Node::from_json(&v).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let f = facts();
        assert_eq!(f.as_map().unwrap().len(), 4);
        let s2 = f.get("2").unwrap();
        assert_eq!(s2.str_at("identifier.identifier_type"), Some("3"));
        assert_eq!(s2.str_at("identifier.esi_value"), Some("0000.0000.0002"));
        assert!(s2.flag("redundancy.all_active"));
        assert_eq!(s2.int_at("df_election.wait_time"), Some(3));
    }

    #[test]
    fn test_identifier_round_trip() {
        let f = facts();
        for seg in ["1", "2"] {
            let entry = f.get(seg).unwrap();
            let line = TABLE.render_one(entry, "identifier", false).unwrap();
            assert!(RUNNING.contains(&format!(" {}\n", line)));
        }
    }

    #[test]
    fn test_purged_named_segment_only() {
        let w = want(json!([{"segment": 1}]));
        let changes = EvpnEthernet.generate_commands(&w, &facts(), State::Purged).unwrap();
        assert_eq!(changes.commands, vec!["no l2vpn evpn ethernet-segment 1"]);
    }

    #[test]
    fn test_merged_child_follows_anchor() {
        let w = want(json!([{"segment": 3, "df_election": {"wait_time": 5}}]));
        let changes = EvpnEthernet.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(
            changes.commands,
            vec!["l2vpn evpn ethernet-segment 3", "df-election wait-time 5"]
        );
    }

    #[test]
    fn test_merged_switches_redundancy_mode() {
        let w = want(json!([{"segment": 2, "redundancy": {"single_active": true}}]));
        let changes = EvpnEthernet.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(
            changes.commands,
            vec!["l2vpn evpn ethernet-segment 2", "redundancy single-active"]
        );
    }

    #[test]
    fn test_facts_carry_only_configured_mode() {
        let f = facts();
        assert_eq!(
            f.get("1").and_then(|s| s.get("redundancy")).unwrap().to_json(),
            json!({"single_active": true})
        );
        assert_eq!(
            f.get("2").and_then(|s| s.get("redundancy")).unwrap().to_json(),
            json!({"all_active": true})
        );
    }

    #[test]
    fn test_gathered_segments_are_idempotent() {
        let f = facts();
        let w = want(f.to_json());
        let redundancy = w.get("1").and_then(|s| s.get("redundancy")).unwrap();
        assert_eq!(redundancy.get("all_active").and_then(Node::as_bool), Some(false));
        for state in [State::Merged, State::Replaced, State::Overridden] {
            let changes = EvpnEthernet.generate_commands(&w, &f, state).unwrap();
            assert!(changes.commands.is_empty(), "{state}: {:?}", changes.commands);
        }
    }

    #[test]
    fn test_replaced_clearing_mode_negates_it() {
        let w = want(json!([{"segment": 3, "redundancy": {"single_active": false}}]));
        let changes = EvpnEthernet.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(
            changes.commands,
            vec!["l2vpn evpn ethernet-segment 3", "no redundancy single-active"]
        );
    }

    #[test]
    fn test_replaced_switches_redundancy() {
        let w = want(json!([{"segment": "3", "redundancy": {"all_active": true}}]));
        let changes = EvpnEthernet.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(
            changes.commands,
            vec!["l2vpn evpn ethernet-segment 3", "redundancy all-active"]
        );
    }

    #[test]
    fn test_overridden_removes_other_segments() {
        let f = facts();
        let w = want(json!([
            {"segment": 1, "identifier": {"identifier_type": 0, "esi_value": "00.00.00.00.00.00.00.00.01"}, "redundancy": {"single_active": true}},
        ]));
        let changes = EvpnEthernet.generate_commands(&w, &f, State::Overridden).unwrap();
        assert_eq!(
            changes.commands,
            vec![
                "l2vpn evpn ethernet-segment 2",
                "no identifier type 3 system-mac 0000.0000.0002",
                "no redundancy all-active",
                "no df-election wait-time 3",
                "l2vpn evpn ethernet-segment 3",
                "no redundancy single-active",
                "l2vpn evpn ethernet-segment 4",
                "no df-election preempt-time 10",
            ]
        );
    }

    #[test]
    fn test_invalid_identifier_type() {
        let w = want(json!([{"segment": 9, "identifier": {"identifier_type": 1, "esi_value": "x"}}]));
        assert!(EvpnEthernet.validate(&w, &Node::map(), State::Merged).is_err());
    }
}
