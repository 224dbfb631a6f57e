//! `ios_prefix_lists`: IPv4 and IPv6 prefix-lists.
//!
//! Facts are keyed three deep: AFI, list name, entry sequence. A list is
//! reconciled as a unit identified by `(afi, name)`.
//!
//! An entry whose sequence exists with different content is removed and
//! re-added, in every state including `merged`: the device rejects a
//! second entry with the same sequence number.

use super::{afi_keyword, afi_name};
use crate::error::{Error, Result};
use crate::resource::compare::{partition, reconcile_entries};
use crate::resource::facts::{for_each_entry, key_field, list_to_dict};
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Node, NodeMap, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_prefix_lists",
        vec![
            Rule::new(
                "description",
                r"^(?P<afi>ip|ipv6)\sprefix-list\s(?P<name>\S+)\sdescription\s(?P<description>.+)$",
                |m| match (m.get("afi"), m.get("name")) {
                    (Some(afi), Some(name)) => on_list(
                        afi,
                        name,
                        Obj::new().with("description", m.get("description")).build(),
                    ),
                    _ => Node::map(),
                },
            )
            .setval(|v| {
                Ok(format!(
                    "{} prefix-list {} description {}",
                    keyword(v)?,
                    v.req("name")?,
                    v.req("description")?
                ))
            }),
            Rule::new(
                "entries",
                r"^(?P<afi>ip|ipv6)\sprefix-list\s(?P<name>\S+)\sseq\s(?P<seq>\d+)\s(?P<action>permit|deny)\s(?P<prefix>\S+)(?:\sge\s(?P<ge>\d+))?(?:\sle\s(?P<le>\d+))?$",
                |m| match (m.get("afi"), m.get("name"), m.get("seq")) {
                    (Some(afi), Some(name), Some(seq)) => on_list(
                        afi,
                        name,
                        Node::nest(
                            &["entries", seq],
                            Obj::new()
                                .with("sequence", m.int("seq"))
                                .with("action", m.get("action"))
                                .with("prefix", m.get("prefix"))
                                .with("ge", m.int("ge"))
                                .with("le", m.int("le"))
                                .build(),
                        ),
                    ),
                    _ => Node::map(),
                },
            )
            .setval(render_entry),
        ],
    )
});

fn on_list(keyword: &str, name: &str, leaf: Node) -> Node {
    let afi = afi_name(keyword);
    let mut list = leaf;
    list.insert("name", Node::from(name));
    Node::nest(
        &[afi],
        Obj::new()
            .with("afi", afi)
            .with("prefix_lists", Node::nest(&[name], list))
            .build(),
    )
}

fn keyword(v: &Node) -> std::result::Result<&'static str, MissingField> {
    v.str_at("afi")
        .map(afi_keyword)
        .ok_or_else(|| MissingField("afi".to_string()))
}

fn render_entry(v: &Node) -> std::result::Result<String, MissingField> {
    let mut line = format!(
        "{} prefix-list {} seq {} {} {}",
        keyword(v)?,
        v.req("name")?,
        v.req("sequence")?,
        v.req("action")?,
        v.req("prefix")?
    );
    if let Some(ge) = v.opt("ge") {
        line.push_str(" ge ");
        line.push_str(&ge);
    }
    if let Some(le) = v.opt("le") {
        line.push_str(" le ");
        line.push_str(&le);
    }
    Ok(line)
}

/// Lists of a tree as one map keyed by `"<afi> <name>"`, each carrying
/// its `afi` and `name`
fn flatten(tree: &Node) -> Node {
    let mut out = NodeMap::new();
    for (afi, family) in tree.as_map().into_iter().flatten() {
        for (name, list) in family.get("prefix_lists").and_then(Node::as_map).into_iter().flatten() {
            let mut entry = list.clone();
            entry.insert("afi", Node::from(afi.as_str()));
            entry.insert("name", Node::from(name.as_str()));
            out.insert(format!("{} {}", afi, name), entry);
        }
    }
    Node::Map(out)
}

/// Tag an entry with its list identity so it can be rendered on its own
fn within(entry: &Node, list: &Node) -> Node {
    if entry.is_empty() {
        return Node::map();
    }
    let mut tagged = entry.clone();
    for field in ["afi", "name"] {
        if let Some(value) = list.get(field) {
            tagged.insert(field, value.clone());
        }
    }
    tagged
}

fn removal(list: &Node) -> Result<String> {
    let afi = list.str_at("afi").unwrap_or("ipv4");
    let name = list.req("name").map_err(|missing| Error::Render {
        parser: "prefix_lists".to_string(),
        field: missing.0,
    })?;
    Ok(format!("no {} prefix-list {}", afi_keyword(afi), name))
}

/// Prefix-list resource
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixLists;

impl PrefixLists {
    fn compare_list(d: &mut Differ<'_>, _key: &str, want: &Node, have: &Node) -> Result<()> {
        let list = if want.is_empty() { have } else { want };
        d.compare(&["description"], &within(want, list), &within(have, list))?;
        d.compare_keyed(want.get("entries"), have.get("entries"), |d, _, w, h| {
            let (w, h) = (within(w, list), within(h, list));
            match (w.is_empty(), h.is_empty()) {
                (false, false) if w != h => {
                    d.addcmd(&h, "entries", true)?;
                    d.addcmd(&w, "entries", false)
                }
                (false, true) => d.addcmd(&w, "entries", false),
                (true, false) => d.addcmd(&h, "entries", true),
                _ => Ok(()),
            }
        })
    }

    /// Whole lists removed under `deleted`
    fn deleted(d: &mut Differ<'_>, want: &Node, have: &Node) -> Result<()> {
        for (afi, family) in have.as_map().into_iter().flatten() {
            let lists = family.get("prefix_lists").and_then(Node::as_map).into_iter().flatten();
            let chosen = match want.get(afi) {
                _ if want.is_empty() => None,
                None => continue,
                Some(w) => w.get("prefix_lists").and_then(Node::as_map).filter(|m| !m.is_empty()),
            };
            for (name, _) in lists {
                if chosen.map_or(true, |names| names.contains_key(name)) {
                    d.push(format!("no {} prefix-list {}", afi_keyword(afi), name));
                }
            }
        }
        Ok(())
    }
}

impl Resource for PrefixLists {
    fn name(&self) -> &'static str {
        "ios_prefix_lists"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut families = list_to_dict(self.name(), Some(tree), &["afi"])?;
        for family in families.values_mut() {
            key_field(self.name(), family, "prefix_lists", &["name"])?;
            for_each_entry(family, "prefix_lists", |list| {
                key_field(self.name(), list, "entries", &["sequence"])?;
                for_each_entry(list, "entries", |entry| {
                    for field in ["sequence", "ge", "le"] {
                        entry.coerce_int(field);
                    }
                    Ok(())
                })
            })?;
        }
        Ok(Node::Map(families))
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for (_, list) in flatten(want).as_map().into_iter().flatten() {
            let name = list.str_at("name").unwrap_or_default();
            if !matches!(list.str_at("afi"), Some("ipv4" | "ipv6")) {
                return Err(Error::invalid_config(
                    self.name(),
                    format!("prefix-list {}: afi must be ipv4 or ipv6", name),
                ));
            }
            for (seq, entry) in list.get("entries").and_then(Node::as_map).into_iter().flatten() {
                if !matches!(entry.str_at("action"), Some("permit" | "deny")) {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("prefix-list {} seq {}: action must be permit or deny", name, seq),
                    ));
                }
                if entry.get("prefix").is_none() {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("prefix-list {} seq {}: prefix is required", name, seq),
                    ));
                }
            }
        }
        Ok(())
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        if state == State::Deleted {
            Self::deleted(&mut d, want, have)?;
            return Ok(d.finish());
        }

        let want_lists = flatten(want);
        let mut have_lists = flatten(have);
        if state == State::Overridden {
            let (Some(wmap), Some(hmap)) = (want_lists.as_map(), have_lists.as_map()) else {
                return Ok(d.finish());
            };
            for key in partition(wmap, hmap).have_only {
                d.push(removal(&hmap[key])?);
            }
            let kept: NodeMap = hmap
                .iter()
                .filter(|(k, _)| wmap.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            have_lists = Node::Map(kept);
        }
        reconcile_entries(&mut d, &want_lists, &have_lists, Self::compare_list)?;
        Ok(d.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const RUNNING: &str = "\
ip prefix-list ALLOW description permitted ranges
ip prefix-list ALLOW seq 5 permit 10.0.0.0/8 le 24
ip prefix-list ALLOW seq 10 permit 192.168.0.0/16 ge 24 le 32
ip prefix-list BLOCK seq 5 deny 0.0.0.0/0
ipv6 prefix-list V6 seq 5 permit 2001:db8::/32 le 64
";

    fn facts() -> Node {
        PrefixLists.normalize(TABLE.parse(RUNNING)).unwrap().prune()
    }

    fn want(v: serde_json::Value) -> Node {
        PrefixLists.normalize_want(Node::from_json(&v).unwrap()).unwrap().prune()
    }

    fn allow_only() -> serde_json::Value {
        json!([{
            "afi": "ipv4",
            "prefix_lists": [{
                "name": "ALLOW",
                "description": "permitted ranges",
                "entries": [
                    {"sequence": 5, "action": "permit", "prefix": "10.0.0.0/8", "le": 24},
                    {"sequence": 10, "action": "permit", "prefix": "192.168.0.0/16", "ge": 24, "le": 32}
                ]
            }]
        }])
    }

    #[test]
    fn test_parse_lists() {
        let f = facts();
        let allow = f.get("ipv4").and_then(|a| a.get("prefix_lists")).and_then(|p| p.get("ALLOW")).unwrap();
        assert_eq!(allow.str_at("description"), Some("permitted ranges"));
        let seq10 = allow.get("entries").and_then(|e| e.get("10")).unwrap();
        assert_eq!(seq10.int_at("ge"), Some(24));
        assert_eq!(seq10.int_at("le"), Some(32));
        assert!(f.get("ipv6").and_then(|a| a.get("prefix_lists")).and_then(|p| p.get("V6")).is_some());
    }

    #[test]
    fn test_entry_round_trip() {
        let f = flatten(&facts());
        for (_, list) in f.as_map().unwrap() {
            for (_, entry) in list.get("entries").and_then(Node::as_map).unwrap() {
                let line = TABLE.render_one(&within(entry, list), "entries", false).unwrap();
                assert!(RUNNING.lines().any(|l| l == line), "{line}");
            }
        }
    }

    #[test]
    fn test_merged_adds_entry() {
        let w = want(json!([{
            "afi": "ipv4",
            "prefix_lists": [{"name": "BLOCK", "entries": [{"sequence": 10, "action": "deny", "prefix": "10.0.0.0/8"}]}]
        }]));
        let changes = PrefixLists.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(changes.commands, vec!["ip prefix-list BLOCK seq 10 deny 10.0.0.0/8"]);
    }

    #[test]
    fn test_merged_changed_entry_is_replaced() {
        let w = want(json!([{
            "afi": "ipv4",
            "prefix_lists": [{"name": "BLOCK", "entries": [{"sequence": 5, "action": "deny", "prefix": "0.0.0.0/0", "le": 32}]}]
        }]));
        let changes = PrefixLists.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(
            changes.commands,
            vec![
                "no ip prefix-list BLOCK seq 5 deny 0.0.0.0/0",
                "ip prefix-list BLOCK seq 5 deny 0.0.0.0/0 le 32",
            ]
        );
    }

    #[test]
    fn test_replaced_removes_unlisted_entries() {
        let w = want(json!([{
            "afi": "ipv4",
            "prefix_lists": [{"name": "ALLOW", "entries": [{"sequence": 5, "action": "permit", "prefix": "10.0.0.0/8", "le": 24}]}]
        }]));
        let changes = PrefixLists.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(
            changes.commands,
            vec![
                "no ip prefix-list ALLOW description permitted ranges",
                "no ip prefix-list ALLOW seq 10 permit 192.168.0.0/16 ge 24 le 32",
            ]
        );
    }

    #[test]
    fn test_overridden_removes_other_lists() {
        let w = want(allow_only());
        let changes = PrefixLists.generate_commands(&w, &facts(), State::Overridden).unwrap();
        assert_eq!(changes.commands, vec!["no ip prefix-list BLOCK", "no ipv6 prefix-list V6"]);
        assert!(PrefixLists.generate_commands(&w, &facts(), State::Replaced).unwrap().is_empty());
    }

    #[test]
    fn test_deleted_all() {
        let changes = PrefixLists.generate_commands(&Node::map(), &facts(), State::Deleted).unwrap();
        assert_eq!(
            changes.commands,
            vec!["no ip prefix-list ALLOW", "no ip prefix-list BLOCK", "no ipv6 prefix-list V6"]
        );
    }

    #[test]
    fn test_deleted_by_afi_and_name() {
        let by_afi = want(json!([{"afi": "ipv6"}]));
        let changes = PrefixLists.generate_commands(&by_afi, &facts(), State::Deleted).unwrap();
        assert_eq!(changes.commands, vec!["no ipv6 prefix-list V6"]);

        let by_name = want(json!([{"afi": "ipv4", "prefix_lists": [{"name": "BLOCK"}]}]));
        let changes = PrefixLists.generate_commands(&by_name, &facts(), State::Deleted).unwrap();
        assert_eq!(changes.commands, vec!["no ip prefix-list BLOCK"]);
    }

    #[test]
    fn test_rendered() {
        let w = want(json!([{
            "afi": "ipv6",
            "prefix_lists": [{"name": "P", "description": "test", "entries": [{"sequence": 1, "action": "permit", "prefix": "::/0"}]}]
        }]));
        let changes = PrefixLists.generate_commands(&w, &Node::map(), State::Rendered).unwrap();
        assert_eq!(
            changes.commands,
            vec!["ipv6 prefix-list P description test", "ipv6 prefix-list P seq 1 permit ::/0"]
        );
    }

    #[test]
    fn test_invalid_action() {
        let w = want(json!([{
            "afi": "ipv4",
            "prefix_lists": [{"name": "X", "entries": [{"sequence": 1, "action": "allow", "prefix": "10.0.0.0/8"}]}]
        }]));
        assert!(PrefixLists.validate(&w, &Node::map(), State::Merged).is_err());
    }

    #[test]
    fn test_idempotent() {
        let f = facts();
        for state in [State::Merged, State::Replaced, State::Overridden] {
            let changes = PrefixLists.generate_commands(&f, &f, state).unwrap();
            assert!(changes.commands.is_empty(), "{state}: {:?}", changes.commands);
        }
    }
}
