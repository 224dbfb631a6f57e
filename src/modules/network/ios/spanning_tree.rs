//! `ios_spanning_tree`: global spanning-tree settings, per-VLAN and MST
//! timers and priorities, and per-interface port settings.
//!
//! VLAN and instance memberships are range sets grouped by value. On the
//! device `spanning-tree vlan 1-3 cost 100` sets the cost for those VLANs,
//! so the comparator works on the membership of each value rather than on
//! individual lines.
//!
//! MST settings only apply when the effective mode is `mst`. Under
//! `merged` a warning is returned when they are ignored; other states skip
//! them without one.

use super::normalize_interface;
use crate::error::{Error, Result};
use crate::resource::compare::{reconcile_entries, restrict, selected};
use crate::resource::facts::list_to_dict;
use crate::resource::ranges::{self, RangeSet};
use crate::resource::{Changes, Differ, Match, Node, NodeMap, Obj, ParserTable, Resource, Rule, State};
use indexmap::IndexMap;
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_spanning_tree",
        vec![
            // Global
            Rule::new("mode", r"^spanning-tree\smode\s(?P<mode>pvst|rapid-pvst|mst)$", |m| {
                Obj::new().with("mode", m.get("mode")).build()
            })
            .setval(|v| Ok(format!("spanning-tree mode {}", v.req("mode")?)))
            .remval(|_| Ok("no spanning-tree mode".to_string())),
            Rule::new("loopguard_default", r"^spanning-tree\sloopguard\sdefault$", |_| {
                Obj::new().with("loopguard_default", true).build()
            })
            .setval(|_| Ok("spanning-tree loopguard default".to_string())),
            Rule::new("logging", r"^spanning-tree\slogging$", |_| Obj::new().with("logging", true).build())
                .setval(|_| Ok("spanning-tree logging".to_string())),
            Rule::new("extend_system_id", r"^spanning-tree\sextend\ssystem-id$", |_| {
                Obj::new().with("extend_system_id", true).build()
            })
            .setval(|_| Ok("spanning-tree extend system-id".to_string())),
            Rule::new("pathcost_method", r"^spanning-tree\spathcost\smethod\s(?P<method>long|short)$", |m| {
                Obj::new().with("pathcost_method", m.get("method")).build()
            })
            .setval(|v| Ok(format!("spanning-tree pathcost method {}", v.req("pathcost_method")?)))
            .remval(|_| Ok("no spanning-tree pathcost method".to_string())),
            Rule::new("portfast.default", r"^spanning-tree\sportfast\s(?:edge\s)?default$", |_| {
                Node::nest(&["portfast", "default"], Node::Bool(true))
            })
            .setval(|_| Ok("spanning-tree portfast default".to_string())),
            Rule::new(
                "portfast.bpduguard_default",
                r"^spanning-tree\sportfast\s(?:edge\s)?bpduguard\sdefault$",
                |_| Node::nest(&["portfast", "bpduguard_default"], Node::Bool(true)),
            )
            .setval(|_| Ok("spanning-tree portfast bpduguard default".to_string())),
            Rule::new(
                "portfast.bpdufilter_default",
                r"^spanning-tree\sportfast\s(?:edge\s)?bpdufilter\sdefault$",
                |_| Node::nest(&["portfast", "bpdufilter_default"], Node::Bool(true)),
            )
            .setval(|_| Ok("spanning-tree portfast bpdufilter default".to_string())),
            Rule::new(
                "forward_time",
                r"^spanning-tree\svlan\s(?P<vlan>[\d,-]+)\sforward-time\s(?P<value>\d+)$",
                |m| range_leaf(m, "forward_time", "value", "vlan"),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} forward-time {}", v.req("vlan")?, v.req("value")?))),
            Rule::new(
                "hello_time",
                r"^spanning-tree\svlan\s(?P<vlan>[\d,-]+)\shello-time\s(?P<value>\d+)$",
                |m| range_leaf(m, "hello_time", "value", "vlan"),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} hello-time {}", v.req("vlan")?, v.req("value")?))),
            Rule::new(
                "max_age",
                r"^spanning-tree\svlan\s(?P<vlan>[\d,-]+)\smax-age\s(?P<value>\d+)$",
                |m| range_leaf(m, "max_age", "value", "vlan"),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} max-age {}", v.req("vlan")?, v.req("value")?))),
            Rule::new(
                "priority",
                r"^spanning-tree\svlan\s(?P<vlan>[\d,-]+)\spriority\s(?P<value>\d+)$",
                |m| range_leaf(m, "priority", "value", "vlan"),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} priority {}", v.req("vlan")?, v.req("value")?))),
            // MST
            Rule::new("mst.configuration", r"^spanning-tree\smst\s(?P<mstcfg>configuration)$", |_| Node::map())
                .setval(|_| Ok("spanning-tree mst configuration".to_string()))
                .shared(),
            Rule::new("mst.configuration.name", r"^\s+name\s(?P<cfgname>\S+)$", |m| {
                mst_config(m, Obj::new().with("name", m.get("cfgname")).build())
            })
            .setval(|v| Ok(format!("name {}", v.req("mst.configuration.name")?))),
            Rule::new("mst.configuration.revision", r"^\s+revision\s(?P<rev>\d+)$", |m| {
                mst_config(m, Obj::new().with("revision", m.int("rev")).build())
            })
            .setval(|v| Ok(format!("revision {}", v.req("mst.configuration.revision")?))),
            Rule::new(
                "mst.configuration.instances",
                r"^\s+instance\s(?P<id>\d+)\svlan\s(?P<vlan>[\d,-]+)$",
                |m| mst_config(m, range_leaf(m, "instances", "id", "vlan")),
            )
            .setval(|v| Ok(format!("instance {} vlan {}", v.req("id")?, v.req("vlan")?))),
            Rule::new("mst.max_hops", r"^spanning-tree\smst\smax-hops\s(?P<hops>\d+)$", |m| {
                Node::nest(&["mst"], Obj::new().with("max_hops", m.int("hops")).build())
            })
            .setval(|v| Ok(format!("spanning-tree mst max-hops {}", v.req("mst.max_hops")?))),
            Rule::new(
                "mst.priority",
                r"^spanning-tree\smst\s(?P<instance>[\d,-]+)\spriority\s(?P<value>\d+)$",
                |m| Node::nest(&["mst"], range_leaf(m, "priority", "value", "instance")),
            )
            .setval(|v| Ok(format!("spanning-tree mst {} priority {}", v.req("instance")?, v.req("value")?))),
            // Interfaces
            Rule::new("interface", r"^interface\s(?P<name>\S+)$", |m| {
                on_interface(m, Obj::new().with("name", m.get("name")).build())
            })
            .setval(|v| Ok(format!("interface {}", v.req("name")?)))
            .shared(),
            Rule::new(
                "cost",
                r"^\s+spanning-tree\svlan\s(?P<vlan>[\d,-]+)\scost\s(?P<value>\d+)$",
                |m| on_interface(m, range_leaf(m, "cost", "value", "vlan")),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} cost {}", v.req("vlan")?, v.req("value")?))),
            Rule::new(
                "port_priority",
                r"^\s+spanning-tree\svlan\s(?P<vlan>[\d,-]+)\sport-priority\s(?P<value>\d+)$",
                |m| on_interface(m, range_leaf(m, "port_priority", "value", "vlan")),
            )
            .setval(|v| Ok(format!("spanning-tree vlan {} port-priority {}", v.req("vlan")?, v.req("value")?))),
            Rule::new(
                "mst_cost",
                r"^\s+spanning-tree\smst\s(?P<instance>[\d,-]+)\scost\s(?P<value>\d+)$",
                |m| on_interface(m, range_leaf(m, "mst_cost", "value", "instance")),
            )
            .setval(|v| Ok(format!("spanning-tree mst {} cost {}", v.req("instance")?, v.req("value")?))),
            Rule::new("portfast", r"^\s+spanning-tree\sportfast(?:\s(?P<opt>trunk|disable))?$", |m| {
                on_interface(m, Obj::new().with("portfast", m.get("opt").unwrap_or("enable")).build())
            })
            .setval(|v| match v.req("portfast")?.as_str() {
                "enable" => Ok("spanning-tree portfast".to_string()),
                opt => Ok(format!("spanning-tree portfast {}", opt)),
            })
            .remval(|_| Ok("no spanning-tree portfast".to_string())),
            Rule::new("bpduguard", r"^\s+spanning-tree\sbpduguard\s(?P<v>enable|disable)$", |m| {
                on_interface(m, Obj::new().with("bpduguard", m.get("v")).build())
            })
            .setval(|v| Ok(format!("spanning-tree bpduguard {}", v.req("bpduguard")?)))
            .remval(|_| Ok("no spanning-tree bpduguard".to_string())),
            Rule::new("bpdufilter", r"^\s+spanning-tree\sbpdufilter\s(?P<v>enable|disable)$", |m| {
                on_interface(m, Obj::new().with("bpdufilter", m.get("v")).build())
            })
            .setval(|v| Ok(format!("spanning-tree bpdufilter {}", v.req("bpdufilter")?)))
            .remval(|_| Ok("no spanning-tree bpdufilter".to_string())),
            Rule::new("guard", r"^\s+spanning-tree\sguard\s(?P<v>loop|root|none)$", |m| {
                on_interface(m, Obj::new().with("guard", m.get("v")).build())
            })
            .setval(|v| Ok(format!("spanning-tree guard {}", v.req("guard")?)))
            .remval(|_| Ok("no spanning-tree guard".to_string())),
            Rule::new("link_type", r"^\s+spanning-tree\slink-type\s(?P<v>point-to-point|shared)$", |m| {
                on_interface(m, Obj::new().with("link_type", m.get("v")).build())
            })
            .setval(|v| Ok(format!("spanning-tree link-type {}", v.req("link_type")?)))
            .remval(|_| Ok("no spanning-tree link-type".to_string())),
            // Any other top-level line closes the current block
            Rule::new("block_end", r"^\S", |_| Node::map()).shared(),
        ],
    )
});

const GLOBAL_PARSERS: &[&str] = &[
    "loopguard_default",
    "logging",
    "extend_system_id",
    "pathcost_method",
    "portfast.default",
    "portfast.bpduguard_default",
    "portfast.bpdufilter_default",
];

const MST_PARSERS: &[&str] = &["mst.max_hops"];

const MST_CONFIG_PARSERS: &[&str] = &["mst.configuration.name", "mst.configuration.revision"];

const INTERFACE_PARSERS: &[&str] = &["portfast", "bpduguard", "bpdufilter", "guard", "link_type"];

/// A list of entries keyed by value whose members form a range set
struct RangeList {
    /// Path of the keyed map in its parent
    path: &'static str,
    parser: &'static str,
    key: &'static str,
    member: &'static str,
}

const fn range_list(path: &'static str, parser: &'static str, key: &'static str, member: &'static str) -> RangeList {
    RangeList {
        path,
        parser,
        key,
        member,
    }
}

const GLOBAL_RANGES: &[RangeList] = &[
    range_list("forward_time", "forward_time", "value", "vlan"),
    range_list("hello_time", "hello_time", "value", "vlan"),
    range_list("max_age", "max_age", "value", "vlan"),
    range_list("priority", "priority", "value", "vlan"),
];

const MST_RANGES: &[RangeList] = &[range_list("mst.priority", "mst.priority", "value", "instance")];

const MST_CONFIG_RANGES: &[RangeList] = &[range_list(
    "mst.configuration.instances",
    "mst.configuration.instances",
    "id",
    "vlan",
)];

const INTERFACE_RANGES: &[RangeList] = &[
    range_list("cost", "cost", "value", "vlan"),
    range_list("port_priority", "port_priority", "value", "vlan"),
];

const INTERFACE_MST_RANGES: &[RangeList] = &[range_list("mst_cost", "mst_cost", "value", "instance")];

/// Fragment for one `<members> <keyword> <value>` line, keyed by value
fn range_leaf(m: &Match<'_>, field: &str, key: &str, member: &str) -> Node {
    match (m.get(key), m.get(member)) {
        (Some(k), Some(members)) => Node::nest(
            &[field, k],
            Obj::new()
                .with(key, m.int(key))
                .with(member, Node::List(vec![Node::from(members)]))
                .build(),
        ),
        _ => Node::map(),
    }
}

fn on_interface(m: &Match<'_>, leaf: Node) -> Node {
    match m.get("name") {
        Some(name) => Node::nest(&["interfaces", name], leaf),
        None => Node::map(),
    }
}

fn mst_config(m: &Match<'_>, leaf: Node) -> Node {
    match m.get("mstcfg") {
        Some(_) => Node::nest(&["mst", "configuration"], leaf),
        None => Node::map(),
    }
}

/// Which part of `have` a `deleted` run removes
#[derive(Clone, Copy)]
enum Scope<'a> {
    All,
    Named(&'a Node),
}

impl<'a> Scope<'a> {
    fn of(want: &'a Node) -> Self {
        if want.is_empty() {
            Scope::All
        } else {
            Scope::Named(want)
        }
    }

    /// An interface entry that names nothing but itself selects all of it
    fn of_interface(want: Option<&'a Node>) -> Self {
        match want {
            Some(entry) if entry.as_map().is_some_and(|m| m.keys().any(|k| k != "name")) => Scope::Named(entry),
            _ => Scope::All,
        }
    }
}

type Groups = IndexMap<String, (Node, RangeSet)>;

fn range_groups(list: Option<&Node>, rl: &RangeList) -> Result<Groups> {
    let mut groups = Groups::new();
    for (k, entry) in list.and_then(Node::as_map).into_iter().flatten() {
        let value = entry.get(rl.key).cloned().unwrap_or_else(|| Node::Str(k.clone()));
        let set = entry
            .str_at(rl.member)
            .map_or_else(|| Ok(RangeSet::new()), ranges::parse)?;
        groups.insert(k.clone(), (value, set));
    }
    Ok(groups)
}

fn emit(d: &mut Differ<'_>, rl: &RangeList, value: &Node, set: &RangeSet, negate: bool) -> Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    let data = Obj::new()
        .with(rl.key, value.clone())
        .with(rl.member, ranges::render(set))
        .build();
    d.addcmd(&data, rl.parser, negate)
}

/// Reconcile one value-keyed range list.
///
/// - merged: each value's set becomes the union with the current one
/// - replaced/overridden: members no longer wanted are removed and the
///   wanted set re-asserted; values only in `have` are removed
/// - deleted: the named members are removed, or everything for
///   [`Scope::All`]
fn compare_ranges(d: &mut Differ<'_>, rl: &RangeList, want: &Node, have: &Node, scope: Option<Scope<'_>>) -> Result<()> {
    let h = range_groups(have.get_path(rl.path), rl)?;

    if d.state() == State::Deleted {
        let w = match scope {
            Some(Scope::Named(selector)) => match selector.get_path(rl.path) {
                Some(list) => Some(range_groups(Some(list), rl)?),
                None => return Ok(()),
            },
            _ => None,
        };
        for (k, (value, hs)) in &h {
            let removed: RangeSet = match &w {
                None => hs.clone(),
                Some(w) => match w.get(k) {
                    Some((_, ws)) => hs.intersection(ws).copied().collect(),
                    None => continue,
                },
            };
            let survivors: RangeSet = hs.difference(&removed).copied().collect();
            if survivors != *hs {
                emit(d, rl, value, &removed, true)?;
            }
        }
        return Ok(());
    }

    let w = range_groups(want.get_path(rl.path), rl)?;
    match d.state() {
        State::Merged => {
            for (k, (value, ws)) in &w {
                let current = h.get(k).map(|(_, hs)| hs);
                let union: RangeSet = ws.union(current.unwrap_or(&RangeSet::new())).copied().collect();
                if Some(&union) != current {
                    emit(d, rl, value, &union, false)?;
                }
            }
        }
        _ => {
            for (k, (value, ws)) in &w {
                match h.get(k) {
                    Some((_, hs)) if hs == ws => {}
                    Some((_, hs)) => {
                        let removed: RangeSet = hs.difference(ws).copied().collect();
                        emit(d, rl, value, &removed, true)?;
                        emit(d, rl, value, ws, false)?;
                    }
                    None => emit(d, rl, value, ws, false)?,
                }
            }
            for (k, (value, hs)) in &h {
                if !w.contains_key(k) {
                    emit(d, rl, value, hs, true)?;
                }
            }
        }
    }
    Ok(())
}

fn has_mst_settings(want: &Node) -> bool {
    want.get("mst").is_some_and(|m| !m.is_empty())
        || want
            .get("interfaces")
            .and_then(Node::as_map)
            .is_some_and(|intfs| intfs.values().any(|i| i.get("mst_cost").is_some()))
}

/// Spanning-tree resource
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanningTree;

impl SpanningTree {
    fn compare_globals(d: &mut Differ<'_>, want: &Node, have: &Node, scope: Option<Scope<'_>>, mst: bool) -> Result<()> {
        let empty = Node::map();
        let (want, have_sel) = match scope {
            Some(Scope::Named(selector)) => (&empty, restrict(have, selector)),
            Some(Scope::All) => (&empty, have.clone()),
            None => (want, have.clone()),
        };

        d.compare(GLOBAL_PARSERS, want, &have_sel)?;
        for rl in GLOBAL_RANGES {
            compare_ranges(d, rl, want, have, scope)?;
        }
        if !mst {
            return Ok(());
        }
        d.compare(MST_PARSERS, want, &have_sel)?;
        for rl in MST_RANGES {
            compare_ranges(d, rl, want, have, scope)?;
        }
        d.block(&["spanning-tree mst configuration".to_string()], |d| {
            d.compare(MST_CONFIG_PARSERS, want, &have_sel)?;
            for rl in MST_CONFIG_RANGES {
                compare_ranges(d, rl, want, have, scope)?;
            }
            Ok(())
        })
    }

    fn compare_interface(
        d: &mut Differ<'_>,
        name: &str,
        want: &Node,
        have: &Node,
        scope: Option<Scope<'_>>,
        mst: bool,
    ) -> Result<()> {
        let empty = Node::map();
        let (want, have_sel) = match scope {
            Some(Scope::Named(selector)) => (&empty, restrict(have, selector)),
            Some(Scope::All) => (&empty, have.clone()),
            None => (want, have.clone()),
        };
        d.block(&[format!("interface {}", name)], |d| {
            d.compare(INTERFACE_PARSERS, want, &have_sel)?;
            for rl in INTERFACE_RANGES {
                compare_ranges(d, rl, want, have, scope)?;
            }
            if mst {
                for rl in INTERFACE_MST_RANGES {
                    compare_ranges(d, rl, want, have, scope)?;
                }
            }
            Ok(())
        })
    }

    fn compare_interfaces(d: &mut Differ<'_>, want: &Node, have: &Node, mst: bool) -> Result<()> {
        let empty = Node::map();
        let wi = want.get("interfaces").unwrap_or(&empty);
        let hi = have.get("interfaces").unwrap_or(&empty);

        if d.state() != State::Deleted {
            return reconcile_entries(d, wi, hi, |d, name, w, h| {
                Self::compare_interface(d, name, w, h, None, mst)
            });
        }

        let chosen = if want.is_empty() {
            selected(&empty, hi)
        } else if want.get("interfaces").is_some() {
            selected(wi, hi)
        } else {
            Vec::new()
        };
        for (name, h) in chosen {
            let scope = if want.is_empty() {
                Scope::All
            } else {
                Scope::of_interface(wi.get(name))
            };
            Self::compare_interface(d, name, &empty, h, Some(scope), mst)?;
        }
        Ok(())
    }

    fn normalize_ranges(&self, node: &mut Node, lists: &[RangeList]) -> Result<()> {
        for rl in lists {
            let Some(slot) = node.get_path_mut(rl.path) else {
                continue;
            };
            let mut keyed = list_to_dict(self.name(), Some(std::mem::take(slot)), &[rl.key])?;
            for entry in keyed.values_mut() {
                entry.coerce_int(rl.key);
                if let Some(members) = entry.get(rl.member) {
                    let parts: Vec<String> = match members {
                        Node::List(items) => items.iter().filter_map(Node::scalar_string).collect(),
                        other => other.scalar_string().into_iter().collect(),
                    };
                    let set = ranges::union_all(parts.iter().map(String::as_str)).map_err(|e| {
                        Error::invalid_config(self.name(), format!("{}.{}: {}", rl.path, rl.member, e))
                    })?;
                    entry.insert(rl.member, Node::Str(ranges::render(&set)));
                }
            }
            *slot = Node::Map(keyed);
        }
        Ok(())
    }
}

impl Resource for SpanningTree {
    fn name(&self) -> &'static str {
        "ios_spanning_tree"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut tree = match tree {
            Node::Map(_) => tree,
            other => {
                return Err(Error::invalid_config(
                    self.name(),
                    format!("expected a mapping of spanning-tree settings, got {:?}", other),
                ))
            }
        };
        self.normalize_ranges(&mut tree, GLOBAL_RANGES)?;
        self.normalize_ranges(&mut tree, MST_RANGES)?;
        self.normalize_ranges(&mut tree, MST_CONFIG_RANGES)?;
        tree.coerce_int("mst.max_hops");
        tree.coerce_int("mst.configuration.revision");

        if let Some(slot) = tree.get_path_mut("interfaces") {
            let keyed = list_to_dict(self.name(), Some(std::mem::take(slot)), &["name"])?;
            let mut interfaces = NodeMap::new();
            for (_, mut entry) in keyed {
                let Some(name) = entry.str_at("name").map(normalize_interface) else {
                    continue;
                };
                entry.insert("name", Node::Str(name.clone()));
                self.normalize_ranges(&mut entry, INTERFACE_RANGES)?;
                self.normalize_ranges(&mut entry, INTERFACE_MST_RANGES)?;
                interfaces.insert(name, entry);
            }
            *slot = Node::Map(interfaces);
        }
        Ok(tree)
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        let effective = match state {
            State::Merged => Node::merged(have, want),
            State::Replaced | State::Overridden | State::Rendered | State::Deleted => want.clone(),
            State::Gathered | State::Parsed | State::Purged => return Ok(d.finish()),
        };
        let mst = match state {
            State::Deleted => have.str_at("mode") == Some("mst"),
            _ => effective.str_at("mode") == Some("mst"),
        };
        if state == State::Merged && !mst && has_mst_settings(want) {
            d.warn("MST settings were ignored because spanning-tree mode is not mst");
        }

        let start = d.len();
        let scope = (state == State::Deleted).then(|| Scope::of(want));
        Self::compare_globals(&mut d, &effective, have, scope, mst)?;

        // A mode change goes first, a mode removal last
        let mode_at = d.len();
        match scope {
            Some(Scope::Named(selector)) => d.compare(&["mode"], &Node::map(), &restrict(have, selector))?,
            Some(Scope::All) => d.compare(&["mode"], &Node::map(), have)?,
            None => d.compare(&["mode"], &effective, have)?,
        }
        let (removals, changes): (Vec<String>, Vec<String>) =
            d.split_off(mode_at).into_iter().partition(|c| c.starts_with("no "));
        for (offset, command) in changes.into_iter().enumerate() {
            d.insert(start + offset, command);
        }

        Self::compare_interfaces(&mut d, &effective, have, mst)?;
        for command in removals {
            d.push(command);
        }
        Ok(d.finish())
    }
}
