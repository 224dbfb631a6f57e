//! `ios_bgp_address_family`: address families under `router bgp`.
//!
//! Address families are keyed by `afi[_safi][_vrf]` (`unicast` is implied
//! and never part of the key). Neighbors inside a family are keyed by
//! address, their route-maps and prefix-lists by direction.

use crate::error::{Error, Result};
use crate::resource::compare::{reconcile_entries, selected};
use crate::resource::facts::{for_each_entry, key_field, list_to_dict};
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Match, Node, NodeMap, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

type RenderResult = std::result::Result<String, MissingField>;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_bgp_address_family",
        vec![
            Rule::new("as_number", r"^router\sbgp\s(?P<as_number>\d+(?:\.\d+)?)$", |m| {
                Obj::new().with("as_number", m.get("as_number")).build()
            })
            .setval(|v| Ok(format!("router bgp {}", v.req("as_number")?)))
            .shared(),
            Rule::new(
                "address_family",
                r"^\s+address-family\s(?P<afi>\S+)(?:\s(?P<safi>unicast|multicast|mdt|flowspec|evpn|vpls|labeled-unicast|mvpn))?(?:\svrf\s(?P<vrf>\S+))?$",
                |m| {
                    on_af(
                        m,
                        Obj::new()
                            .with("afi", m.get("afi"))
                            .with("safi", m.get("safi").filter(|s| *s != "unicast"))
                            .with("vrf", m.get("vrf"))
                            .build(),
                    )
                },
            )
            .setval(render_address_family)
            .shared(),
            // Neighbor rules go from specific to general; the bare
            // `neighbor` rule must stay last.
            Rule::new(
                "remote_as",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sremote-as\s(?P<remote_as>\S+)$",
                |m| on_neighbor(m, Obj::new().with("remote_as", m.get("remote_as"))),
            )
            .setval(|v| Ok(format!("neighbor {} remote-as {}", v.req("address")?, v.req("remote_as")?))),
            Rule::new("activate", r"^\s{2,}neighbor\s(?P<address>\S+)\sactivate$", |m| {
                on_neighbor(m, Obj::new().with("activate", true))
            })
            .setval(|v| Ok(format!("neighbor {} activate", v.req("address")?))),
            Rule::new(
                "nexthop_self",
                r"^\s{2,}neighbor\s(?P<address>\S+)\snext-hop-self(?P<all>\sall)?$",
                |m| {
                    let flag = if m.matched("all") { "all" } else { "set" };
                    on_neighbor(m, Obj::new().with("nexthop_self", Obj::new().with(flag, true)))
                },
            )
            .setval(render_nexthop_self),
            Rule::new(
                "route_reflector_client",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sroute-reflector-client$",
                |m| on_neighbor(m, Obj::new().with("route_reflector_client", true)),
            )
            .setval(|v| Ok(format!("neighbor {} route-reflector-client", v.req("address")?))),
            Rule::new(
                "send_community",
                r"^\s{2,}neighbor\s(?P<address>\S+)\ssend-community(?:\s(?P<kind>both|standard|extended))?$",
                |m| {
                    let flag = m.get("kind").unwrap_or("set");
                    on_neighbor(m, Obj::new().with("send_community", Obj::new().with(flag, true)))
                },
            )
            .setval(render_send_community),
            Rule::new(
                "soft_reconfiguration",
                r"^\s{2,}neighbor\s(?P<address>\S+)\ssoft-reconfiguration\sinbound$",
                |m| on_neighbor(m, Obj::new().with("soft_reconfiguration", true)),
            )
            .setval(|v| Ok(format!("neighbor {} soft-reconfiguration inbound", v.req("address")?))),
            Rule::new(
                "default_originate",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sdefault-originate(?:\sroute-map\s(?P<rm>\S+))?$",
                |m| {
                    on_neighbor(
                        m,
                        Obj::new().with(
                            "default_originate",
                            Obj::new().with("set", true).with("route_map", m.get("rm")),
                        ),
                    )
                },
            )
            .setval(render_default_originate),
            Rule::new(
                "maximum_prefix",
                r"^\s{2,}neighbor\s(?P<address>\S+)\smaximum-prefix\s(?P<max>\d+)(?:\s(?P<threshold>\d+))?(?P<warning>\swarning-only)?$",
                |m| {
                    on_neighbor(
                        m,
                        Obj::new().with(
                            "maximum_prefix",
                            Obj::new()
                                .with("number", m.int("max"))
                                .with("threshold", m.int("threshold"))
                                .flag("warning_only", m.matched("warning")),
                        ),
                    )
                },
            )
            .setval(render_maximum_prefix),
            Rule::new("weight", r"^\s{2,}neighbor\s(?P<address>\S+)\sweight\s(?P<weight>\d+)$", |m| {
                on_neighbor(m, Obj::new().with("weight", m.int("weight")))
            })
            .setval(|v| Ok(format!("neighbor {} weight {}", v.req("address")?, v.req("weight")?))),
            Rule::new(
                "description",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sdescription\s(?P<description>.+)$",
                |m| on_neighbor(m, Obj::new().with("description", m.get("description"))),
            )
            .setval(|v| Ok(format!("neighbor {} description {}", v.req("address")?, v.req("description")?))),
            Rule::new(
                "route_maps",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sroute-map\s(?P<name>\S+)\s(?P<dir>in|out)$",
                |m| on_neighbor(m, Obj::new().with("route_maps", direction_entry(m))),
            )
            .setval(|v| {
                Ok(format!(
                    "neighbor {} route-map {} {}",
                    v.req("address")?,
                    v.req("name")?,
                    v.req("direction")?
                ))
            }),
            Rule::new(
                "prefix_lists",
                r"^\s{2,}neighbor\s(?P<address>\S+)\sprefix-list\s(?P<name>\S+)\s(?P<dir>in|out)$",
                |m| on_neighbor(m, Obj::new().with("prefix_lists", direction_entry(m))),
            )
            .setval(|v| {
                Ok(format!(
                    "neighbor {} prefix-list {} {}",
                    v.req("address")?,
                    v.req("name")?,
                    v.req("direction")?
                ))
            }),
            Rule::new("neighbor", r"^\s{2,}neighbor\s(?P<address>\S+)\s\S.*$", |m| on_neighbor(m, Obj::new())),
            Rule::new(
                "networks",
                r"^\s{2,}network\s(?P<address>\S+)(?:\smask\s(?P<mask>\S+))?(?:\sroute-map\s(?P<rm>\S+))?(?P<backdoor>\sbackdoor)?$",
                |m| {
                    let Some(address) = m.get("address") else {
                        return Node::map();
                    };
                    let key = match m.get("mask") {
                        Some(mask) => format!("{}_{}", address, mask),
                        None => address.to_string(),
                    };
                    on_af(
                        m,
                        Node::nest(
                            &["networks", key.as_str()],
                            Obj::new()
                                .with("address", address)
                                .with("mask", m.get("mask"))
                                .with("route_map", m.get("rm"))
                                .flag("backdoor", m.matched("backdoor"))
                                .build(),
                        ),
                    )
                },
            )
            .setval(render_network),
            Rule::new(
                "aggregate_addresses",
                r"^\s{2,}aggregate-address\s(?P<address>\S+)\s(?P<netmask>\S+)(?P<as_set>\sas-set)?(?P<summary_only>\ssummary-only)?(?:\sattribute-map\s(?P<attr>\S+))?$",
                |m| match (m.get("address"), m.get("netmask")) {
                    (Some(address), Some(netmask)) => on_af(
                        m,
                        Node::nest(
                            &["aggregate_addresses", format!("{}_{}", address, netmask).as_str()],
                            Obj::new()
                                .with("address", address)
                                .with("netmask", netmask)
                                .flag("as_set", m.matched("as_set"))
                                .flag("summary_only", m.matched("summary_only"))
                                .with("attribute_map", m.get("attr"))
                                .build(),
                        ),
                    ),
                    _ => Node::map(),
                },
            )
            .setval(render_aggregate),
            Rule::new("default_information", r"^\s{2,}default-information\soriginate$", |m| {
                on_af(m, Node::nest(&["default_information", "originate"], Node::Bool(true)))
            })
            .setval(|_| Ok("default-information originate".to_string()))
            .compval("default_information.originate"),
            Rule::new("maximum_paths.ibgp", r"^\s{2,}maximum-paths\sibgp\s(?P<paths>\d+)$", |m| {
                on_af(m, Node::nest(&["maximum_paths"], Obj::new().with("ibgp", m.int("paths")).build()))
            })
            .setval(|v| Ok(format!("maximum-paths ibgp {}", v.req("maximum_paths.ibgp")?))),
            Rule::new("maximum_paths.paths", r"^\s{2,}maximum-paths\s(?P<paths>\d+)$", |m| {
                on_af(m, Node::nest(&["maximum_paths"], Obj::new().with("paths", m.int("paths")).build()))
            })
            .setval(|v| Ok(format!("maximum-paths {}", v.req("maximum_paths.paths")?))),
            Rule::new("block_end", r"^\S", |_| Node::map()).shared(),
        ],
    )
});

const AF_PARSERS: &[&str] = &["default_information", "maximum_paths.paths", "maximum_paths.ibgp"];

const NEIGHBOR_PARSERS: &[&str] = &[
    "remote_as",
    "activate",
    "nexthop_self",
    "route_reflector_client",
    "send_community",
    "soft_reconfiguration",
    "default_originate",
    "maximum_prefix",
    "weight",
    "description",
];

/// Neighbor attributes that are flag maps (`{set: true}`, `{all: true}`)
const NEIGHBOR_FLAG_MAPS: &[&str] = &["nexthop_self", "send_community", "default_originate"];

fn af_key(afi: &str, safi: Option<&str>, vrf: Option<&str>) -> String {
    let mut parts = vec![afi];
    parts.extend(safi.filter(|s| *s != "unicast"));
    parts.extend(vrf);
    parts.join("_")
}

fn on_af(m: &Match<'_>, leaf: Node) -> Node {
    match m.get("afi") {
        Some(afi) => {
            let key = af_key(afi, m.get("safi"), m.get("vrf"));
            Node::nest(&["address_family", key.as_str()], leaf)
        }
        None => Node::map(),
    }
}

fn on_neighbor(m: &Match<'_>, leaf: Obj) -> Node {
    match m.get("address") {
        Some(address) => on_af(m, Node::nest(&["neighbors", address], leaf.with("address", address).build())),
        None => Node::map(),
    }
}

fn direction_entry(m: &Match<'_>) -> Node {
    match m.get("dir") {
        Some(dir) => Node::nest(
            &[dir],
            Obj::new().with("name", m.get("name")).with("direction", dir).build(),
        ),
        None => Node::map(),
    }
}

fn render_address_family(v: &Node) -> RenderResult {
    let mut line = format!("address-family {}", v.req("afi")?);
    if let Some(safi) = v.opt("safi") {
        line.push(' ');
        line.push_str(&safi);
    }
    if let Some(vrf) = v.opt("vrf") {
        line.push_str(" vrf ");
        line.push_str(&vrf);
    }
    Ok(line)
}

fn render_nexthop_self(v: &Node) -> RenderResult {
    let address = v.req("address")?;
    if v.flag("nexthop_self.all") {
        Ok(format!("neighbor {} next-hop-self all", address))
    } else if v.flag("nexthop_self.set") {
        Ok(format!("neighbor {} next-hop-self", address))
    } else {
        Err(MissingField("nexthop_self".to_string()))
    }
}

fn render_send_community(v: &Node) -> RenderResult {
    let address = v.req("address")?;
    for kind in ["both", "standard", "extended"] {
        if v.flag(&format!("send_community.{}", kind)) {
            return Ok(format!("neighbor {} send-community {}", address, kind));
        }
    }
    if v.flag("send_community.set") {
        Ok(format!("neighbor {} send-community", address))
    } else {
        Err(MissingField("send_community".to_string()))
    }
}

fn render_default_originate(v: &Node) -> RenderResult {
    let mut line = format!("neighbor {} default-originate", v.req("address")?);
    match v.opt("default_originate.route_map") {
        Some(rm) => {
            line.push_str(" route-map ");
            line.push_str(&rm);
        }
        None if !v.flag("default_originate.set") => {
            return Err(MissingField("default_originate".to_string()))
        }
        None => {}
    }
    Ok(line)
}

fn render_maximum_prefix(v: &Node) -> RenderResult {
    let mut line = format!(
        "neighbor {} maximum-prefix {}",
        v.req("address")?,
        v.req("maximum_prefix.number")?
    );
    if let Some(threshold) = v.opt("maximum_prefix.threshold") {
        line.push(' ');
        line.push_str(&threshold);
    }
    if v.flag("maximum_prefix.warning_only") {
        line.push_str(" warning-only");
    }
    Ok(line)
}

fn render_network(v: &Node) -> RenderResult {
    let mut line = format!("network {}", v.req("address")?);
    if let Some(mask) = v.opt("mask") {
        line.push_str(" mask ");
        line.push_str(&mask);
    }
    if let Some(rm) = v.opt("route_map") {
        line.push_str(" route-map ");
        line.push_str(&rm);
    }
    if v.flag("backdoor") {
        line.push_str(" backdoor");
    }
    Ok(line)
}

fn render_aggregate(v: &Node) -> RenderResult {
    let mut line = format!("aggregate-address {} {}", v.req("address")?, v.req("netmask")?);
    if v.flag("as_set") {
        line.push_str(" as-set");
    }
    if v.flag("summary_only") {
        line.push_str(" summary-only");
    }
    if let Some(map) = v.opt("attribute_map") {
        line.push_str(" attribute-map ");
        line.push_str(&map);
    }
    Ok(line)
}

/// An entry tagged with its neighbor address, or empty when absent
fn for_neighbor(entry: &Node, address: &str) -> Node {
    if entry.is_empty() {
        return Node::map();
    }
    let mut tagged = entry.clone();
    tagged.insert("address", Node::from(address));
    tagged
}

/// Keep only the `true` flags of a flag map
fn drop_false_flags(entry: &mut Node, path: &str) {
    if let Some(map) = entry.get_path_mut(path).and_then(Node::as_map_mut) {
        map.retain(|_, v| v.as_bool() != Some(false));
    }
}

/// A default-originate route map implies the bare flag, which is how the
/// device line parses back.
fn complete_default_originate(neighbor: &mut Node) {
    let Some(slot) = neighbor.get_path_mut("default_originate") else {
        return;
    };
    if slot.as_bool() == Some(true) {
        *slot = Obj::new().with("set", true).build();
    } else if slot.get("route_map").is_some() {
        slot.insert("set", Node::Bool(true));
    }
}

/// Key a per-direction list (`[{name, in: true}]` or `[{name, direction}]`)
fn key_by_direction(resource: &str, entry: &mut Node, field: &str) -> Result<()> {
    let Some(slot) = entry.get_path_mut(field) else {
        return Ok(());
    };
    let items: Vec<Node> = match std::mem::take(slot) {
        Node::List(items) => items,
        Node::Map(map) => map.into_values().collect(),
        other => {
            return Err(Error::invalid_config(
                resource,
                format!("{}: expected a list, got {:?}", field, other),
            ))
        }
    };
    let mut keyed = NodeMap::new();
    for mut item in items {
        let direction = match item.opt("direction") {
            Some(dir) => dir,
            None if item.flag("in") => "in".to_string(),
            None if item.flag("out") => "out".to_string(),
            None => {
                return Err(Error::invalid_config(
                    resource,
                    format!("{}: entry needs a direction (in or out)", field),
                ))
            }
        };
        item.remove("in");
        item.remove("out");
        item.insert("direction", Node::Str(direction.clone()));
        keyed.insert(direction, item);
    }
    *slot = Node::Map(keyed);
    Ok(())
}

/// Rewrite legacy neighbor fields into their current shape. The current
/// field wins when both are given.
fn upgrade_neighbor(neighbor: &mut Node) {
    if let Some(address) = neighbor.remove("neighbor_address") {
        if neighbor.get("address").is_none() {
            neighbor.insert("address", address);
        }
    }
    if let Some(legacy) = neighbor.remove("next_hop_self") {
        if neighbor.get("nexthop_self").is_none() {
            if let Some(set) = legacy.as_bool() {
                neighbor.insert("nexthop_self", Obj::new().with("all", set).build());
            }
        }
    }
    for (legacy, current) in [("route_map", "route_maps"), ("prefix_list", "prefix_lists")] {
        if let Some(value) = neighbor.remove(legacy) {
            if neighbor.get(current).is_none() {
                let items = match value {
                    Node::List(items) => Node::List(items),
                    other => Node::List(vec![other]),
                };
                neighbor.insert(current, items);
            }
        }
    }
}

/// BGP address family resource
#[derive(Debug, Clone, Copy, Default)]
pub struct BgpAddressFamily;

impl BgpAddressFamily {
    fn normalize_tree(&self, tree: Node, want: bool) -> Result<Node> {
        let mut tree = match tree {
            Node::Map(_) => tree,
            other => {
                return Err(Error::invalid_config(
                    self.name(),
                    format!("expected a mapping with as_number and address_family, got {:?}", other),
                ))
            }
        };
        tree.coerce_str("as_number");

        if let Some(slot) = tree.get_path_mut("address_family") {
            let mut families = std::mem::take(slot);
            match &mut families {
                Node::List(items) => items.iter_mut().for_each(drop_unicast),
                Node::Map(map) => map.values_mut().for_each(drop_unicast),
                _ => {}
            }
            *slot = Node::Map(list_to_dict(self.name(), Some(families), &["afi", "safi", "vrf"])?);
        }

        for_each_entry(&mut tree, "address_family", |af| {
            if want {
                match af.get_path_mut("neighbors") {
                    Some(Node::List(neighbors)) => neighbors.iter_mut().for_each(upgrade_neighbor),
                    Some(Node::Map(neighbors)) => neighbors.values_mut().for_each(upgrade_neighbor),
                    _ => {}
                }
            }
            key_field(self.name(), af, "neighbors", &["address"])?;
            key_field(self.name(), af, "networks", &["address", "mask"])?;
            key_field(self.name(), af, "aggregate_addresses", &["address", "netmask"])?;
            af.coerce_int("maximum_paths.paths");
            af.coerce_int("maximum_paths.ibgp");
            if let Some(neighbors) = af.get_path_mut("neighbors").and_then(Node::as_map_mut) {
                for neighbor in neighbors.values_mut() {
                    neighbor.coerce_str("remote_as");
                    neighbor.coerce_int("weight");
                    neighbor.coerce_int("maximum_prefix.number");
                    neighbor.coerce_int("maximum_prefix.threshold");
                    for path in NEIGHBOR_FLAG_MAPS {
                        drop_false_flags(neighbor, path);
                    }
                    complete_default_originate(neighbor);
                    key_by_direction(self.name(), neighbor, "route_maps")?;
                    key_by_direction(self.name(), neighbor, "prefix_lists")?;
                }
            }
            Ok(())
        })?;
        Ok(tree)
    }

    fn compare_neighbor(d: &mut Differ<'_>, address: &str, want: &Node, have: &Node) -> Result<()> {
        let start = d.len();
        let want = for_neighbor(want, address);
        let have = for_neighbor(have, address);
        d.compare(NEIGHBOR_PARSERS, &want, &have)?;
        for list in ["route_maps", "prefix_lists"] {
            d.compare_keyed(want.get(list), have.get(list), |d, _, w, h| {
                d.compare_entry(list, &for_neighbor(w, address), &for_neighbor(h, address))
            })?;
        }
        // The session is deactivated before its remote-as goes away
        d.order_after(
            start,
            &format!("no neighbor {} activate", address),
            &format!("no neighbor {} remote-as ", address),
        );
        Ok(())
    }

    fn compare_af(d: &mut Differ<'_>, _key: &str, want: &Node, have: &Node) -> Result<()> {
        let ident = if want.get("afi").is_some() { want } else { have };
        let anchor = d.table().render(ident, "address_family", false)?;
        d.block(&anchor, |d| {
            d.compare(AF_PARSERS, want, have)?;
            for list in ["networks", "aggregate_addresses"] {
                d.compare_keyed(want.get(list), have.get(list), |d, _, w, h| d.compare_entry(list, w, h))?;
            }
            d.compare_keyed(want.get("neighbors"), have.get("neighbors"), Self::compare_neighbor)
        })
    }
}

fn drop_unicast(af: &mut Node) {
    if af.str_at("safi") == Some("unicast") {
        af.remove("safi");
    }
}

impl Resource for BgpAddressFamily {
    fn name(&self) -> &'static str {
        "ios_bgp_address_family"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        self.normalize_tree(tree, false)
    }

    fn normalize_want(&self, want: Node) -> Result<Node> {
        self.normalize_tree(want, true)
    }

    fn supports_purged(&self) -> bool {
        true
    }

    fn validate(&self, want: &Node, have: &Node, state: State) -> Result<()> {
        if !matches!(state, State::Merged | State::Replaced | State::Overridden) {
            return Ok(());
        }
        match (want.str_at("as_number"), have.str_at("as_number")) {
            (Some(w), Some(h)) if w != h => Err(Error::invalid_config(
                self.name(),
                format!("Only one bgp instance is allowed per device (configured {}, requested {})", h, w),
            )),
            _ => Ok(()),
        }
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        let as_number = match state {
            State::Deleted | State::Purged => have.str_at("as_number"),
            _ => want.str_at("as_number").or_else(|| have.str_at("as_number")),
        };
        let empty = Node::map();
        let want_afs = want.get("address_family").unwrap_or(&empty);
        let have_afs = have.get("address_family").unwrap_or(&empty);

        let Some(as_number) = as_number else {
            if want_afs.is_empty() || matches!(state, State::Deleted | State::Purged) {
                return Ok(d.finish());
            }
            return Err(Error::invalid_config(self.name(), "as_number is required"));
        };

        d.block(&[format!("router bgp {}", as_number)], |d| {
            if state == State::Purged {
                for (_, af) in selected(want_afs, have_afs) {
                    d.addcmd(af, "address_family", true)?;
                }
                Ok(())
            } else {
                reconcile_entries(d, want_afs, have_afs, Self::compare_af)
            }
        })?;
        Ok(d.finish())
    }
}
