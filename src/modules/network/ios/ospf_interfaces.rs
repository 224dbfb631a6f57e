//! `ios_ospf_interfaces`: per-interface OSPFv2/OSPFv3 settings.
//!
//! Interfaces hold an `address_family` map keyed by AFI (`ipv4`, `ipv6`).
//! Commands use the `ip ospf` or `ipv6 ospf` prefix of their family.

use super::{afi_keyword, afi_name, interface_anchor, key_interfaces};
use crate::error::{Error, Result};
use crate::resource::compare::reconcile_entries;
use crate::resource::facts::key_field;
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Match, Node, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_ospf_interfaces",
        vec![
            interface_anchor(),
            Rule::new(
                "process",
                r"^\s+(?P<afi>ip|ipv6)\sospf\s(?P<id>\d+)\sarea\s(?P<area>\S+)(?P<secondaries>\ssecondaries\snone)?(?:\sinstance\s(?P<instance>\d+))?$",
                |m| {
                    let mut process = Obj::new()
                        .with("id", m.int("id"))
                        .with("area_id", m.get("area"))
                        .with("instance", m.int("instance"));
                    if m.matched("secondaries") {
                        process = process.with("secondaries", false);
                    }
                    on_af(m, Obj::new().with("process", process).build())
                },
            )
            .setval(render_process),
            Rule::new("cost", r"^\s+(?P<afi>ip|ipv6)\sospf\scost\s(?P<v>\d+)$", |m| int_field(m, "cost"))
                .setval(|v| Ok(format!("{} ospf cost {}", prefix(v)?, v.req("cost")?))),
            Rule::new(
                "hello_interval",
                r"^\s+(?P<afi>ip|ipv6)\sospf\shello-interval\s(?P<v>\d+)$",
                |m| int_field(m, "hello_interval"),
            )
            .setval(|v| Ok(format!("{} ospf hello-interval {}", prefix(v)?, v.req("hello_interval")?))),
            Rule::new(
                "dead_interval",
                r"^\s+(?P<afi>ip|ipv6)\sospf\sdead-interval\s(?P<v>\d+)$",
                |m| int_field(m, "dead_interval"),
            )
            .setval(|v| Ok(format!("{} ospf dead-interval {}", prefix(v)?, v.req("dead_interval")?))),
            Rule::new("priority", r"^\s+(?P<afi>ip|ipv6)\sospf\spriority\s(?P<v>\d+)$", |m| {
                int_field(m, "priority")
            })
            .setval(|v| Ok(format!("{} ospf priority {}", prefix(v)?, v.req("priority")?))),
            Rule::new(
                "transmit_delay",
                r"^\s+(?P<afi>ip|ipv6)\sospf\stransmit-delay\s(?P<v>\d+)$",
                |m| int_field(m, "transmit_delay"),
            )
            .setval(|v| Ok(format!("{} ospf transmit-delay {}", prefix(v)?, v.req("transmit_delay")?))),
            Rule::new(
                "retransmit_interval",
                r"^\s+(?P<afi>ip|ipv6)\sospf\sretransmit-interval\s(?P<v>\d+)$",
                |m| int_field(m, "retransmit_interval"),
            )
            .setval(|v| {
                Ok(format!(
                    "{} ospf retransmit-interval {}",
                    prefix(v)?,
                    v.req("retransmit_interval")?
                ))
            }),
            Rule::new(
                "network",
                r"^\s+(?P<afi>ip|ipv6)\sospf\snetwork\s(?P<v>broadcast|non-broadcast|point-to-multipoint|point-to-point)$",
                |m| on_af(m, Obj::new().with("network", m.get("v")).build()),
            )
            .setval(|v| Ok(format!("{} ospf network {}", prefix(v)?, v.req("network")?))),
            Rule::new("mtu_ignore", r"^\s+(?P<afi>ip|ipv6)\sospf\smtu-ignore$", |m| {
                on_af(m, Obj::new().with("mtu_ignore", true).build())
            })
            .setval(|v| Ok(format!("{} ospf mtu-ignore", prefix(v)?))),
            Rule::new("shutdown", r"^\s+(?P<afi>ip|ipv6)\sospf\sshutdown$", |m| {
                on_af(m, Obj::new().with("shutdown", true).build())
            })
            .setval(|v| Ok(format!("{} ospf shutdown", prefix(v)?))),
            Rule::new("bfd", r"^\s+(?P<afi>ip|ipv6)\sospf\sbfd$", |m| {
                on_af(m, Obj::new().with("bfd", true).build())
            })
            .setval(|v| Ok(format!("{} ospf bfd", prefix(v)?))),
            Rule::new(
                "authentication",
                r"^\s+(?P<afi>ip)\sospf\sauthentication(?:\s(?P<kind>message-digest|null))?$",
                |m| {
                    let flag = match m.get("kind") {
                        Some("message-digest") => "message_digest",
                        Some(_) => "null",
                        None => "enable",
                    };
                    on_af(m, Node::nest(&["authentication", flag], Node::Bool(true)))
                },
            )
            .setval(render_authentication),
        ],
    )
});

const PARSERS: &[&str] = &[
    "process",
    "cost",
    "hello_interval",
    "dead_interval",
    "priority",
    "transmit_delay",
    "retransmit_interval",
    "network",
    "mtu_ignore",
    "shutdown",
    "bfd",
    "authentication",
];

fn on_af(m: &Match<'_>, leaf: Node) -> Node {
    match (m.get("name"), m.get("afi")) {
        (Some(name), Some(keyword)) => {
            let afi = afi_name(keyword);
            let mut entry = leaf;
            entry.insert("afi", Node::from(afi));
            Node::nest(&[name, "address_family", afi], entry)
        }
        _ => Node::map(),
    }
}

fn int_field(m: &Match<'_>, field: &str) -> Node {
    on_af(m, Obj::new().with(field, m.int("v")).build())
}

fn prefix(v: &Node) -> std::result::Result<&'static str, MissingField> {
    v.str_at("afi")
        .map(afi_keyword)
        .ok_or_else(|| MissingField("afi".to_string()))
}

fn render_process(v: &Node) -> std::result::Result<String, MissingField> {
    let keyword = prefix(v)?;
    let mut line = format!(
        "{} ospf {} area {}",
        keyword,
        v.req("process.id")?,
        v.req("process.area_id")?
    );
    match keyword {
        "ipv6" => {
            if let Some(instance) = v.opt("process.instance") {
                line.push_str(" instance ");
                line.push_str(&instance);
            }
        }
        _ => {
            if v.get_path("process.secondaries").and_then(Node::as_bool) == Some(false) {
                line.push_str(" secondaries none");
            }
        }
    }
    Ok(line)
}

fn render_authentication(v: &Node) -> std::result::Result<String, MissingField> {
    let keyword = prefix(v)?;
    if v.flag("authentication.message_digest") {
        Ok(format!("{} ospf authentication message-digest", keyword))
    } else if v.flag("authentication.null") {
        Ok(format!("{} ospf authentication null", keyword))
    } else if v.flag("authentication.enable") {
        Ok(format!("{} ospf authentication", keyword))
    } else {
        Err(MissingField("authentication".to_string()))
    }
}

/// OSPF interface settings resource
#[derive(Debug, Clone, Copy, Default)]
pub struct OspfInterfaces;

impl OspfInterfaces {
    fn compare_interface(d: &mut Differ<'_>, name: &str, want: &Node, have: &Node) -> Result<()> {
        d.block(&[format!("interface {}", name)], |d| {
            d.compare_keyed(want.get("address_family"), have.get("address_family"), |d, _, w, h| {
                d.compare(PARSERS, w, h)
            })
        })
    }
}

impl Resource for OspfInterfaces {
    fn name(&self) -> &'static str {
        "ios_ospf_interfaces"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let mut keyed = key_interfaces(self.name(), Some(tree))?;
        for entry in keyed.values_mut() {
            key_field(self.name(), entry, "address_family", &["afi"])?;
            let Some(families) = entry.get_path_mut("address_family").and_then(Node::as_map_mut) else {
                continue;
            };
            for af in families.values_mut() {
                for field in [
                    "process.id",
                    "process.instance",
                    "cost",
                    "hello_interval",
                    "dead_interval",
                    "priority",
                    "transmit_delay",
                    "retransmit_interval",
                ] {
                    af.coerce_int(field);
                }
                af.coerce_str("process.area_id");
            }
        }
        Ok(Node::Map(keyed))
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for (name, entry) in want.as_map().into_iter().flatten() {
            for (afi, af) in entry.get("address_family").and_then(Node::as_map).into_iter().flatten() {
                if afi != "ipv4" && afi != "ipv6" {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("{}: afi must be ipv4 or ipv6, got '{}'", name, afi),
                    ));
                }
                if afi == "ipv6" && af.get_path("process.secondaries").is_some() {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("{}: process.secondaries is only valid for ipv4", name),
                    ));
                }
                if afi == "ipv4" && af.get_path("process.instance").is_some() {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("{}: process.instance is only valid for ipv6", name),
                    ));
                }
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
