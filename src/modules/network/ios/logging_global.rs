//! `ios_logging_global`: device-wide logging settings.

use super::normalize_interface;
use crate::error::{Error, Result};
use crate::resource::facts::{for_each_entry, key_field};
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Match, Node, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

const SEVERITIES: &[&str] = &[
    "emergencies",
    "alerts",
    "critical",
    "errors",
    "warnings",
    "notifications",
    "informational",
    "debugging",
];

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_logging_global",
        vec![
            Rule::new(
                "hosts",
                r"^logging\shost\s(?P<host>\S+)(?:\svrf\s(?P<vrf>\S+))?(?:\stransport\s(?P<transport>udp|tcp)(?:\sport\s(?P<port>\d+))?)?$",
                |m| keyed(m, "hosts", &["host", "vrf"], Obj::new()
                    .with("host", m.get("host"))
                    .with("vrf", m.get("vrf"))
                    .with("transport", m.get("transport"))
                    .with("port", m.int("port"))),
            )
            .setval(render_host),
            Rule::new(
                "source_interface",
                r"^logging\ssource-interface\s(?P<interface>\S+)(?:\svrf\s(?P<vrf>\S+))?$",
                |m| keyed(m, "source_interface", &["interface", "vrf"], Obj::new()
                    .with("interface", m.get("interface"))
                    .with("vrf", m.get("vrf"))),
            )
            .setval(|v| {
                let mut line = format!("logging source-interface {}", v.req("interface")?);
                if let Some(vrf) = v.opt("vrf") {
                    line.push_str(" vrf ");
                    line.push_str(&vrf);
                }
                Ok(line)
            }),
            Rule::new(
                "buffered",
                r"^logging\sbuffered(?:\s(?P<size>\d+))?(?:\s(?P<severity>[a-z]+))?$",
                |m| {
                    Obj::new()
                        .with("buffered", Obj::new().with("size", m.int("size")).with("severity", m.get("severity")))
                        .build()
                },
            )
            .setval(|v| Ok(with_options("logging buffered", v, &["buffered.size", "buffered.severity"])))
            .remval(|_| Ok("no logging buffered".to_string())),
            Rule::new("console", r"^(?P<no>no\s)?logging\sconsole(?:\s(?P<severity>[a-z]+))?$", |m| {
                let console = if m.matched("no") {
                    Obj::new().with("enable", false)
                } else {
                    Obj::new().with("severity", m.get("severity"))
                };
                Obj::new().with("console", console).build()
            })
            .setval(render_console)
            .remval(|v| match v.get_path("console.enable").and_then(Node::as_bool) {
                Some(false) => Ok("logging console".to_string()),
                _ => Ok("no logging console".to_string()),
            }),
            Rule::new("monitor", r"^logging\smonitor\s(?P<severity>[a-z]+)$", |m| {
                Node::nest(&["monitor"], Obj::new().with("severity", m.get("severity")).build())
            })
            .setval(|v| Ok(format!("logging monitor {}", v.req("monitor.severity")?)))
            .remval(|_| Ok("no logging monitor".to_string())),
            Rule::new("trap", r"^logging\strap\s(?P<severity>[a-z]+)$", |m| {
                Obj::new().with("trap", m.get("severity")).build()
            })
            .setval(|v| Ok(format!("logging trap {}", v.req("trap")?)))
            .remval(|_| Ok("no logging trap".to_string())),
            Rule::new("history.size", r"^logging\shistory\ssize\s(?P<size>\d+)$", |m| {
                Node::nest(&["history"], Obj::new().with("size", m.int("size")).build())
            })
            .setval(|v| Ok(format!("logging history size {}", v.req("history.size")?)))
            .remval(|_| Ok("no logging history size".to_string())),
            Rule::new("history.severity", r"^logging\shistory\s(?P<severity>[a-z]+)$", |m| {
                Node::nest(&["history"], Obj::new().with("severity", m.get("severity")).build())
            })
            .setval(|v| Ok(format!("logging history {}", v.req("history.severity")?)))
            .remval(|_| Ok("no logging history".to_string())),
            Rule::new("facility", r"^logging\sfacility\s(?P<facility>\S+)$", |m| {
                Obj::new().with("facility", m.get("facility")).build()
            })
            .setval(|v| Ok(format!("logging facility {}", v.req("facility")?)))
            .remval(|_| Ok("no logging facility".to_string())),
            Rule::new("rate_limit", r"^logging\srate-limit\s(?P<rate>\d+)$", |m| {
                Obj::new().with("rate_limit", m.int("rate")).build()
            })
            .setval(|v| Ok(format!("logging rate-limit {}", v.req("rate_limit")?)))
            .remval(|_| Ok("no logging rate-limit".to_string())),
            Rule::new("count", r"^logging\scount$", |_| Obj::new().with("count", true).build())
                .setval(|_| Ok("logging count".to_string())),
            Rule::new("userinfo", r"^logging\suserinfo$", |_| Obj::new().with("userinfo", true).build())
                .setval(|_| Ok("logging userinfo".to_string())),
        ],
    )
});

const PARSERS: &[&str] = &[
    "buffered",
    "console",
    "monitor",
    "trap",
    "history.size",
    "history.severity",
    "facility",
    "rate_limit",
    "count",
    "userinfo",
];

const KEYED: &[(&str, &[&str])] = &[("hosts", &["host", "vrf"]), ("source_interface", &["interface", "vrf"])];

fn keyed(m: &Match<'_>, field: &str, fields: &[&str], entry: Obj) -> Node {
    let parts: Vec<&str> = fields.iter().filter_map(|f| m.get(f)).collect();
    if parts.is_empty() {
        return Node::map();
    }
    Node::nest(&[field, parts.join("_").as_str()], entry.build())
}

fn with_options(base: &str, v: &Node, paths: &[&str]) -> String {
    let mut line = base.to_string();
    for value in paths.iter().filter_map(|p| v.opt(p)) {
        line.push(' ');
        line.push_str(&value);
    }
    line
}

fn render_host(v: &Node) -> std::result::Result<String, MissingField> {
    let mut line = format!("logging host {}", v.req("host")?);
    if let Some(vrf) = v.opt("vrf") {
        line.push_str(" vrf ");
        line.push_str(&vrf);
    }
    if let Some(transport) = v.opt("transport") {
        line.push_str(" transport ");
        line.push_str(&transport);
        if let Some(port) = v.opt("port") {
            line.push_str(" port ");
            line.push_str(&port);
        }
    }
    Ok(line)
}

fn render_console(v: &Node) -> std::result::Result<String, MissingField> {
    match v.get_path("console.enable").and_then(Node::as_bool) {
        Some(false) => Ok("no logging console".to_string()),
        _ => Ok(with_options("logging console", v, &["console.severity"])),
    }
}

/// Global logging resource
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGlobal;

impl Resource for LoggingGlobal {
    fn name(&self) -> &'static str {
        "ios_logging_global"
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
                    format!("expected a mapping of logging settings, got {:?}", other),
                ))
            }
        };
        for path in ["buffered.size", "history.size", "rate_limit"] {
            tree.coerce_int(path);
        }
        if let Some(console) = tree.get_path_mut("console") {
            // `enable: true` is the device default and never rendered
            if console.get("enable").and_then(Node::as_bool) == Some(true) {
                console.remove("enable");
            }
        }
        for_each_entry(&mut tree, "source_interface", |entry| {
            if let Some(name) = entry.str_at("interface").map(normalize_interface) {
                entry.insert("interface", Node::Str(name));
            }
            Ok(())
        })?;
        if let Some(Node::List(items)) = tree.get_path_mut("source_interface") {
            for item in items.iter_mut() {
                if let Some(name) = item.str_at("interface").map(normalize_interface) {
                    item.insert("interface", Node::Str(name));
                }
            }
        }
        for (field, keys) in KEYED {
            key_field(self.name(), &mut tree, field, keys)?;
        }
        for_each_entry(&mut tree, "hosts", |entry| {
            entry.coerce_int("port");
            Ok(())
        })?;
        Ok(tree)
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for path in ["buffered.severity", "console.severity", "monitor.severity", "trap", "history.severity"] {
            if let Some(severity) = want.str_at(path) {
                if !SEVERITIES.contains(&severity) {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("{}: unknown severity '{}'", path, severity),
                    ));
                }
            }
        }
        Ok(())
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        let effective = match state {
            State::Merged => Node::merged(have, want),
            // Removes every logging setting whatever `want` names
            State::Deleted => Node::map(),
            _ => want.clone(),
        };
        d.compare(PARSERS, &effective, have)?;
        for (field, _) in KEYED {
            d.compare_keyed(effective.get(field), have.get(field), |d, _, w, h| d.compare_entry(field, w, h))?;
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
logging buffered 64000 informational
no logging console
logging monitor warnings
logging trap notifications
logging history size 50
logging facility local5
logging count
logging source-interface Loopback0
logging host 10.0.0.5
logging host 10.0.0.6 vrf mgmt transport tcp port 1514
";

    fn facts() -> Node {
        LoggingGlobal.normalize(TABLE.parse(RUNNING)).unwrap().prune()
    }

    fn want(v: serde_json::Value) -> Node {
        LoggingGlobal.normalize_want(Node::from_json(&v).unwrap()).unwrap().prune()
    }

    #[test]
    fn test_parse() {
        let f = facts();
        assert_eq!(f.int_at("buffered.size"), Some(64000));
        assert_eq!(f.str_at("buffered.severity"), Some("informational"));
        assert_eq!(f.get_path("console.enable"), Some(&Node::Bool(false)));
        assert_eq!(f.str_at("trap"), Some("notifications"));
        assert!(f.flag("count"));
        let host = f.get("hosts").and_then(|h| h.get("10.0.0.6_mgmt")).unwrap();
        assert_eq!(host.int_at("port"), Some(1514));
        assert!(f.get("source_interface").and_then(|s| s.get("Loopback0")).is_some());
    }

    #[test]
    fn test_merged_adds_host_and_changes_trap() {
        let w = want(json!({"trap": "errors", "hosts": [{"host": "10.0.0.7"}]}));
        let changes = LoggingGlobal.generate_commands(&w, &facts(), State::Merged).unwrap();
        assert_eq!(changes.commands, vec!["logging trap errors", "logging host 10.0.0.7"]);
    }

    #[test]
    fn test_replaced_reenables_console() {
        let w = want(json!({
            "buffered": {"size": 64000, "severity": "informational"},
            "monitor": {"severity": "warnings"},
            "trap": "notifications",
            "history": {"size": 50},
            "facility": "local5",
            "count": true,
            "source_interface": [{"interface": "lo0"}],
            "hosts": [{"host": "10.0.0.5"}, {"host": "10.0.0.6", "vrf": "mgmt", "transport": "tcp", "port": 1514}]
        }));
        let changes = LoggingGlobal.generate_commands(&w, &facts(), State::Replaced).unwrap();
        assert_eq!(changes.commands, vec!["logging console"]);
    }

    #[test]
    fn test_deleted_removes_everything() {
        let w = want(json!({"trap": "notifications"}));
        let changes = LoggingGlobal.generate_commands(&w, &facts(), State::Deleted).unwrap();
        assert_eq!(
            changes.commands,
            vec![
                "no logging buffered",
                "logging console",
                "no logging monitor",
                "no logging trap",
                "no logging history size",
                "no logging facility",
                "no logging count",
                "no logging host 10.0.0.5",
                "no logging host 10.0.0.6 vrf mgmt transport tcp port 1514",
                "no logging source-interface Loopback0",
            ]
        );
    }

    #[test]
    fn test_rendered() {
        let w = want(json!({"console": {"severity": "critical"}, "userinfo": true, "rate_limit": 100}));
        let changes = LoggingGlobal.generate_commands(&w, &Node::map(), State::Rendered).unwrap();
        assert_eq!(
            changes.commands,
            vec!["logging console critical", "logging rate-limit 100", "logging userinfo"]
        );
    }

    #[test]
    fn test_unknown_severity() {
        let w = want(json!({"trap": "loud"}));
        assert!(LoggingGlobal.validate(&w, &Node::map(), State::Merged).is_err());
    }

    #[test]
    fn test_idempotent() {
        let f = facts();
        for state in [State::Merged, State::Replaced, State::Overridden] {
            let changes = LoggingGlobal.generate_commands(&f, &f, state).unwrap();
            assert!(changes.commands.is_empty(), "{state}: {:?}", changes.commands);
        }
    }
}
