//! `ios_line`: console, aux and virtual terminal line settings.
//!
//! Lines are keyed by their name as the device prints it (`con 0`,
//! `vty 0 4`).

use super::word_list;
use crate::error::{Error, Result};
use crate::resource::compare::reconcile_entries;
use crate::resource::facts::{key_field, list_to_dict};
use crate::resource::node::MissingField;
use crate::resource::{Changes, Differ, Match, Node, NodeMap, Obj, ParserTable, Resource, Rule, State};
use once_cell::sync::Lazy;

static TABLE: Lazy<ParserTable> = Lazy::new(|| {
    ParserTable::new(
        "ios_line",
        vec![
            Rule::new("name", r"^line\s(?P<name>(?:con|aux|vty|tty)\s\d+(?:\s\d+)?)$", |m| {
                m.scope(&["name"], Obj::new().with("name", m.get("name")).build())
            })
            .setval(|v| Ok(format!("line {}", v.req("name")?)))
            .shared(),
            Rule::new(
                "exec_timeout",
                r"^\s+exec-timeout\s(?P<minutes>\d+)(?:\s(?P<seconds>\d+))?$",
                |m| {
                    on_line(
                        m,
                        Obj::new().with(
                            "exec_timeout",
                            Obj::new()
                                .with("minutes", m.int("minutes"))
                                .with("seconds", m.int("seconds").or(Some(0))),
                        ),
                    )
                },
            )
            .setval(|v| {
                Ok(format!(
                    "exec-timeout {} {}",
                    v.req("exec_timeout.minutes")?,
                    v.opt("exec_timeout.seconds").unwrap_or_else(|| "0".to_string())
                ))
            })
            .remval(|_| Ok("no exec-timeout".to_string())),
            Rule::new("logging_synchronous", r"^\s+logging\ssynchronous$", |m| {
                on_line(m, Obj::new().with("logging_synchronous", true))
            })
            .setval(|_| Ok("logging synchronous".to_string())),
            Rule::new(
                "login_authentication",
                r"^\s+login\sauthentication\s(?P<list>\S+)$",
                |m| on_line(m, Obj::new().with("login_authentication", m.get("list"))),
            )
            .setval(|v| Ok(format!("login authentication {}", v.req("login_authentication")?)))
            .remval(|_| Ok("no login authentication".to_string())),
            Rule::new("login", r"^\s+login(?:\s(?P<local>local))?$", |m| {
                let kind = if m.matched("local") { "local" } else { "line" };
                on_line(m, Obj::new().with("login", kind))
            })
            .setval(|v| match v.req("login")?.as_str() {
                "local" => Ok("login local".to_string()),
                _ => Ok("login".to_string()),
            })
            .remval(|_| Ok("no login".to_string())),
            Rule::new("transport.input", r"^\s+transport\sinput\s(?P<protocols>.+)$", |m| {
                on_line(m, Obj::new().with("transport", Obj::new().with("input", words(m))))
            })
            .setval(|v| render_transport(v, "input"))
            .remval(|_| Ok("no transport input".to_string())),
            Rule::new("transport.output", r"^\s+transport\soutput\s(?P<protocols>.+)$", |m| {
                on_line(m, Obj::new().with("transport", Obj::new().with("output", words(m))))
            })
            .setval(|v| render_transport(v, "output"))
            .remval(|_| Ok("no transport output".to_string())),
            Rule::new("privilege", r"^\s+privilege\slevel\s(?P<level>\d+)$", |m| {
                on_line(m, Obj::new().with("privilege", m.int("level")))
            })
            .setval(|v| Ok(format!("privilege level {}", v.req("privilege")?)))
            .remval(|_| Ok("no privilege level".to_string())),
            Rule::new("length", r"^\s+length\s(?P<length>\d+)$", |m| {
                on_line(m, Obj::new().with("length", m.int("length")))
            })
            .setval(|v| Ok(format!("length {}", v.req("length")?)))
            .remval(|_| Ok("no length".to_string())),
            Rule::new("session_timeout", r"^\s+session-timeout\s(?P<minutes>\d+)$", |m| {
                on_line(m, Obj::new().with("session_timeout", m.int("minutes")))
            })
            .setval(|v| Ok(format!("session-timeout {}", v.req("session_timeout")?)))
            .remval(|_| Ok("no session-timeout".to_string())),
            Rule::new("stopbits", r"^\s+stopbits\s(?P<bits>1|1\.5|2)$", |m| {
                on_line(m, Obj::new().with("stopbits", m.get("bits")))
            })
            .setval(|v| Ok(format!("stopbits {}", v.req("stopbits")?)))
            .remval(|_| Ok("no stopbits".to_string())),
            Rule::new("exec", r"^\s+no\sexec$", |m| on_line(m, Obj::new().with("exec", false)))
                .setval(|v| match v.get("exec").and_then(Node::as_bool) {
                    Some(false) => Ok("no exec".to_string()),
                    _ => Ok("exec".to_string()),
                }),
            Rule::new(
                "access_classes",
                r"^\s+access-class\s(?P<acl>\S+)\s(?P<direction>in|out)(?P<vrf_also>\svrf-also)?$",
                |m| match m.get("direction") {
                    Some(direction) => on_line(
                        m,
                        Obj::new().with(
                            "access_classes",
                            Node::nest(
                                &[direction],
                                Obj::new()
                                    .with("name", m.get("acl"))
                                    .with("direction", direction)
                                    .flag("vrf_also", m.matched("vrf_also"))
                                    .build(),
                            ),
                        ),
                    ),
                    None => Node::map(),
                },
            )
            .setval(|v| {
                let mut line = format!("access-class {} {}", v.req("name")?, v.req("direction")?);
                if v.flag("vrf_also") {
                    line.push_str(" vrf-also");
                }
                Ok(line)
            }),
            Rule::new("block_end", r"^\S", |_| Node::map()).shared(),
        ],
    )
});

const PARSERS: &[&str] = &[
    "exec_timeout",
    "logging_synchronous",
    "login_authentication",
    "login",
    "transport.input",
    "transport.output",
    "privilege",
    "length",
    "session_timeout",
    "stopbits",
];

fn on_line(m: &Match<'_>, leaf: Obj) -> Node {
    m.get("name")
        .map(|name| Node::nest(&[name], leaf.build()))
        .unwrap_or_default()
}

fn words(m: &Match<'_>) -> Option<Node> {
    m.get("protocols").map(|p| word_list(&Node::from(p)))
}

fn render_transport(v: &Node, direction: &str) -> std::result::Result<String, MissingField> {
    let path = format!("transport.{}", direction);
    let protocols: Vec<String> = v
        .get_path(&path)
        .and_then(Node::as_list)
        .map(|items| items.iter().filter_map(Node::scalar_string).collect())
        .unwrap_or_default();
    if protocols.is_empty() {
        return Err(MissingField(path));
    }
    Ok(format!("transport {} {}", direction, protocols.join(" ")))
}

/// Canonical line name: known abbreviations and single spacing
fn normalize_line_name(name: &str) -> String {
    let mut parts = name.split_whitespace();
    let kind = match parts.next() {
        Some("console") => "con",
        Some(other) => other,
        None => return String::new(),
    };
    std::iter::once(kind).chain(parts).collect::<Vec<_>>().join(" ")
}

/// Terminal line resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Line;

impl Line {
    fn compare_line(d: &mut Differ<'_>, name: &str, want: &Node, have: &Node) -> Result<()> {
        d.block(&[format!("line {}", name)], |d| {
            d.compare(PARSERS, want, have)?;

            // `exec` is on unless configured otherwise
            let w = want.get("exec").and_then(Node::as_bool).unwrap_or(true);
            let h = have.get("exec").and_then(Node::as_bool).unwrap_or(true);
            if w != h {
                d.addcmd(&Obj::new().with("exec", w).build(), "exec", false)?;
            }

            d.compare_keyed(want.get("access_classes"), have.get("access_classes"), |d, _, w, h| {
                d.compare_entry("access_classes", w, h)
            })
        })
    }
}

impl Resource for Line {
    fn name(&self) -> &'static str {
        "ios_line"
    }

    fn table(&self) -> &'static ParserTable {
        &TABLE
    }

    fn normalize(&self, tree: Node) -> Result<Node> {
        let keyed = list_to_dict(self.name(), Some(tree), &["name"])?;
        let mut lines = NodeMap::new();
        for (_, mut entry) in keyed {
            let name = entry.str_at("name").map(normalize_line_name).unwrap_or_default();
            if name.is_empty() {
                return Err(Error::invalid_config(self.name(), "line entry is missing 'name'"));
            }
            entry.insert("name", Node::Str(name.clone()));
            for path in ["exec_timeout.minutes", "exec_timeout.seconds", "privilege", "length", "session_timeout"] {
                entry.coerce_int(path);
            }
            entry.coerce_str("stopbits");
            if entry.get_path("exec_timeout.minutes").is_some() && entry.get_path("exec_timeout.seconds").is_none() {
                if let Some(timeout) = entry.get_path_mut("exec_timeout") {
                    timeout.insert("seconds", Node::Int(0));
                }
            }
            for direction in ["input", "output"] {
                let path = format!("transport.{}", direction);
                if let Some(slot) = entry.get_path_mut(&path) {
                    *slot = word_list(slot);
                }
            }
            key_field(self.name(), &mut entry, "access_classes", &["direction"])?;
            lines.insert(name, entry);
        }
        Ok(Node::Map(lines))
    }

    fn validate(&self, want: &Node, _have: &Node, _state: State) -> Result<()> {
        for (name, entry) in want.as_map().into_iter().flatten() {
            if let Some(level) = entry.int_at("privilege") {
                if !(0..=15).contains(&level) {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("line {}: privilege level must be 0-15, got {}", name, level),
                    ));
                }
            }
            for (direction, _) in entry.get("access_classes").and_then(Node::as_map).into_iter().flatten() {
                if direction != "in" && direction != "out" {
                    return Err(Error::invalid_config(
                        self.name(),
                        format!("line {}: access-class direction must be in or out, got '{}'", name, direction),
                    ));
                }
            }
        }
        Ok(())
    }

    fn generate_commands(&self, want: &Node, have: &Node, state: State) -> Result<Changes> {
        let mut d = Differ::new(self.table(), state);
        reconcile_entries(&mut d, want, have, Self::compare_line)?;
        Ok(d.finish())
    }
}
