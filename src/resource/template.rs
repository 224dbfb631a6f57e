//! Parser tables
//!
//! A resource declares an ordered list of [`Rule`]s. Each rule pairs a line
//! pattern with a fragment builder (text to tree) and a render function
//! (tree to command). Parsing tries rules in declared order and the first
//! match wins, so more specific patterns must be declared before more
//! general ones that could match the same line.
//!
//! Rules marked `shared` are block anchors (`interface X`, `router bgp N`).
//! Their captures become the context that later fragment builders use to
//! place values, until the next anchor matches.

use super::node::{MissingField, Node};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use tracing::trace;

/// Renders one command line from a values subtree
pub type RenderLine = fn(&Node) -> std::result::Result<String, MissingField>;

/// Renders a short ordered sequence of command lines
pub type RenderLines = fn(&Node) -> std::result::Result<Vec<String>, MissingField>;

/// Builds the fact fragment for a matched line
pub type Builder = fn(&Match<'_>) -> Node;

/// Render template of a rule
#[derive(Clone, Copy)]
pub enum Setval {
    /// The field is not rendered on its own (list fields handled by a
    /// resource comparator)
    None,
    Line(RenderLine),
    Lines(RenderLines),
}

impl Setval {
    fn render(&self, data: &Node) -> std::result::Result<Vec<String>, MissingField> {
        match self {
            Setval::None => Ok(Vec::new()),
            Setval::Line(f) => f(data).map(|line| vec![line]),
            Setval::Lines(f) => f(data),
        }
    }
}

/// A single parse/render rule
pub struct Rule {
    name: &'static str,
    pattern: Regex,
    result: Builder,
    setval: Setval,
    remval: Option<Setval>,
    compval: Option<&'static str>,
    shared: bool,
}

impl Rule {
    /// Create a rule from a line pattern and fragment builder.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid regular expression. Rule tables are
    /// static, so this surfaces on first use of the table.
    pub fn new(name: &'static str, pattern: &str, result: Builder) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("Invalid parser rule regex"),
            result,
            setval: Setval::None,
            remval: None,
            compval: None,
            shared: false,
        }
    }

    /// Set a single-line render function
    pub fn setval(mut self, render: RenderLine) -> Self {
        self.setval = Setval::Line(render);
        self
    }

    /// Set a multi-line render function
    pub fn setval_lines(mut self, render: RenderLines) -> Self {
        self.setval = Setval::Lines(render);
        self
    }

    /// Set an explicit negation. The result is used verbatim, without the
    /// default `no ` prefix.
    pub fn remval(mut self, render: RenderLine) -> Self {
        self.remval = Some(Setval::Line(render));
        self
    }

    /// Compare this rule against a different path than its name
    pub fn compval(mut self, path: &'static str) -> Self {
        self.compval = Some(path);
        self
    }

    /// Mark the rule as a block anchor
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Path in a values tree that [`Differ::compare`](super::compare::Differ::compare)
    /// inspects for this rule
    pub fn compval_path(&self) -> &'static str {
        self.compval.unwrap_or(self.name)
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("shared", &self.shared)
            .finish()
    }
}

/// Captures of a matched line, falling back to the anchor context
pub struct Match<'a> {
    caps: Captures<'a>,
    shared: &'a IndexMap<String, String>,
}

impl<'a> Match<'a> {
    /// Value of a named group, or of the anchor context when the group did
    /// not participate in this match. Missing names resolve to `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.caps
            .name(name)
            .map(|m| m.as_str())
            .or_else(|| self.shared.get(name).map(String::as_str))
    }

    /// Whether the named group participated in this line's match
    pub fn matched(&self, name: &str) -> bool {
        self.caps.name(name).is_some()
    }

    /// Named group parsed as an integer
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Named group as a string node
    pub fn node(&self, name: &str) -> Option<Node> {
        self.get(name).map(Node::from)
    }

    /// Place `leaf` under the values of the given context captures.
    ///
    /// When any of them is unset (a line before the first anchor) the leaf is
    /// returned unscoped, which puts it in the global context.
    pub fn scope(&self, keys: &[&str], leaf: Node) -> Node {
        let path: Option<Vec<&str>> = keys.iter().map(|k| self.get(k)).collect();
        match path {
            Some(path) => Node::nest(&path, leaf),
            None => leaf,
        }
    }
}

/// Ordered rule table for one resource
pub struct ParserTable {
    resource: &'static str,
    rules: Vec<Rule>,
}

impl ParserTable {
    pub fn new(resource: &'static str, rules: Vec<Rule>) -> Self {
        Self { resource, rules }
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Look up a rule by name
    pub fn get(&self, name: &str) -> Result<&Rule> {
        self.rules
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::UnknownParser {
                resource: self.resource.to_string(),
                parser: name.to_string(),
            })
    }

    /// Parse configuration text into a fact tree
    pub fn parse(&self, text: &str) -> Node {
        self.parse_lines(text.lines())
    }

    /// Parse a sequence of configuration lines into a fact tree.
    ///
    /// Lines that match no rule are skipped.
    pub fn parse_lines<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Node {
        let mut tree = Node::map();
        let mut shared: IndexMap<String, String> = IndexMap::new();

        for raw in lines {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            for rule in &self.rules {
                let Some(caps) = rule.pattern.captures(line) else {
                    continue;
                };
                if rule.shared {
                    shared = rule
                        .pattern
                        .capture_names()
                        .flatten()
                        .filter_map(|n| caps.name(n).map(|m| (n.to_string(), m.as_str().to_string())))
                        .collect();
                }
                let fragment = (rule.result)(&Match {
                    caps,
                    shared: &shared,
                });
                trace!(resource = self.resource, parser = rule.name, line, "matched");
                tree.merge(fragment);
                break;
            }
        }

        tree
    }

    /// Render the command(s) for `parser` from `data`.
    ///
    /// Negation uses the rule's `remval` when declared, otherwise prefixes
    /// each rendered line with `no `.
    pub fn render(&self, data: &Node, parser: &str, negate: bool) -> Result<Vec<String>> {
        let rule = self.get(parser)?;
        let (template, prefix) = match (negate, &rule.remval) {
            (true, Some(remval)) => (remval, false),
            (true, None) => (&rule.setval, true),
            (false, _) => (&rule.setval, false),
        };
        let lines = template.render(data).map_err(|missing| Error::Render {
            parser: parser.to_string(),
            field: missing.0,
        })?;
        Ok(lines
            .into_iter()
            .filter(|l| !l.is_empty())
            .map(|l| if prefix { format!("no {}", l) } else { l })
            .collect())
    }

    /// Render a single line, failing when the rule produces nothing
    pub fn render_one(&self, data: &Node, parser: &str, negate: bool) -> Result<String> {
        self.render(data, parser, negate)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Render {
                parser: parser.to_string(),
                field: String::new(),
            })
    }
}

impl std::fmt::Debug for ParserTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserTable")
            .field("resource", &self.resource)
            .field("rules", &self.rules.len())
            .finish()
    }
}
