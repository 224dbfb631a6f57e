//! Structural differ
//!
//! [`Differ`] walks a `want` and a `have` tree field by field and collects
//! the commands that move the device from one to the other. Resources drive
//! it from their `generate_commands`, calling [`Differ::compare`] for plain
//! fields and their own comparators for keyed lists and range sets.
//!
//! Top-level entries are reconciled by [`reconcile_entries`], which
//! partitions the keyed maps up front instead of consuming a working copy.

use super::node::{Node, NodeMap};
use super::state::State;
use super::template::ParserTable;
use crate::error::Result;
use tracing::{debug, warn};

/// Commands and diagnostics produced by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub commands: Vec<String>,
    pub warnings: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Command collector for one resource and state
pub struct Differ<'t> {
    table: &'t ParserTable,
    state: State,
    commands: Vec<String>,
    warnings: Vec<String>,
}

impl<'t> Differ<'t> {
    pub fn new(table: &'t ParserTable, state: State) -> Self {
        Self {
            table,
            state,
            commands: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn table(&self) -> &'t ParserTable {
        self.table
    }

    /// Compare `parsers` between `want` and `have`.
    ///
    /// For each parser the value at its compare path is looked up on both
    /// sides. A wanted value that differs from the current one is asserted
    /// (booleans assert `true` and negate `false`). A value present only in
    /// `have` is negated (a `false` boolean is re-asserted instead).
    pub fn compare(&mut self, parsers: &[&str], want: &Node, have: &Node) -> Result<()> {
        for &parser in parsers {
            let path = self.table.get(parser)?.compval_path();
            let inw = want.get_path(path);
            let inh = have.get_path(path);
            match (inw, inh) {
                (Some(w), h) if Some(w) != h => match w {
                    Node::Bool(b) => self.addcmd(want, parser, !*b)?,
                    _ => self.addcmd(want, parser, false)?,
                },
                (None, Some(h)) => match h {
                    Node::Bool(b) => self.addcmd(have, parser, *b)?,
                    _ => self.addcmd(have, parser, true)?,
                },
                _ => {}
            }
        }
        Ok(())
    }

    /// Render `parser` from `data` and append the result
    pub fn addcmd(&mut self, data: &Node, parser: &str, negate: bool) -> Result<()> {
        let lines = self.table.render(data, parser, negate)?;
        self.commands.extend(lines);
        Ok(())
    }

    /// Append a literal command
    pub fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    /// Insert a literal command at `index`
    pub fn insert(&mut self, index: usize, command: impl Into<String>) {
        self.commands.insert(index, command.into());
    }

    /// Number of commands collected so far
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Detach the commands from `at` onwards
    pub fn split_off(&mut self, at: usize) -> Vec<String> {
        self.commands.split_off(at.min(self.commands.len()))
    }

    /// Run `body` and, if it produced any commands, put `anchor` in front of
    /// them. Child commands never appear without their block context.
    pub fn block<F>(&mut self, anchor: &[String], body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let start = self.commands.len();
        body(self)?;
        if self.commands.len() > start {
            for (offset, line) in anchor.iter().enumerate() {
                self.commands.insert(start + offset, line.clone());
            }
        }
        Ok(())
    }

    /// Within `commands[start..]`, move a command containing `later` to the
    /// end when it comes before a command containing `earlier`.
    pub fn order_after(&mut self, start: usize, earlier: &str, later: &str) {
        let tail = &self.commands[start.min(self.commands.len())..];
        let later_at = tail.iter().position(|c| c.contains(later));
        let earlier_at = tail.iter().position(|c| c.contains(earlier));
        if let (Some(l), Some(e)) = (later_at, earlier_at) {
            if l < e {
                let moved = self.commands.remove(start + l);
                self.commands.push(moved);
            }
        }
    }

    /// Record a diagnostic for the caller
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(resource = self.table.resource(), "{}", message);
        self.warnings.push(message);
    }

    /// Compare two keyed maps entry by entry.
    ///
    /// `each` is called with the key and the wanted and current entries (an
    /// empty map stands in for a missing side). Entries only in `have` are
    /// visited last, and never under `merged`.
    pub fn compare_keyed<F>(&mut self, want: Option<&Node>, have: Option<&Node>, mut each: F) -> Result<()>
    where
        F: FnMut(&mut Self, &str, &Node, &Node) -> Result<()>,
    {
        let empty_map = NodeMap::new();
        let empty = Node::map();
        let wmap = want.and_then(Node::as_map).unwrap_or(&empty_map);
        let hmap = have.and_then(Node::as_map).unwrap_or(&empty_map);

        for (key, w) in wmap {
            let h = hmap.get(key).unwrap_or(&empty);
            each(self, key, w, h)?;
        }
        if self.state != State::Merged {
            for key in partition(wmap, hmap).have_only {
                each(self, key, &empty, &hmap[key])?;
            }
        }
        Ok(())
    }

    /// Compare two whole entries under one parser. A wanted entry that
    /// differs is asserted; an entry only in `have` is negated.
    pub fn compare_entry(&mut self, parser: &str, want: &Node, have: &Node) -> Result<()> {
        if !want.is_empty() {
            if want != have {
                self.addcmd(want, parser, false)?;
            }
        } else if !have.is_empty() {
            self.addcmd(have, parser, true)?;
        }
        Ok(())
    }

    /// Finish the pass and hand back the collected output
    pub fn finish(self) -> Changes {
        debug!(
            resource = self.table.resource(),
            state = %self.state,
            commands = self.commands.len(),
            warnings = self.warnings.len(),
            "generated commands"
        );
        Changes {
            commands: self.commands,
            warnings: self.warnings,
        }
    }
}

/// Keys of two keyed maps split by where they occur
#[derive(Debug, Default, PartialEq)]
pub struct Partition<'a> {
    pub both: Vec<&'a str>,
    pub want_only: Vec<&'a str>,
    pub have_only: Vec<&'a str>,
}

/// Split keys into in-both, want-only and have-only, in map order
pub fn partition<'a>(want: &'a NodeMap, have: &'a NodeMap) -> Partition<'a> {
    let mut parts = Partition::default();
    for key in want.keys() {
        if have.contains_key(key) {
            parts.both.push(key);
        } else {
            parts.want_only.push(key);
        }
    }
    parts.have_only = have
        .keys()
        .filter(|k| !want.contains_key(*k))
        .map(String::as_str)
        .collect();
    parts
}

/// Entries of `have` selected by `want`'s keys, or all of them when `want`
/// names none. Used by `deleted` and `purged`.
pub fn selected<'a>(want: &Node, have: &'a Node) -> Vec<(&'a str, &'a Node)> {
    let Some(hmap) = have.as_map() else {
        return Vec::new();
    };
    let wmap = want.as_map();
    let select_all = wmap.map_or(true, |m| m.is_empty());
    hmap.iter()
        .filter(|(k, _)| select_all || wmap.is_some_and(|m| m.contains_key(*k)))
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}

/// The parts of `have` that `want` names.
///
/// Keys absent from `want` are dropped. Where both sides hold a non-empty
/// map the selection narrows recursively, otherwise the whole `have`
/// subtree is kept.
pub fn restrict(have: &Node, want: &Node) -> Node {
    let (Some(hmap), Some(wmap)) = (have.as_map(), want.as_map()) else {
        return have.clone();
    };
    let mut out = NodeMap::new();
    for (key, h) in hmap {
        let Some(w) = wmap.get(key) else {
            continue;
        };
        let narrowed = match (h, w) {
            (Node::Map(_), Node::Map(wm)) if !wm.is_empty() => restrict(h, w),
            _ => h.clone(),
        };
        out.insert(key.clone(), narrowed);
    }
    Node::Map(out)
}

/// Reconcile keyed top-level entries under the differ's state.
///
/// `compare` receives the key, the effective wanted entry and the current
/// entry:
/// - merged: wanted entry is the current one with `want` merged over it
/// - replaced: wanted entries as given, have-only entries untouched
/// - overridden: have-only entries are compared against an empty want
///   first, then as replaced
/// - deleted: selected entries are compared against an empty want
/// - rendered: wanted entries against an empty have
///
/// Purged is resource specific and handled by the caller through
/// [`selected`].
pub fn reconcile_entries<F>(differ: &mut Differ<'_>, want: &Node, have: &Node, mut compare: F) -> Result<()>
where
    F: FnMut(&mut Differ<'_>, &str, &Node, &Node) -> Result<()>,
{
    let empty = Node::map();
    let empty_map = NodeMap::new();
    let wmap = want.as_map().unwrap_or(&empty_map);
    let hmap = have.as_map().unwrap_or(&empty_map);

    match differ.state() {
        State::Deleted => {
            for (key, entry) in selected(want, have) {
                compare(differ, key, &empty, entry)?;
            }
        }
        State::Merged | State::Replaced | State::Overridden | State::Rendered => {
            if differ.state() == State::Overridden {
                for key in partition(wmap, hmap).have_only {
                    compare(differ, key, &empty, &hmap[key])?;
                }
            }
            for (key, entry) in wmap {
                let current = match differ.state() {
                    State::Rendered => &empty,
                    _ => hmap.get(key).unwrap_or(&empty),
                };
                if differ.state() == State::Merged {
                    let merged = Node::merged(current, entry);
                    compare(differ, key, &merged, current)?;
                } else {
                    compare(differ, key, entry, current)?;
                }
            }
        }
        State::Gathered | State::Parsed | State::Purged => {}
    }
    Ok(())
}
