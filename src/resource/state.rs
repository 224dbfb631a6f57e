//! Reconciliation state modes

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How desired configuration is reconciled against the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Add or update, never remove (default)
    #[default]
    Merged,
    /// Make each named entry exactly match the desired config
    Replaced,
    /// Like replaced, and remove entries not named at all
    Overridden,
    /// Negate the fields of named entries, or of every entry when none are named
    Deleted,
    /// Return the device facts without changes
    Gathered,
    /// Render commands from the desired config alone
    Rendered,
    /// Parse caller-supplied configuration text into facts
    Parsed,
    /// Remove named block constructs entirely
    Purged,
}

impl State {
    /// States that may produce commands for the device
    pub fn is_action(self) -> bool {
        matches!(
            self,
            State::Merged | State::Replaced | State::Overridden | State::Deleted | State::Purged
        )
    }

    /// States that must be given a desired configuration
    pub fn requires_config(self) -> bool {
        matches!(
            self,
            State::Merged | State::Replaced | State::Overridden | State::Rendered
        )
    }

    /// States that may negate configuration
    pub fn negates(self) -> bool {
        matches!(
            self,
            State::Replaced | State::Overridden | State::Deleted | State::Purged
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Merged => "merged",
            State::Replaced => "replaced",
            State::Overridden => "overridden",
            State::Deleted => "deleted",
            State::Gathered => "gathered",
            State::Rendered => "rendered",
            State::Parsed => "parsed",
            State::Purged => "purged",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merged" => Ok(State::Merged),
            "replaced" => Ok(State::Replaced),
            "overridden" => Ok(State::Overridden),
            "deleted" => Ok(State::Deleted),
            "gathered" => Ok(State::Gathered),
            "rendered" => Ok(State::Rendered),
            "parsed" => Ok(State::Parsed),
            "purged" => Ok(State::Purged),
            _ => Err(Error::InvalidState(s.to_string())),
        }
    }
}
