//! Jinja2-compatible filter plugins for netrm.
//!
//! - **pop_ace**: remove access control entries from ACL facts by match criteria
//!
//! # Usage
//!
//! ```rust,ignore
//! use netrm::plugins::filter::FilterRegistry;
//! use minijinja::Environment;
//!
//! let mut env = Environment::new();
//! FilterRegistry::register_all(&mut env);
//! ```

pub mod pop_ace;

pub use pop_ace::{pop_ace, pop_ace_value, FailedWhen, FilterOptions, MatchCriteria, PopAce, Remove};

use minijinja::Environment;

/// Registry for managing and registering filter plugins.
pub struct FilterRegistry;

impl FilterRegistry {
    /// Register all available filters with the given environment.
    pub fn register_all(env: &mut Environment<'static>) {
        pop_ace::register_filters(env);
    }

    /// Names of the registered filters
    pub fn names() -> &'static [&'static str] {
        &["pop_ace"]
    }
}
