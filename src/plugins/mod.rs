//! Plugin System for netrm
//!
//! # Plugin Categories
//!
//! ## Filter Plugins
//!
//! Jinja2-compatible filters for template processing over resource facts.
//! See the [`filter`] module for available filters.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use netrm::plugins::filter::FilterRegistry;
//! use minijinja::Environment;
//!
//! let mut env = Environment::new();
//! FilterRegistry::register_all(&mut env);
//! ```

pub mod filter;
