//! # netrm - Network Resource Modules
//!
//! netrm manages network device configuration as structured data. Each
//! resource (interfaces, spanning tree, BGP address families, ...) parses the
//! device's running configuration into a fact tree, compares it with a desired
//! tree under a state mode and renders the CLI commands that reconcile them.
//!
//! ## Core Concepts
//!
//! - **Parser tables**: ordered line rules that build facts and render commands
//! - **Facts**: the keyed tree parsed from running configuration
//! - **States**: `merged`, `replaced`, `overridden`, `deleted`, `purged`,
//!   `gathered`, `rendered`, `parsed`
//! - **Modules**: the parameter/output contract resources are driven through
//! - **Devices**: external collaborators that return configuration text and
//!   accept commands
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                CLI / Module Registry                      │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │          ResourceModule  ──►  NetworkDevice               │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌───────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ Parser tables │   │    Differ     │   │  Range sets     │
//! │ (facts/render)│   │ (state modes) │   │ (vlans, insts)  │
//! └───────────────┘   └───────────────┘   └─────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netrm::prelude::*;
//! use serde_json::json;
//!
//! let running = "interface GigabitEthernet1\n description old\n";
//! let want = json!([{"name": "GigabitEthernet1", "description": "new"}]);
//! let result = run(&Interfaces, State::Merged, Some(&want), None, || Ok(running.to_string()))?;
//! assert_eq!(result.command_list(), ["interface GigabitEthernet1", "description new"]);
//! ```

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Engine
    pub use crate::resource::{
        run, Changes, Differ, Node, NodeMap, Obj, ParserTable, Resource, Rule, RunResult, State,
    };

    // Resources
    pub use crate::modules::network::ios::{
        BgpAddressFamily, EvpnEthernet, Interfaces, L2Interfaces, Line, LoggingGlobal,
        OspfInterfaces, PrefixLists, SpanningTree,
    };

    // Modules
    pub use crate::modules::network::{NetworkDevice, ResourceModule, StaticConfigDevice};
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
    };

    // Plugins
    pub use crate::plugins::filter::{pop_ace, FilterRegistry};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Parser tables, the differ and the state-mode orchestrator.
pub mod resource;

// ============================================================================
// Module System
// ============================================================================

/// Module trait, registry and the network resource modules.
pub mod modules;

/// Filter plugins.
pub mod plugins;

// ============================================================================
// Configuration
// ============================================================================

/// Layered configuration (files and environment).
pub mod config;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
