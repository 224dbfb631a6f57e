//! Error types for netrm.
//!
//! Engine failures split into two groups. Internal failures (an unknown
//! parser name, a render function missing a value its own rule guarantees)
//! abort the run because emitting a wrong command into a live device is
//! worse than emitting none. Business-rule failures carry the resource name
//! and are reported back to the caller as task failures.

use thiserror::Error;

/// Result type alias for netrm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for netrm.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// A resource referenced a parser that its table does not declare.
    #[error("Parser '{parser}' is not declared in the {resource} template")]
    UnknownParser {
        /// Resource whose table was searched
        resource: String,
        /// Parser name
        parser: String,
    },

    /// Rendering a command needed a value that was not present.
    #[error("Failed to render '{parser}': required value '{field}' is missing")]
    Render {
        /// Parser being rendered
        parser: String,
        /// Dotted path of the missing value
        field: String,
    },

    /// A range string could not be parsed.
    #[error("Invalid range '{0}': expected comma separated numbers or 'a-b' spans")]
    InvalidRange(String),

    /// Unknown state mode.
    #[error(
        "Invalid state '{0}'. Valid options: merged, replaced, overridden, deleted, gathered, rendered, parsed, purged"
    )]
    InvalidState(String),

    // ========================================================================
    // Business Rule Errors
    // ========================================================================
    /// The desired configuration violates a resource rule.
    #[error("{resource}: {message}")]
    InvalidConfig {
        /// Resource reporting the violation
        resource: String,
        /// Actionable description naming the offending field
        message: String,
    },

    /// A parameter required by the chosen state is missing.
    #[error("{resource}: value of '{param}' is required with state '{state}'")]
    MissingParameter {
        /// Resource being run
        resource: String,
        /// Parameter name
        param: String,
        /// State that requires it
        state: String,
    },

    /// A filter plugin rejected its input.
    #[error("Error when using plugin '{plugin}': {message}")]
    Filter {
        /// Plugin name
        plugin: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device collaborator failed to return configuration or accept commands.
    #[error("Device '{device}' failed: {message}")]
    Device {
        /// Device identifier
        device: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Serialization / IO Errors
    // ========================================================================
    /// Configuration file could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::InvalidConfig`] for `resource`.
    pub fn invalid_config(resource: &str, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Returns true for failures the caller can act on (bad input, business
    /// rules) as opposed to internal engine faults.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. }
                | Error::MissingParameter { .. }
                | Error::InvalidState(_)
                | Error::InvalidRange(_)
                | Error::Filter { .. }
                | Error::Device { .. }
        )
    }
}
