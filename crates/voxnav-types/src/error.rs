//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file was rejected before parsing (too large, NUL bytes).
    #[error("config file {} rejected: {reason}", path.display())]
    Rejected { path: PathBuf, reason: String },

    /// A config file (or the merged result) is not valid TOML for the schema.
    #[error("invalid config ({origin}): {reason}")]
    Parse { origin: String, reason: String },

    /// An environment variable override could not be applied.
    #[error("environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    /// The merged configuration violates a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
