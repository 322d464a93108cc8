//! Error types for the satellite crate.

use std::path::PathBuf;

/// Satellite-level error types.
#[derive(Debug, thiserror::Error)]
pub enum SatelliteError {
    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML or misses required keys.
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration parsed but is semantically invalid.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error on a connection or file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to turn a tool identifier into a usable tool.
///
/// `Clone` so that one cached failure can be handed to every caller that
/// waited on the same load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The code source has no artifact for this identifier.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// The artifact exists but no tool could be constructed from it.
    #[error("failed to load tool {name}: {reason}")]
    ToolLoadError { name: String, reason: String },
}

impl ResolveError {
    /// Identifier the failure refers to.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::ToolNotFound { name } | Self::ToolLoadError { name, .. } => name,
        }
    }
}

/// Convenience result type for satellite operations.
pub type SatelliteResult<T> = Result<T, SatelliteError>;
