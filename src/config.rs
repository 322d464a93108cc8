//! Satellite configuration — TOML file with this node's identity, the
//! coordinator's address, and where tool artifacts come from.
//!
//! ```toml
//! [satellite]
//! name = "satellite-1"
//! port = 7001
//!
//! [server]
//! host = "127.0.0.1"
//! port = 7000
//!
//! [code_source]
//! kind = "directory"
//! path = "./tools"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SatelliteError, SatelliteResult};
use crate::source::{ArtifactSource, DirectorySource};

/// Address/port of a node. Immutable once built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ConnectivityInfo {
    pub fn new(name: Option<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, suitable for binding or connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ConnectivityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}@{}:{}", self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

/// Where the resolver fetches artifacts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeSourceConfig {
    Directory { path: PathBuf },
    Http { url: String },
}

impl CodeSourceConfig {
    /// Build the configured source.
    ///
    /// # Errors
    ///
    /// Fails for `http` when the crate was built without the `http` feature,
    /// or when the HTTP client cannot be created.
    pub fn build(&self) -> SatelliteResult<Box<dyn ArtifactSource>> {
        match self {
            Self::Directory { path } => Ok(Box::new(DirectorySource::new(path.clone()))),
            #[cfg(feature = "http")]
            Self::Http { url } => crate::source::HttpSource::new(url.clone())
                .map(|source| Box::new(source) as Box<dyn ArtifactSource>)
                .map_err(|e| SatelliteError::ConfigInvalid(format!("{e:#}"))),
            #[cfg(not(feature = "http"))]
            Self::Http { url } => Err(SatelliteError::ConfigInvalid(format!(
                "code source {url} needs the `http` feature"
            ))),
        }
    }
}

/// Full satellite configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteConfig {
    /// This node.
    pub satellite: ConnectivityInfo,
    /// The coordinator. Read-only; registration is handled elsewhere.
    pub server: ConnectivityInfo,
    pub code_source: CodeSourceConfig,
}

impl SatelliteConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, is not valid TOML, lacks a required key,
    /// or names an empty artifact location.
    pub fn load(path: &Path) -> SatelliteResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SatelliteError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&text).map_err(|source| SatelliteError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply command-line overrides.
    pub fn apply_cli_overrides(&mut self, port: Option<u16>) {
        if let Some(port) = port {
            self.satellite.port = port;
        }
    }

    fn validate(&self) -> SatelliteResult<()> {
        if self.satellite.host.trim().is_empty() {
            return Err(SatelliteError::ConfigInvalid(
                "satellite.host must not be empty".to_owned(),
            ));
        }
        match &self.code_source {
            CodeSourceConfig::Directory { path } if path.as_os_str().is_empty() => Err(
                SatelliteError::ConfigInvalid("code_source.path must not be empty".to_owned()),
            ),
            CodeSourceConfig::Http { url } if url.trim().is_empty() => Err(
                SatelliteError::ConfigInvalid("code_source.url must not be empty".to_owned()),
            ),
            _ => Ok(()),
        }
    }
}
