//! Tool capability and the catalog that constructs tools from artifacts.
//!
//! A tool is anything that can turn a JSON parameter value into a JSON
//! result. Tools are never linked to the request path by name: the resolver
//! fetches an artifact, and the [`ToolCatalog`] turns the artifact's manifest
//! into a live instance through the constructor registered for its `entry`.
//!
//! ```text
//! artifact bytes → ToolManifest { entry, config } → Constructor(config) → Box<dyn Tool>
//! ```

pub mod add;
pub mod echo;
pub mod fibonacci;

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use crate::source::Artifact;

/// A unit of work invoked with parameters, producing a result or failing.
pub trait Tool: Send + Sync {
    /// Catalog entry this instance was built from.
    fn name(&self) -> &str;

    /// Run the tool once.
    fn execute(&self, parameters: serde_json::Value) -> Result<serde_json::Value>;
}

/// Constructor for one catalog entry. Receives the manifest's `config`
/// (`Value::Null` when absent).
pub type Constructor = fn(&serde_json::Value) -> Result<Box<dyn Tool>>;

/// Decoded artifact payload.
#[derive(Debug, Deserialize)]
pub struct ToolManifest {
    /// Name of the constructor to invoke.
    pub entry: String,
    /// Constructor-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ToolManifest {
    pub fn parse(artifact: &Artifact) -> Result<Self> {
        serde_json::from_slice(artifact.bytes()).context("malformed tool manifest")
    }
}

/// Registry of tool constructors keyed by entry name.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    constructors: BTreeMap<String, Constructor>,
}

impl ToolCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the built-in tools.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(echo::ENTRY, echo::construct);
        catalog.register(add::ENTRY, add::construct);
        catalog.register(fibonacci::ENTRY, fibonacci::construct);
        catalog
    }

    /// Register (or replace) the constructor for `entry`.
    pub fn register(&mut self, entry: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(entry.into(), constructor);
    }

    /// Registered entry names, sorted.
    pub fn entries(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build a tool from an artifact.
    ///
    /// # Errors
    ///
    /// Fails if the manifest is malformed, names an unregistered entry, or the
    /// constructor rejects its config.
    pub fn instantiate(&self, artifact: &Artifact) -> Result<Box<dyn Tool>> {
        let manifest = ToolManifest::parse(artifact)?;
        let Some(constructor) = self.constructors.get(&manifest.entry) else {
            bail!("no constructor registered for entry `{}`", manifest.entry);
        };
        debug!(entry = manifest.entry, "constructing tool");
        constructor(&manifest.config)
            .with_context(|| format!("constructor for `{}` failed", manifest.entry))
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("entries", &self.entries())
            .finish()
    }
}
