//! Code sources — where tool artifacts come from.
//!
//! The resolver only sees the [`ArtifactSource`] trait. Three sources ship:
//!
//! - [`DirectorySource`] — `<root>/<identifier>.json` on the local filesystem
//! - [`MemorySource`] — an in-process map, for embedding and tests
//! - `HttpSource` — `GET <base>/<identifier>` against a code server (feature `http`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

/// Loadable representation of a tool, as returned by a code source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Failure to fetch an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source has nothing under this identifier.
    #[error("artifact not found: {name}")]
    ArtifactNotFound { name: String },

    /// The source could not be consulted.
    #[error("code source unavailable for {name}: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Something that can answer "fetch the artifact for identifier X".
pub trait ArtifactSource: Send + Sync {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError>;
}

impl<S: ArtifactSource + ?Sized> ArtifactSource for Box<S> {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError> {
        (**self).fetch(identifier)
    }
}

/// Identifiers become file names or URL segments, so they must be a single
/// plain path component.
fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\', '\0'])
}

// ---------------------------------------------------------------------------
// Directory source
// ---------------------------------------------------------------------------

/// Reads artifacts from `<root>/<identifier>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.root.join(format!("{identifier}.json"))
    }
}

impl ArtifactSource for DirectorySource {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError> {
        if !is_safe_identifier(identifier) {
            return Err(SourceError::ArtifactNotFound {
                name: identifier.to_owned(),
            });
        }
        let path = self.artifact_path(identifier);
        debug!(path = %path.display(), "reading artifact");
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Artifact::new(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::ArtifactNotFound {
                    name: identifier.to_owned(),
                })
            }
            Err(e) => Err(SourceError::Unavailable {
                name: identifier.to_owned(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory source
// ---------------------------------------------------------------------------

/// In-process artifact map.
#[derive(Debug, Default)]
pub struct MemorySource {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) an artifact.
    pub fn insert(&self, identifier: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let mut artifacts = self
            .artifacts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        artifacts.insert(identifier.into(), Artifact::new(bytes.into()));
    }

    /// Builder-style [`MemorySource::insert`].
    #[must_use]
    pub fn with(self, identifier: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(identifier, bytes);
        self
    }
}

impl ArtifactSource for MemorySource {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError> {
        let artifacts = self
            .artifacts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        artifacts
            .get(identifier)
            .cloned()
            .ok_or_else(|| SourceError::ArtifactNotFound {
                name: identifier.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches artifacts from a code server with `GET <base_url>/<identifier>`.
///
/// The identifier is appended as one percent-encoded path segment, so `?`,
/// `#` and `%` in an identifier never change which resource is requested.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: reqwest::Url,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let base_url = base_url.into();
        let parsed = reqwest::Url::parse(&base_url)
            .with_context(|| format!("invalid code source URL {base_url}"))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("code source URL {base_url} cannot carry a path");
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build HTTP client for code source")?;
        Ok(Self {
            base_url: parsed,
            client,
        })
    }

    /// URL for `identifier`, or `None` if the base cannot take path segments.
    fn artifact_url(&self, identifier: &str) -> Option<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(identifier);
        Some(url)
    }
}

#[cfg(feature = "http")]
impl ArtifactSource for HttpSource {
    fn fetch(&self, identifier: &str) -> Result<Artifact, SourceError> {
        let not_found = || SourceError::ArtifactNotFound {
            name: identifier.to_owned(),
        };
        let unavailable = |reason: String| SourceError::Unavailable {
            name: identifier.to_owned(),
            reason,
        };
        if !is_safe_identifier(identifier) {
            return Err(not_found());
        }
        let Some(url) = self.artifact_url(identifier) else {
            return Err(not_found());
        };

        debug!(%url, "fetching artifact");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        let response = response
            .error_for_status()
            .map_err(|e| unavailable(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| unavailable(e.to_string()))?;
        Ok(Artifact::new(bytes.to_vec()))
    }
}
