//! Tool resolver — identifier → cached, shared tool instance.
//!
//! Each identifier owns one [`Slot`]. Claiming a slot happens under a short
//! lock on the slot map; loading happens outside it, inside the slot's
//! [`OnceLock`]. Callers racing on the same identifier block on that slot
//! until the single load publishes its outcome, while loads of different
//! identifiers proceed in parallel.
//!
//! Outcomes are permanent for the life of the resolver, failures included:
//! an identifier is fetched at most once.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::source::{ArtifactSource, SourceError};
use crate::tools::{Tool, ToolCatalog};

/// Result of one load, shared by every caller for that identifier.
type LoadOutcome = Result<Arc<dyn Tool>, ResolveError>;

/// Per-identifier cell. Empty while the load is in progress.
type Slot = Arc<OnceLock<LoadOutcome>>;

/// Resolves tool identifiers through a code source and caches the result.
pub struct ToolResolver {
    source: Box<dyn ArtifactSource>,
    catalog: ToolCatalog,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ToolResolver {
    pub fn new(source: impl ArtifactSource + 'static, catalog: ToolCatalog) -> Self {
        Self {
            source: Box::new(source),
            catalog,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the tool for `identifier`, loading it on first use.
    ///
    /// # Errors
    ///
    /// [`ResolveError::ToolNotFound`] if the code source has no artifact for
    /// the identifier, [`ResolveError::ToolLoadError`] if the source failed or
    /// the artifact could not be turned into a tool.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Tool>, ResolveError> {
        let slot = self.claim(identifier);

        if let Some(outcome) = slot.get() {
            debug!(tool = identifier, "tool cache hit");
            return outcome.clone();
        }

        slot.get_or_init(|| self.load(identifier)).clone()
    }

    /// Number of identifiers with a published outcome (success or failure).
    pub fn cached_count(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Whether `identifier` resolved successfully and is cached.
    pub fn is_cached(&self, identifier: &str) -> bool {
        self.lock_slots()
            .get(identifier)
            .and_then(|slot| slot.get())
            .is_some_and(Result::is_ok)
    }

    /// Get or create the slot for `identifier`. Holds the map lock only for
    /// the lookup/insert.
    fn claim(&self, identifier: &str) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(identifier.to_owned()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // Slot map mutations cannot leave it inconsistent, so a poisoned lock is still usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch and construct. Runs at most once per identifier; a panicking
    /// source or constructor still publishes an outcome.
    fn load(&self, identifier: &str) -> LoadOutcome {
        info!(tool = identifier, "loading tool");
        std::panic::catch_unwind(AssertUnwindSafe(|| self.try_load(identifier))).unwrap_or_else(
            |_| {
                warn!(tool = identifier, "tool loader panicked");
                Err(ResolveError::ToolLoadError {
                    name: identifier.to_owned(),
                    reason: "loader panicked".to_owned(),
                })
            },
        )
    }

    fn try_load(&self, identifier: &str) -> LoadOutcome {
        let artifact = self.source.fetch(identifier).map_err(|e| {
            warn!(tool = identifier, error = %e, "artifact fetch failed");
            match e {
                SourceError::ArtifactNotFound { .. } => ResolveError::ToolNotFound {
                    name: identifier.to_owned(),
                },
                SourceError::Unavailable { reason, .. } => ResolveError::ToolLoadError {
                    name: identifier.to_owned(),
                    reason,
                },
            }
        })?;

        let tool = self.catalog.instantiate(&artifact).map_err(|e| {
            warn!(tool = identifier, error = %e, "tool construction failed");
            ResolveError::ToolLoadError {
                name: identifier.to_owned(),
                reason: format!("{e:#}"),
            }
        })?;

        info!(tool = identifier, entry = tool.name(), "tool loaded");
        Ok(Arc::from(tool))
    }
}

impl std::fmt::Debug for ToolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolResolver")
            .field("catalog", &self.catalog)
            .field("cached", &self.cached_count())
            .finish_non_exhaustive()
    }
}
