//! Startup synchronization of external definitions into the registry
//!
//! [`SyncEngine::initialize_registry_if_necessary`] runs once before the
//! server accepts traffic. Candidates already covered by the registry are
//! skipped, everything else is persisted, and the authorization cache is
//! reloaded so lookups observe the result. Running it again over the same
//! candidates changes nothing.

use crate::cache::AuthorizationCache;
use crate::error::Result;
use crate::service::{MatchDimension, ServiceDefinition};
use crate::source::ServiceSource;
use crate::store::{InsertOutcome, RegistryStore};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decision points reported while synchronizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Registry size before anything else happens
    RegistrySize { store: String, size: usize },

    /// Initialization from external definitions is turned off
    InitializationDisabled { store: String },

    /// Initialization from external definitions is turned on
    InitializationEnabled { store: String },

    /// Candidates were read from the source
    CandidatesLoaded { source: String, candidates: Vec<ServiceDefinition> },

    /// A candidate is already covered by an entry in the registry
    Skipped {
        candidate: ServiceDefinition,
        existing: ServiceDefinition,
        dimension: MatchDimension,
    },

    /// A candidate is about to be written to the registry
    Persisting { definition: ServiceDefinition },

    /// The authorization cache was reloaded
    CacheLoaded { store: String, count: usize },
}

/// Receives every synchronization decision
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Reports synchronization through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::RegistrySize { size, .. } => {
                debug!("Service registry contains [{}] service definitions", size);
            }
            SyncEvent::InitializationDisabled { store } => {
                info!(
                    "The service registry backed by [{}] will not be initialized from JSON services. \
                     If the registry ends up empty, no service will be authorized until definitions are \
                     added. To auto-initialize the registry, set 'init_from_json = true' in the [registry] \
                     section of the node configuration.",
                    store
                );
            }
            SyncEvent::InitializationEnabled { store } => {
                warn!(
                    "Service registry [{}] will be auto-initialized from JSON service definitions. \
                     This is only meant for testing and demo setups and MAY NOT be appropriate for \
                     production. Consider setting 'init_from_json = false' and registering \
                     definitions explicitly.",
                    store
                );
            }
            SyncEvent::CandidatesLoaded { source, candidates } => {
                debug!("Loaded {} candidate definitions from {}", candidates.len(), source);
            }
            SyncEvent::Skipped {
                candidate,
                existing,
                dimension: MatchDimension::Id,
            } => {
                warn!(
                    "Skipping [{}] JSON service definition as a matching id [{}] is found in the registry",
                    candidate.name, existing.id
                );
            }
            SyncEvent::Skipped { candidate, existing, .. } => {
                warn!(
                    "Skipping [{}] JSON service definition as a matching service [{}] is found in the registry",
                    candidate.name, existing.name
                );
            }
            SyncEvent::Persisting { definition } => {
                debug!("Initializing service registry with the [{}] JSON service definition", definition);
            }
            SyncEvent::CacheLoaded { store, count } => {
                info!("Service registry [{}] contains [{}] service definitions", store, count);
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Candidate left out because the registry already covers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCandidate {
    pub candidate: ServiceDefinition,
    pub existing: ServiceDefinition,
    pub dimension: MatchDimension,
}

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Registry size observed before synchronizing
    pub registry_size_before: usize,

    /// Number of candidates read from the source
    pub candidates: usize,

    pub persisted: Vec<ServiceDefinition>,

    pub skipped: Vec<SkippedCandidate>,

    /// Cache size after reload; `None` when initialization is disabled
    pub cache_count: Option<usize>,
}

impl SyncReport {
    pub fn is_disabled(&self) -> bool {
        self.cache_count.is_none()
    }
}

/// Bootstrap engine
pub struct SyncEngine {
    init_from_json: bool,
    store: Arc<dyn RegistryStore>,
    source: Arc<dyn ServiceSource>,
    cache: Arc<dyn AuthorizationCache>,
    observer: Arc<dyn SyncObserver>,
}

impl SyncEngine {
    pub fn new(
        init_from_json: bool,
        store: Arc<dyn RegistryStore>,
        source: Arc<dyn ServiceSource>,
        cache: Arc<dyn AuthorizationCache>,
    ) -> Self {
        Self {
            init_from_json,
            store,
            source,
            cache,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Merge source candidates into the registry when enabled, then reload the cache.
    ///
    /// Store, source, and cache failures abort the pass and are returned as-is.
    pub async fn initialize_registry_if_necessary(&self) -> Result<SyncReport> {
        let store_name = self.store.name().to_string();
        let size = self.store.size().await?;
        self.emit(SyncEvent::RegistrySize {
            store: store_name.clone(),
            size,
        });

        let mut report = SyncReport {
            registry_size_before: size,
            ..SyncReport::default()
        };

        if !self.init_from_json {
            self.emit(SyncEvent::InitializationDisabled { store: store_name });
            return Ok(report);
        }

        self.emit(SyncEvent::InitializationEnabled {
            store: store_name.clone(),
        });

        let candidates = self.source.load().await?;
        report.candidates = candidates.len();
        self.emit(SyncEvent::CandidatesLoaded {
            source: self.source.describe(),
            candidates: candidates.clone(),
        });

        for candidate in candidates {
            if let Some((dimension, existing)) = self.find_existing_match(&candidate).await? {
                self.skip(&mut report, candidate, existing, dimension);
                continue;
            }

            self.emit(SyncEvent::Persisting {
                definition: candidate.clone(),
            });
            match self.store.insert_new(candidate.clone()).await? {
                InsertOutcome::Inserted(definition) => report.persisted.push(definition),
                // Another writer got there between the lookup and the insert
                InsertOutcome::Conflict { existing, dimension } => {
                    self.skip(&mut report, candidate, existing, dimension);
                }
            }
        }

        self.cache.load().await?;
        let count = self.cache.count().await;
        self.emit(SyncEvent::CacheLoaded {
            store: store_name,
            count,
        });
        report.cache_count = Some(count);

        Ok(report)
    }

    /// Existing entry covering `candidate`, checked by pattern, exact text, then id
    async fn find_existing_match(
        &self,
        candidate: &ServiceDefinition,
    ) -> Result<Option<(MatchDimension, ServiceDefinition)>> {
        if let Some(found) = self.store.find_by_service_id_pattern(&candidate.service_id).await? {
            return Ok(Some((MatchDimension::ServiceIdPattern, found)));
        }
        if let Some(found) = self.store.find_by_exact_service_id(&candidate.service_id).await? {
            return Ok(Some((MatchDimension::ExactServiceId, found)));
        }
        Ok(self
            .store
            .find_by_id(candidate.id)
            .await?
            .map(|found| (MatchDimension::Id, found)))
    }

    fn skip(
        &self,
        report: &mut SyncReport,
        candidate: ServiceDefinition,
        existing: ServiceDefinition,
        dimension: MatchDimension,
    ) {
        self.emit(SyncEvent::Skipped {
            candidate: candidate.clone(),
            existing: existing.clone(),
            dimension,
        });
        report.skipped.push(SkippedCandidate {
            candidate,
            existing,
            dimension,
        });
    }

    fn emit(&self, event: SyncEvent) {
        self.observer.on_event(&event);
    }
}
