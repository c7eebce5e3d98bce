//! In-memory view of the registry used for runtime service decisions

use crate::error::Result;
use crate::service::ServiceDefinition;
use crate::store::RegistryStore;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wicket_core::Service;

/// Cache refreshed from the registry store
#[async_trait]
pub trait AuthorizationCache: Send + Sync {
    /// Replace the cached view with the store's current contents
    async fn load(&self) -> Result<()>;

    /// Number of definitions in the cached view
    async fn count(&self) -> usize;
}

/// Services manager configuration
#[derive(Debug, Clone)]
pub struct ServicesManagerConfig {
    /// Maximum number of memoized URL lookups
    pub lookup_capacity: usize,
}

impl Default for ServicesManagerConfig {
    fn default() -> Self {
        Self {
            lookup_capacity: 10_000,
        }
    }
}

#[derive(Clone)]
struct CompiledService {
    definition: ServiceDefinition,
    pattern: Regex,
}

/// Default [`AuthorizationCache`]: compiled definitions in evaluation order
/// plus a memo of recent URL lookups.
pub struct ServicesManager {
    store: Arc<dyn RegistryStore>,

    services: RwLock<Vec<CompiledService>>,

    /// URL to matched definition; cleared on every load
    lookups: DashMap<String, Option<ServiceDefinition>>,

    config: ServicesManagerConfig,

    stats: DashMap<String, usize>,
}

impl ServicesManager {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self::with_config(store, ServicesManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn RegistryStore>, config: ServicesManagerConfig) -> Self {
        Self {
            store,
            services: RwLock::new(Vec::new()),
            lookups: DashMap::new(),
            config,
            stats: DashMap::new(),
        }
    }

    /// First definition, by evaluation order, whose pattern matches the service URL
    pub fn find_service(&self, service: &Service) -> Option<ServiceDefinition> {
        let url = service.url();

        if let Some(cached) = self.lookups.get(url) {
            self.increment_stat("hits");
            return cached.clone();
        }
        self.increment_stat("misses");

        // Memoize under the read guard so a concurrent load clears this entry
        let services = self.services.read();
        let found = services
            .iter()
            .find(|s| s.pattern.is_match(url))
            .map(|s| s.definition.clone());

        if self.lookups.len() >= self.config.lookup_capacity {
            self.evict_lookups();
        }
        self.lookups.insert(url.to_string(), found.clone());
        found
    }

    /// Whether any definition authorizes the service
    pub fn matches_existing_service(&self, service: &Service) -> bool {
        self.find_service(service).is_some()
    }

    /// Every cached definition, in evaluation order
    pub fn all_services(&self) -> Vec<ServiceDefinition> {
        self.services
            .read()
            .iter()
            .map(|s| s.definition.clone())
            .collect()
    }

    pub fn stats(&self) -> LookupStats {
        LookupStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            loads: self.get_stat("loads"),
            entries: self.lookups.len(),
            max_entries: self.config.lookup_capacity,
        }
    }

    fn evict_lookups(&self) {
        // Remove up to 10% of entries
        let to_remove = (self.config.lookup_capacity / 10).max(1);
        let mut removed = 0;

        self.lookups.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl AuthorizationCache for ServicesManager {
    async fn load(&self) -> Result<()> {
        let definitions = self.store.load().await?;

        let mut compiled = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match definition.pattern() {
                Ok(pattern) => compiled.push(CompiledService { definition, pattern }),
                Err(e) => warn!("Skipping service definition {}: {}", definition, e),
            }
        }

        let count = compiled.len();
        debug!("Compiled {} service definitions from [{}]", count, self.store.name());
        {
            let mut services = self.services.write();
            *services = compiled;
            self.lookups.clear();
        }
        self.increment_stat("loads");

        info!("Loaded {} services from [{}]", count, self.store.name());
        Ok(())
    }

    async fn count(&self) -> usize {
        self.services.read().len()
    }
}

/// Lookup statistics
#[derive(Debug, Clone)]
pub struct LookupStats {
    pub hits: usize,
    pub misses: usize,
    pub loads: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl LookupStats {
    /// Calculate lookup hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
