//! In-memory registry store

use super::{InsertOutcome, RegistryStore};
use crate::error::{RegistryError, Result};
use crate::service::{find_conflict, sort_definitions, ServiceDefinition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use wicket_core::ServiceDefinitionId;

/// In-memory registry store implementation
#[derive(Clone, Default)]
pub struct InMemoryRegistryStore {
    services: Arc<RwLock<HashMap<ServiceDefinitionId, ServiceDefinition>>>,
}

impl InMemoryRegistryStore {
    /// Create a new in-memory registry store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `definitions`
    pub fn with_definitions(definitions: impl IntoIterator<Item = ServiceDefinition>) -> Self {
        let services = definitions.into_iter().map(|d| (d.id, d)).collect();
        Self {
            services: Arc::new(RwLock::new(services)),
        }
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.services.read().await.len())
    }

    async fn load(&self) -> Result<Vec<ServiceDefinition>> {
        let services = self.services.read().await;
        let mut definitions: Vec<_> = services.values().cloned().collect();
        sort_definitions(&mut definitions);
        Ok(definitions)
    }

    async fn save(&self, definition: ServiceDefinition) -> Result<ServiceDefinition> {
        let mut services = self.services.write().await;
        if let Some(owner) = services
            .values()
            .find(|s| s.service_id == definition.service_id && s.id != definition.id)
        {
            return Err(RegistryError::DuplicateDefinition(format!(
                "service id '{}' already belongs to definition {}",
                definition.service_id, owner.id
            )));
        }
        services.insert(definition.id, definition.clone());
        Ok(definition)
    }

    async fn insert_new(&self, definition: ServiceDefinition) -> Result<InsertOutcome> {
        let mut services = self.services.write().await;

        if let Some((dimension, existing)) = find_conflict(services.values(), &definition) {
            return Ok(InsertOutcome::Conflict {
                existing: existing.clone(),
                dimension,
            });
        }

        services.insert(definition.id, definition.clone());
        Ok(InsertOutcome::Inserted(definition))
    }

    async fn find_by_id(&self, id: ServiceDefinitionId) -> Result<Option<ServiceDefinition>> {
        Ok(self.services.read().await.get(&id).cloned())
    }

    async fn find_by_exact_service_id(&self, service_id: &str) -> Result<Option<ServiceDefinition>> {
        let services = self.services.read().await;
        Ok(services.values().find(|d| d.service_id == service_id).cloned())
    }

    async fn delete(&self, id: ServiceDefinitionId) -> Result<bool> {
        Ok(self.services.write().await.remove(&id).is_some())
    }
}
