//! Persistent storage for service definitions

use crate::error::Result;
use crate::service::{MatchDimension, ServiceDefinition};
use async_trait::async_trait;
use wicket_core::ServiceDefinitionId;

pub mod memory;
pub mod sled;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use self::memory::InMemoryRegistryStore;
pub use self::sled::SledRegistryStore;

#[cfg(feature = "postgres")]
pub use self::postgres::PostgresRegistryStore;

/// Result of a guarded insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The definition was stored
    Inserted(ServiceDefinition),
    /// An entry already covers the definition; nothing was written
    Conflict {
        existing: ServiceDefinition,
        dimension: MatchDimension,
    },
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Registry store trait
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Diagnostic label for the backend
    fn name(&self) -> &str;

    /// Number of stored definitions
    async fn size(&self) -> Result<usize>;

    /// All definitions, by evaluation order then id
    async fn load(&self) -> Result<Vec<ServiceDefinition>>;

    /// Insert or replace a definition keyed by id. Fails with
    /// `DuplicateDefinition` when another id already holds the same service id text.
    async fn save(&self, definition: ServiceDefinition) -> Result<ServiceDefinition>;

    /// Insert a definition only if neither its id nor its exact service id is
    /// already present. The check and the write are atomic.
    async fn insert_new(&self, definition: ServiceDefinition) -> Result<InsertOutcome>;

    /// Get a definition by id
    async fn find_by_id(&self, id: ServiceDefinitionId) -> Result<Option<ServiceDefinition>>;

    /// First definition, by evaluation order, whose pattern matches `url`
    async fn find_by_service_id_pattern(&self, url: &str) -> Result<Option<ServiceDefinition>> {
        Ok(self.load().await?.into_iter().find(|d| d.matches(url)))
    }

    /// Definition whose service id text equals `service_id`
    async fn find_by_exact_service_id(&self, service_id: &str) -> Result<Option<ServiceDefinition>>;

    /// Delete a definition, returning whether it existed
    async fn delete(&self, id: ServiceDefinitionId) -> Result<bool>;
}
