//! # Wicket Service Registry
//!
//! Registry of services allowed to use the authentication server, and the
//! startup synchronization that seeds it from external definitions.
//!
//! ## Features
//!
//! - **Service definitions** matched against service URLs by anchored,
//!   case-insensitive patterns
//! - **Registry stores**: in-memory, embedded sled, and PostgreSQL (`postgres` feature)
//! - **Candidate sources** reading JSON definition files
//! - **Services manager** caching compiled definitions for runtime lookups
//! - **Sync engine** performing idempotent, duplicate-free bootstrap
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wicket_registry::{
//!     AuthorizationCache, InMemoryRegistryStore, ServiceDefinition, ServicesManager,
//!     StaticServiceSource, SyncEngine,
//! };
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryRegistryStore::new());
//! let cache = Arc::new(ServicesManager::new(store.clone()));
//! let source = Arc::new(StaticServiceSource::new([
//!     ServiceDefinition::new(1, r"^https://app\.example\.org/.*", "App"),
//! ]));
//!
//! let engine = SyncEngine::new(true, store, source, cache.clone());
//! let report = engine.initialize_registry_if_necessary().await.unwrap();
//!
//! assert_eq!(report.persisted.len(), 1);
//! assert_eq!(cache.count().await, 1);
//! # });
//! ```

pub mod cache;
pub mod error;
pub mod service;
pub mod source;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use cache::{AuthorizationCache, LookupStats, ServicesManager, ServicesManagerConfig};
pub use error::{RegistryError, Result};
pub use service::{find_conflict, MatchDimension, ServiceDefinition};
pub use source::{parse_definition, JsonServiceSource, ServiceSource, StaticServiceSource};
pub use store::{InMemoryRegistryStore, InsertOutcome, RegistryStore, SledRegistryStore};
pub use sync::{
    RecordingObserver, SkippedCandidate, SyncEngine, SyncEvent, SyncObserver, SyncReport,
    TracingObserver,
};

#[cfg(feature = "postgres")]
pub use store::PostgresRegistryStore;
