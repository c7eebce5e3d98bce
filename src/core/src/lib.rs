//! # Wicket Core
//!
//! Shared types for the Wicket workspace. This package breaks the dependency
//! between the ticket model and the service registry, which both need to talk
//! about the service that started an authentication flow.

pub mod types;

// Re-export commonly used types
pub use types::{Service, ServiceDefinitionId};
