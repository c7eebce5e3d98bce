//! Shared types for the Wicket workspace

pub mod service;

// Re-export commonly used types
pub use service::{Service, ServiceDefinitionId};
