//! Error types for the service registry

use thiserror::Error;

/// Service registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Backing store could not be reached or failed the operation
    #[error("Registry store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Definition collides with an existing entry
    #[error("Duplicate service definition: {0}")]
    DuplicateDefinition(String),

    /// Definition is malformed
    #[error("Invalid service definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// Service id is not a valid pattern
    #[error("Invalid service pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
