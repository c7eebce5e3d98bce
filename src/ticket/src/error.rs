//! Error types for the ticket model

use thiserror::Error;

/// Ticket model errors
#[derive(Debug, Error)]
pub enum TicketError {
    /// Stored property value cannot be converted to the requested type
    #[error("Property '{name}' cannot be read as {expected}: {source}")]
    PropertyTypeMismatch {
        name: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Value handed to the property bag has no JSON representation
    #[error("Property '{name}' cannot be stored: {reason}")]
    PropertyEncoding { name: String, reason: String },

    /// No decoder is registered for the ticket type tag
    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(String),

    /// No decoder is registered for the expiration policy type tag
    #[error("Unknown expiration policy: {0}")]
    UnknownExpirationPolicy(String),

    /// Ticket exists but is not of the requested concrete type
    #[error("Ticket {id} is not a {expected}")]
    UnexpectedTicketType { id: String, expected: &'static str },

    /// Ticket id is already registered
    #[error("Ticket already exists: {0}")]
    DuplicateTicket(String),

    /// Ticket id is not registered
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// Record encoding/decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for ticket operations
pub type Result<T> = std::result::Result<T, TicketError>;
