//! # Wicket Tickets
//!
//! Ticket model used to carry short-lived state across multi-step
//! authentication flows.
//!
//! ## Features
//!
//! - **Ticket contract** with usage bookkeeping and a pluggable expiration policy
//! - **Transient session tickets** binding a service to a typed property bag
//! - **Unique id generation** with per-kind prefixes
//! - **Polymorphic persistence** through tagged records
//! - **In-memory ticket registry** that honors expiration on read
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wicket_core::Service;
//! use wicket_ticket::{HardTimeout, Ticket, TransientSessionTicket};
//!
//! let mut ticket = TransientSessionTicket::new(
//!     "TST-1-a1b2c3",
//!     Arc::new(HardTimeout::from_secs(300)),
//!     Service::new("https://app.example.org"),
//! );
//! ticket.put("client", "GitHubClient");
//!
//! assert!(ticket.contains("client"));
//! assert_eq!(ticket.get::<String>("client").unwrap().as_deref(), Some("GitHubClient"));
//! assert_eq!(ticket.get::<String>("missing").unwrap(), None);
//! assert!(!ticket.is_expired());
//! ```

pub mod codec;
pub mod error;
pub mod expiration;
pub mod id;
pub mod property;
pub mod registry;
pub mod ticket;
pub mod transient;

// Re-export commonly used types
pub use codec::{PolicyRecord, TicketCodec, TicketRecord};
pub use error::{Result, TicketError};
pub use expiration::{ExpirationPolicy, HardTimeout, NeverExpires, TicketState};
pub use id::{DefaultTicketIdGenerator, TicketIdGenerator};
pub use property::PropertyBag;
pub use registry::{get_ticket_as, InMemoryTicketRegistry, TicketRegistry};
pub use ticket::{Ticket, TicketMetadata};
pub use transient::{TransientSessionTicket, TransientSessionTicketFactory};
