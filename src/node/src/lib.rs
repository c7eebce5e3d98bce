//! Wicket Node Library
//!
//! Wires the service registry and the ticket model into a runnable node:
//! configuration, registry backend selection, startup bootstrap, and
//! periodic ticket maintenance.

pub mod config;
pub mod node;
pub mod validate;

pub use config::{NodeConfig, RegistryBackend};
pub use node::WicketNode;
pub use validate::{validate_directory, Problem, ValidationReport};
