//! Ticket abstraction shared by every ticket kind

use crate::error::Result;
use crate::expiration::{ExpirationPolicy, TicketState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Identity and usage bookkeeping common to all tickets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMetadata {
    /// Globally unique ticket id, prefixed by the ticket kind
    pub id: String,

    pub creation_time: DateTime<Utc>,

    pub last_time_used: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_time_used: Option<DateTime<Utc>>,

    #[serde(default)]
    pub count_of_uses: u32,

    /// Set when the ticket was explicitly invalidated
    #[serde(default)]
    pub expired: bool,
}

impl TicketMetadata {
    /// Fresh metadata for a ticket issued now
    pub fn new(id: impl Into<String>) -> Self {
        Self::created_at(id, Utc::now())
    }

    /// Metadata for a ticket issued at `creation_time`
    pub fn created_at(id: impl Into<String>, creation_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            creation_time,
            last_time_used: creation_time,
            previous_time_used: None,
            count_of_uses: 0,
            expired: false,
        }
    }

    /// Record a use of the ticket
    pub fn record_use(&mut self) {
        self.previous_time_used = Some(self.last_time_used);
        self.last_time_used = Utc::now();
        self.count_of_uses = self.count_of_uses.saturating_add(1);
    }
}

impl TicketState for TicketMetadata {
    fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    fn last_time_used(&self) -> DateTime<Utc> {
        self.last_time_used
    }

    fn previous_time_used(&self) -> Option<DateTime<Utc>> {
        self.previous_time_used
    }

    fn count_of_uses(&self) -> u32 {
        self.count_of_uses
    }
}

/// An identified, expiration-governed record issued during an authentication flow.
///
/// Implementors supply their metadata, policy handle, kind prefix and
/// payload; everything else is provided.
pub trait Ticket: Send + Sync + fmt::Debug {
    /// Fixed id prefix of the concrete ticket kind, also used as its type tag
    fn prefix(&self) -> &'static str;

    fn metadata(&self) -> &TicketMetadata;

    fn metadata_mut(&mut self) -> &mut TicketMetadata;

    /// Policy this ticket was issued with
    fn expiration_policy(&self) -> &Arc<dyn ExpirationPolicy>;

    /// Kind-specific fields in persisted form
    fn payload(&self) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.metadata().creation_time
    }

    fn count_of_uses(&self) -> u32 {
        self.metadata().count_of_uses
    }

    /// Record a use of the ticket
    fn update(&mut self) {
        self.metadata_mut().record_use();
    }

    /// Invalidate the ticket regardless of its policy
    fn mark_expired(&mut self) {
        self.metadata_mut().expired = true;
    }

    /// Explicitly invalidated, or expired according to the policy
    fn is_expired(&self) -> bool {
        self.metadata().expired || self.expiration_policy().is_expired(self.metadata())
    }
}
