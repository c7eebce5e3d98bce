//! Ticket registry contract and in-memory implementation

use crate::codec::{TicketCodec, TicketRecord};
use crate::error::{Result, TicketError};
use crate::ticket::Ticket;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Store for issued tickets, shared by every request handler
#[async_trait]
pub trait TicketRegistry: Send + Sync {
    /// Register a newly issued ticket; ids must be unique
    async fn add_ticket(&self, ticket: &dyn Ticket) -> Result<()>;

    /// Fetch a live ticket. Expired tickets are removed and reported absent.
    async fn get_ticket(&self, id: &str) -> Result<Option<Box<dyn Ticket>>>;

    /// Persist changes made to a registered ticket
    async fn update_ticket(&self, ticket: &dyn Ticket) -> Result<()>;

    /// Remove a ticket, returning whether it was present
    async fn delete_ticket(&self, id: &str) -> Result<bool>;

    /// Number of stored tickets, expired or not
    async fn count(&self) -> Result<usize>;
}

/// Fetch a ticket as its concrete type
pub async fn get_ticket_as<T: Ticket + 'static>(
    registry: &dyn TicketRegistry,
    id: &str,
) -> Result<Option<T>> {
    let Some(ticket) = registry.get_ticket(id).await? else {
        return Ok(None);
    };

    ticket
        .into_any()
        .downcast::<T>()
        .map(|ticket| Some(*ticket))
        .map_err(|_| TicketError::UnexpectedTicketType {
            id: id.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

/// In-memory registry keeping tickets in their encoded form.
///
/// Every ticket read back has been through [`TicketCodec`].
pub struct InMemoryTicketRegistry {
    tickets: DashMap<String, TicketRecord>,
    codec: Arc<TicketCodec>,
}

impl InMemoryTicketRegistry {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(TicketCodec::new()))
    }

    pub fn with_codec(codec: Arc<TicketCodec>) -> Self {
        Self {
            tickets: DashMap::new(),
            codec,
        }
    }

    /// Remove every expired ticket, returning the removed ids.
    ///
    /// Meant to be driven by an external scheduler; the registry never runs
    /// it on its own. Records that no longer decode are left in place.
    pub fn sweep_expired(&self) -> Result<Vec<String>> {
        let mut expired = Vec::new();
        for entry in self.tickets.iter() {
            match self.codec.decode(entry.value().clone()) {
                Ok(ticket) if ticket.is_expired() => expired.push(entry.key().clone()),
                Ok(_) => {}
                Err(e) => warn!("Skipping ticket [{}] during sweep: {}", entry.key(), e),
            }
        }

        for id in &expired {
            self.tickets.remove(id);
        }

        if !expired.is_empty() {
            debug!("Removed {} expired tickets", expired.len());
        }
        Ok(expired)
    }
}

impl Default for InMemoryTicketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketRegistry for InMemoryTicketRegistry {
    async fn add_ticket(&self, ticket: &dyn Ticket) -> Result<()> {
        let record = self.codec.encode(ticket)?;
        self.codec.ensure_decodable(&record)?;
        match self.tickets.entry(record.id().to_string()) {
            Entry::Occupied(_) => Err(TicketError::DuplicateTicket(record.id().to_string())),
            Entry::Vacant(slot) => {
                debug!("Added ticket [{}]", record.id());
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get_ticket(&self, id: &str) -> Result<Option<Box<dyn Ticket>>> {
        let Some(record) = self.tickets.get(id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };

        let ticket = self.codec.decode(record)?;
        if ticket.is_expired() {
            debug!("Ticket [{}] has expired and is removed from the registry", id);
            self.tickets.remove(id);
            return Ok(None);
        }
        Ok(Some(ticket))
    }

    async fn update_ticket(&self, ticket: &dyn Ticket) -> Result<()> {
        let record = self.codec.encode(ticket)?;
        self.codec.ensure_decodable(&record)?;
        match self.tickets.get_mut(record.id()) {
            Some(mut entry) => {
                *entry = record;
                Ok(())
            }
            None => Err(TicketError::TicketNotFound(ticket.id().to_string())),
        }
    }

    async fn delete_ticket(&self, id: &str) -> Result<bool> {
        Ok(self.tickets.remove(id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.tickets.len())
    }
}
