//! Transient session tickets
//!
//! Issued when an authentication request has to leave the server (for
//! example a redirect to an external identity provider). The ticket keeps
//! the calling service and whatever request state the flow needs, so the
//! exchange can be resumed when the browser comes back.

use crate::error::{Result, TicketError};
use crate::expiration::ExpirationPolicy;
use crate::id::TicketIdGenerator;
use crate::property::PropertyBag;
use crate::ticket::{Ticket, TicketMetadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use wicket_core::Service;

/// Ticket binding a service reference to a typed property bag
#[derive(Debug, Clone)]
pub struct TransientSessionTicket {
    metadata: TicketMetadata,
    expiration_policy: Arc<dyn ExpirationPolicy>,
    service: Service,
    properties: PropertyBag,
}

/// Persisted kind-specific fields
#[derive(Serialize, Deserialize)]
struct TransientSessionPayload {
    service: Service,
    #[serde(default)]
    properties: PropertyBag,
}

impl TransientSessionTicket {
    /// Id prefix and type tag of transient session tickets
    pub const PREFIX: &'static str = "TST";

    pub fn new(
        id: impl Into<String>,
        expiration_policy: Arc<dyn ExpirationPolicy>,
        service: Service,
    ) -> Self {
        Self::with_properties(id, expiration_policy, service, PropertyBag::new())
    }

    pub fn with_properties(
        id: impl Into<String>,
        expiration_policy: Arc<dyn ExpirationPolicy>,
        service: Service,
        properties: impl Into<PropertyBag>,
    ) -> Self {
        Self {
            metadata: TicketMetadata::new(id),
            expiration_policy,
            service,
            properties: properties.into(),
        }
    }

    /// Rebuild a persisted ticket; used by the codec
    pub(crate) fn decode(
        metadata: TicketMetadata,
        expiration_policy: Arc<dyn ExpirationPolicy>,
        payload: Value,
    ) -> Result<Box<dyn Ticket>> {
        let payload: TransientSessionPayload = serde_json::from_value(payload)
            .map_err(|e| TicketError::Serialization(format!("Invalid transient session payload: {}", e)))?;

        Ok(Box::new(Self {
            metadata,
            expiration_policy,
            service: payload.service,
            properties: payload.properties,
        }))
    }

    /// Service that started the flow
    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Insert or overwrite a property
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.put(name, value);
    }

    /// Merge properties, overwriting on key collision
    pub fn put_all<I, K, V>(&mut self, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.properties.put_all(properties);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// Typed read; `Ok(None)` when absent, error on type mismatch
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.properties.get(name)
    }

    /// Typed read falling back to `default` when absent
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        self.properties.get_or(name, default)
    }
}

impl Ticket for TransientSessionTicket {
    fn prefix(&self) -> &'static str {
        Self::PREFIX
    }

    fn metadata(&self) -> &TicketMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut TicketMetadata {
        &mut self.metadata
    }

    fn expiration_policy(&self) -> &Arc<dyn ExpirationPolicy> {
        &self.expiration_policy
    }

    fn payload(&self) -> Result<Value> {
        let payload = TransientSessionPayload {
            service: self.service.clone(),
            properties: self.properties.clone(),
        };
        serde_json::to_value(payload)
            .map_err(|e| TicketError::Serialization(format!("Failed to encode transient session: {}", e)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Issues transient session tickets with a fixed policy and id generator
pub struct TransientSessionTicketFactory {
    id_generator: Arc<dyn TicketIdGenerator>,
    expiration_policy: Arc<dyn ExpirationPolicy>,
}

impl TransientSessionTicketFactory {
    pub fn new(
        id_generator: Arc<dyn TicketIdGenerator>,
        expiration_policy: Arc<dyn ExpirationPolicy>,
    ) -> Self {
        Self {
            id_generator,
            expiration_policy,
        }
    }

    /// Ticket with an empty property bag
    pub fn create(&self, service: Service) -> TransientSessionTicket {
        self.create_with_properties(service, PropertyBag::new())
    }

    pub fn create_with_properties(
        &self,
        service: Service,
        properties: impl Into<PropertyBag>,
    ) -> TransientSessionTicket {
        let id = self.id_generator.new_ticket_id(TransientSessionTicket::PREFIX);
        TransientSessionTicket::with_properties(id, Arc::clone(&self.expiration_policy), service, properties)
    }

    pub fn expiration_policy(&self) -> &Arc<dyn ExpirationPolicy> {
        &self.expiration_policy
    }
}
