//! Polymorphic ticket persistence
//!
//! Tickets of different kinds share one store. Each persisted record carries
//! the ticket's type tag (its id prefix) and the type tag of its expiration
//! policy; decoding looks both up in tables of registered constructors.

use crate::error::{Result, TicketError};
use crate::expiration::{ExpirationPolicy, HardTimeout, NeverExpires};
use crate::ticket::{Ticket, TicketMetadata};
use crate::transient::TransientSessionTicket;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Persisted form of an expiration policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

/// Persisted form of a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Ticket type tag
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub metadata: TicketMetadata,

    #[serde(rename = "expirationPolicy")]
    pub expiration_policy: PolicyRecord,

    #[serde(default)]
    pub payload: Value,
}

impl TicketRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Rebuilds a concrete ticket from its persisted parts
pub type TicketDecoder =
    fn(TicketMetadata, Arc<dyn ExpirationPolicy>, Value) -> Result<Box<dyn Ticket>>;

/// Rebuilds an expiration policy from its persisted parameters
pub type PolicyDecoder = fn(&Value) -> Result<Arc<dyn ExpirationPolicy>>;

/// Encoder/decoder for heterogeneous tickets
pub struct TicketCodec {
    tickets: HashMap<String, TicketDecoder>,
    policies: HashMap<String, PolicyDecoder>,
}

impl TicketCodec {
    /// Codec with no registered kinds
    pub fn empty() -> Self {
        Self {
            tickets: HashMap::new(),
            policies: HashMap::new(),
        }
    }

    /// Codec knowing the ticket kinds and policies shipped with this crate
    pub fn new() -> Self {
        let mut codec = Self::empty();
        codec.register_ticket_type(TransientSessionTicket::PREFIX, TransientSessionTicket::decode);
        codec.register_policy(NeverExpires::NAME, |_| {
            Ok(Arc::new(NeverExpires) as Arc<dyn ExpirationPolicy>)
        });
        codec.register_policy(HardTimeout::NAME, |parameters| {
            HardTimeout::from_parameters(parameters)
                .map(|policy| Arc::new(policy) as Arc<dyn ExpirationPolicy>)
                .ok_or_else(|| {
                    TicketError::Serialization(format!("Invalid {} parameters: {}", HardTimeout::NAME, parameters))
                })
        });
        codec
    }

    pub fn register_ticket_type(&mut self, type_tag: impl Into<String>, decoder: TicketDecoder) {
        self.tickets.insert(type_tag.into(), decoder);
    }

    pub fn register_policy(&mut self, type_tag: impl Into<String>, decoder: PolicyDecoder) {
        self.policies.insert(type_tag.into(), decoder);
    }

    /// Encode any ticket into its tagged record
    pub fn encode(&self, ticket: &dyn Ticket) -> Result<TicketRecord> {
        let policy = ticket.expiration_policy();
        Ok(TicketRecord {
            kind: ticket.prefix().to_string(),
            metadata: ticket.metadata().clone(),
            expiration_policy: PolicyRecord {
                kind: policy.name().to_string(),
                parameters: policy.parameters(),
            },
            payload: ticket.payload()?,
        })
    }

    /// Fail unless both the ticket kind and the policy of `record` are registered
    pub fn ensure_decodable(&self, record: &TicketRecord) -> Result<()> {
        if !self.tickets.contains_key(&record.kind) {
            return Err(TicketError::UnknownTicketType(record.kind.clone()));
        }
        if !self.policies.contains_key(&record.expiration_policy.kind) {
            return Err(TicketError::UnknownExpirationPolicy(record.expiration_policy.kind.clone()));
        }
        Ok(())
    }

    /// Decode a record back into its concrete ticket kind
    pub fn decode(&self, record: TicketRecord) -> Result<Box<dyn Ticket>> {
        let ticket_decoder = self
            .tickets
            .get(&record.kind)
            .ok_or_else(|| TicketError::UnknownTicketType(record.kind.clone()))?;

        let policy_decoder = self
            .policies
            .get(&record.expiration_policy.kind)
            .ok_or_else(|| TicketError::UnknownExpirationPolicy(record.expiration_policy.kind.clone()))?;

        let policy = policy_decoder(&record.expiration_policy.parameters)?;
        ticket_decoder(record.metadata, policy, record.payload)
    }

    pub fn to_json(&self, ticket: &dyn Ticket) -> Result<Vec<u8>> {
        let record = self.encode(ticket)?;
        serde_json::to_vec(&record)
            .map_err(|e| TicketError::Serialization(format!("Failed to serialize ticket: {}", e)))
    }

    pub fn from_json(&self, bytes: &[u8]) -> Result<Box<dyn Ticket>> {
        let record: TicketRecord = serde_json::from_slice(bytes)
            .map_err(|e| TicketError::Serialization(format!("Failed to deserialize ticket: {}", e)))?;
        self.decode(record)
    }
}

impl Default for TicketCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wicket_core::Service;

    fn sample() -> TransientSessionTicket {
        let mut ticket = TransientSessionTicket::new(
            "TST-1-abc",
            Arc::new(HardTimeout::from_secs(300)),
            Service::new("https://app.example.org"),
        );
        ticket.put("client", "GitHubClient");
        ticket.put("attempt", 2);
        ticket
    }

    #[test]
    fn test_record_carries_type_tags() {
        let codec = TicketCodec::new();
        let record = codec.encode(&sample()).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "TST");
        assert_eq!(json["id"], "TST-1-abc");
        assert_eq!(json["expirationPolicy"]["type"], "HARD_TIMEOUT");
        assert_eq!(json["expirationPolicy"]["parameters"]["timeToKillMillis"], 300_000);
        assert_eq!(json["payload"]["properties"]["client"], "GitHubClient");
    }

    #[test]
    fn test_decode_restores_concrete_kind() {
        let codec = TicketCodec::new();
        let original = sample();

        let bytes = codec.to_json(&original).unwrap();
        let decoded = codec.from_json(&bytes).unwrap();

        assert_eq!(decoded.prefix(), TransientSessionTicket::PREFIX);
        assert_eq!(decoded.metadata(), original.metadata());
        assert_eq!(
            decoded.expiration_policy().time_to_live(),
            Some(Duration::from_secs(300))
        );

        let concrete = decoded
            .as_any()
            .downcast_ref::<TransientSessionTicket>()
            .unwrap();
        assert_eq!(concrete.service(), original.service());
        assert_eq!(concrete.properties(), original.properties());
        assert_eq!(concrete.get::<i64>("attempt").unwrap(), Some(2));
    }

    #[test]
    fn test_unknown_ticket_type() {
        let codec = TicketCodec::new();
        let mut record = codec.encode(&sample()).unwrap();
        record.kind = "ST".to_string();

        assert!(matches!(codec.decode(record), Err(TicketError::UnknownTicketType(kind)) if kind == "ST"));
    }

    #[test]
    fn test_unknown_policy() {
        let codec = TicketCodec::new();
        let mut record = codec.encode(&sample()).unwrap();
        record.expiration_policy.kind = "SLIDING".to_string();

        assert!(matches!(
            codec.decode(record),
            Err(TicketError::UnknownExpirationPolicy(kind)) if kind == "SLIDING"
        ));
    }

    #[test]
    fn test_empty_codec_knows_nothing() {
        let record = TicketCodec::new().encode(&sample()).unwrap();
        assert!(TicketCodec::empty().decode(record).is_err());
    }

    #[test]
    fn test_malformed_payload() {
        let codec = TicketCodec::new();
        let mut record = codec.encode(&sample()).unwrap();
        record.payload = json!({ "properties": {} });

        assert!(matches!(codec.decode(record), Err(TicketError::Serialization(_))));
    }

    #[test]
    fn test_policy_without_parameters_omits_field() {
        let codec = TicketCodec::new();
        let ticket = TransientSessionTicket::new(
            "TST-2-def",
            Arc::new(NeverExpires),
            Service::new("https://app.example.org"),
        );
        let json = serde_json::to_value(codec.encode(&ticket).unwrap()).unwrap();

        assert_eq!(json["expirationPolicy"], json!({ "type": "NEVER" }));
        assert!(codec.decode(serde_json::from_value(json).unwrap()).is_ok());
    }
}
