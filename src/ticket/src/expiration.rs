//! Expiration policy contract
//!
//! A ticket never decides on its own whether it is still valid; it asks the
//! policy it was issued with. Policies are immutable values, so one instance
//! can back any number of tickets.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Usage facts an expiration policy can base its decision on
pub trait TicketState {
    /// When the ticket was issued
    fn creation_time(&self) -> DateTime<Utc>;

    /// Most recent use (creation time if never used)
    fn last_time_used(&self) -> DateTime<Utc>;

    /// Use before the most recent one
    fn previous_time_used(&self) -> Option<DateTime<Utc>>;

    /// Number of recorded uses
    fn count_of_uses(&self) -> u32;
}

/// Decides whether a ticket is still valid.
///
/// `name` and `parameters` describe the policy well enough for
/// [`TicketCodec`](crate::codec::TicketCodec) to rebuild it after the ticket
/// has been persisted.
pub trait ExpirationPolicy: Send + Sync + fmt::Debug {
    /// Whether the ticket described by `ticket` has expired
    fn is_expired(&self, ticket: &dyn TicketState) -> bool;

    /// Stable type tag written next to persisted tickets
    fn name(&self) -> &'static str;

    /// Policy settings in persisted form
    fn parameters(&self) -> Value {
        Value::Null
    }

    /// Upper bound on ticket lifetime, for stores with native TTL support
    fn time_to_live(&self) -> Option<Duration> {
        None
    }
}

/// Tickets never expire on their own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeverExpires;

impl NeverExpires {
    pub const NAME: &'static str = "NEVER";
}

impl ExpirationPolicy for NeverExpires {
    fn is_expired(&self, _ticket: &dyn TicketState) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Tickets expire a fixed amount of time after creation, regardless of use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardTimeout {
    time_to_kill: Duration,
}

impl HardTimeout {
    pub const NAME: &'static str = "HARD_TIMEOUT";

    pub fn new(time_to_kill: Duration) -> Self {
        Self { time_to_kill }
    }

    pub fn from_secs(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    pub fn time_to_kill(&self) -> Duration {
        self.time_to_kill
    }

    /// Rebuild from [`ExpirationPolicy::parameters`] output
    pub fn from_parameters(parameters: &Value) -> Option<Self> {
        parameters
            .get("timeToKillMillis")
            .and_then(Value::as_u64)
            .map(|millis| Self::new(Duration::from_millis(millis)))
    }
}

impl ExpirationPolicy for HardTimeout {
    fn is_expired(&self, ticket: &dyn TicketState) -> bool {
        // A creation time in the future (clock skew) converts to Err: not expired.
        (Utc::now() - ticket.creation_time())
            .to_std()
            .map(|elapsed| elapsed >= self.time_to_kill)
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parameters(&self) -> Value {
        json!({ "timeToKillMillis": u64::try_from(self.time_to_kill.as_millis()).unwrap_or(u64::MAX) })
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }
}
