//! Ticket id generation

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces globally unique ticket ids for a given kind prefix
pub trait TicketIdGenerator: Send + Sync {
    fn new_ticket_id(&self, prefix: &str) -> String;
}

/// `<prefix>-<counter>-<random>[-<suffix>]` ids.
///
/// The counter only helps humans correlate ids issued by one node; the
/// random part is what makes ids unguessable and unique. The optional suffix
/// names the issuing node in clustered deployments.
#[derive(Debug)]
pub struct DefaultTicketIdGenerator {
    counter: AtomicU64,
    random_length: usize,
    suffix: Option<String>,
}

impl DefaultTicketIdGenerator {
    pub const DEFAULT_RANDOM_LENGTH: usize = 32;

    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            random_length: Self::DEFAULT_RANDOM_LENGTH,
            suffix: None,
        }
    }

    /// Append a node identifier to every id
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.suffix = if suffix.is_empty() { None } else { Some(suffix) };
        self
    }

    pub fn with_random_length(mut self, random_length: usize) -> Self {
        self.random_length = random_length.max(1);
        self
    }

    fn next_counter(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

impl Default for DefaultTicketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketIdGenerator for DefaultTicketIdGenerator {
    fn new_ticket_id(&self, prefix: &str) -> String {
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.random_length)
            .map(char::from)
            .collect();

        let mut id = format!("{}-{}-{}", prefix, self.next_counter(), random);
        if let Some(suffix) = &self.suffix {
            id.push('-');
            id.push_str(suffix);
        }
        id
    }
}
