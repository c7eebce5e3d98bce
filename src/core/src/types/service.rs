//! Service reference types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Numeric identifier of a service definition in the registry
pub type ServiceDefinitionId = i64;

/// The service (application) on whose behalf an authentication flow runs.
///
/// `id` is the URL the service asked to be sent back to, already stripped of
/// protocol noise by the caller; `original_url` keeps the raw value the
/// request carried so that redirects can be rebuilt byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service URL used for registry matching
    pub id: String,

    /// URL exactly as presented by the requesting party
    #[serde(rename = "originalUrl")]
    pub original_url: String,

    /// Request attributes captured with the service (e.g. `renew`, `gateway`)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Service {
    /// Create a service reference from a URL
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            original_url: url.clone(),
            id: url,
            attributes: HashMap::new(),
        }
    }

    /// Keep the raw URL separately from the matching id
    pub fn with_original_url(mut self, original_url: impl Into<String>) -> Self {
        self.original_url = original_url.into();
        self
    }

    /// Add a request attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Service URL used for matching
    pub fn url(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<&str> for Service {
    fn from(url: &str) -> Self {
        Service::new(url)
    }
}

impl From<String> for Service {
    fn from(url: String) -> Self {
        Service::new(url)
    }
}
