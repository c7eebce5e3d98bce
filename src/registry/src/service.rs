//! Service definitions and matching

use crate::error::{RegistryError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use wicket_core::ServiceDefinitionId;

/// An application allowed to use the authentication server.
///
/// `service_id` is a regular expression matched, case-insensitively and
/// against the whole URL, with the service URL a request presents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    /// Internal numeric identifier
    pub id: ServiceDefinitionId,

    /// URL pattern (e.g., "^https://app\\.example\\.org/.*")
    pub service_id: String,

    /// Display name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Lower values are consulted first when several definitions match
    #[serde(default)]
    pub evaluation_order: i32,
}

impl ServiceDefinition {
    pub fn new(
        id: ServiceDefinitionId,
        service_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            service_id: service_id.into(),
            name: name.into(),
            description: None,
            evaluation_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_evaluation_order(mut self, evaluation_order: i32) -> Self {
        self.evaluation_order = evaluation_order;
        self
    }

    /// Compile the service id into an anchored, case-insensitive pattern
    pub fn pattern(&self) -> Result<Regex> {
        compile_pattern(&self.service_id)
    }

    /// Whether `url` is covered by this definition. Invalid patterns match nothing.
    pub fn matches(&self, url: &str) -> bool {
        self.pattern().map(|re| re.is_match(url)).unwrap_or(false)
    }

    /// Reject definitions that could never be served
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition {
                name: format!("#{}", self.id),
                reason: "name must not be empty".to_string(),
            });
        }
        if self.service_id.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition {
                name: self.name.clone(),
                reason: "serviceId must not be empty".to_string(),
            });
        }
        self.pattern().map(|_| ())
    }
}

impl fmt::Display for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}, {})", self.name, self.id, self.service_id)
    }
}

pub(crate) fn compile_pattern(service_id: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{})$", service_id))
        .case_insensitive(true)
        .build()
        .map_err(|e| RegistryError::InvalidPattern {
            pattern: service_id.to_string(),
            reason: e.to_string(),
        })
}

/// Identity dimension on which a candidate collided with an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDimension {
    /// An existing entry's pattern matches the candidate's service id
    ServiceIdPattern,
    /// An existing entry has the same service id text
    ExactServiceId,
    /// An existing entry has the same numeric id
    Id,
}

impl fmt::Display for MatchDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchDimension::ServiceIdPattern => "service id pattern",
            MatchDimension::ExactServiceId => "exact service id",
            MatchDimension::Id => "id",
        };
        f.write_str(label)
    }
}

/// First existing entry colliding with `candidate`, checked dimension by
/// dimension in the order pattern, exact service id, id.
pub fn find_conflict<'a, I>(
    existing: I,
    candidate: &ServiceDefinition,
) -> Option<(MatchDimension, &'a ServiceDefinition)>
where
    I: IntoIterator<Item = &'a ServiceDefinition>,
    I::IntoIter: Clone,
{
    let entries = existing.into_iter();

    if let Some(found) = entries.clone().find(|e| e.matches(&candidate.service_id)) {
        return Some((MatchDimension::ServiceIdPattern, found));
    }
    if let Some(found) = entries.clone().find(|e| e.service_id == candidate.service_id) {
        return Some((MatchDimension::ExactServiceId, found));
    }
    entries
        .clone()
        .find(|e| e.id == candidate.id)
        .map(|found| (MatchDimension::Id, found))
}

/// Registry ordering: evaluation order, then id
pub(crate) fn sort_definitions(definitions: &mut [ServiceDefinition]) {
    definitions.sort_by(|a, b| {
        a.evaluation_order
            .cmp(&b.evaluation_order)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let definition = ServiceDefinition::new(1, r"^https://app\.example\.org.*", "App");

        assert!(definition.matches("https://app.example.org"));
        assert!(definition.matches("https://app.example.org/login?x=1"));
        assert!(definition.matches("HTTPS://APP.EXAMPLE.ORG/"));
        assert!(!definition.matches("https://evil.example.org"));
        assert!(!definition.matches("https://appXexample.org"));
    }

    #[test]
    fn test_pattern_must_cover_whole_url() {
        let definition = ServiceDefinition::new(1, r"https://app\.example\.org", "App");

        assert!(definition.matches("https://app.example.org"));
        assert!(!definition.matches("https://app.example.org/other"));
        assert!(!definition.matches("x-https://app.example.org"));
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        let definition = ServiceDefinition::new(1, "https://(unclosed", "Broken");

        assert!(!definition.matches("https://(unclosed"));
        assert!(matches!(definition.validate(), Err(RegistryError::InvalidPattern { .. })));
    }

    #[test]
    fn test_validate() {
        assert!(ServiceDefinition::new(1, "^https://.*", "All").validate().is_ok());
        assert!(ServiceDefinition::new(1, "^https://.*", " ").validate().is_err());
        assert!(ServiceDefinition::new(1, "", "Empty").validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "id": 42,
            "serviceId": "^https://app\\.example\\.org.*",
            "name": "App",
            "evaluationOrder": 5
        }"#;

        let definition: ServiceDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.id, 42);
        assert_eq!(definition.evaluation_order, 5);
        assert!(definition.description.is_none());

        let back = serde_json::to_value(&definition).unwrap();
        assert_eq!(back["serviceId"], r"^https://app\.example\.org.*");
        assert!(back.get("description").is_none());
    }

    #[test]
    fn test_find_conflict_order() {
        let existing = vec![
            ServiceDefinition::new(42, "https://other.example.org", "Other"),
            ServiceDefinition::new(7, r"^https://app\.example\.org.*", "App"),
        ];

        let by_pattern = ServiceDefinition::new(1, "https://app.example.org/x", "Candidate");
        let (dimension, found) = find_conflict(&existing, &by_pattern).unwrap();
        assert_eq!(dimension, MatchDimension::ServiceIdPattern);
        assert_eq!(found.id, 7);

        let by_id = ServiceDefinition::new(42, "https://new.example.org", "Candidate");
        let (dimension, found) = find_conflict(&existing, &by_id).unwrap();
        assert_eq!(dimension, MatchDimension::Id);
        assert_eq!(found.name, "Other");

        let fresh = ServiceDefinition::new(3, "https://fresh.example.org", "Fresh");
        assert!(find_conflict(&existing, &fresh).is_none());
    }

    #[test]
    fn test_exact_match_on_pattern_text() {
        // The text of a pattern does not necessarily match the pattern itself
        let existing = vec![ServiceDefinition::new(7, r"^https://app\.example\.org/\d+$", "App")];
        let candidate = ServiceDefinition::new(8, r"^https://app\.example\.org/\d+$", "Copy");

        let (dimension, _) = find_conflict(&existing, &candidate).unwrap();
        assert_eq!(dimension, MatchDimension::ExactServiceId);
    }

    #[test]
    fn test_sort_definitions() {
        let mut definitions = vec![
            ServiceDefinition::new(3, "c", "C").with_evaluation_order(1),
            ServiceDefinition::new(2, "b", "B").with_evaluation_order(0),
            ServiceDefinition::new(1, "a", "A").with_evaluation_order(1),
        ];
        sort_definitions(&mut definitions);

        let ids: Vec<_> = definitions.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
