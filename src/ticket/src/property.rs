//! Typed property storage carried by tickets

use crate::error::{Result, TicketError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// String-keyed bag of JSON values with typed accessors.
///
/// Values are kept in their JSON form so the bag survives persistence
/// unchanged. Reads convert back into the requested type; a value that
/// cannot be converted is reported as [`TicketError::PropertyTypeMismatch`],
/// never folded into "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: HashMap<String, Value>,
}

impl PropertyBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite a property
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Merge every entry of `properties`, overwriting on key collision
    pub fn put_all<I, K, V>(&mut self, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.entries.extend(
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
    }

    /// Store any serializable value (structs, enums) under `name`
    pub fn put_serialized<T: Serialize>(&mut self, name: impl Into<String>, value: &T) -> Result<()> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|e| TicketError::PropertyEncoding {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        self.entries.insert(name, value);
        Ok(())
    }

    /// Whether `name` has an entry, whatever its value
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Read `name` as `T`.
    ///
    /// Returns `Ok(None)` when the property is absent and an error when the
    /// stored value does not convert to `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.entries.get(name) {
            Some(value) => convert(name, value).map(Some),
            None => Ok(None),
        }
    }

    /// Read `name` as `T`, falling back to `default` when absent
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    /// Raw JSON value of a property
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Remove a property, returning its raw value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    /// Property names in unspecified order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn convert<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|source| TicketError::PropertyTypeMismatch {
        name: name.to_string(),
        expected: std::any::type_name::<T>(),
        source,
    })
}

impl From<HashMap<String, Value>> for PropertyBag {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        bag.put_all(iter);
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ClientState {
        client_name: String,
        attempts: u32,
    }

    #[test]
    fn test_put_and_get() {
        let mut bag = PropertyBag::new();
        bag.put("foo", "bar");
        bag.put("count", 3);
        bag.put("enabled", true);

        assert_eq!(bag.len(), 3);
        assert_eq!(bag.get::<String>("foo").unwrap(), Some("bar".to_string()));
        assert_eq!(bag.get::<i64>("count").unwrap(), Some(3));
        assert_eq!(bag.get::<bool>("enabled").unwrap(), Some(true));
    }

    #[test]
    fn test_absent_property() {
        let bag = PropertyBag::new();

        assert!(!bag.contains("missing"));
        assert_eq!(bag.get::<String>("missing").unwrap(), None);
    }

    #[test]
    fn test_get_or_returns_default_only_when_absent() {
        let mut bag = PropertyBag::new();
        bag.put("present", "value");

        assert_eq!(bag.get_or("missing", "fallback".to_string()).unwrap(), "fallback");
        assert_eq!(bag.get_or("present", "fallback".to_string()).unwrap(), "value");
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut bag = PropertyBag::new();
        bag.put("foo", "bar");

        let err = bag.get::<i64>("foo").unwrap_err();
        match err {
            TicketError::PropertyTypeMismatch { name, expected, .. } => {
                assert_eq!(name, "foo");
                assert_eq!(expected, "i64");
            }
            other => panic!("unexpected error: {other}"),
        }

        // get_or must not swallow the mismatch either
        assert!(bag.get_or::<i64>("foo", 7).is_err());
    }

    #[test]
    fn test_null_value_still_counts_as_present() {
        let mut bag = PropertyBag::new();
        bag.put("nothing", Value::Null);

        assert!(bag.contains("nothing"));
        assert_eq!(bag.get::<Option<String>>("nothing").unwrap(), Some(None));
        assert!(bag.get::<String>("nothing").is_err());
    }

    #[test]
    fn test_put_all_overwrites_on_collision() {
        let mut bag = PropertyBag::new();
        bag.put("x", 1);
        bag.put_all([("x", json!(5)), ("y", json!("why"))]);

        assert_eq!(bag.get::<i64>("x").unwrap(), Some(5));
        assert_eq!(bag.get::<String>("y").unwrap(), Some("why".to_string()));
    }

    #[test]
    fn test_serialized_struct_round_trip() {
        let mut bag = PropertyBag::new();
        let state = ClientState {
            client_name: "GitHubClient".to_string(),
            attempts: 2,
        };
        bag.put_serialized("state", &state).unwrap();

        assert_eq!(bag.get::<ClientState>("state").unwrap(), Some(state));
    }

    #[test]
    fn test_bag_serializes_as_plain_object() {
        let bag: PropertyBag = [("a", json!(1))].into_iter().collect();
        assert_eq!(serde_json::to_value(&bag).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn test_remove() {
        let mut bag = PropertyBag::new();
        bag.put("a", 1);

        assert_eq!(bag.remove("a"), Some(json!(1)));
        assert!(bag.is_empty());
    }
}
