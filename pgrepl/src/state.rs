use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{ErrorKind, ProviderResult};
use crate::schema::AttributeType;

/// A single attribute value of a resource or of the provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    String(String),
}

impl AttributeValue {
    /// Returns the [`AttributeType`] this value belongs to.
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::String(_) => AttributeType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            AttributeValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            AttributeValue::String(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// Attribute bag exchanged between the host and the resource handlers.
///
/// Holds the resource identifier, its attributes and the timeouts the host granted to the
/// current operation. Handlers read their inputs from it and write the observed state
/// back into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(skip)]
    delete_timeout: Option<Duration>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a [`ResourceData`] with the given attributes and no identifier.
    pub fn from_attributes<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the resource identifier, `None` if the resource doesn't exist.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Clears the identifier, which signals the host that the resource is gone.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttributeValue::as_int)
    }

    /// Returns a string attribute, failing if it's missing or not a string.
    pub fn require_string(&self, key: &str) -> ProviderResult<&str> {
        match self.get(key) {
            Some(AttributeValue::String(value)) => Ok(value.as_str()),
            Some(AttributeValue::Int(_)) => {
                bail!(ErrorKind::ValidationError, "Attribute is not a string", key)
            }
            None => bail!(ErrorKind::ValidationError, "Missing required attribute", key),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Returns the delete timeout granted by the host, or `default` if none was set.
    pub fn delete_timeout(&self, default: Duration) -> Duration {
        self.delete_timeout.unwrap_or(default)
    }

    pub fn set_delete_timeout(&mut self, timeout: Duration) {
        self.delete_timeout = Some(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_respect_attribute_types() {
        let data = ResourceData::new()
            .with_attribute("slot_name", "orders_slot")
            .with_attribute("port", 5432_i64);

        assert_eq!(data.get_string("slot_name"), Some("orders_slot"));
        assert_eq!(data.get_int("slot_name"), None);
        assert_eq!(data.get_int("port"), Some(5432));
        assert_eq!(data.get_string("port"), None);
        assert_eq!(data.get_string("missing"), None);
    }

    #[test]
    fn require_string_reports_missing_and_mistyped_attributes() {
        let data = ResourceData::from_attributes([("database", AttributeValue::Int(1))]);

        let err = data.require_string("database").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.detail(), Some("database"));

        let err = data.require_string("slot_name").unwrap_err();
        assert_eq!(err.detail(), Some("slot_name"));
    }

    #[test]
    fn id_can_be_set_and_cleared() {
        let mut data = ResourceData::new();
        assert_eq!(data.id(), None);

        data.set_id("orders_slot");
        assert_eq!(data.id(), Some("orders_slot"));

        data.clear_id();
        assert_eq!(data.id(), None);
    }

    #[test]
    fn delete_timeout_falls_back_to_default() {
        let mut data = ResourceData::new();
        assert_eq!(
            data.delete_timeout(Duration::from_secs(60)),
            Duration::from_secs(60)
        );

        data.set_delete_timeout(Duration::from_secs(5));
        assert_eq!(
            data.delete_timeout(Duration::from_secs(60)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn serializes_to_json() {
        let mut data = ResourceData::new()
            .with_attribute("slot_name", "orders_slot")
            .with_attribute("output_plugin", "test_decoding");
        data.set_id("orders_slot");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "orders_slot",
                "attributes": {
                    "output_plugin": "test_decoding",
                    "slot_name": "orders_slot",
                }
            })
        );

        let data: ResourceData =
            serde_json::from_str(r#"{"attributes": {"port": 5433, "host": "db"}}"#).unwrap();
        assert_eq!(data.id(), None);
        assert_eq!(data.get_int("port"), Some(5433));
        assert_eq!(data.get_string("host"), Some("db"));
    }
}
