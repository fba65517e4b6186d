//! Declarative schemas of the provider and of its resources.
//!
//! A host reads these, usually serialized as JSON, to learn which attributes exist, which
//! are required, and which force a resource to be recreated when they change.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::provider_error;
use crate::state::{AttributeValue, ResourceData};

/// Type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
}

/// Schema of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSchema {
    #[serde(rename = "type")]
    pub typ: AttributeType,
    pub description: &'static str,
    pub required: bool,
    pub force_new: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
}

impl AttributeSchema {
    fn new(typ: AttributeType, description: &'static str, required: bool) -> Self {
        Self {
            typ,
            description,
            required,
            force_new: false,
            sensitive: false,
            default: None,
        }
    }

    pub fn required_string(description: &'static str) -> Self {
        Self::new(AttributeType::String, description, true)
    }

    pub fn optional_string(description: &'static str) -> Self {
        Self::new(AttributeType::String, description, false)
    }

    pub fn optional_int(description: &'static str) -> Self {
        Self::new(AttributeType::Int, description, false)
    }

    /// Marks the attribute as force-new: changing it recreates the resource.
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Marks the attribute as sensitive, hosts must not display its value.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<AttributeValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Default timeouts a resource declares for its operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceTimeouts {
    #[serde(
        rename = "delete_secs",
        serialize_with = "serialize_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub delete: Option<Duration>,
}

fn serialize_secs<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_u64(duration.as_secs()),
        None => serializer.serialize_none(),
    }
}

/// Schema of a resource type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub schema_version: u32,
    pub attributes: BTreeMap<&'static str, AttributeSchema>,
    pub timeouts: ResourceTimeouts,
}

impl ResourceSchema {
    pub fn new(schema_version: u32) -> Self {
        Self {
            schema_version,
            attributes: BTreeMap::new(),
            timeouts: ResourceTimeouts::default(),
        }
    }

    pub fn with_attribute(mut self, name: &'static str, attribute: AttributeSchema) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.delete = Some(timeout);
        self
    }

    /// Validates `data` against this schema.
    ///
    /// Every required attribute must be present, every present attribute must be declared
    /// and have the declared type. All violations are reported together.
    pub fn validate(&self, data: &ResourceData) -> ProviderResult<()> {
        validate_attributes(&self.attributes, data)
    }
}

/// Schema of the provider: its configuration attributes and the resources it manages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSchema {
    pub attributes: BTreeMap<&'static str, AttributeSchema>,
    pub resources: BTreeMap<&'static str, ResourceSchema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &'static str, attribute: AttributeSchema) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn with_resource(mut self, name: &'static str, resource: ResourceSchema) -> Self {
        self.resources.insert(name, resource);
        self
    }

    /// Fills in the default of every provider attribute missing from `data`.
    pub fn apply_defaults(&self, data: &mut ResourceData) {
        for (name, attribute) in &self.attributes {
            if let Some(default) = &attribute.default {
                if !data.contains(name) {
                    data.set(*name, default.clone());
                }
            }
        }
    }

    /// Validates a provider configuration against the provider attributes.
    pub fn validate(&self, data: &ResourceData) -> ProviderResult<()> {
        validate_attributes(&self.attributes, data)
    }
}

impl Default for ProviderSchema {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_attributes(
    attributes: &BTreeMap<&'static str, AttributeSchema>,
    data: &ResourceData,
) -> ProviderResult<()> {
    let mut errors = Vec::new();

    for (name, attribute) in attributes {
        match data.get(name) {
            Some(value) if value.attribute_type() != attribute.typ => {
                errors.push(provider_error!(
                    ErrorKind::ValidationError,
                    "Attribute has the wrong type",
                    format!("`{name}` must be of type {:?}", attribute.typ)
                ));
            }
            Some(_) => {}
            None if attribute.required => {
                errors.push(provider_error!(
                    ErrorKind::ValidationError,
                    "Missing required attribute",
                    name
                ));
            }
            None => {}
        }
    }

    for (name, _) in data.attributes() {
        if !attributes.contains_key(name) {
            errors.push(provider_error!(
                ErrorKind::ValidationError,
                "Unknown attribute",
                name
            ));
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ProviderError::many(errors)),
    }
}
