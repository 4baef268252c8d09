//! SCIM resource and attribute descriptors.
//!
//! Descriptors define the shape of a SCIM resource kind: its attributes,
//! their data types, multi-valuedness, and sub-attributes for complex types.
//! Descriptors are built once at startup and never mutated afterwards; the
//! catalogue hands out shared references to registered descriptors.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// The URI of the SCIM core schema used by the standard descriptors.
pub const CORE_SCHEMA_URI: &str = "urn:scim:schemas:core:1.0";

/// SCIM attribute data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    /// UTF-8 string value
    String,
    /// Boolean value
    Boolean,
    /// Decimal number
    Decimal,
    /// Integer number
    Integer,
    /// Timestamp in RFC 3339 format
    DateTime,
    /// Binary data, base64-encoded in transport
    Binary,
    /// Structured value with named sub-attributes
    Complex,
}

/// Describes a single SCIM attribute.
///
/// For complex attributes the descriptor carries an ordered set of child
/// descriptors; for simple attributes `sub_attributes` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    name: String,
    schema: String,
    data_type: AttributeType,
    multi_valued: bool,
    sub_attributes: Vec<AttributeDescriptor>,
}

impl AttributeDescriptor {
    /// Creates a simple single-valued attribute descriptor.
    #[must_use]
    pub fn simple(name: impl Into<String>, data_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            schema: CORE_SCHEMA_URI.to_string(),
            data_type,
            multi_valued: false,
            sub_attributes: Vec::new(),
        }
    }

    /// Creates a complex single-valued attribute descriptor with the given
    /// sub-attributes.
    #[must_use]
    pub fn complex(name: impl Into<String>, sub_attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            name: name.into(),
            schema: CORE_SCHEMA_URI.to_string(),
            data_type: AttributeType::Complex,
            multi_valued: false,
            sub_attributes,
        }
    }

    /// Marks the attribute as multi-valued.
    #[must_use]
    pub const fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Overrides the schema URI the attribute belongs to.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Attribute name (e.g. `userName`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema URI the attribute belongs to.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Declared data type.
    #[must_use]
    pub const fn data_type(&self) -> AttributeType {
        self.data_type
    }

    /// Whether the attribute holds a sequence of values.
    #[must_use]
    pub const fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Sub-attribute descriptors of a complex attribute, in declaration order.
    #[must_use]
    pub fn sub_attributes(&self) -> &[AttributeDescriptor] {
        &self.sub_attributes
    }

    /// Looks up a sub-attribute descriptor by name (case-insensitive).
    #[must_use]
    pub fn sub_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.sub_attributes
            .iter()
            .find(|sub| sub.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a sub-attribute descriptor, failing when the attribute does
    /// not declare it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedValue`] if the sub-attribute is not
    /// declared.
    pub fn require_sub_attribute(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.sub_attribute(name).ok_or_else(|| {
            Error::MalformedValue(format!(
                "attribute {} does not declare sub-attribute {name}",
                self.name
            ))
        })
    }
}

/// Describes one SCIM resource kind.
///
/// Every descriptor carries an `id` pseudo-attribute whose value is the
/// resource's canonical identifier (the directory entry's distinguished name
/// in this system).
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    name: String,
    schema: String,
    attributes: Vec<AttributeDescriptor>,
}

impl ResourceDescriptor {
    /// Creates a resource descriptor from the provided attributes.
    ///
    /// The `id` pseudo-attribute is added automatically when the caller does
    /// not declare it.
    #[must_use]
    pub fn new(name: impl Into<String>, mut attributes: Vec<AttributeDescriptor>) -> Self {
        if !attributes
            .iter()
            .any(|a| a.name().eq_ignore_ascii_case("id"))
        {
            attributes.insert(0, AttributeDescriptor::simple("id", AttributeType::String));
        }

        Self {
            name: name.into(),
            schema: CORE_SCHEMA_URI.to_string(),
            attributes,
        }
    }

    /// Resource kind name (e.g. `User`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema URI of the resource kind.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// All attribute descriptors, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Looks up an attribute descriptor by name (case-insensitive).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Looks up an attribute descriptor, failing with [`Error::MalformedValue`]
    /// when the resource kind does not declare it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedValue`] if the attribute is not declared.
    pub fn require_attribute(&self, name: &str) -> Result<&AttributeDescriptor> {
        self.attribute(name).ok_or_else(|| {
            Error::MalformedValue(format!(
                "resource kind {} does not declare attribute {name}",
                self.name
            ))
        })
    }
}

/// Name-keyed registry of resource descriptors.
///
/// The catalogue is populated during startup and frozen afterwards; lookups
/// require no synchronization beyond publication of the containing context.
#[derive(Debug, Default)]
pub struct ResourceDescriptorCatalog {
    descriptors: HashMap<String, Arc<ResourceDescriptor>>,
}

impl ResourceDescriptorCatalog {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor under its resource name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a descriptor with the same name is
    /// already registered.
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<()> {
        let key = descriptor.name().to_ascii_lowercase();
        if self.descriptors.contains_key(&key) {
            return Err(Error::ConfigError(format!(
                "resource descriptor {} is already registered",
                descriptor.name()
            )));
        }
        self.descriptors.insert(key, Arc::new(descriptor));
        Ok(())
    }

    /// Retrieves the descriptor registered under the given resource name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] if no descriptor is registered.
    pub fn get(&self, resource_name: &str) -> Result<Arc<ResourceDescriptor>> {
        self.descriptors
            .get(&resource_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownResource(resource_name.to_string()))
    }
}

/// Builds the descriptor for the SCIM core `User` resource kind, covering
/// the attributes the standard user mapper understands.
#[must_use]
pub fn core_user_descriptor() -> ResourceDescriptor {
    let name = AttributeDescriptor::complex(
        "name",
        vec![
            AttributeDescriptor::simple("formatted", AttributeType::String),
            AttributeDescriptor::simple("familyName", AttributeType::String),
            AttributeDescriptor::simple("givenName", AttributeType::String),
        ],
    );

    let plural = |attr: &str| {
        AttributeDescriptor::complex(
            attr,
            vec![
                AttributeDescriptor::simple("type", AttributeType::String),
                AttributeDescriptor::simple("value", AttributeType::String),
            ],
        )
        .multi_valued()
    };

    let addresses = AttributeDescriptor::complex(
        "addresses",
        vec![
            AttributeDescriptor::simple("type", AttributeType::String),
            AttributeDescriptor::simple("formatted", AttributeType::String),
            AttributeDescriptor::simple("streetAddress", AttributeType::String),
            AttributeDescriptor::simple("locality", AttributeType::String),
            AttributeDescriptor::simple("region", AttributeType::String),
            AttributeDescriptor::simple("postalCode", AttributeType::String),
            AttributeDescriptor::simple("country", AttributeType::String),
        ],
    )
    .multi_valued();

    ResourceDescriptor::new(
        "User",
        vec![
            AttributeDescriptor::simple("userName", AttributeType::String),
            name,
            plural("emails"),
            plural("phoneNumbers"),
            addresses,
        ],
    )
}

/// Builds the descriptor for the SCIM core `Group` resource kind.
#[must_use]
pub fn core_group_descriptor() -> ResourceDescriptor {
    let members = AttributeDescriptor::complex(
        "members",
        vec![
            AttributeDescriptor::simple("type", AttributeType::String),
            AttributeDescriptor::simple("value", AttributeType::String),
        ],
    )
    .multi_valued();

    ResourceDescriptor::new(
        "Group",
        vec![
            AttributeDescriptor::simple("displayName", AttributeType::String),
            members,
        ],
    )
}
