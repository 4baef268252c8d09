//! SCIM attributes and resource objects.

use crate::schema::AttributeDescriptor;
use crate::selection::AttributeSelection;
use crate::value::{ComplexValue, ScimScalar, ScimValue};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A named SCIM attribute: a descriptor paired with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScimAttribute {
    descriptor: AttributeDescriptor,
    value: ScimValue,
}

impl ScimAttribute {
    /// Creates an attribute from the provided descriptor and value.
    #[must_use]
    pub const fn new(descriptor: AttributeDescriptor, value: ScimValue) -> Self {
        Self { descriptor, value }
    }

    /// Creates a singular attribute holding a primitive scalar.
    #[must_use]
    pub fn singular(descriptor: AttributeDescriptor, scalar: ScimScalar) -> Self {
        Self::new(descriptor, ScimValue::Scalar(scalar))
    }

    /// Creates a singular complex attribute.
    #[must_use]
    pub fn complex(descriptor: AttributeDescriptor, value: ComplexValue) -> Self {
        Self::new(descriptor, ScimValue::Complex(value))
    }

    /// Creates a multi-valued attribute from the provided elements.
    #[must_use]
    pub fn multi_valued(descriptor: AttributeDescriptor, elements: Vec<ComplexValue>) -> Self {
        Self::new(descriptor, ScimValue::Multi(elements))
    }

    /// The attribute name, as declared by the descriptor.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The attribute's descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &AttributeDescriptor {
        &self.descriptor
    }

    /// The attribute's value.
    #[must_use]
    pub const fn value(&self) -> &ScimValue {
        &self.value
    }
}

/// A SCIM resource: a resource-kind label plus named attributes.
///
/// No two contained attributes share a name; inserting an attribute under an
/// existing name replaces the previous one, so when several mappers produce
/// the same attribute the last registered mapper wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScimObject {
    resource_name: String,
    attributes: BTreeMap<String, ScimAttribute>,
}

impl ScimObject {
    /// Creates an empty resource of the given kind.
    #[must_use]
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// The resource-kind label (e.g. `User`).
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Adds an attribute, replacing any previous attribute of the same name.
    pub fn add_attribute(&mut self, attribute: ScimAttribute) {
        self.attributes
            .insert(attribute.name().to_ascii_lowercase(), attribute);
    }

    /// Adds an attribute and returns the object, for construction chains.
    #[must_use]
    pub fn with_attribute(mut self, attribute: ScimAttribute) -> Self {
        self.add_attribute(attribute);
        self
    }

    /// Looks up an attribute by name (case-insensitive).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ScimAttribute> {
        self.attributes.get(&name.to_ascii_lowercase())
    }

    /// Returns the attribute's value when present.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ScimValue> {
        self.attribute(name).map(ScimAttribute::value)
    }

    /// Returns the string content of a singular string attribute.
    #[must_use]
    pub fn string_value(&self, name: &str) -> Option<&str> {
        self.value(name)
            .and_then(ScimValue::as_scalar)
            .and_then(ScimScalar::as_str)
    }

    /// Returns a named sub-value of a singular complex attribute.
    #[must_use]
    pub fn complex_sub_value(&self, name: &str, sub_name: &str) -> Option<&str> {
        self.value(name)
            .and_then(ScimValue::as_complex)
            .and_then(|complex| complex.get_str(sub_name))
    }

    /// Returns the elements of a multi-valued attribute, or an empty slice.
    #[must_use]
    pub fn multi_values(&self, name: &str) -> &[ComplexValue] {
        self.value(name)
            .and_then(ScimValue::as_multi)
            .unwrap_or_default()
    }

    /// Returns true if the resource carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Number of attributes on the resource.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Iterates over the contained attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &ScimAttribute> {
        self.attributes.values()
    }

    /// Drops every attribute whose name is not requested by the selection.
    ///
    /// The selection is applied after translation; mappers may produce a
    /// superset of the requested attributes.
    pub fn retain_selected(&mut self, selection: &AttributeSelection) {
        self.attributes
            .retain(|_, attribute| selection.is_requested(attribute.name()));
    }
}

impl Serialize for ScimObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for attribute in self.attributes.values() {
            map.serialize_entry(attribute.name(), attribute.value())?;
        }
        map.end()
    }
}
