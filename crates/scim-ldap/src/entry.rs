//! Directory entry and modification types used by the mapping pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named directory attribute with one or more values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name (e.g. `givenName`).
    pub name: String,
    /// Attribute values, in server order.
    pub values: Vec<String>,
}

impl Attribute {
    /// Creates an attribute from a name and values.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a single-valued attribute.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

/// A directory entry: a distinguished name plus an attribute multimap.
///
/// Attribute lookup is case-insensitive, matching directory semantics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl Entry {
    /// Creates an empty entry with the given distinguished name.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Creates an entry from a pre-built attribute map.
    #[must_use]
    pub fn with_attributes(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// The entry's distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Appends values to an attribute, creating it when absent. The existing
    /// attribute name's casing is kept when one matches case-insensitively.
    pub fn add_values<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = self
            .canonical_key(name)
            .unwrap_or_else(|| name.to_string());
        self.attributes
            .entry(key)
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Merges another attribute into the entry.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.add_values(&attribute.name, attribute.values);
    }

    /// Adds an attribute and returns the entry, for construction chains.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.add_attribute(attribute);
        self
    }

    /// Returns all values of the named attribute (case-insensitive).
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.lookup(name).map(Vec::as_slice)
    }

    /// Returns the first value of the named attribute.
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.lookup(name)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns true if the entry carries the named attribute.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Returns true if the named attribute carries the given value.
    #[must_use]
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.lookup(name)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Iterates over the entry's attributes in unspecified order.
    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.attributes.iter().map(|(name, values)| Attribute {
            name: name.clone(),
            values: values.clone(),
        })
    }

    /// Number of distinct attribute names on the entry.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    fn lookup(&self, name: &str) -> Option<&Vec<String>> {
        if let Some(values) = self.attributes.get(name) {
            return Some(values);
        }
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }

    fn canonical_key(&self, name: &str) -> Option<String> {
        if self.attributes.contains_key(name) {
            return Some(name.to_string());
        }
        self.attributes
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}

/// A directory modification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes the attribute entirely).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

impl Modification {
    /// The attribute this modification targets.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Delete { attribute, .. }
            | Self::Replace { attribute, .. } => attribute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let entry = Entry::new("uid=bjensen,dc=example,dc=com")
            .with_attribute(Attribute::single("givenName", "Barbara"));

        assert_eq!(entry.first_value("givenname"), Some("Barbara"));
        assert_eq!(entry.first_value("GIVENNAME"), Some("Barbara"));
        assert!(entry.has_attribute("GivenName"));
        assert!(!entry.has_attribute("sn"));
    }

    #[test]
    fn add_values_merges_case_insensitively() {
        let mut entry = Entry::new("cn=g,dc=example,dc=com");
        entry.add_values("objectClass", ["top"]);
        entry.add_values("OBJECTCLASS", ["groupOfNames"]);

        assert_eq!(entry.attribute_count(), 1);
        assert_eq!(
            entry.values("objectclass").unwrap(),
            &["top".to_string(), "groupOfNames".to_string()]
        );
    }

    #[test]
    fn has_value_checks_exact_value() {
        let entry = Entry::new("uid=x,dc=example,dc=com")
            .with_attribute(Attribute::new("mail", ["a@example.com", "b@example.com"]));
        assert!(entry.has_value("mail", "b@example.com"));
        assert!(!entry.has_value("mail", "c@example.com"));
    }

    #[test]
    fn modification_attribute_accessor() {
        let m = Modification::Delete {
            attribute: "homePhone".to_string(),
            values: Vec::new(),
        };
        assert_eq!(m.attribute(), "homePhone");
    }
}
