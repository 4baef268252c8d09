//! The standard Group resource mapper.
//!
//! Maps SCIM `displayName` to `cn` (which also names the entry) and the
//! `members` elements to `member` values on a `groupOfNames` entry. Values
//! cross the boundary through the value resolvers, dispatched on the
//! descriptor's declared type.

use crate::dn::{Dn, Rdn};
use crate::entry::{Attribute, Entry, Modification};
use crate::mapper::{diff_attribute, ResourceMapper};
use scim_core::error::{Error, Result};
use scim_core::resource::{ScimAttribute, ScimObject};
use scim_core::schema::ResourceDescriptor;
use scim_core::selection::AttributeSelection;
use scim_core::value::{decode_value, encode_value, ComplexValue, ScimValue};
use std::sync::Arc;

const OBJECT_CLASSES: &[&str] = &["top", "groupOfNames"];

/// Creator mapper for the SCIM core `Group` resource kind.
pub struct GroupResourceMapper {
    descriptor: Arc<ResourceDescriptor>,
}

impl GroupResourceMapper {
    /// Creates the mapper for the given `Group` descriptor.
    #[must_use]
    pub fn new(descriptor: Arc<ResourceDescriptor>) -> Self {
        Self { descriptor }
    }

    fn display_name_values(&self, resource: &ScimObject) -> Result<Vec<String>> {
        let Some(scalar) = resource.value("displayName").and_then(ScimValue::as_scalar) else {
            return Ok(Vec::new());
        };
        let descriptor = self.descriptor.require_attribute("displayName")?;
        Ok(vec![encode_value(descriptor, scalar)?])
    }

    fn member_values(&self, resource: &ScimObject) -> Result<Vec<String>> {
        let descriptor = self
            .descriptor
            .require_attribute("members")?
            .require_sub_attribute("value")?;
        resource
            .multi_values("members")
            .iter()
            .filter_map(|element| element.get("value"))
            .map(|scalar| encode_value(descriptor, scalar))
            .collect()
    }
}

impl ResourceMapper for GroupResourceMapper {
    fn resource_name(&self) -> &str {
        "Group"
    }

    fn supports_create(&self) -> bool {
        true
    }

    fn to_scim_attributes(
        &self,
        _resource_name: &str,
        entry: &Entry,
        selection: &AttributeSelection,
    ) -> Result<Vec<ScimAttribute>> {
        let mut attributes = Vec::new();

        if selection.is_requested("displayName") {
            if let Some(cn) = entry.first_value("cn") {
                let descriptor = self.descriptor.require_attribute("displayName")?;
                attributes.push(ScimAttribute::singular(
                    descriptor.clone(),
                    decode_value(descriptor, cn)?,
                ));
            }
        }

        if selection.is_requested("members") {
            let value_descriptor = self
                .descriptor
                .require_attribute("members")?
                .require_sub_attribute("value")?;
            let members: Vec<ComplexValue> = entry
                .values("member")
                .unwrap_or_default()
                .iter()
                .map(|dn| {
                    Ok(ComplexValue::new().with("value", decode_value(value_descriptor, dn)?))
                })
                .collect::<Result<_>>()?;
            if !members.is_empty() {
                attributes.push(ScimAttribute::multi_valued(
                    self.descriptor.require_attribute("members")?.clone(),
                    members,
                ));
            }
        }

        Ok(attributes)
    }

    fn to_ldap_entry(&self, resource: &ScimObject, base_dn: &Dn) -> Result<Entry> {
        let display_name = resource.string_value("displayName").ok_or_else(|| {
            Error::IncompleteResource("displayName is required to name a Group entry".to_string())
        })?;

        let dn = Dn::child_of(Rdn::new("cn", display_name), base_dn);
        let mut entry = Entry::new(dn.as_str());
        entry.add_values("objectClass", OBJECT_CLASSES.iter().copied());
        for attribute in self.to_ldap_attributes(resource)? {
            entry.add_attribute(attribute);
        }
        Ok(entry)
    }

    fn to_ldap_attributes(&self, resource: &ScimObject) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        let display_name = self.display_name_values(resource)?;
        if !display_name.is_empty() {
            attributes.push(Attribute::new("cn", display_name));
        }
        let members = self.member_values(resource)?;
        if !members.is_empty() {
            attributes.push(Attribute::new("member", members));
        }
        Ok(attributes)
    }

    fn to_ldap_modifications(
        &self,
        current_entry: &Entry,
        desired: &ScimObject,
    ) -> Result<Vec<Modification>> {
        let mut modifications = Vec::new();
        if let Some(modification) =
            diff_attribute(current_entry, "cn", self.display_name_values(desired)?)
        {
            modifications.push(modification);
        }
        if let Some(modification) =
            diff_attribute(current_entry, "member", self.member_values(desired)?)
        {
            modifications.push(modification);
        }
        Ok(modifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scim_core::schema::core_group_descriptor;
    use scim_core::value::ScimScalar;

    fn mapper() -> GroupResourceMapper {
        GroupResourceMapper::new(Arc::new(core_group_descriptor()))
    }

    fn admins_resource() -> ScimObject {
        let descriptor = core_group_descriptor();
        ScimObject::new("Group")
            .with_attribute(ScimAttribute::singular(
                descriptor.attribute("displayName").unwrap().clone(),
                ScimScalar::String("admins".to_string()),
            ))
            .with_attribute(ScimAttribute::multi_valued(
                descriptor.attribute("members").unwrap().clone(),
                vec![ComplexValue::new().with("value", "uid=bjensen,dc=example,dc=com")],
            ))
    }

    #[test]
    fn entry_creation_names_by_cn() {
        let base = Dn::parse("dc=example,dc=com").unwrap();
        let entry = mapper().to_ldap_entry(&admins_resource(), &base).unwrap();
        assert_eq!(entry.dn(), "cn=admins,dc=example,dc=com");
        assert!(entry.has_value("cn", "admins"));
        assert!(entry.has_value("member", "uid=bjensen,dc=example,dc=com"));
        assert!(entry.has_value("objectClass", "groupOfNames"));
    }

    #[test]
    fn entry_creation_requires_display_name() {
        let base = Dn::parse("dc=example,dc=com").unwrap();
        let err = mapper()
            .to_ldap_entry(&ScimObject::new("Group"), &base)
            .unwrap_err();
        assert!(matches!(err, Error::IncompleteResource(_)));
    }

    #[test]
    fn membership_diff_replaces_member_values() {
        let current = Entry::new("cn=admins,dc=example,dc=com")
            .with_attribute(Attribute::single("cn", "admins"))
            .with_attribute(Attribute::new(
                "member",
                ["uid=bjensen,dc=example,dc=com", "uid=jdoe,dc=example,dc=com"],
            ));

        let modifications = mapper()
            .to_ldap_modifications(&current, &admins_resource())
            .unwrap();
        assert_eq!(
            modifications,
            vec![Modification::Replace {
                attribute: "member".to_string(),
                values: vec!["uid=bjensen,dc=example,dc=com".to_string()],
            }]
        );
    }

    #[test]
    fn entry_translates_back_to_scim() {
        let entry = Entry::new("cn=admins,dc=example,dc=com")
            .with_attribute(Attribute::single("cn", "admins"))
            .with_attribute(Attribute::single("member", "uid=bjensen,dc=example,dc=com"));

        let attributes = mapper()
            .to_scim_attributes("Group", &entry, &AttributeSelection::all())
            .unwrap();
        let object = attributes
            .into_iter()
            .fold(ScimObject::new("Group"), ScimObject::with_attribute);

        assert_eq!(object.string_value("displayName"), Some("admins"));
        let members = object.multi_values("members");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].value(), Some("uid=bjensen,dc=example,dc=com"));
    }

    #[test]
    fn non_string_display_name_is_rejected() {
        let descriptor = core_group_descriptor();
        let resource = ScimObject::new("Group").with_attribute(ScimAttribute::singular(
            descriptor.attribute("displayName").unwrap().clone(),
            ScimScalar::Integer(7),
        ));
        let err = mapper().to_ldap_attributes(&resource).unwrap_err();
        assert!(matches!(err, Error::MalformedValue(_)));
    }
}
