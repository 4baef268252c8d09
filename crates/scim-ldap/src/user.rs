//! The standard User resource mapper.
//!
//! Maps the SCIM core `User` attributes onto an `inetOrgPerson` entry:
//!
//! | SCIM                      | Directory                                            |
//! |---------------------------|------------------------------------------------------|
//! | `userName`                | `uid` (also names the entry)                         |
//! | `name.formatted`          | `cn` (falling back to `userName`)                    |
//! | `name.familyName`         | `sn`                                                 |
//! | `name.givenName`          | `givenName`                                          |
//! | `emails`                  | `mail`                                               |
//! | `phoneNumbers` (`work`)   | `telephoneNumber`                                    |
//! | `phoneNumbers` (`home`)   | `homePhone`                                          |
//! | `addresses` (`work`)      | `postalAddress`, `street`, `l`, `st`, `postalCode`   |
//! | `addresses` (`home`)      | `homePostalAddress`                                  |
//!
//! Every value crosses the boundary through the value resolvers, dispatched
//! on the descriptor's declared type. Postal strings use `$` as the line
//! separator on the directory side.

use crate::dn::{Dn, Rdn};
use crate::entry::{Attribute, Entry, Modification};
use crate::mapper::{diff_attribute, ResourceMapper};
use scim_core::error::{Error, Result};
use scim_core::resource::{ScimAttribute, ScimObject};
use scim_core::schema::ResourceDescriptor;
use scim_core::selection::AttributeSelection;
use scim_core::value::{decode_value, encode_value, ComplexValue, ScimValue};
use std::sync::Arc;

const OBJECT_CLASSES: &[&str] = &["top", "person", "organizationalPerson", "inetOrgPerson"];

/// Every directory attribute this mapper owns. PUT diffs each one
/// independently, so a type-split multi-valued attribute (e.g. work and home
/// phone numbers) changes one directory attribute without touching the other.
const MAPPED_ATTRIBUTES: &[&str] = &[
    "uid",
    "cn",
    "sn",
    "givenName",
    "mail",
    "telephoneNumber",
    "homePhone",
    "postalAddress",
    "street",
    "l",
    "st",
    "postalCode",
    "homePostalAddress",
];

/// The work address is spread across parallel directory attributes; each
/// tuple is (SCIM sub-attribute, directory attribute, postal-string form).
const WORK_ADDRESS_SOURCES: &[(&str, &str, bool)] = &[
    ("formatted", "postalAddress", true),
    ("streetAddress", "street", false),
    ("locality", "l", false),
    ("region", "st", false),
    ("postalCode", "postalCode", false),
];

/// Creator mapper for the SCIM core `User` resource kind.
pub struct UserResourceMapper {
    descriptor: Arc<ResourceDescriptor>,
}

impl UserResourceMapper {
    /// Creates the mapper for the given `User` descriptor.
    #[must_use]
    pub fn new(descriptor: Arc<ResourceDescriptor>) -> Self {
        Self { descriptor }
    }

    /// Directory values implied by the resource for one mapped attribute,
    /// encoded through the owning descriptor's resolver.
    fn desired_values(&self, resource: &ScimObject, attribute: &str) -> Result<Vec<String>> {
        match attribute {
            "uid" => self.encoded_single(resource, "userName"),
            "cn" => match self.encoded_name_sub(resource, "formatted")? {
                Some(formatted) => Ok(vec![formatted]),
                None => self.encoded_single(resource, "userName"),
            },
            "sn" => Ok(self
                .encoded_name_sub(resource, "familyName")?
                .into_iter()
                .collect()),
            "givenName" => Ok(self
                .encoded_name_sub(resource, "givenName")?
                .into_iter()
                .collect()),
            "mail" => self.encoded_plural_values(resource, "emails", None),
            "telephoneNumber" => self.encoded_plural_values(resource, "phoneNumbers", Some("work")),
            "homePhone" => self.encoded_plural_values(resource, "phoneNumbers", Some("home")),
            "postalAddress" => Ok(self
                .encoded_address_sub(resource, "work", "formatted")?
                .iter()
                .map(|formatted| to_postal_string(formatted))
                .collect()),
            "street" => self.encoded_address_sub(resource, "work", "streetAddress"),
            "l" => self.encoded_address_sub(resource, "work", "locality"),
            "st" => self.encoded_address_sub(resource, "work", "region"),
            "postalCode" => self.encoded_address_sub(resource, "work", "postalCode"),
            "homePostalAddress" => Ok(self
                .encoded_address_sub(resource, "home", "formatted")?
                .iter()
                .map(|formatted| to_postal_string(formatted))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn encoded_single(&self, resource: &ScimObject, attribute: &str) -> Result<Vec<String>> {
        let Some(scalar) = resource.value(attribute).and_then(ScimValue::as_scalar) else {
            return Ok(Vec::new());
        };
        let descriptor = self.descriptor.require_attribute(attribute)?;
        Ok(vec![encode_value(descriptor, scalar)?])
    }

    fn encoded_name_sub(&self, resource: &ScimObject, sub: &str) -> Result<Option<String>> {
        let Some(scalar) = resource
            .value("name")
            .and_then(ScimValue::as_complex)
            .and_then(|name| name.get(sub))
        else {
            return Ok(None);
        };
        let descriptor = self
            .descriptor
            .require_attribute("name")?
            .require_sub_attribute(sub)?;
        encode_value(descriptor, scalar).map(Some)
    }

    fn encoded_plural_values(
        &self,
        resource: &ScimObject,
        attribute: &str,
        discriminator: Option<&str>,
    ) -> Result<Vec<String>> {
        let descriptor = self
            .descriptor
            .require_attribute(attribute)?
            .require_sub_attribute("value")?;
        resource
            .multi_values(attribute)
            .iter()
            .filter(|element| discriminator.map_or(true, |kind| matches_type(element, kind)))
            .filter_map(|element| element.get("value"))
            .map(|scalar| encode_value(descriptor, scalar))
            .collect()
    }

    fn encoded_address_sub(
        &self,
        resource: &ScimObject,
        discriminator: &str,
        sub: &str,
    ) -> Result<Vec<String>> {
        let descriptor = self
            .descriptor
            .require_attribute("addresses")?
            .require_sub_attribute(sub)?;
        resource
            .multi_values("addresses")
            .iter()
            .filter(|element| matches_type(element, discriminator))
            .filter_map(|element| element.get(sub))
            .map(|scalar| encode_value(descriptor, scalar))
            .collect()
    }

    fn scim_name(&self, entry: &Entry) -> Result<Option<ComplexValue>> {
        let descriptor = self.descriptor.require_attribute("name")?;
        let mut name = ComplexValue::new();
        for (sub, attribute) in [
            ("formatted", "cn"),
            ("familyName", "sn"),
            ("givenName", "givenName"),
        ] {
            if let Some(raw) = entry.first_value(attribute) {
                name.set(sub, decode_value(descriptor.require_sub_attribute(sub)?, raw)?);
            }
        }
        Ok((!name.is_empty()).then_some(name))
    }

    fn scim_emails(&self, entry: &Entry) -> Result<Vec<ComplexValue>> {
        let descriptor = self
            .descriptor
            .require_attribute("emails")?
            .require_sub_attribute("value")?;
        entry
            .values("mail")
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                Ok(ComplexValue::new()
                    .with("type", "work")
                    .with("value", decode_value(descriptor, raw)?))
            })
            .collect()
    }

    fn scim_phone_numbers(&self, entry: &Entry) -> Result<Vec<ComplexValue>> {
        let descriptor = self
            .descriptor
            .require_attribute("phoneNumbers")?
            .require_sub_attribute("value")?;
        let mut elements = Vec::new();
        for (attribute, discriminator) in [("telephoneNumber", "work"), ("homePhone", "home")] {
            for raw in entry.values(attribute).unwrap_or_default() {
                elements.push(
                    ComplexValue::new()
                        .with("type", discriminator)
                        .with("value", decode_value(descriptor, raw)?),
                );
            }
        }
        Ok(elements)
    }

    fn scim_addresses(&self, entry: &Entry) -> Result<Vec<ComplexValue>> {
        let descriptor = self.descriptor.require_attribute("addresses")?;
        let mut elements = self.work_addresses(entry)?;

        let formatted_descriptor = descriptor.require_sub_attribute("formatted")?;
        for raw in entry.values("homePostalAddress").unwrap_or_default() {
            elements.push(
                ComplexValue::new()
                    .with("type", "home")
                    .with("formatted", decode_value(formatted_descriptor, &from_postal_string(raw))?),
            );
        }
        Ok(elements)
    }

    fn work_addresses(&self, entry: &Entry) -> Result<Vec<ComplexValue>> {
        let descriptor = self.descriptor.require_attribute("addresses")?;
        let count = WORK_ADDRESS_SOURCES
            .iter()
            .map(|(_, attribute, _)| entry.values(attribute).unwrap_or_default().len())
            .max()
            .unwrap_or(0);

        // Parallel attribute values are recombined index-wise.
        let mut elements = Vec::with_capacity(count);
        for idx in 0..count {
            let mut element = ComplexValue::new().with("type", "work");
            for (sub, attribute, postal) in WORK_ADDRESS_SOURCES {
                if let Some(raw) = entry.values(attribute).unwrap_or_default().get(idx) {
                    let raw = if *postal {
                        from_postal_string(raw)
                    } else {
                        raw.clone()
                    };
                    element.set(
                        *sub,
                        decode_value(descriptor.require_sub_attribute(sub)?, &raw)?,
                    );
                }
            }
            elements.push(element);
        }
        Ok(elements)
    }
}

impl ResourceMapper for UserResourceMapper {
    fn resource_name(&self) -> &str {
        "User"
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

        if selection.is_requested("userName") {
            if let Some(uid) = entry.first_value("uid") {
                let descriptor = self.descriptor.require_attribute("userName")?;
                attributes.push(ScimAttribute::singular(
                    descriptor.clone(),
                    decode_value(descriptor, uid)?,
                ));
            }
        }

        if selection.is_requested("name") {
            if let Some(name) = self.scim_name(entry)? {
                attributes.push(ScimAttribute::complex(
                    self.descriptor.require_attribute("name")?.clone(),
                    name,
                ));
            }
        }

        if selection.is_requested("emails") {
            let emails = self.scim_emails(entry)?;
            if !emails.is_empty() {
                attributes.push(ScimAttribute::multi_valued(
                    self.descriptor.require_attribute("emails")?.clone(),
                    emails,
                ));
            }
        }

        if selection.is_requested("phoneNumbers") {
            let numbers = self.scim_phone_numbers(entry)?;
            if !numbers.is_empty() {
                attributes.push(ScimAttribute::multi_valued(
                    self.descriptor.require_attribute("phoneNumbers")?.clone(),
                    numbers,
                ));
            }
        }

        if selection.is_requested("addresses") {
            let addresses = self.scim_addresses(entry)?;
            if !addresses.is_empty() {
                attributes.push(ScimAttribute::multi_valued(
                    self.descriptor.require_attribute("addresses")?.clone(),
                    addresses,
                ));
            }
        }

        Ok(attributes)
    }

    fn to_ldap_entry(&self, resource: &ScimObject, base_dn: &Dn) -> Result<Entry> {
        let user_name = resource.string_value("userName").ok_or_else(|| {
            Error::IncompleteResource("userName is required to name a User entry".to_string())
        })?;

        let dn = Dn::child_of(Rdn::new("uid", user_name), base_dn);
        let mut entry = Entry::new(dn.as_str());
        entry.add_values("objectClass", OBJECT_CLASSES.iter().copied());
        for attribute in self.to_ldap_attributes(resource)? {
            entry.add_attribute(attribute);
        }
        Ok(entry)
    }

    fn to_ldap_attributes(&self, resource: &ScimObject) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        for attribute in MAPPED_ATTRIBUTES {
            let values = self.desired_values(resource, attribute)?;
            if !values.is_empty() {
                attributes.push(Attribute::new(*attribute, values));
            }
        }
        Ok(attributes)
    }

    fn to_ldap_modifications(
        &self,
        current_entry: &Entry,
        desired: &ScimObject,
    ) -> Result<Vec<Modification>> {
        let mut modifications = Vec::new();
        for attribute in MAPPED_ATTRIBUTES {
            if let Some(modification) = diff_attribute(
                current_entry,
                attribute,
                self.desired_values(desired, attribute)?,
            ) {
                modifications.push(modification);
            }
        }
        Ok(modifications)
    }
}

fn matches_type(element: &ComplexValue, discriminator: &str) -> bool {
    element
        .type_discriminator()
        .is_some_and(|value| value.eq_ignore_ascii_case(discriminator))
}

fn to_postal_string(formatted: &str) -> String {
    formatted.replace('\n', "$")
}

fn from_postal_string(value: &str) -> String {
    value.replace('$', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scim_core::schema::core_user_descriptor;
    use scim_core::value::ScimScalar;

    fn mapper() -> UserResourceMapper {
        UserResourceMapper::new(Arc::new(core_user_descriptor()))
    }

    fn base_dn() -> Dn {
        Dn::parse("dc=example,dc=com").unwrap()
    }

    fn jensen_resource() -> ScimObject {
        let descriptor = core_user_descriptor();
        ScimObject::new("User")
            .with_attribute(ScimAttribute::singular(
                descriptor.attribute("userName").unwrap().clone(),
                ScimScalar::String("bjensen".to_string()),
            ))
            .with_attribute(ScimAttribute::complex(
                descriptor.attribute("name").unwrap().clone(),
                ComplexValue::new()
                    .with("formatted", "Ms. Barbara J Jensen III")
                    .with("familyName", "Jensen")
                    .with("givenName", "Barbara"),
            ))
    }

    #[test]
    fn entry_creation_names_by_uid() {
        let entry = mapper().to_ldap_entry(&jensen_resource(), &base_dn()).unwrap();
        assert_eq!(entry.dn(), "uid=bjensen,dc=example,dc=com");
        assert!(entry.has_value("uid", "bjensen"));
        assert!(entry.has_value("sn", "Jensen"));
        assert!(entry.has_value("cn", "Ms. Barbara J Jensen III"));
        assert!(entry.has_value("givenName", "Barbara"));
        assert!(entry.has_value("objectClass", "inetOrgPerson"));
    }

    #[test]
    fn entry_creation_requires_user_name() {
        let resource = ScimObject::new("User");
        let err = mapper().to_ldap_entry(&resource, &base_dn()).unwrap_err();
        assert!(matches!(err, Error::IncompleteResource(_)));
    }

    #[test]
    fn cn_falls_back_to_user_name() {
        let descriptor = core_user_descriptor();
        let resource = ScimObject::new("User").with_attribute(ScimAttribute::singular(
            descriptor.attribute("userName").unwrap().clone(),
            ScimScalar::String("b jensen".to_string()),
        ));
        let entry = mapper().to_ldap_entry(&resource, &base_dn()).unwrap();
        assert!(entry.has_value("cn", "b jensen"));
    }

    #[test]
    fn entry_translates_back_to_scim() {
        let entry = Entry::new("uid=b jensen,dc=example,dc=com")
            .with_attribute(Attribute::single("uid", "b jensen"))
            .with_attribute(Attribute::single("cn", "Barbara Jensen"))
            .with_attribute(Attribute::single("sn", "Jensen"))
            .with_attribute(Attribute::single("givenName", "Barbara"))
            .with_attribute(Attribute::single("mail", "bjensen@example.com"))
            .with_attribute(Attribute::single("telephoneNumber", "800-864-8377"))
            .with_attribute(Attribute::single("homePhone", "818-123-4567"));

        let attributes = mapper()
            .to_scim_attributes("User", &entry, &AttributeSelection::all())
            .unwrap();
        let object = attributes
            .into_iter()
            .fold(ScimObject::new("User"), ScimObject::with_attribute);

        assert_eq!(object.string_value("userName"), Some("b jensen"));
        assert_eq!(
            object.complex_sub_value("name", "familyName"),
            Some("Jensen")
        );
        assert_eq!(
            object.complex_sub_value("name", "formatted"),
            Some("Barbara Jensen")
        );

        let phones = object.multi_values("phoneNumbers");
        assert_eq!(phones.len(), 2);
        assert!(phones
            .iter()
            .any(|e| e.type_discriminator() == Some("work") && e.value() == Some("800-864-8377")));
        assert!(phones
            .iter()
            .any(|e| e.type_discriminator() == Some("home") && e.value() == Some("818-123-4567")));
    }

    #[test]
    fn selection_limits_produced_attributes() {
        let entry = Entry::new("uid=b jensen,dc=example,dc=com")
            .with_attribute(Attribute::single("uid", "b jensen"))
            .with_attribute(Attribute::single("sn", "Jensen"));

        let attributes = mapper()
            .to_scim_attributes(
                "User",
                &entry,
                &AttributeSelection::from_query(Some("userName")),
            )
            .unwrap();

        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].name(), "userName");
    }

    #[test]
    fn duplicate_type_discriminators_survive_both_directions() {
        let descriptor = core_user_descriptor();
        let resource = jensen_resource().with_attribute(ScimAttribute::multi_valued(
            descriptor.attribute("phoneNumbers").unwrap().clone(),
            vec![
                ComplexValue::new().with("type", "work").with("value", "800-864-8377"),
                ComplexValue::new().with("type", "work").with("value", "800-864-8378"),
            ],
        ));

        let entry = mapper().to_ldap_entry(&resource, &base_dn()).unwrap();
        assert_eq!(entry.values("telephoneNumber").unwrap().len(), 2);

        let attributes = mapper()
            .to_scim_attributes("User", &entry, &AttributeSelection::all())
            .unwrap();
        let object = attributes
            .into_iter()
            .fold(ScimObject::new("User"), ScimObject::with_attribute);
        assert_eq!(object.multi_values("phoneNumbers").len(), 2);
    }

    #[test]
    fn modifications_remove_only_omitted_type() {
        let descriptor = core_user_descriptor();
        let current = Entry::new("uid=bjensen,dc=example,dc=com")
            .with_attribute(Attribute::single("uid", "bjensen"))
            .with_attribute(Attribute::single("cn", "Ms. Barbara J Jensen III"))
            .with_attribute(Attribute::single("sn", "Jensen"))
            .with_attribute(Attribute::single("telephoneNumber", "800-864-8377"))
            .with_attribute(Attribute::single("homePhone", "818-123-4567"));

        // Desired state keeps the work number and omits the home number.
        let desired = jensen_resource().with_attribute(ScimAttribute::multi_valued(
            descriptor.attribute("phoneNumbers").unwrap().clone(),
            vec![ComplexValue::new()
                .with("type", "work")
                .with("value", "800-864-8377")],
        ));

        let modifications = mapper().to_ldap_modifications(&current, &desired).unwrap();
        assert_eq!(
            modifications,
            vec![Modification::Delete {
                attribute: "homePhone".to_string(),
                values: Vec::new(),
            }]
        );
    }

    #[test]
    fn postal_address_uses_dollar_separator() {
        let descriptor = core_user_descriptor();
        let resource = jensen_resource().with_attribute(ScimAttribute::multi_valued(
            descriptor.attribute("addresses").unwrap().clone(),
            vec![ComplexValue::new()
                .with("type", "work")
                .with("formatted", "100 Universal City Plaza\nHollywood, CA 91608 USA")
                .with("streetAddress", "100 Universal City Plaza")
                .with("locality", "Hollywood")
                .with("region", "CA")
                .with("postalCode", "91608")],
        ));

        let attributes = mapper().to_ldap_attributes(&resource).unwrap();
        let postal = attributes
            .iter()
            .find(|a| a.name == "postalAddress")
            .unwrap();
        assert_eq!(
            postal.values,
            vec!["100 Universal City Plaza$Hollywood, CA 91608 USA".to_string()]
        );
        assert!(attributes.iter().any(|a| a.name == "street"));
        assert!(attributes.iter().any(|a| a.name == "l"));
        assert!(attributes.iter().any(|a| a.name == "st"));
        assert!(attributes.iter().any(|a| a.name == "postalCode"));

        // And back: the $-separated value becomes a formatted address again.
        let entry = mapper().to_ldap_entry(&resource, &base_dn()).unwrap();
        let addresses = mapper().scim_addresses(&entry).unwrap();
        assert_eq!(
            addresses[0].get_str("formatted"),
            Some("100 Universal City Plaza\nHollywood, CA 91608 USA")
        );
    }

    #[test]
    fn ignores_untyped_phone_elements() {
        let descriptor = core_user_descriptor();
        let resource = ScimObject::new("User").with_attribute(ScimAttribute::new(
            descriptor.attribute("phoneNumbers").unwrap().clone(),
            ScimValue::Multi(vec![ComplexValue::new().with("value", "555-0100")]),
        ));
        assert!(mapper()
            .encoded_plural_values(&resource, "phoneNumbers", Some("work"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn values_are_validated_against_declared_types() {
        let descriptor = core_user_descriptor();
        // A non-string userName is rejected by the resolver dispatch.
        let resource = ScimObject::new("User").with_attribute(ScimAttribute::singular(
            descriptor.attribute("userName").unwrap().clone(),
            ScimScalar::Boolean(true),
        ));
        let err = mapper().to_ldap_attributes(&resource).unwrap_err();
        assert!(matches!(err, Error::MalformedValue(_)));
    }
}
