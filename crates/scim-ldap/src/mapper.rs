//! Resource mappers and the server mapping context.
//!
//! A resource mapper translates one slice of a resource kind's attributes
//! between SCIM form and directory form. Several mappers may serve the same
//! resource kind; registration order decides attribute overlay, and exactly
//! one registered mapper per kind may originate entries.

use crate::dn::Dn;
use crate::entry::{Attribute, Entry, Modification};
use scim_core::error::{Error, Result};
use scim_core::resource::{ScimAttribute, ScimObject};
use scim_core::schema::{ResourceDescriptor, ResourceDescriptorCatalog};
use scim_core::selection::AttributeSelection;
use std::collections::HashMap;
use std::sync::Arc;

/// Translates between a resource kind's SCIM attributes and directory
/// entries, for the attribute slice this mapper owns.
pub trait ResourceMapper: Send + Sync {
    /// The resource kind this mapper participates in (e.g. `User`).
    fn resource_name(&self) -> &str;

    /// Whether this mapper can originate directory entries for the kind.
    fn supports_create(&self) -> bool {
        false
    }

    /// Produces SCIM attributes from a directory entry, restricted to names
    /// present in `selection`. Attributes that cannot be sourced from the
    /// entry are silently omitted.
    ///
    /// # Errors
    ///
    /// Returns an error when an entry value cannot be translated.
    fn to_scim_attributes(
        &self,
        resource_name: &str,
        entry: &Entry,
        selection: &AttributeSelection,
    ) -> Result<Vec<ScimAttribute>>;

    /// Constructs a new directory entry for the resource, named under
    /// `base_dn`. Only creator mappers implement this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteResource`] when naming attributes are
    /// missing, or [`Error::NoCreator`] for non-creator mappers.
    fn to_ldap_entry(&self, resource: &ScimObject, base_dn: &Dn) -> Result<Entry> {
        let _ = base_dn;
        Err(Error::NoCreator(resource.resource_name().to_string()))
    }

    /// Contributes directory attributes for an entry another mapper
    /// originated.
    ///
    /// # Errors
    ///
    /// Returns an error when a resource value cannot be translated.
    fn to_ldap_attributes(&self, resource: &ScimObject) -> Result<Vec<Attribute>>;

    /// Computes the minimal modification set that brings `current_entry` to
    /// the shape implied by `desired`, for this mapper's attributes only.
    ///
    /// # Errors
    ///
    /// Returns an error when a resource value cannot be translated.
    fn to_ldap_modifications(
        &self,
        current_entry: &Entry,
        desired: &ScimObject,
    ) -> Result<Vec<Modification>>;
}

/// Computes the replace/add/delete modification for one directory attribute.
///
/// - desired empty, attribute present: delete the attribute;
/// - desired non-empty, attribute absent: add all desired values;
/// - both present: replace only when the value sets differ
///   (order-independent comparison).
#[must_use]
pub fn diff_attribute(
    current: &Entry,
    attribute: &str,
    desired: Vec<String>,
) -> Option<Modification> {
    match (current.values(attribute), desired.is_empty()) {
        (None, true) => None,
        (Some(_), true) => Some(Modification::Delete {
            attribute: attribute.to_string(),
            values: Vec::new(),
        }),
        (None, false) => Some(Modification::Add {
            attribute: attribute.to_string(),
            values: desired,
        }),
        (Some(existing), false) => {
            if same_value_set(existing, &desired) {
                None
            } else {
                Some(Modification::Replace {
                    attribute: attribute.to_string(),
                    values: desired,
                })
            }
        }
    }
}

fn same_value_set(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b: Vec<&str> = b.iter().map(String::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// The mapping context a backend operates against: the descriptor catalogue
/// plus the mapper registry.
///
/// Built during startup, then shared immutably; lookups need no
/// synchronization beyond publication.
#[derive(Default)]
pub struct ServerContext {
    catalog: ResourceDescriptorCatalog,
    mappers: HashMap<String, Vec<Arc<dyn ResourceMapper>>>,
}

impl ServerContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with the standard User and Group descriptors and
    /// mappers registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when registration fails.
    pub fn standard() -> Result<Self> {
        use crate::group::GroupResourceMapper;
        use crate::user::UserResourceMapper;
        use scim_core::schema::{core_group_descriptor, core_user_descriptor};

        let mut context = Self::new();
        context.register_descriptor(core_user_descriptor())?;
        context.register_descriptor(core_group_descriptor())?;

        let user_descriptor = context.descriptor("User")?;
        context.register_mapper(Arc::new(UserResourceMapper::new(user_descriptor)))?;
        let group_descriptor = context.descriptor("Group")?;
        context.register_mapper(Arc::new(GroupResourceMapper::new(group_descriptor)))?;

        Ok(context)
    }

    /// Registers a resource descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a duplicate registration.
    pub fn register_descriptor(&mut self, descriptor: ResourceDescriptor) -> Result<()> {
        self.catalog.register(descriptor)
    }

    /// Registers a mapper under its resource name. Registration order is
    /// preserved: it decides creator selection and attribute overlay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when a second creator-capable mapper
    /// is registered for the same resource name.
    pub fn register_mapper(&mut self, mapper: Arc<dyn ResourceMapper>) -> Result<()> {
        let key = mapper.resource_name().to_ascii_lowercase();
        let registered = self.mappers.entry(key).or_default();
        if mapper.supports_create()
            && registered.iter().any(|existing| existing.supports_create())
        {
            return Err(Error::ConfigError(format!(
                "a creator mapper is already registered for {} resources",
                mapper.resource_name()
            )));
        }
        registered.push(mapper);
        Ok(())
    }

    /// Retrieves the descriptor for a resource name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] when no descriptor is registered.
    pub fn descriptor(&self, resource_name: &str) -> Result<Arc<ResourceDescriptor>> {
        self.catalog.get(resource_name)
    }

    /// The mappers registered for a resource name, in registration order.
    #[must_use]
    pub fn resource_mappers(&self, resource_name: &str) -> &[Arc<dyn ResourceMapper>] {
        self.mappers
            .get(&resource_name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("resource_names", &self.mappers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::StubMapper;
    use super::*;
    use crate::entry::Attribute;

    fn entry_with(attribute: &str, values: &[&str]) -> Entry {
        Entry::new("uid=x,dc=example,dc=com")
            .with_attribute(Attribute::new(attribute, values.iter().copied()))
    }

    #[test]
    fn diff_deletes_when_desired_absent() {
        let current = entry_with("homePhone", &["818-123-4567"]);
        let modification = diff_attribute(&current, "homePhone", Vec::new()).unwrap();
        assert_eq!(
            modification,
            Modification::Delete {
                attribute: "homePhone".to_string(),
                values: Vec::new(),
            }
        );
    }

    #[test]
    fn diff_adds_when_current_absent() {
        let current = Entry::new("uid=x,dc=example,dc=com");
        let modification =
            diff_attribute(&current, "mail", vec!["bjensen@example.com".to_string()]).unwrap();
        assert_eq!(
            modification,
            Modification::Add {
                attribute: "mail".to_string(),
                values: vec!["bjensen@example.com".to_string()],
            }
        );
    }

    #[test]
    fn diff_is_order_independent() {
        let current = entry_with("mail", &["a@example.com", "b@example.com"]);
        assert!(diff_attribute(
            &current,
            "mail",
            vec!["b@example.com".to_string(), "a@example.com".to_string()],
        )
        .is_none());
    }

    #[test]
    fn diff_replaces_on_changed_values() {
        let current = entry_with("givenName", &["Barbara"]);
        let modification =
            diff_attribute(&current, "givenName", vec!["Babs".to_string()]).unwrap();
        assert!(matches!(modification, Modification::Replace { .. }));
    }

    #[test]
    fn diff_no_change_when_both_absent() {
        let current = Entry::new("uid=x,dc=example,dc=com");
        assert!(diff_attribute(&current, "description", Vec::new()).is_none());
    }

    #[test]
    fn second_creator_registration_fails() {
        let mut context = ServerContext::new();
        context
            .register_mapper(Arc::new(StubMapper {
                name: "User",
                creator: true,
            }))
            .unwrap();
        context
            .register_mapper(Arc::new(StubMapper {
                name: "User",
                creator: false,
            }))
            .unwrap();

        let err = context
            .register_mapper(Arc::new(StubMapper {
                name: "User",
                creator: true,
            }))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        assert_eq!(context.resource_mappers("user").len(), 2);
        assert!(context.resource_mappers("Device").is_empty());
    }

    #[test]
    fn standard_context_registers_user_and_group() {
        let context = ServerContext::standard().unwrap();
        assert_eq!(context.resource_mappers("User").len(), 1);
        assert_eq!(context.resource_mappers("Group").len(), 1);
        assert!(context.descriptor("User").is_ok());
        assert!(context.descriptor("Missing").is_err());
    }
}
