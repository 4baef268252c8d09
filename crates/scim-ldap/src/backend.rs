//! The LDAP resource backend: the four CRUD verbs over directory entries.
//!
//! The backend is a stateless translator. It resolves the resource kind
//! through the server context, lets the registered mappers translate in
//! both directions, and reaches the directory through the
//! [`LdapInterfaceProvider`] capability. Responses to create and replace
//! operations are assembled from the entry state the directory committed
//! (the post-read result), never from the request body.

use crate::dn::Dn;
use crate::entry::{Attribute, Entry, Modification};
use crate::interface::{LdapInterfaceProvider, SearchRequest};
use crate::mapper::ServerContext;
use scim_core::error::{Error, Result, ResultCode};
use scim_core::request::{
    DeleteResourceRequest, GetResourceRequest, PostResourceRequest, PutResourceRequest,
};
use scim_core::resource::{ScimAttribute, ScimObject};
use scim_core::schema::ResourceDescriptor;
use scim_core::selection::AttributeSelection;
use scim_core::value::ScimScalar;
use std::sync::Arc;
use tracing::debug;

/// Resource backend that stores SCIM resources in an LDAP directory.
pub struct LdapBackend {
    provider: Arc<dyn LdapInterfaceProvider>,
    context: Arc<ServerContext>,
    base_dn: Dn,
}

impl LdapBackend {
    /// Creates a backend.
    ///
    /// `base_dn` is the parent distinguished name under which created
    /// entries are placed.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LdapInterfaceProvider>,
        context: Arc<ServerContext>,
        base_dn: Dn,
    ) -> Self {
        Self {
            provider,
            context,
            base_dn,
        }
    }

    /// Retrieves a resource by identifier, or `None` when no entry exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] for an unregistered resource kind
    /// and any backend failure other than a missing entry.
    pub async fn get_resource(&self, request: &GetResourceRequest) -> Result<Option<ScimObject>> {
        let descriptor = self.context.descriptor(request.resource_name())?;
        debug!(resource = request.resource_name(), id = request.resource_id(), "get resource");

        let mut interface = self.provider.ldap_interface().await?;
        let Some(entry) = interface
            .search_for_entry(&SearchRequest::for_entry(request.resource_id()))
            .await?
        else {
            return Ok(None);
        };

        self.build_resource(
            request.resource_name(),
            &descriptor,
            &entry,
            request.attributes(),
        )
        .map(Some)
    }

    /// Creates a resource and returns it as committed by the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCreator`] when no registered mapper can originate
    /// entries for the resource kind, [`Error::IncompleteResource`] when
    /// naming attributes are missing, and any backend failure.
    pub async fn post_resource(&self, request: &PostResourceRequest) -> Result<ScimObject> {
        let descriptor = self.context.descriptor(request.resource_name())?;
        let mappers = self.context.resource_mappers(request.resource_name());

        let mut entry: Option<Entry> = None;
        let mut contributed: Vec<Attribute> = Vec::new();
        for mapper in mappers {
            if entry.is_none() && mapper.supports_create() {
                entry = Some(mapper.to_ldap_entry(request.resource_object(), &self.base_dn)?);
            } else {
                contributed.extend(mapper.to_ldap_attributes(request.resource_object())?);
            }
        }

        let mut entry =
            entry.ok_or_else(|| Error::NoCreator(request.resource_name().to_string()))?;
        for attribute in contributed {
            entry.add_attribute(attribute);
        }
        debug!(resource = request.resource_name(), dn = entry.dn(), "create resource");

        let mut interface = self.provider.ldap_interface().await?;
        let committed = interface
            .add_entry(&entry)
            .await?
            .ok_or_else(|| post_read_missing("add"))?;

        self.build_resource(
            request.resource_name(),
            &descriptor,
            &committed,
            request.attributes(),
        )
    }

    /// Replaces a resource's mapped attributes, returning the resource as
    /// committed, or `None` when no entry exists under the identifier.
    ///
    /// Directory attributes outside every mapper's remit are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] for an unregistered resource kind
    /// and any backend failure other than a missing entry.
    pub async fn put_resource(&self, request: &PutResourceRequest) -> Result<Option<ScimObject>> {
        let descriptor = self.context.descriptor(request.resource_name())?;
        let mappers = self.context.resource_mappers(request.resource_name());

        let mut interface = self.provider.ldap_interface().await?;
        let Some(current) = interface.get_entry(request.resource_id()).await? else {
            return Ok(None);
        };

        let mut modifications: Vec<Modification> = Vec::new();
        for mapper in mappers {
            modifications.extend(mapper.to_ldap_modifications(&current, request.resource_object())?);
        }
        debug!(
            resource = request.resource_name(),
            id = request.resource_id(),
            modifications = modifications.len(),
            "replace resource"
        );

        let committed = if modifications.is_empty() {
            // Nothing to change; an empty modify would be a protocol error.
            current
        } else {
            interface
                .modify_entry(request.resource_id(), &modifications)
                .await?
                .ok_or_else(|| post_read_missing("modify"))?
        };

        self.build_resource(
            request.resource_name(),
            &descriptor,
            &committed,
            request.attributes(),
        )
        .map(Some)
    }

    /// Deletes a resource. Returns `true` when an entry was removed and
    /// `false` when none existed.
    ///
    /// # Errors
    ///
    /// Propagates every backend failure other than a missing entry.
    pub async fn delete_resource(&self, request: &DeleteResourceRequest) -> Result<bool> {
        debug!(resource = request.resource_name(), id = request.resource_id(), "delete resource");
        let mut interface = self.provider.ldap_interface().await?;
        match interface.delete_entry(request.resource_id()).await {
            Ok(()) => Ok(true),
            Err(err) if err.ldap_result_code() == Some(ResultCode::NO_SUCH_OBJECT) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Builds the response resource from a directory entry: the `id`
    /// pseudo-attribute when requested, then every mapper's attributes in
    /// registration order (later mappers win on name collisions), filtered
    /// by the selection.
    fn build_resource(
        &self,
        resource_name: &str,
        descriptor: &ResourceDescriptor,
        entry: &Entry,
        selection: &AttributeSelection,
    ) -> Result<ScimObject> {
        let mut object = ScimObject::new(resource_name);

        if selection.is_requested("id") {
            object.add_attribute(ScimAttribute::singular(
                descriptor.require_attribute("id")?.clone(),
                ScimScalar::String(entry.dn().to_string()),
            ));
        }

        for mapper in self.context.resource_mappers(resource_name) {
            for attribute in mapper.to_scim_attributes(resource_name, entry, selection)? {
                object.add_attribute(attribute);
            }
        }

        object.retain_selected(selection);
        Ok(object)
    }
}

fn post_read_missing(operation: &str) -> Error {
    Error::backend(
        ResultCode::OTHER,
        format!("directory did not return a post-read entry for the {operation} operation"),
    )
}
