//! Request value objects for the four resource operations.
//!
//! Each carrier is immutable for the lifetime of one operation: the HTTP
//! layer constructs it after resolving the request body into a resource
//! object, and the backend consumes it.

use crate::resource::ScimObject;
use crate::selection::AttributeSelection;

/// A request to retrieve a single resource.
#[derive(Debug, Clone)]
pub struct GetResourceRequest {
    resource_name: String,
    resource_id: String,
    attributes: AttributeSelection,
}

impl GetResourceRequest {
    /// Creates a new retrieve request.
    #[must_use]
    pub fn new(
        resource_name: impl Into<String>,
        resource_id: impl Into<String>,
        attributes: AttributeSelection,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_id: resource_id.into(),
            attributes,
        }
    }

    /// The resource kind identified by the request endpoint (e.g. `User`).
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The target resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The requested attribute projection.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeSelection {
        &self.attributes
    }
}

/// A request to create a resource.
#[derive(Debug, Clone)]
pub struct PostResourceRequest {
    resource_name: String,
    resource_object: ScimObject,
    attributes: AttributeSelection,
}

impl PostResourceRequest {
    /// Creates a new create request.
    #[must_use]
    pub fn new(
        resource_name: impl Into<String>,
        resource_object: ScimObject,
        attributes: AttributeSelection,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_object,
            attributes,
        }
    }

    /// The resource kind identified by the request endpoint.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The resource contents supplied by the client.
    #[must_use]
    pub const fn resource_object(&self) -> &ScimObject {
        &self.resource_object
    }

    /// The requested attribute projection.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeSelection {
        &self.attributes
    }
}

/// A request to replace a resource's attributes.
#[derive(Debug, Clone)]
pub struct PutResourceRequest {
    resource_name: String,
    resource_id: String,
    resource_object: ScimObject,
    attributes: AttributeSelection,
}

impl PutResourceRequest {
    /// Creates a new replace request.
    #[must_use]
    pub fn new(
        resource_name: impl Into<String>,
        resource_id: impl Into<String>,
        resource_object: ScimObject,
        attributes: AttributeSelection,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_id: resource_id.into(),
            resource_object,
            attributes,
        }
    }

    /// The resource kind identified by the request endpoint.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The target resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The desired resource state supplied by the client.
    #[must_use]
    pub const fn resource_object(&self) -> &ScimObject {
        &self.resource_object
    }

    /// The requested attribute projection.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeSelection {
        &self.attributes
    }
}

/// A request to delete a single resource.
#[derive(Debug, Clone)]
pub struct DeleteResourceRequest {
    resource_name: String,
    resource_id: String,
}

impl DeleteResourceRequest {
    /// Creates a new delete request.
    #[must_use]
    pub fn new(resource_name: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_id: resource_id.into(),
        }
    }

    /// The resource kind identified by the request endpoint.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The target resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accessors() {
        let get = GetResourceRequest::new(
            "User",
            "uid=bjensen,dc=example,dc=com",
            AttributeSelection::from_query(Some("userName")),
        );
        assert_eq!(get.resource_name(), "User");
        assert_eq!(get.resource_id(), "uid=bjensen,dc=example,dc=com");
        assert!(get.attributes().is_requested("userName"));

        let delete = DeleteResourceRequest::new("User", "uid=bjensen,dc=example,dc=com");
        assert_eq!(delete.resource_name(), "User");
        assert_eq!(delete.resource_id(), "uid=bjensen,dc=example,dc=com");
    }
}
