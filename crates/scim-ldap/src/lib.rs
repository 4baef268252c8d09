//! # scim-ldap
//!
//! LDAP backend for a SCIM server: translates CRUD operations on SCIM
//! resources into directory operations and back.
//!
//! The pipeline for an inbound operation: a request value object enters the
//! [`backend::LdapBackend`], which looks up the resource's mappers and
//! descriptor in the [`mapper::ServerContext`], lets each
//! [`mapper::ResourceMapper`] translate between SCIM attributes and
//! directory form, and executes against the directory through a pooled
//! connection managed by [`external::LdapExternalServer`].

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod dn;
pub mod entry;
pub mod external;
pub mod group;
pub mod interface;
pub mod mapper;
pub mod pool;
pub mod user;

pub use backend::LdapBackend;
pub use config::{DirectoryConfig, DirectoryCredentials};
pub use dn::{Dn, DnError, Rdn};
pub use entry::{Attribute, Entry, Modification};
pub use external::LdapExternalServer;
pub use interface::{
    DirectoryConnection, DirectoryConnector, LdapInterface, LdapInterfaceProvider, SearchRequest,
    SearchScope,
};
pub use mapper::{ResourceMapper, ServerContext};
pub use pool::{ConnectionPool, PooledConnection};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = scim_core::Result<T>;
