//! The directory connection abstraction and its `ldap3`-backed implementation.
//!
//! The pipeline talks to the directory through the [`DirectoryConnection`]
//! trait so the pool, the backend, and the tests are independent of the wire
//! client. [`Ldap3Connector`] provides the production implementation.

use crate::config::DirectoryConfig;
use crate::entry::{Entry, Modification};
use async_trait::async_trait;
use ldap3::controls::{Control, PostRead, PostReadResp};
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry, SearchOptions};
use native_tls::{Certificate, TlsConnector};
use scim_core::error::{Error, Result, ResultCode};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// OID of the post-read response control.
const POST_READ_CONTROL_OID: &str = "1.3.6.1.1.13.2";

/// Search scope for directory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// A directory search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base distinguished name.
    pub base_dn: String,
    /// Search scope.
    pub scope: SearchScope,
    /// Search filter string.
    pub filter: String,
    /// Attributes to return; empty requests all user attributes.
    pub attributes: Vec<String>,
    /// Maximum number of entries the server should return; `0` is unlimited.
    pub size_limit: i32,
}

impl SearchRequest {
    /// Creates a request with no size limit, returning all user attributes.
    #[must_use]
    pub fn new(base_dn: impl Into<String>, scope: SearchScope, filter: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope,
            filter: filter.into(),
            attributes: Vec::new(),
            size_limit: 0,
        }
    }

    /// Creates a base-scope presence search for a single entry, the shape
    /// used to fetch a resource by identifier.
    #[must_use]
    pub fn for_entry(dn: impl Into<String>) -> Self {
        Self::new(dn, SearchScope::Base, "(objectClass=*)").with_size_limit(1)
    }

    /// Overrides the size limit.
    #[must_use]
    pub const fn with_size_limit(mut self, size_limit: i32) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Overrides the requested attributes.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a request shaped for a single-entry lookup.
    ///
    /// When the request already carries a size limit of one it is returned
    /// unchanged; otherwise a duplicate with both the limit and the result
    /// handling adjusted is substituted.
    #[must_use]
    pub fn single_entry(&self) -> Self {
        if self.size_limit == 1 {
            return self.clone();
        }
        self.clone().with_size_limit(1)
    }
}

/// One bound connection to the directory.
///
/// Implementations are not required to be reusable after an operation fails
/// with a defunct result code; the pool discards such connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Authenticates the connection with the given credentials.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Executes a search and returns the matched entries.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<Entry>>;

    /// Adds an entry. With `post_read` set, asks the directory to return the
    /// committed entry state in the same round-trip.
    async fn add(&mut self, entry: &Entry, post_read: bool) -> Result<Option<Entry>>;

    /// Applies modifications to the entry named by `dn`, optionally
    /// returning the post-modification entry state.
    async fn modify(
        &mut self,
        dn: &str,
        modifications: &[Modification],
        post_read: bool,
    ) -> Result<Option<Entry>>;

    /// Deletes the entry named by `dn`.
    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// Closes the connection.
    async fn unbind(&mut self) -> Result<()>;
}

/// Establishes new directory connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens a new, not yet authenticated connection.
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>>;
}

/// The high-level directory operations the resource backend consumes.
///
/// An implementation wraps one borrowed connection for the duration of a
/// request; releasing it happens when the interface is dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapInterface: Send {
    /// Runs a search expected to match at most one entry.
    ///
    /// Returns `None` when the base entry does not exist and fails with
    /// [`Error::TooManyResults`] when more than one entry matches. A request
    /// not shaped for a single result is substituted with one that is.
    async fn search_for_entry(&mut self, request: &SearchRequest) -> Result<Option<Entry>>;

    /// Fetches the entry named by `dn`, or `None` when it does not exist.
    async fn get_entry(&mut self, dn: &str) -> Result<Option<Entry>>;

    /// Adds an entry and returns the committed entry state as reported by
    /// the directory's post-read response.
    async fn add_entry(&mut self, entry: &Entry) -> Result<Option<Entry>>;

    /// Applies modifications and returns the post-modification entry state.
    async fn modify_entry(
        &mut self,
        dn: &str,
        modifications: &[Modification],
    ) -> Result<Option<Entry>>;

    /// Deletes the entry named by `dn`. A missing target surfaces as a
    /// backend error carrying `noSuchObject`.
    async fn delete_entry(&mut self, dn: &str) -> Result<()>;
}

/// Capability to obtain an LDAP interface for one request.
///
/// One implementor exists per deployment style; the production one draws
/// from the shared connection pool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapInterfaceProvider: Send + Sync {
    /// Obtains an interface bound to a borrowed connection.
    async fn ldap_interface(&self) -> Result<Box<dyn LdapInterface>>;
}

/// Production connector backed by `ldap3`.
pub struct Ldap3Connector {
    config: Arc<DirectoryConfig>,
}

impl Ldap3Connector {
    /// Creates a connector for the configured directory server.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>> {
        let settings = build_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url())
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(Ldap3Connection {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct Ldap3Connection {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("directory bind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        result.success().map_err(map_ldap_error)?;
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<Entry>> {
        let attributes = if request.attributes.is_empty() {
            vec!["*".to_string()]
        } else {
            request.attributes.clone()
        };

        let search = self
            .inner
            .with_search_options(SearchOptions::new().sizelimit(request.size_limit))
            .search(
                &request.base_dn,
                request.scope.into(),
                &request.filter,
                attributes,
            );
        let result = timeout(self.operation_timeout, search)
            .await
            .map_err(|_| Error::Timeout("directory search timed out".to_string()))?
            .map_err(map_ldap_error)?;
        let (entries, _) = result.success().map_err(map_ldap_error)?;

        Ok(entries
            .into_iter()
            .map(|entry| from_search_entry(SearchEntry::construct(entry)))
            .collect())
    }

    async fn add(&mut self, entry: &Entry, post_read: bool) -> Result<Option<Entry>> {
        let attributes: Vec<(String, HashSet<String>)> = entry
            .attributes()
            .map(|attribute| (attribute.name, attribute.values.into_iter().collect()))
            .collect();

        let op = if post_read {
            self.inner
                .with_controls(PostRead::new(vec!["*".to_string()]))
                .add(entry.dn(), attributes)
        } else {
            self.inner.add(entry.dn(), attributes)
        };
        let result = timeout(self.operation_timeout, op)
            .await
            .map_err(|_| Error::Timeout("directory add timed out".to_string()))?
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(extract_post_read(entry.dn(), &result.ctrls))
    }

    async fn modify(
        &mut self,
        dn: &str,
        modifications: &[Modification],
        post_read: bool,
    ) -> Result<Option<Entry>> {
        let mods: Vec<Mod<String>> = modifications.iter().map(to_ldap3_mod).collect();

        let op = if post_read {
            self.inner
                .with_controls(PostRead::new(vec!["*".to_string()]))
                .modify(dn, mods)
        } else {
            self.inner.modify(dn, mods)
        };
        let result = timeout(self.operation_timeout, op)
            .await
            .map_err(|_| Error::Timeout("directory modify timed out".to_string()))?
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(extract_post_read(dn, &result.ctrls))
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        timeout(self.operation_timeout, self.inner.delete(dn))
            .await
            .map_err(|_| Error::Timeout("directory delete timed out".to_string()))?
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(())
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("directory unbind timed out".to_string()))?
            .map_err(map_ldap_error)
    }
}

fn to_ldap3_mod(modification: &Modification) -> Mod<String> {
    match modification {
        Modification::Add { attribute, values } => {
            Mod::Add(attribute.clone(), values.iter().cloned().collect())
        }
        Modification::Delete { attribute, values } => {
            Mod::Delete(attribute.clone(), values.iter().cloned().collect())
        }
        Modification::Replace { attribute, values } => {
            Mod::Replace(attribute.clone(), values.iter().cloned().collect())
        }
    }
}

fn from_search_entry(entry: SearchEntry) -> Entry {
    Entry::with_attributes(entry.dn, entry.attrs)
}

fn extract_post_read(dn: &str, ctrls: &[Control]) -> Option<Entry> {
    ctrls.iter().find_map(|control| {
        let Control(_, raw) = control;
        if raw.ctype == POST_READ_CONTROL_OID {
            let response = raw.parse::<PostReadResp>();
            Some(Entry::with_attributes(dn, response.attrs))
        } else {
            None
        }
    })
}

fn build_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    match err {
        ldap3::LdapError::LdapResult { result } => {
            let message = if result.text.is_empty() {
                format!("directory returned result code {}", result.rc)
            } else {
                result.text
            };
            Error::backend(result.rc, message)
        }
        // Anything below the protocol result is a connection-level failure.
        other => Error::backend(ResultCode::SERVER_DOWN, other.to_string()),
    }
}
