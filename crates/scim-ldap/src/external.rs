//! Lifecycle management for the external directory server connection pool.

use crate::config::DirectoryConfig;
use crate::entry::{Entry, Modification};
use crate::interface::{
    DirectoryConnector, Ldap3Connector, LdapInterface, LdapInterfaceProvider, SearchRequest,
};
use crate::pool::{ConnectionPool, PooledConnection};
use async_trait::async_trait;
use scim_core::error::{Error, Result, ResultCode};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Manages the single shared connection pool to the backing directory.
///
/// The pool is constructed lazily on first use and replaced only when it is
/// observed closed. Two racing initializers converge on one live pool: the
/// first to publish wins and the loser's pool is closed before its caller
/// proceeds, so at most one pool is ever live.
pub struct LdapExternalServer {
    config: Arc<DirectoryConfig>,
    connector: Arc<dyn DirectoryConnector>,
    pool: RwLock<Option<Arc<ConnectionPool>>>,
}

impl LdapExternalServer {
    /// Creates an external server that dials the configured directory with
    /// the production `ldap3` connector.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector = Arc::new(Ldap3Connector::new(Arc::clone(&config)));
        Self {
            config,
            connector,
            pool: RwLock::new(None),
        }
    }

    /// Creates an external server with a custom connector.
    #[must_use]
    pub fn with_connector(config: DirectoryConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            pool: RwLock::new(None),
        }
    }

    /// Returns the live connection pool, creating one when none exists or
    /// the published pool has been observed closed.
    #[must_use]
    pub fn pool(&self) -> Arc<ConnectionPool> {
        let observed = self
            .pool
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some(pool) = observed {
            if !pool.is_closed() {
                return pool;
            }
        }

        let fresh = Arc::new(ConnectionPool::new(
            Arc::clone(&self.connector),
            self.config.credentials().bind_dn(),
            self.config.credentials().bind_password(),
            self.config.max_connections(),
        ));

        let mut published = self
            .pool
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match published.as_ref() {
            Some(current) if !current.is_closed() => {
                // Lost the race: another initializer published first.
                let winner = Arc::clone(current);
                drop(published);
                warn!("discarding connection pool that lost the publish race");
                fresh.close();
                winner
            }
            _ => {
                debug!(
                    url = %self.config.url(),
                    capacity = self.config.max_connections(),
                    "publishing directory connection pool"
                );
                *published = Some(Arc::clone(&fresh));
                fresh
            }
        }
    }

    /// Runs a search expected to match at most one entry, classifying any
    /// connection failure against the defunct result codes.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TooManyResults`] when more than one entry
    /// matches, or with the underlying backend error.
    pub async fn search_for_entry(&self, request: &SearchRequest) -> Result<Option<Entry>> {
        self.ldap_interface().await?.search_for_entry(request).await
    }

    /// Closes the pool. All connections are torn down; later operations
    /// would lazily create a fresh pool.
    pub fn close(&self) {
        let taken = self
            .pool
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(pool) = taken {
            pool.close();
        }
    }
}

#[async_trait]
impl LdapInterfaceProvider for LdapExternalServer {
    async fn ldap_interface(&self) -> Result<Box<dyn LdapInterface>> {
        let connection = self.pool().acquire().await?;
        Ok(Box::new(PooledLdapInterface { connection }))
    }
}

/// An LDAP interface over one borrowed pool connection.
///
/// Every failed operation is classified: when the result code belongs to the
/// defunct set the connection is discarded on release instead of returned to
/// the idle set. The original error always propagates.
struct PooledLdapInterface {
    connection: PooledConnection,
}

impl PooledLdapInterface {
    fn classify<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.connection.classify_failure(err);
        }
        result
    }
}

#[async_trait]
impl LdapInterface for PooledLdapInterface {
    async fn search_for_entry(&mut self, request: &SearchRequest) -> Result<Option<Entry>> {
        let single = request.single_entry();
        let outcome = self.connection.search(&single).await;
        match self.classify(outcome) {
            Ok(mut entries) => {
                if entries.len() > 1 {
                    return Err(too_many_results(&single.base_dn, entries.len()));
                }
                Ok(entries.pop())
            }
            Err(err) => match err.ldap_result_code() {
                Some(ResultCode::NO_SUCH_OBJECT) => Ok(None),
                Some(ResultCode::SIZE_LIMIT_EXCEEDED) => {
                    Err(too_many_results(&single.base_dn, 2))
                }
                _ => Err(err),
            },
        }
    }

    async fn get_entry(&mut self, dn: &str) -> Result<Option<Entry>> {
        self.search_for_entry(&SearchRequest::for_entry(dn)).await
    }

    async fn add_entry(&mut self, entry: &Entry) -> Result<Option<Entry>> {
        let outcome = self.connection.add(entry, true).await;
        self.classify(outcome)
    }

    async fn modify_entry(
        &mut self,
        dn: &str,
        modifications: &[Modification],
    ) -> Result<Option<Entry>> {
        let outcome = self.connection.modify(dn, modifications, true).await;
        self.classify(outcome)
    }

    async fn delete_entry(&mut self, dn: &str) -> Result<()> {
        let outcome = self.connection.delete(dn).await;
        self.classify(outcome)
    }
}

fn too_many_results(base_dn: &str, matched: usize) -> Error {
    Error::TooManyResults(format!(
        "single-entry search at {base_dn} matched {matched} entries"
    ))
}
