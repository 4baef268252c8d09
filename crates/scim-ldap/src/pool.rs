//! Bounded directory connection pool.
//!
//! The pool owns its connections exclusively. Callers borrow a
//! [`PooledConnection`] guard; when the guard drops, the connection either
//! returns to the idle set or, if marked defunct, is discarded so the pool
//! replenishes on a later borrow. Exactly one of the two happens on every
//! exit path.

use crate::interface::{DirectoryConnection, DirectoryConnector};
use scim_core::error::{Error, Result, ResultCode};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// A pool of bound directory connections with a fixed capacity.
pub struct ConnectionPool {
    connector: Arc<dyn DirectoryConnector>,
    bind_dn: String,
    bind_password: String,
    idle: Mutex<Vec<Box<dyn DirectoryConnection>>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Creates a pool that dials through `connector` and binds every new
    /// connection with the given credentials. Connections are established
    /// lazily, on first borrow.
    #[must_use]
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            connector,
            bind_dn: bind_dn.into(),
            bind_password: bind_password.into(),
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            closed: AtomicBool::new(false),
        }
    }

    /// Borrows a connection, waiting for capacity when all are in use.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the pool is closed, or any error raised
    /// while establishing and binding a fresh connection.
    pub async fn acquire(self: Arc<Self>) -> Result<PooledConnection> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| pool_closed())?;

        let idle = self
            .idle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop();

        let connection = match idle {
            Some(connection) => connection,
            None => {
                debug!(bind_dn = %self.bind_dn, "establishing new directory connection");
                let mut connection = self.connector.connect().await?;
                connection
                    .simple_bind(&self.bind_dn, &self.bind_password)
                    .await?;
                connection
            }
        };

        Ok(PooledConnection {
            connection: Some(connection),
            pool: self,
            _permit: permit,
            defunct: false,
        })
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the pool: pending and future borrows fail, idle connections
    /// are dropped, and in-flight borrows are discarded on release.
    ///
    /// Closing an already-closed pool is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.permits.close();
        let drained = {
            let mut idle = self
                .idle
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *idle)
        };
        debug!(connections = drained.len(), "directory connection pool closed");
        drop(drained);
    }

    fn release(&self, connection: Box<dyn DirectoryConnection>, defunct: bool) {
        if defunct {
            warn!("discarding defunct directory connection");
            return;
        }
        if self.is_closed() {
            return;
        }
        self.idle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(connection);
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("bind_dn", &self.bind_dn)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn pool_closed() -> Error {
    Error::backend(ResultCode::UNAVAILABLE, "connection pool is closed")
}

/// A borrowed pool connection.
///
/// Dropping the guard releases the connection: back to the idle set when
/// healthy, discarded when [`mark_defunct`](Self::mark_defunct) was called
/// or the pool has been closed in the meantime.
pub struct PooledConnection {
    connection: Option<Box<dyn DirectoryConnection>>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
    defunct: bool,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("defunct", &self.defunct)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    /// Marks the connection as no longer usable; it will be discarded
    /// instead of returned to the idle set.
    pub fn mark_defunct(&mut self) {
        self.defunct = true;
    }

    /// Inspects a failed operation's error and marks the connection defunct
    /// when the result code belongs to the defunct set.
    pub fn classify_failure(&mut self, error: &Error) {
        if error
            .ldap_result_code()
            .is_some_and(ResultCode::is_defunct)
        {
            self.mark_defunct();
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn DirectoryConnection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_deref()
            .expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_deref_mut()
            .expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection, self.defunct);
        }
    }
}
