//! Configuration for the LDAP backend.

use crate::dn::Dn;
use scim_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// Credentials the connection pool binds with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryCredentials {
    /// Bind distinguished name.
    pub bind_dn: String,
    /// Bind password.
    #[serde(skip_serializing)]
    pub bind_password: String,
}

impl DirectoryCredentials {
    /// Creates a new credential pair.
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, bind_password: impl Into<String>) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            bind_password: bind_password.into(),
        }
    }

    /// The bind distinguished name.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// The bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        &self.bind_password
    }
}

/// Configuration for connecting to the backing directory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    ds_host: String,
    ds_port: u16,
    credentials: DirectoryCredentials,
    base_dn: Dn,
    max_connections: usize,
    use_ldaps: bool,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// `base_dn` is the parent distinguished name under which created
    /// entries are placed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when the host and port do not form a
    /// valid directory endpoint.
    pub fn new(
        ds_host: impl Into<String>,
        ds_port: u16,
        credentials: DirectoryCredentials,
        base_dn: Dn,
    ) -> Result<Self> {
        let config = Self {
            ds_host: ds_host.into(),
            ds_port,
            credentials,
            base_dn,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_ldaps: false,
            tls_verify: true,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };

        Url::parse(&config.url())
            .map_err(|err| Error::ConfigError(format!("invalid directory endpoint: {err}")))?;

        Ok(config)
    }

    /// The directory server hostname.
    #[must_use]
    pub fn ds_host(&self) -> &str {
        &self.ds_host
    }

    /// The directory server port.
    #[must_use]
    pub const fn ds_port(&self) -> u16 {
        self.ds_port
    }

    /// The LDAP URL of the directory endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ldaps { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.ds_host, self.ds_port)
    }

    /// The pool bind credentials.
    #[must_use]
    pub const fn credentials(&self) -> &DirectoryCredentials {
        &self.credentials
    }

    /// The parent distinguished name for created entries.
    #[must_use]
    pub const fn base_dn(&self) -> &Dn {
        &self.base_dn
    }

    /// Maximum number of pooled connections.
    #[must_use]
    pub const fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// The connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// The per-operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Overrides the maximum number of pooled connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Connects over LDAPS instead of plain LDAP.
    #[must_use]
    pub const fn with_ldaps(mut self, use_ldaps: bool) -> Self {
        self.use_ldaps = use_ldaps;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets a custom CA certificate for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the per-operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
