//! Client configuration.

use dsx_protocol::DEFAULT_DATABASE_ID;
use std::env;
use std::time::Duration;

/// Environment variable holding the project id.
pub const ENV_PROJECT_ID: &str = "DATASTORE_PROJECT_ID";
/// Environment variable holding the database id.
pub const ENV_DATABASE_ID: &str = "DATASTORE_DATABASE_ID";
/// Environment variable holding the namespace.
pub const ENV_NAMESPACE: &str = "DATASTORE_NAMESPACE";
/// Environment variable pointing at an emulator, e.g. `localhost:8081`.
pub const ENV_EMULATOR_HOST: &str = "DATASTORE_EMULATOR_HOST";

/// Configuration for a [`crate::DatastoreClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Project id sent on every request.
    pub project_id: String,
    /// Database id sent on every request.
    pub database_id: String,
    /// Namespace used for queries.
    pub namespace: String,
    /// Base URL for HTTP transports.
    pub endpoint: Option<String>,
    /// Per-call timeout applied on top of the caller's scope.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Creates a configuration for the default database of a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            namespace: String::new(),
            endpoint: None,
            timeout: None,
        }
    }

    /// Reads the configuration from the `DATASTORE_*` environment variables.
    ///
    /// Returns `None` when no project id is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let project_id = lookup(ENV_PROJECT_ID).filter(|p| !p.is_empty())?;
        let mut config = Self::new(project_id);
        if let Some(database_id) = lookup(ENV_DATABASE_ID).filter(|d| !d.is_empty()) {
            config.database_id = database_id;
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.namespace = namespace;
        }
        if let Some(host) = lookup(ENV_EMULATOR_HOST).filter(|h| !h.is_empty()) {
            config.endpoint = Some(format!("http://{}", host));
        }
        Some(config)
    }

    /// Sets the database id.
    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the HTTP endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
