//! Native datastore client.
//!
//! [`DatastoreClient`] offers the everyday read and write calls. Every call
//! goes through one [`Invoker`] chain assembled by [`ClientBuilder`]: a
//! transport at the bottom and any number of interceptors on top.

use crate::config::ClientConfig;
use crate::entity::{entity_from_proto, Entity};
use crate::error::{CoreError, CoreResult, RpcError};
use crate::interceptor::{Intercepted, Interceptor, Invoker, InvokerExt};
use crate::key::{key_to_proto, proto_to_key, Key};
use crate::mutation::{mutation_protos, Mutation};
use crate::scope::RequestScope;
use crate::transport::{HttpClient, HttpTransport, ServiceTransport};
use dsx_protocol::{CommitRequest, DatastoreService, LookupRequest, PartitionId, Query, RunQueryRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builder for [`DatastoreClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Invoker>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    error: Option<CoreError>,
}

impl ClientBuilder {
    /// Creates a builder for `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            interceptors: Vec::new(),
            error: None,
        }
    }

    /// Serves calls from an in-process service.
    pub fn with_service<S: DatastoreService + 'static>(self, service: S) -> Self {
        self.with_invoker(ServiceTransport::new(service))
    }

    /// Sends calls over HTTP to the configured endpoint.
    pub fn with_http<C: HttpClient + 'static>(mut self, client: C) -> Self {
        match self.config.endpoint.clone() {
            Some(endpoint) => self.with_invoker(HttpTransport::new(endpoint, client)),
            None => {
                self.error = Some(CoreError::invalid_config(
                    "HTTP transport requires an endpoint",
                ));
                self
            }
        }
    }

    /// Uses a custom transport.
    pub fn with_invoker<I: Invoker + 'static>(mut self, invoker: I) -> Self {
        self.transport = Some(Arc::new(invoker));
        self
    }

    /// Adds an interceptor. The first one added sees each call first.
    pub fn with_interceptor<X: Interceptor + 'static>(mut self, interceptor: X) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Builds the client.
    pub fn build(self) -> CoreResult<DatastoreClient> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.config.project_id.is_empty() {
            return Err(CoreError::invalid_config("project id is empty"));
        }
        let mut rpc = self
            .transport
            .ok_or_else(|| CoreError::invalid_config("no transport configured"))?;
        for interceptor in self.interceptors.into_iter().rev() {
            rpc = Arc::new(Intercepted::new(rpc, interceptor));
        }
        Ok(DatastoreClient {
            rpc,
            config: self.config,
        })
    }
}

/// Client for a versioned document datastore.
#[derive(Clone)]
pub struct DatastoreClient {
    rpc: Arc<dyn Invoker>,
    config: ClientConfig,
}

impl DatastoreClient {
    /// Starts building a client.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn rpc(&self) -> &Arc<dyn Invoker> {
        &self.rpc
    }

    /// Converts a key to wire form for this client's project and database.
    pub fn key_to_proto(&self, key: &Key) -> dsx_protocol::Key {
        key_to_proto(key, &self.config.project_id, &self.config.database_id)
    }

    fn scoped(&self, scope: &RequestScope) -> RequestScope {
        match self.config.timeout {
            Some(timeout) => scope.with_timeout(timeout),
            None => scope.clone(),
        }
    }

    /// Reads one entity. Returns `None` if it does not exist.
    pub fn get(&self, scope: &RequestScope, key: &Key) -> CoreResult<Option<Entity>> {
        let mut entities = self.get_multi(scope, std::slice::from_ref(key))?;
        Ok(entities.pop().flatten())
    }

    /// Reads several entities, in the order of `keys`.
    ///
    /// Keys the service defers are requested again until all are answered.
    pub fn get_multi(&self, scope: &RequestScope, keys: &[Key]) -> CoreResult<Vec<Option<Entity>>> {
        if let Some(key) = keys.iter().find(|k| k.is_incomplete()) {
            return Err(CoreError::invalid_key(format!("can't get the incomplete key {}", key)));
        }

        let scope = self.scoped(scope);
        let mut found: HashMap<String, Entity> = HashMap::new();
        let mut pending: Vec<dsx_protocol::Key> = keys.iter().map(|k| self.key_to_proto(k)).collect();

        while !pending.is_empty() {
            let requested = pending.len();
            let request = LookupRequest::new(
                self.config.project_id.clone(),
                self.config.database_id.clone(),
                pending,
            );
            let response = self.rpc.lookup(&scope, request)?;
            debug!(
                found = response.found.len(),
                missing = response.missing.len(),
                deferred = response.deferred.len(),
                "lookup"
            );

            for result in response.found {
                let entity = entity_from_proto(result.entity)?;
                found.insert(entity.key.encode(), entity);
            }
            if response.deferred.len() >= requested {
                return Err(RpcError::Protocol("lookup deferred every key".into()).into());
            }
            pending = response.deferred;
        }

        Ok(keys.iter().map(|k| found.get(&k.encode()).cloned()).collect())
    }

    /// Runs a query in the client's namespace.
    pub fn run_query(&self, scope: &RequestScope, query: Query) -> CoreResult<Vec<Entity>> {
        let partition_id = PartitionId::new(&*self.config.project_id, &*self.config.database_id)
            .with_namespace(self.config.namespace.clone());
        let request = RunQueryRequest {
            project_id: self.config.project_id.clone(),
            database_id: self.config.database_id.clone(),
            partition_id,
            query,
        };
        let response = self.rpc.run_query(&self.scoped(scope), request)?;
        debug!(results = response.batch.entity_results.len(), "query");

        response
            .batch
            .entity_results
            .into_iter()
            .map(|r| entity_from_proto(r.entity))
            .collect()
    }

    /// Creates or replaces an entity. Returns its key, allocated if it was incomplete.
    pub fn put(&self, scope: &RequestScope, entity: Entity) -> CoreResult<Key> {
        let mut keys = self.mutate(scope, vec![Mutation::upsert(entity)])?;
        keys.pop()
            .ok_or_else(|| RpcError::Protocol("commit returned no results".into()).into())
    }

    /// Deletes an entity.
    pub fn delete(&self, scope: &RequestScope, key: Key) -> CoreResult<()> {
        self.mutate(scope, vec![Mutation::delete(key)]).map(|_| ())
    }

    /// Applies mutations in one non-transactional commit.
    ///
    /// Returns the key of each mutation in order, with allocated ids filled in.
    /// A failed base-version precondition yields [`CoreError::Conflict`].
    pub fn mutate(&self, scope: &RequestScope, mutations: Vec<Mutation>) -> CoreResult<Vec<Key>> {
        let protos = mutation_protos(&mutations, &self.config.project_id, &self.config.database_id)?;
        let request = CommitRequest::non_transactional(
            self.config.project_id.clone(),
            self.config.database_id.clone(),
            protos,
        );
        let response = self.rpc.commit(&self.scoped(scope), request)?;
        debug!(mutations = mutations.len(), "commit");

        if response.has_conflicts() {
            return Err(CoreError::Conflict {
                response: Box::new(response),
            });
        }

        mutations
            .iter()
            .zip(&response.mutation_results)
            .map(|(mutation, result)| match &result.key {
                Some(allocated) => proto_to_key(allocated),
                None => Ok(mutation.key().clone()),
            })
            .collect()
    }
}

impl std::fmt::Debug for DatastoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
