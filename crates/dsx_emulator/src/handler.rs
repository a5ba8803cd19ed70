//! Request handlers for the datastore methods.

use crate::config::EmulatorConfig;
use crate::error::{EmulatorError, EmulatorResult};
use crate::store::{EntityStore, StoreKey};
use dsx_protocol::{
    CommitMode, CommitRequest, CommitResponse, EntityResult, LookupRequest, LookupResponse,
    MoreResults, QueryResultBatch, RunQueryRequest, RunQueryResponse, TransactionOptions,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Emulator configuration.
    pub config: EmulatorConfig,
    /// Entity store (shared across all handlers).
    pub store: Arc<RwLock<EntityStore>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: EmulatorConfig, store: Arc<RwLock<EntityStore>>) -> Self {
        Self { config, store }
    }

    fn check_project(&self, project_id: &str) -> EmulatorResult<()> {
        if project_id.is_empty() {
            return Err(EmulatorError::InvalidArgument("project id is empty".into()));
        }
        match &self.config.project_id {
            Some(expected) if expected != project_id => {
                Err(EmulatorError::UnknownProject(project_id.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Handler for datastore requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a lookup request.
    ///
    /// Keys beyond `max_lookup_keys` are returned as deferred.
    pub fn handle_lookup(&self, request: LookupRequest) -> EmulatorResult<LookupResponse> {
        self.context.check_project(&request.project_id)?;

        let mut keys = request.keys;
        let deferred = keys.split_off(keys.len().min(self.context.config.max_lookup_keys));
        let store_keys = keys
            .iter()
            .map(StoreKey::from_key)
            .collect::<EmulatorResult<Vec<_>>>()?;

        let store = self.context.store.read();
        let read_version = store.version();
        let mut response = LookupResponse {
            deferred,
            read_time: Some(read_version),
            ..LookupResponse::default()
        };
        for (key, store_key) in keys.into_iter().zip(&store_keys) {
            match store.get(store_key) {
                Some(stored) => response.found.push(stored.to_result()),
                None => response.missing.push(EntityResult::missing(key, read_version)),
            }
        }

        debug!(
            found = response.found.len(),
            missing = response.missing.len(),
            deferred = response.deferred.len(),
            "lookup"
        );
        Ok(response)
    }

    /// Handles a query request.
    pub fn handle_run_query(&self, request: RunQueryRequest) -> EmulatorResult<RunQueryResponse> {
        self.context.check_project(&request.project_id)?;

        let partition = &request.partition_id;
        if partition.database_id != request.database_id {
            return Err(EmulatorError::InvalidArgument(format!(
                "partition database {} does not match request database {}",
                partition.database_id, request.database_id
            )));
        }
        let query = request.query;
        let ancestor = match &query.ancestor {
            Some(ancestor) => {
                if ancestor.partition_id.database_id != partition.database_id
                    || ancestor.partition_id.namespace_id != partition.namespace_id
                {
                    return Err(EmulatorError::InvalidArgument(
                        "ancestor is outside the queried partition".into(),
                    ));
                }
                Some(StoreKey::from_key(ancestor)?)
            }
            None => None,
        };
        let limit = query.limit.unwrap_or(self.context.config.default_query_limit) as usize;

        let store = self.context.store.read();
        let mut matches = store.scan(
            &partition.database_id,
            &partition.namespace_id,
            query.kind.as_deref(),
            ancestor.as_ref(),
        );
        let entity_results: Vec<EntityResult> =
            matches.by_ref().take(limit).map(|e| e.to_result()).collect();
        let more_results = if matches.next().is_some() {
            MoreResults::MoreResultsAfterLimit
        } else {
            MoreResults::NoMoreResults
        };

        debug!(kind = ?query.kind, results = entity_results.len(), "query");
        Ok(RunQueryResponse {
            batch: QueryResultBatch {
                entity_results,
                more_results,
                snapshot_version: store.version(),
            },
        })
    }

    /// Handles a commit request.
    pub fn handle_commit(&self, request: CommitRequest) -> EmulatorResult<CommitResponse> {
        self.context.check_project(&request.project_id)?;

        let max = self.context.config.max_mutations_per_commit;
        if request.mutations.len() > max {
            return Err(EmulatorError::InvalidArgument(format!(
                "too many mutations: {} > {}",
                request.mutations.len(),
                max
            )));
        }
        for mutation in &request.mutations {
            if let Some(key) = mutation.key() {
                if key.partition_id.database_id != request.database_id {
                    return Err(EmulatorError::InvalidArgument(format!(
                        "mutation key database {} does not match request database {}",
                        key.partition_id.database_id, request.database_id
                    )));
                }
            }
        }

        let transactional = match (request.mode, request.single_use_transaction) {
            (CommitMode::Transactional, Some(TransactionOptions::ReadWrite)) => true,
            (CommitMode::Transactional, Some(TransactionOptions::ReadOnly)) => {
                if !request.mutations.is_empty() {
                    return Err(EmulatorError::InvalidArgument(
                        "read-only transaction cannot commit mutations".into(),
                    ));
                }
                true
            }
            (CommitMode::Transactional, None) => {
                return Err(EmulatorError::InvalidArgument(
                    "transactional commit requires a transaction".into(),
                ));
            }
            (CommitMode::NonTransactional, Some(_)) => {
                return Err(EmulatorError::InvalidArgument(
                    "non-transactional commit cannot carry a transaction".into(),
                ));
            }
            (CommitMode::NonTransactional, None) => false,
        };

        let count = request.mutations.len();
        let response = self
            .context
            .store
            .write()
            .commit(request.mutations, transactional)?;

        debug!(
            mutations = count,
            transactional,
            conflicts = response.mutation_results.iter().filter(|r| r.conflict_detected).count(),
            "commit"
        );
        Ok(response)
    }
}
