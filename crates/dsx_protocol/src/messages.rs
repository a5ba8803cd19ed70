//! Protocol messages.

use crate::codec::WireMessage;
use crate::entity::EntityResult;
use crate::key::{Key, PartitionId};
use crate::mutation::Mutation;
use serde::{Deserialize, Serialize};

/// RPC methods of the datastore service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Multi-key read.
    Lookup,
    /// Query read.
    RunQuery,
    /// Write.
    Commit,
}

impl Method {
    /// Returns the HTTP path the method is served on.
    pub fn path(&self) -> &'static str {
        match self {
            Method::Lookup => "/v1/lookup",
            Method::RunQuery => "/v1/runQuery",
            Method::Commit => "/v1/commit",
        }
    }

    /// Resolves a method from its HTTP path.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/v1/lookup" => Some(Method::Lookup),
            "/v1/runQuery" => Some(Method::RunQuery),
            "/v1/commit" => Some(Method::Commit),
            _ => None,
        }
    }

    /// Returns true for methods whose responses carry entities.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Lookup | Method::RunQuery)
    }
}

/// Reads entities by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Project id.
    pub project_id: String,
    /// Database id.
    pub database_id: String,
    /// Keys to read.
    pub keys: Vec<Key>,
}

impl LookupRequest {
    /// Creates a new lookup request.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>, keys: Vec<Key>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
            keys,
        }
    }
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Entities that exist.
    pub found: Vec<EntityResult>,
    /// Keys that do not exist (entity carries only the key).
    pub missing: Vec<EntityResult>,
    /// Keys the service did not process; the caller should ask again.
    pub deferred: Vec<Key>,
    /// Store version the read was served at.
    pub read_time: Option<i64>,
}

/// A kind query, optionally scoped to an ancestor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// Entity kind to return.
    pub kind: Option<String>,
    /// Only return descendants of this key (inclusive).
    pub ancestor: Option<Key>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

impl Query {
    /// Creates a query over a kind.
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Restricts the query to descendants of `ancestor`.
    pub fn with_ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Runs a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQueryRequest {
    /// Project id.
    pub project_id: String,
    /// Database id.
    pub database_id: String,
    /// Partition to query.
    pub partition_id: PartitionId,
    /// The query.
    pub query: Query,
}

/// Whether more results exist after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoreResults {
    /// The limit was reached; more results may exist.
    MoreResultsAfterLimit,
    /// The query is exhausted.
    NoMoreResults,
}

/// One batch of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultBatch {
    /// Matching entities.
    pub entity_results: Vec<EntityResult>,
    /// Whether more results exist.
    pub more_results: MoreResults,
    /// Store version the batch was served at.
    pub snapshot_version: i64,
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQueryResponse {
    /// The result batch.
    pub batch: QueryResultBatch,
}

/// Commit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitMode {
    /// All mutations apply atomically or none do.
    Transactional,
    /// Mutations apply independently.
    NonTransactional,
}

/// Options for a single-use transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOptions {
    /// Read-write transaction; the only mode that accepts mutations.
    ReadWrite,
    /// Read-only transaction.
    ReadOnly,
}

/// Applies a batch of mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Project id.
    pub project_id: String,
    /// Database id.
    pub database_id: String,
    /// Commit mode.
    pub mode: CommitMode,
    /// Implicit transaction scoped to exactly this commit.
    pub single_use_transaction: Option<TransactionOptions>,
    /// Mutations in application order.
    pub mutations: Vec<Mutation>,
}

impl CommitRequest {
    /// Creates a non-transactional commit.
    pub fn non_transactional(
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        mutations: Vec<Mutation>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
            mode: CommitMode::NonTransactional,
            single_use_transaction: None,
            mutations,
        }
    }

    /// Creates a transactional commit in a single-use read-write transaction.
    pub fn single_use(
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        mutations: Vec<Mutation>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
            mode: CommitMode::Transactional,
            single_use_transaction: Some(TransactionOptions::ReadWrite),
            mutations,
        }
    }
}

/// Outcome of one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Allocated key, set only when the mutation's key was incomplete.
    pub key: Option<Key>,
    /// Version of the entity after the commit (current version on conflict).
    pub version: i64,
    /// Creation time in microseconds, if the entity exists.
    pub create_time: Option<i64>,
    /// Update time in microseconds, if the entity exists.
    pub update_time: Option<i64>,
    /// True if the base-version precondition failed.
    pub conflict_detected: bool,
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommitResponse {
    /// One result per mutation, in request order.
    pub mutation_results: Vec<MutationResult>,
    /// Number of index entries written.
    pub index_updates: u32,
    /// Commit time in microseconds.
    pub commit_time: Option<i64>,
}

impl CommitResponse {
    /// Returns true if any mutation reported a conflict.
    pub fn has_conflicts(&self) -> bool {
        self.mutation_results.iter().any(|r| r.conflict_detected)
    }
}

impl WireMessage for LookupRequest {}
impl WireMessage for LookupResponse {}
impl WireMessage for RunQueryRequest {}
impl WireMessage for RunQueryResponse {}
impl WireMessage for CommitRequest {}
impl WireMessage for CommitResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::key::DEFAULT_DATABASE_ID;

    fn result(conflict: bool) -> MutationResult {
        MutationResult {
            key: None,
            version: 3,
            create_time: Some(1),
            update_time: Some(2),
            conflict_detected: conflict,
        }
    }

    #[test]
    fn method_paths() {
        for method in [Method::Lookup, Method::RunQuery, Method::Commit] {
            assert_eq!(Method::from_path(method.path()), Some(method));
        }
        assert_eq!(Method::from_path("/v1/beginTransaction"), None);
        assert!(Method::Lookup.is_read());
        assert!(!Method::Commit.is_read());
    }

    #[test]
    fn single_use_commit_shape() {
        let key = Key::id("p", DEFAULT_DATABASE_ID, "Task", 1);
        let req = CommitRequest::single_use(
            "p",
            DEFAULT_DATABASE_ID,
            vec![Mutation::update(Entity::new(key)).with_base_version(5)],
        );
        assert_eq!(req.mode, CommitMode::Transactional);
        assert_eq!(req.single_use_transaction, Some(TransactionOptions::ReadWrite));

        let decoded = CommitRequest::decode(&req.encode().unwrap()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn conflict_aggregate() {
        let clean = CommitResponse {
            mutation_results: vec![result(false), result(false)],
            ..CommitResponse::default()
        };
        assert!(!clean.has_conflicts());

        let conflicted = CommitResponse {
            mutation_results: vec![result(false), result(true)],
            ..CommitResponse::default()
        };
        assert!(conflicted.has_conflicts());
    }
}
