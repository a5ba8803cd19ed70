//! Commits that lock previously read entities.
//!
//! An [`ExtensionClient`] shares the RPC handle of a native client. Reads go
//! through the native client with a recorder in scope; the extension client
//! then commits caller mutations together with a lock on each chosen entity,
//! in one single-use read-write transaction:
//!
//! ```text
//! let (scope, _recorder) = with_recorder(&RequestScope::new());
//! let group = client.get(&scope, &group_key)?;
//! let task = client.get(&scope, &task_key)?;
//! extension.mutate_with_locks(&scope, vec![Mutation::update(task)], &[group_key])?;
//! ```
//!
//! If any locked entity changed since it was read the commit applies nothing
//! and fails with [`CoreError::Conflict`].

use crate::adapter::{ExposeRpc, ADAPTER_VERSION};
use crate::error::{CoreError, CoreResult};
use crate::interceptor::{Invoker, InvokerExt};
use crate::key::Key;
use crate::locks::build_locks;
use crate::mutation::{mutation_protos, Mutation};
use crate::scope::RequestScope;
use dsx_protocol::{CommitRequest, CommitResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Issues locked commits over a native client's RPC handle.
#[derive(Clone)]
pub struct ExtensionClient {
    rpc: Arc<dyn Invoker>,
    project_id: String,
    database_id: String,
    timeout: Option<Duration>,
}

impl ExtensionClient {
    /// Derives an extension client from a native client.
    ///
    /// Fails with [`CoreError::AdapterIncompatible`] if the client was built
    /// against another adapter version or does not expose its handles.
    pub fn from_client<C: ExposeRpc + ?Sized>(client: &C) -> CoreResult<Self> {
        let version = client.adapter_version();
        if version != ADAPTER_VERSION {
            return Err(CoreError::adapter_incompatible(format!(
                "adapter version {} does not match {}",
                version, ADAPTER_VERSION
            )));
        }
        let handles = client
            .rpc_handles()
            .ok_or_else(|| CoreError::adapter_incompatible("client exposes no rpc handles"))?;
        if handles.project_id.is_empty() {
            return Err(CoreError::adapter_incompatible("client exposes no project id"));
        }
        Ok(Self {
            rpc: handles.rpc,
            project_id: handles.project_id,
            database_id: handles.database_id,
            timeout: handles.timeout,
        })
    }

    /// Project id sent on commits.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Database id sent on commits.
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Commits `mutations` in one single-use read-write transaction.
    pub fn mutate(&self, scope: &RequestScope, mutations: Vec<Mutation>) -> CoreResult<CommitResponse> {
        self.mutate_with_locks(scope, mutations, &[])
    }

    /// Commits `mutations` together with a lock on each of `locked`.
    ///
    /// Every locked key must have been read with `scope`'s recorder. Locks
    /// are placed before the caller's mutations. Nothing is sent if a lock
    /// cannot be built. The source client's timeout bounds the commit.
    pub fn mutate_with_locks(
        &self,
        scope: &RequestScope,
        mutations: Vec<Mutation>,
        locked: &[Key],
    ) -> CoreResult<CommitResponse> {
        let mut protos = Vec::with_capacity(locked.len() + mutations.len());
        if !locked.is_empty() {
            let recorder = scope.recorder().ok_or(CoreError::MissingRecorder)?;
            protos.extend(build_locks(recorder, locked)?);
        }
        protos.extend(mutation_protos(&mutations, &self.project_id, &self.database_id)?);

        let request = CommitRequest::single_use(self.project_id.clone(), self.database_id.clone(), protos);
        let scope = match self.timeout {
            Some(timeout) => scope.with_timeout(timeout),
            None => scope.clone(),
        };
        let response = self.rpc.commit(&scope, request)?;

        if response.has_conflicts() {
            debug!(
                locks = locked.len(),
                mutations = mutations.len(),
                "locked commit conflicted"
            );
            return Err(CoreError::Conflict {
                response: Box::new(response),
            });
        }
        debug!(
            locks = locked.len(),
            mutations = mutations.len(),
            "locked commit applied"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for ExtensionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionClient")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}
