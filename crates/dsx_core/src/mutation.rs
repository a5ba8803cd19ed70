//! Application-level mutations and the base-version helper.

use crate::entity::{entity_to_proto, Entity};
use crate::error::{CoreError, CoreResult};
use crate::key::{key_to_proto, Key};

/// Kind of write a [`Mutation`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Create; fails if the entity exists.
    Insert,
    /// Replace; fails if the entity does not exist.
    Update,
    /// Create or replace.
    Upsert,
    /// Remove.
    Delete,
}

/// A pending write to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    kind: MutationKind,
    entity: Entity,
    base_version: Option<i64>,
}

impl Mutation {
    /// Creates an insert. The key may be incomplete.
    pub fn insert(entity: Entity) -> Self {
        Self::new(MutationKind::Insert, entity)
    }

    /// Creates an update.
    pub fn update(entity: Entity) -> Self {
        Self::new(MutationKind::Update, entity)
    }

    /// Creates an upsert. The key may be incomplete.
    pub fn upsert(entity: Entity) -> Self {
        Self::new(MutationKind::Upsert, entity)
    }

    /// Creates a delete.
    pub fn delete(key: Key) -> Self {
        Self::new(MutationKind::Delete, Entity::new(key))
    }

    fn new(kind: MutationKind, entity: Entity) -> Self {
        Self {
            kind,
            entity,
            base_version: None,
        }
    }

    /// Requires the entity to be at `base_version` when the mutation commits.
    pub fn with_base_version(mut self, base_version: i64) -> Self {
        self.base_version = Some(base_version);
        self
    }

    /// Kind of write.
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Target key.
    pub fn key(&self) -> &Key {
        &self.entity.key
    }

    /// Base-version precondition, if any.
    pub fn base_version(&self) -> Option<i64> {
        self.base_version
    }

    /// Converts to the wire mutation.
    pub fn to_proto(&self, project_id: &str, database_id: &str) -> CoreResult<dsx_protocol::Mutation> {
        use dsx_protocol::Mutation as Proto;

        let key = &self.entity.key;
        if key.is_incomplete() && matches!(self.kind, MutationKind::Update | MutationKind::Delete) {
            return Err(CoreError::invalid_key(format!(
                "can't {} the incomplete key {}",
                if self.kind == MutationKind::Update { "update" } else { "delete" },
                key
            )));
        }

        let mutation = match self.kind {
            MutationKind::Insert => Proto::insert(entity_to_proto(&self.entity, project_id, database_id)),
            MutationKind::Update => Proto::update(entity_to_proto(&self.entity, project_id, database_id)),
            MutationKind::Upsert => Proto::upsert(entity_to_proto(&self.entity, project_id, database_id)),
            MutationKind::Delete => Proto::delete(key_to_proto(key, project_id, database_id)),
        };
        Ok(match self.base_version {
            Some(version) => mutation.with_base_version(version),
            None => mutation,
        })
    }
}

/// Stamps an explicit base-version precondition onto `mutation`.
///
/// For callers that already know the expected version (for example from a
/// previous response) and do not use a recorder.
pub fn set_base_version(mutation: &mut Mutation, base_version: i64) {
    mutation.base_version = Some(base_version);
}

/// Converts a batch of mutations to wire form, failing on the first invalid one.
pub fn mutation_protos(
    mutations: &[Mutation],
    project_id: &str,
    database_id: &str,
) -> CoreResult<Vec<dsx_protocol::Mutation>> {
    mutations
        .iter()
        .map(|m| m.to_proto(project_id, database_id))
        .collect()
}
