//! Write-path mutations.

use crate::entity::Entity;
use crate::key::Key;
use serde::{Deserialize, Serialize};

/// The write a mutation performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create the entity; fails if it exists.
    Insert(Entity),
    /// Replace the entity; fails if it does not exist.
    Update(Entity),
    /// Create or replace the entity.
    Upsert(Entity),
    /// Remove the entity; succeeds if it does not exist.
    Delete(Key),
}

impl Operation {
    /// Returns the key targeted by this operation.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Operation::Insert(e) | Operation::Update(e) | Operation::Upsert(e) => e.key.as_ref(),
            Operation::Delete(k) => Some(k),
        }
    }

    /// Returns a short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert(_) => "insert",
            Operation::Update(_) => "update",
            Operation::Upsert(_) => "upsert",
            Operation::Delete(_) => "delete",
        }
    }
}

/// A single write, optionally guarded by a base-version precondition.
///
/// When `base_version` is set the store only applies the mutation if the
/// entity is currently at that version (0 means "does not exist"); otherwise
/// the mutation result reports a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Operation to perform.
    pub operation: Operation,
    /// Expected current version of the entity.
    pub base_version: Option<i64>,
}

impl Mutation {
    /// Creates an insert mutation.
    pub fn insert(entity: Entity) -> Self {
        Self::from_operation(Operation::Insert(entity))
    }

    /// Creates an update mutation.
    pub fn update(entity: Entity) -> Self {
        Self::from_operation(Operation::Update(entity))
    }

    /// Creates an upsert mutation.
    pub fn upsert(entity: Entity) -> Self {
        Self::from_operation(Operation::Upsert(entity))
    }

    /// Creates a delete mutation.
    pub fn delete(key: Key) -> Self {
        Self::from_operation(Operation::Delete(key))
    }

    fn from_operation(operation: Operation) -> Self {
        Self {
            operation,
            base_version: None,
        }
    }

    /// Sets the base-version precondition.
    pub fn with_base_version(mut self, base_version: i64) -> Self {
        self.base_version = Some(base_version);
        self
    }

    /// Returns the key targeted by this mutation.
    pub fn key(&self) -> Option<&Key> {
        self.operation.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_target_key() {
        let key = Key::id("p", "(default)", "Task", 4);
        let update = Mutation::update(Entity::new(key.clone())).with_base_version(17);
        assert_eq!(update.key(), Some(&key));
        assert_eq!(update.base_version, Some(17));
        assert_eq!(update.operation.name(), "update");

        let delete = Mutation::delete(key.clone());
        assert_eq!(delete.key(), Some(&key));
        assert_eq!(delete.base_version, None);
    }

    #[test]
    fn keyless_entity_has_no_target() {
        let mutation = Mutation::upsert(Entity::default());
        assert!(mutation.key().is_none());
    }
}
