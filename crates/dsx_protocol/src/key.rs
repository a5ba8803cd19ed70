//! Wire representation of entity keys.

use serde::{Deserialize, Serialize};

/// Database id used when none is configured.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Identifies the partition (project, database, namespace) a key lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PartitionId {
    /// Project id.
    pub project_id: String,
    /// Database id within the project.
    pub database_id: String,
    /// Namespace id; empty for the default namespace.
    pub namespace_id: String,
}

impl PartitionId {
    /// Creates a partition in the default namespace.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
            namespace_id: String::new(),
        }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = namespace_id.into();
        self
    }
}

/// The identifying part of a path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdType {
    /// Numeric id assigned by the store or the caller.
    Id(i64),
    /// Caller-chosen string name.
    Name(String),
    /// Not yet assigned; the store allocates an id on insert.
    Incomplete,
}

/// One `(kind, id)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    /// Entity kind.
    pub kind: String,
    /// Id or name.
    pub id_type: IdType,
}

impl PathElement {
    /// Creates a path element.
    pub fn new(kind: impl Into<String>, id_type: IdType) -> Self {
        Self {
            kind: kind.into(),
            id_type,
        }
    }

    /// Returns true if the element carries an id or a name.
    pub fn is_complete(&self) -> bool {
        !matches!(self.id_type, IdType::Incomplete)
    }
}

/// A key on the wire: partition plus ancestor path, root first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    /// Partition the entity lives in.
    pub partition_id: PartitionId,
    /// Path from the root ancestor to the entity itself.
    pub path: Vec<PathElement>,
}

impl Key {
    /// Creates a key from a partition and a path.
    pub fn new(partition_id: PartitionId, path: Vec<PathElement>) -> Self {
        Self { partition_id, path }
    }

    /// Creates a single-element key with a numeric id.
    pub fn id(
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        kind: impl Into<String>,
        id: i64,
    ) -> Self {
        Self::new(
            PartitionId::new(project_id, database_id),
            vec![PathElement::new(kind, IdType::Id(id))],
        )
    }

    /// Returns a key for a child of this key.
    pub fn child(&self, kind: impl Into<String>, id_type: IdType) -> Self {
        let mut path = self.path.clone();
        path.push(PathElement::new(kind, id_type));
        Self::new(self.partition_id.clone(), path)
    }

    /// Returns the last path element, if any.
    pub fn last(&self) -> Option<&PathElement> {
        self.path.last()
    }

    /// Returns the kind of the entity this key points to.
    pub fn kind(&self) -> Option<&str> {
        self.last().map(|e| e.kind.as_str())
    }

    /// Returns true if every path element carries an id or a name.
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && self.path.iter().all(PathElement::is_complete)
    }

    /// Returns true if `ancestor` is this key or one of its ancestors.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.partition_id == ancestor.partition_id
            && ancestor.path.len() <= self.path.len()
            && self.path[..ancestor.path.len()] == ancestor.path[..]
    }
}
