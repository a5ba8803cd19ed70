//! In-memory versioned entity store.
//!
//! The store keeps:
//! - The latest state of every entity, ordered by key path
//! - A store-wide version, bumped once per applied commit
//! - The id allocator for incomplete keys

use crate::error::{EmulatorError, EmulatorResult};
use dsx_protocol::{
    CommitResponse, Entity, EntityResult, IdType, Key, Mutation, MutationResult, Operation,
    PathElement,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage key: a complete key without its project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    database_id: String,
    namespace_id: String,
    path: Vec<PathElement>,
}

impl StoreKey {
    /// Builds the storage key of a complete wire key.
    pub fn from_key(key: &Key) -> EmulatorResult<Self> {
        if !key.is_complete() {
            return Err(EmulatorError::InvalidArgument(format!(
                "key {} is incomplete",
                describe(key)
            )));
        }
        Ok(Self::partition(&key.partition_id.database_id, &key.partition_id.namespace_id)
            .with_path(key.path.clone()))
    }

    fn partition(database_id: &str, namespace_id: &str) -> Self {
        Self {
            database_id: database_id.to_string(),
            namespace_id: namespace_id.to_string(),
            path: Vec::new(),
        }
    }

    fn with_path(mut self, path: Vec<PathElement>) -> Self {
        self.path = path;
        self
    }

    fn same_partition(&self, other: &StoreKey) -> bool {
        self.database_id == other.database_id && self.namespace_id == other.namespace_id
    }

    /// Returns true if `ancestor` is this key or one of its ancestors.
    pub fn has_ancestor(&self, ancestor: &StoreKey) -> bool {
        self.same_partition(ancestor) && self.path.starts_with(&ancestor.path)
    }

    /// Kind of the entity.
    pub fn kind(&self) -> &str {
        self.path.last().map(|e| e.kind.as_str()).unwrap_or_default()
    }
}

/// Formats a key path as `/Kind,id/Kind,name` for diagnostics.
pub fn describe(key: &Key) -> String {
    let mut out = String::new();
    for element in &key.path {
        let _ = match &element.id_type {
            IdType::Id(id) => write!(out, "/{},{}", element.kind, id),
            IdType::Name(name) => write!(out, "/{},{}", element.kind, name),
            IdType::Incomplete => write!(out, "/{},0", element.kind),
        };
    }
    out
}

/// An entity with its version metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    /// Entity content, key included.
    pub entity: Entity,
    /// Version of the last commit that wrote the entity.
    pub version: i64,
    /// Creation time in microseconds.
    pub create_time: i64,
    /// Last update time in microseconds.
    pub update_time: i64,
}

impl StoredEntity {
    /// Converts to a read result.
    pub fn to_result(&self) -> EntityResult {
        EntityResult::found(
            self.entity.clone(),
            self.version,
            self.create_time,
            self.update_time,
        )
    }
}

/// The entity store.
#[derive(Debug)]
pub struct EntityStore {
    entities: BTreeMap<StoreKey, StoredEntity>,
    version: i64,
    next_id: i64,
    clock: i64,
}

impl EntityStore {
    /// Creates an empty store allocating ids from `first_id`.
    pub fn new(first_id: i64) -> Self {
        Self {
            entities: BTreeMap::new(),
            version: 0,
            next_id: first_id,
            clock: 0,
        }
    }

    /// Current store version.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns a stored entity.
    pub fn get(&self, key: &StoreKey) -> Option<&StoredEntity> {
        self.entities.get(key)
    }

    /// Iterates entities of a partition in key order.
    ///
    /// `kind` filters on the entity's own kind; `ancestor` keeps only the
    /// ancestor itself and its descendants.
    pub fn scan<'a>(
        &'a self,
        database_id: &str,
        namespace_id: &str,
        kind: Option<&'a str>,
        ancestor: Option<&'a StoreKey>,
    ) -> impl Iterator<Item = &'a StoredEntity> + 'a {
        let start = match ancestor {
            Some(ancestor) => ancestor.clone(),
            None => StoreKey::partition(database_id, namespace_id),
        };
        let partition = StoreKey::partition(database_id, namespace_id);
        self.entities
            .range(start..)
            .take_while(move |(key, _)| match ancestor {
                Some(ancestor) => key.has_ancestor(ancestor),
                None => key.same_partition(&partition),
            })
            .filter(move |(key, _)| kind.map_or(true, |kind| key.kind() == kind))
            .map(|(_, stored)| stored)
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn tick(&mut self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        self.clock = now.max(self.clock + 1);
        self.clock
    }

    /// Completes a mutation's key, allocating an id for an incomplete
    /// insert or upsert. Returns the key and whether it was allocated.
    fn resolve_key(&mut self, mutation: &Mutation) -> EmulatorResult<(Key, bool)> {
        let name = mutation.operation.name();
        let mut key = mutation
            .key()
            .cloned()
            .ok_or_else(|| EmulatorError::InvalidArgument(format!("{} without a key", name)))?;

        let Some((last, ancestors)) = key.path.split_last() else {
            return Err(EmulatorError::InvalidArgument(format!("{} with an empty key", name)));
        };
        if !ancestors.iter().all(PathElement::is_complete) {
            return Err(EmulatorError::InvalidArgument(format!(
                "key {} has an incomplete ancestor",
                describe(&key)
            )));
        }
        if last.is_complete() {
            return Ok((key, false));
        }
        if !matches!(mutation.operation, Operation::Insert(_) | Operation::Upsert(_)) {
            return Err(EmulatorError::InvalidArgument(format!(
                "can't {} the incomplete key {}",
                name,
                describe(&key)
            )));
        }

        let id = self.allocate_id();
        if let Some(last) = key.path.last_mut() {
            last.id_type = IdType::Id(id);
        }
        Ok((key, true))
    }

    /// Applies a commit.
    ///
    /// A mutation whose base version differs from the entity's current
    /// version (0 if missing) is not applied and reports a conflict. In
    /// transactional mode any conflict leaves the store untouched. Insert of
    /// an existing entity or update of a missing one fails the whole commit.
    pub fn commit(
        &mut self,
        mutations: Vec<Mutation>,
        transactional: bool,
    ) -> EmulatorResult<CommitResponse> {
        let version = self.version + 1;
        let commit_time = self.tick();

        let mut staged: BTreeMap<StoreKey, Option<StoredEntity>> = BTreeMap::new();
        let mut results = Vec::with_capacity(mutations.len());
        let mut before = Vec::with_capacity(mutations.len());
        let mut conflicts = 0;

        for mutation in mutations {
            let (key, allocated) = self.resolve_key(&mutation)?;
            let store_key = StoreKey::from_key(&key)?;
            let current = match staged.get(&store_key) {
                Some(staged) => staged.clone(),
                None => self.entities.get(&store_key).cloned(),
            };
            let current_version = current.as_ref().map_or(0, |e| e.version);
            let result_key = allocated.then(|| key.clone());

            if mutation.base_version.is_some_and(|base| base != current_version) {
                conflicts += 1;
                results.push(unchanged_result(result_key, current.as_ref(), true));
                before.push(current);
                continue;
            }

            let (result, next) = match mutation.operation {
                Operation::Insert(_) if current.is_some() => {
                    return Err(EmulatorError::AlreadyExists(describe(&key)));
                }
                Operation::Update(_) if current.is_none() => {
                    return Err(EmulatorError::NotFound(describe(&key)));
                }
                Operation::Insert(entity) | Operation::Update(entity) | Operation::Upsert(entity) => {
                    let stored = StoredEntity {
                        entity: Entity {
                            key: Some(key),
                            properties: entity.properties,
                        },
                        version,
                        create_time: current.as_ref().map_or(commit_time, |e| e.create_time),
                        update_time: commit_time,
                    };
                    let result = MutationResult {
                        key: result_key,
                        version,
                        create_time: Some(stored.create_time),
                        update_time: Some(commit_time),
                        conflict_detected: false,
                    };
                    (result, Some(stored))
                }
                Operation::Delete(_) => {
                    let result = MutationResult {
                        key: None,
                        version,
                        create_time: None,
                        update_time: Some(commit_time),
                        conflict_detected: false,
                    };
                    (result, None)
                }
            };
            staged.insert(store_key, next);
            results.push(result);
            before.push(current);
        }

        if transactional && conflicts > 0 {
            for (result, current) in results.iter_mut().zip(&before) {
                if !result.conflict_detected {
                    *result = unchanged_result(result.key.take(), current.as_ref(), false);
                }
            }
            return Ok(CommitResponse {
                mutation_results: results,
                index_updates: 0,
                commit_time: None,
            });
        }

        let index_updates = staged.len() as u32;
        if !staged.is_empty() {
            self.version = version;
            for (key, next) in staged {
                match next {
                    Some(stored) => {
                        self.entities.insert(key, stored);
                    }
                    None => {
                        self.entities.remove(&key);
                    }
                }
            }
        }

        Ok(CommitResponse {
            mutation_results: results,
            index_updates,
            commit_time: Some(commit_time),
        })
    }
}

/// Result of a mutation that left the entity as it was.
fn unchanged_result(
    key: Option<Key>,
    current: Option<&StoredEntity>,
    conflict_detected: bool,
) -> MutationResult {
    MutationResult {
        key,
        version: current.map_or(0, |e| e.version),
        create_time: current.map(|e| e.create_time),
        update_time: current.map(|e| e.update_time),
        conflict_detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: &str, id: i64) -> Key {
        Key::id("demo", "(default)", kind, id)
    }

    fn entity(key: Key, title: &str) -> Entity {
        Entity::new(key).with("title", title)
    }

    fn stored(store: &EntityStore, key: &Key) -> Option<StoredEntity> {
        store.get(&StoreKey::from_key(key).unwrap()).cloned()
    }

    #[test]
    fn versions_advance_per_commit() {
        let mut store = EntityStore::new(1);
        assert_eq!(store.version(), 0);

        let response = store
            .commit(
                vec![
                    Mutation::insert(entity(key("Task", 1), "a")),
                    Mutation::insert(entity(key("Task", 2), "b")),
                ],
                false,
            )
            .unwrap();
        assert_eq!(store.version(), 1);
        assert!(response.mutation_results.iter().all(|r| r.version == 1));
        assert_eq!(response.index_updates, 2);

        store
            .commit(vec![Mutation::upsert(entity(key("Task", 1), "c"))], false)
            .unwrap();
        assert_eq!(stored(&store, &key("Task", 1)).unwrap().version, 2);
        assert_eq!(stored(&store, &key("Task", 2)).unwrap().version, 1);
    }

    #[test]
    fn create_time_survives_updates() {
        let mut store = EntityStore::new(1);
        store
            .commit(vec![Mutation::insert(entity(key("Task", 1), "a"))], false)
            .unwrap();
        let first = stored(&store, &key("Task", 1)).unwrap();

        store
            .commit(vec![Mutation::update(entity(key("Task", 1), "b"))], false)
            .unwrap();
        let second = stored(&store, &key("Task", 1)).unwrap();
        assert_eq!(second.create_time, first.create_time);
        assert!(second.update_time > first.update_time);
    }

    #[test]
    fn incomplete_keys_are_allocated() {
        let mut store = EntityStore::new(100);
        let parent = key("TaskGroup", 1);
        let response = store
            .commit(
                vec![
                    Mutation::insert(Entity::new(parent.child("Task", IdType::Incomplete))),
                    Mutation::upsert(Entity::new(parent.child("Task", IdType::Incomplete))),
                ],
                false,
            )
            .unwrap();

        let ids: Vec<IdType> = response
            .mutation_results
            .iter()
            .map(|r| r.key.as_ref().unwrap().path[1].id_type.clone())
            .collect();
        assert_eq!(ids, vec![IdType::Id(100), IdType::Id(101)]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn incomplete_update_is_rejected() {
        let mut store = EntityStore::new(1);
        let err = store
            .commit(
                vec![Mutation::update(Entity::new(key("TaskGroup", 1).child("Task", IdType::Incomplete)))],
                false,
            )
            .unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidArgument(_)));
    }

    #[test]
    fn insert_existing_and_update_missing() {
        let mut store = EntityStore::new(1);
        store
            .commit(vec![Mutation::insert(entity(key("Task", 1), "a"))], false)
            .unwrap();

        let err = store
            .commit(vec![Mutation::insert(entity(key("Task", 1), "b"))], false)
            .unwrap_err();
        assert!(matches!(err, EmulatorError::AlreadyExists(_)));

        let err = store
            .commit(vec![Mutation::update(entity(key("Task", 2), "b"))], false)
            .unwrap_err();
        assert_eq!(err, EmulatorError::NotFound("/Task,2".into()));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn base_version_of_missing_entity_is_zero() {
        let mut store = EntityStore::new(1);
        let response = store
            .commit(
                vec![Mutation::insert(entity(key("Task", 1), "a")).with_base_version(0)],
                true,
            )
            .unwrap();
        assert!(!response.has_conflicts());

        let response = store
            .commit(
                vec![Mutation::upsert(entity(key("Task", 1), "b")).with_base_version(0)],
                true,
            )
            .unwrap();
        assert!(response.mutation_results[0].conflict_detected);
        assert_eq!(response.mutation_results[0].version, 1);
    }

    #[test]
    fn transactional_conflict_applies_nothing() {
        let mut store = EntityStore::new(1);
        store
            .commit(
                vec![
                    Mutation::insert(entity(key("TaskGroup", 1), "g")),
                    Mutation::insert(entity(key("Task", 1), "t")),
                ],
                false,
            )
            .unwrap();

        let response = store
            .commit(
                vec![
                    Mutation::update(entity(key("TaskGroup", 1), "g")).with_base_version(7),
                    Mutation::update(entity(key("Task", 1), "changed")),
                ],
                true,
            )
            .unwrap();

        assert!(response.mutation_results[0].conflict_detected);
        assert!(!response.mutation_results[1].conflict_detected);
        assert_eq!(response.mutation_results[1].version, 1);
        assert!(response.commit_time.is_none());
        assert_eq!(store.version(), 1);
        let task = stored(&store, &key("Task", 1)).unwrap();
        assert_eq!(task.entity.get("title").and_then(|v| v.as_text()), Some("t"));
    }

    #[test]
    fn non_transactional_conflict_applies_the_rest() {
        let mut store = EntityStore::new(1);
        store
            .commit(vec![Mutation::insert(entity(key("Task", 1), "t"))], false)
            .unwrap();

        let response = store
            .commit(
                vec![
                    Mutation::update(entity(key("Task", 1), "stale")).with_base_version(9),
                    Mutation::insert(entity(key("Task", 2), "new")),
                ],
                false,
            )
            .unwrap();
        assert!(response.mutation_results[0].conflict_detected);
        assert_eq!(store.version(), 2);
        assert!(stored(&store, &key("Task", 2)).is_some());
        let task = stored(&store, &key("Task", 1)).unwrap();
        assert_eq!(task.entity.get("title").and_then(|v| v.as_text()), Some("t"));
    }

    #[test]
    fn delete_removes_entity() {
        let mut store = EntityStore::new(1);
        store
            .commit(vec![Mutation::insert(entity(key("Task", 1), "t"))], false)
            .unwrap();
        store.commit(vec![Mutation::delete(key("Task", 1))], false).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn scan_by_kind_and_ancestor() {
        let mut store = EntityStore::new(1);
        let group = key("TaskGroup", 1);
        let other = key("TaskGroup", 2);
        store
            .commit(
                vec![
                    Mutation::insert(entity(group.clone(), "g1")),
                    Mutation::insert(entity(other.clone(), "g2")),
                    Mutation::insert(entity(group.child("Task", IdType::Id(2)), "a")),
                    Mutation::insert(entity(group.child("Task", IdType::Name("x".into())), "b")),
                    Mutation::insert(entity(other.child("Task", IdType::Id(1)), "c")),
                ],
                false,
            )
            .unwrap();

        let titles = |kind: Option<&str>, ancestor: Option<&Key>| -> Vec<String> {
            let ancestor = ancestor.map(|k| StoreKey::from_key(k).unwrap());
            store
                .scan("(default)", "", kind, ancestor.as_ref())
                .filter_map(|e| e.entity.get("title").and_then(|v| v.as_text()).map(String::from))
                .collect()
        };

        assert_eq!(titles(Some("Task"), None), vec!["a", "b", "c"]);
        assert_eq!(titles(Some("Task"), Some(&group)), vec!["a", "b"]);
        assert_eq!(titles(None, Some(&group)), vec!["g1", "a", "b"]);
        assert!(store.scan("other-db", "", None, None).next().is_none());
    }
}
