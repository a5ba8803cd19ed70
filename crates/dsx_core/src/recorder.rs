//! Per-request record of entities observed by reads.

use crate::key::{proto_to_key, Key};
use dsx_protocol::{Entity, EntityResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

/// An entity as observed by a read: content plus version metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedObservation {
    /// Decoded key of the entity.
    pub key: Key,
    /// Entity content exactly as returned by the read.
    pub entity: Entity,
    /// Version of the entity at read time.
    pub version: i64,
    /// Creation time in microseconds.
    pub create_time: Option<i64>,
    /// Last update time in microseconds.
    pub update_time: Option<i64>,
}

#[derive(Debug, Default)]
struct RecorderState {
    /// Every observation in read order, duplicates included.
    results: Vec<RecordedObservation>,
    /// Encoded key -> index of the latest observation in `results`.
    indexed: HashMap<String, usize>,
}

/// Records the entities returned by reads made within one unit of work.
///
/// Create one per logical request with [`crate::with_recorder`]. The latest
/// read of a key wins; earlier observations stay in [`Recorder::results`].
#[derive(Debug, Default)]
pub struct Recorder {
    state: Mutex<RecorderState>,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records entity results from a read response.
    ///
    /// Results whose key cannot be decoded are dropped with a warning; this
    /// never fails.
    pub fn record(&self, results: &[EntityResult]) {
        if results.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        for result in results {
            let key = match result.entity.key.as_ref().map(proto_to_key) {
                Some(Ok(key)) => key,
                Some(Err(e)) => {
                    warn!(error = %e, "error converting key, dropping observation");
                    continue;
                }
                None => {
                    warn!("entity result without key, dropping observation");
                    continue;
                }
            };

            let index = state.results.len();
            state.indexed.insert(key.encode(), index);
            state.results.push(RecordedObservation {
                key,
                entity: result.entity.clone(),
                version: result.version,
                create_time: result.create_time,
                update_time: result.update_time,
            });
        }
    }

    /// Returns the most recent observation of `key`.
    pub fn get(&self, key: &Key) -> Option<RecordedObservation> {
        let state = self.state.lock();
        state
            .indexed
            .get(&key.encode())
            .and_then(|&i| state.results.get(i))
            .cloned()
    }

    /// Returns true if `key` has been observed.
    pub fn contains(&self, key: &Key) -> bool {
        self.state.lock().indexed.contains_key(&key.encode())
    }

    /// Returns every observation in read order.
    pub fn results(&self) -> Vec<RecordedObservation> {
        self.state.lock().results.clone()
    }

    /// Returns the distinct observed keys.
    pub fn keys(&self) -> Vec<Key> {
        let state = self.state.lock();
        let mut indices: Vec<usize> = state.indexed.values().copied().collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|i| state.results.get(i).map(|o| o.key.clone()))
            .collect()
    }

    /// Number of observations, duplicates included.
    pub fn len(&self) -> usize {
        self.state.lock().results.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_to_proto;

    fn result(key: &Key, name: &str, version: i64) -> EntityResult {
        let entity = Entity::new(key_to_proto(key, "demo", "(default)")).with("name", name);
        EntityResult::found(entity, version, 10, 10 + version)
    }

    #[test]
    fn unread_key_is_not_found() {
        let recorder = Recorder::new();
        assert!(recorder.is_empty());
        assert!(recorder.get(&Key::id_key("Task", 1, None)).is_none());
    }

    #[test]
    fn last_read_wins() {
        let key = Key::id_key("Task", 1, None);
        let recorder = Recorder::new();
        recorder.record(&[result(&key, "first", 3)]);
        recorder.record(&[result(&key, "second", 5)]);

        let observed = recorder.get(&key).unwrap();
        assert_eq!(observed.version, 5);
        assert_eq!(observed.entity.get("name").and_then(|v| v.as_text()), Some("second"));
        assert_eq!(observed.update_time, Some(15));

        // Both reads stay in the ordered log.
        let versions: Vec<i64> = recorder.results().iter().map(|o| o.version).collect();
        assert_eq!(versions, vec![3, 5]);
        assert_eq!(recorder.keys(), vec![key]);
    }

    #[test]
    fn keys_are_distinguished() {
        let a = Key::id_key("Task", 1, None);
        let b = Key::id_key("Task", 2, None);
        let c = Key::id_key("Task", 1, Some(Key::id_key("TaskGroup", 1, None)));
        let recorder = Recorder::new();
        recorder.record(&[result(&a, "a", 1), result(&b, "b", 2), result(&c, "c", 3)]);

        assert_eq!(recorder.get(&a).unwrap().version, 1);
        assert_eq!(recorder.get(&b).unwrap().version, 2);
        assert_eq!(recorder.get(&c).unwrap().version, 3);
        assert_eq!(recorder.len(), 3);
    }

    #[test]
    fn undecodable_key_is_dropped() {
        let good = Key::id_key("Task", 1, None);
        let mut keyless = result(&good, "keyless", 9);
        keyless.entity.key = None;
        let mut empty_path = result(&good, "empty", 9);
        if let Some(key) = empty_path.entity.key.as_mut() {
            key.path.clear();
        }

        let recorder = Recorder::new();
        recorder.record(&[keyless, result(&good, "good", 2), empty_path]);

        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.get(&good).unwrap().version, 2);
    }
}
