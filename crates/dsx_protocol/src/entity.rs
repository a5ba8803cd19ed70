//! Entities and property values.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double precision float.
    Double(f64),
    /// Timestamp in microseconds since the Unix epoch.
    Timestamp(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Reference to another entity.
    Key(Key),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Embedded entity.
    Entity(Entity),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a key, if it is one.
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        Value::Key(k)
    }
}

/// A stored record: its key and named properties.
///
/// Embedded entities carry no key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Entity key.
    pub key: Option<Key>,
    /// Properties by name.
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Creates an empty entity with the given key.
    pub fn new(key: Key) -> Self {
        Self {
            key: Some(key),
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property, returning the entity.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns a property by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// An entity as returned by a read, with its version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResult {
    /// The entity. For missing results only the key is set.
    pub entity: Entity,
    /// Version of the entity at read time.
    ///
    /// For missing results this is the read-time version of the store.
    pub version: i64,
    /// Creation time in microseconds, when known.
    pub create_time: Option<i64>,
    /// Last update time in microseconds, when known.
    pub update_time: Option<i64>,
}

impl EntityResult {
    /// Creates a result for a found entity.
    pub fn found(entity: Entity, version: i64, create_time: i64, update_time: i64) -> Self {
        Self {
            entity,
            version,
            create_time: Some(create_time),
            update_time: Some(update_time),
        }
    }

    /// Creates a result for a key that does not exist.
    pub fn missing(key: Key, read_version: i64) -> Self {
        Self {
            entity: Entity {
                key: Some(key),
                properties: BTreeMap::new(),
            },
            version: read_version,
            create_time: None,
            update_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_cbor, to_cbor};

    #[test]
    fn entity_builder() {
        let key = Key::id("p", "(default)", "Task", 1);
        let entity = Entity::new(key.clone())
            .with("name", "write docs")
            .with("done", false)
            .with("group", Key::id("p", "(default)", "TaskGroup", 9));

        assert_eq!(entity.key, Some(key));
        assert_eq!(entity.get("name").and_then(Value::as_text), Some("write docs"));
        assert_eq!(entity.get("done").and_then(Value::as_bool), Some(false));
        assert!(entity.get("group").and_then(Value::as_key).is_some());
        assert!(entity.get("missing").is_none());
    }

    #[test]
    fn nested_entity_survives_cbor() {
        let inner = Entity::default().with("street", "Main St").with("no", 12i64);
        let entity = Entity::new(Key::id("p", "(default)", "Person", 3))
            .with("address", Value::Entity(inner))
            .with("score", 1.5f64)
            .with(
                "tags",
                Value::Array(vec![Value::from("a"), Value::Null, Value::Blob(vec![1, 2])]),
            );

        let bytes = to_cbor(&entity).unwrap();
        let decoded: Entity = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, entity);
    }
}
