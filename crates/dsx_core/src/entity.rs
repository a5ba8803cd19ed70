//! Application-level entities.

use crate::error::{CoreError, CoreResult};
use crate::key::{key_to_proto, proto_to_key, Key};
use dsx_protocol::Value;
use std::collections::BTreeMap;

/// An entity addressed by an application [`Key`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity key.
    pub key: Key,
    /// Properties by name.
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Creates an entity with no properties.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property, returning the entity.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Sets a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Returns a property by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Returns a text property.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    /// Returns a key-valued property as an application key.
    pub fn key_property(&self, name: &str) -> CoreResult<Option<Key>> {
        self.get(name)
            .and_then(Value::as_key)
            .map(proto_to_key)
            .transpose()
    }
}

/// Converts an entity to its wire form.
pub fn entity_to_proto(entity: &Entity, project_id: &str, database_id: &str) -> dsx_protocol::Entity {
    dsx_protocol::Entity {
        key: Some(key_to_proto(&entity.key, project_id, database_id)),
        properties: entity.properties.clone(),
    }
}

/// Converts a wire entity to an application entity.
pub fn entity_from_proto(entity: dsx_protocol::Entity) -> CoreResult<Entity> {
    let key = entity
        .key
        .as_ref()
        .ok_or_else(|| CoreError::invalid_key("entity has no key"))
        .and_then(proto_to_key)?;
    Ok(Entity {
        key,
        properties: entity.properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_roundtrip_keeps_properties() {
        let group = Key::id_key("TaskGroup", 1, None);
        let entity = Entity::new(Key::id_key("Task", 2, None))
            .with("name", "write docs")
            .with("group", key_to_proto(&group, "demo", "(default)"));

        let proto = entity_to_proto(&entity, "demo", "(default)");
        let back = entity_from_proto(proto).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.text("name"), Some("write docs"));
        assert_eq!(back.key_property("group").unwrap(), Some(group));
        assert_eq!(back.key_property("name").unwrap(), None);
    }

    #[test]
    fn keyless_proto_is_rejected() {
        let result = entity_from_proto(dsx_protocol::Entity::default());
        assert!(matches!(result, Err(CoreError::InvalidKey { .. })));
    }
}
