//! Application-level entity keys.
//!
//! A [`Key`] names an entity by kind and id (or name) plus an optional parent
//! chain and namespace. Keys convert to and from the wire representation with
//! [`key_to_proto`] and [`proto_to_key`], and have a canonical string form
//! ([`Key::encode`]) that the recorder uses as its lookup key.

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ciborium::Value as Cbor;
use dsx_protocol::{IdType, PartitionId, PathElement};
use std::fmt;

/// The identifying part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    /// Numeric id.
    Id(i64),
    /// String name.
    Name(String),
    /// Not yet assigned; the datastore allocates an id on insert.
    Incomplete,
}

/// Identifier of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    kind: String,
    id: KeyId,
    parent: Option<Box<Key>>,
    namespace: String,
}

impl Key {
    /// Creates a key with a numeric id.
    pub fn id_key(kind: impl Into<String>, id: i64, parent: Option<Key>) -> Self {
        Self::with_id(kind, KeyId::Id(id), parent)
    }

    /// Creates a key with a string name.
    pub fn name_key(kind: impl Into<String>, name: impl Into<String>, parent: Option<Key>) -> Self {
        Self::with_id(kind, KeyId::Name(name.into()), parent)
    }

    /// Creates a key whose id the datastore allocates on insert.
    pub fn incomplete_key(kind: impl Into<String>, parent: Option<Key>) -> Self {
        Self::with_id(kind, KeyId::Incomplete, parent)
    }

    fn with_id(kind: impl Into<String>, id: KeyId, parent: Option<Key>) -> Self {
        let namespace = parent
            .as_ref()
            .map(|p| p.namespace.clone())
            .unwrap_or_default();
        Self {
            kind: kind.into(),
            id,
            parent: parent.map(Box::new),
            namespace,
        }
    }

    /// Moves this key and all its ancestors into `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let mut current = Some(&mut self);
        while let Some(key) = current {
            key.namespace = namespace.clone();
            current = key.parent.as_deref_mut();
        }
        self
    }

    /// Entity kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Id or name.
    pub fn key_id(&self) -> &KeyId {
        &self.id
    }

    /// Numeric id, if the key has one.
    pub fn id(&self) -> Option<i64> {
        match self.id {
            KeyId::Id(id) => Some(id),
            _ => None,
        }
    }

    /// String name, if the key has one.
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Parent key.
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Namespace; empty for the default namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true if this key has no id or name yet.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.id, KeyId::Incomplete)
    }

    /// Returns the wire path, root ancestor first.
    fn path(&self) -> Vec<PathElement> {
        let mut path = Vec::new();
        let mut current = Some(self);
        while let Some(key) = current {
            let id_type = match &key.id {
                KeyId::Id(id) => IdType::Id(*id),
                KeyId::Name(name) => IdType::Name(name.clone()),
                KeyId::Incomplete => IdType::Incomplete,
            };
            path.push(PathElement::new(key.kind.clone(), id_type));
            current = key.parent();
        }
        path.reverse();
        path
    }

    /// Rebuilds a key from a wire path, root ancestor first.
    fn from_path(namespace: &str, path: &[PathElement]) -> CoreResult<Self> {
        if path.is_empty() {
            return Err(CoreError::invalid_key("empty key path"));
        }

        let mut key: Option<Key> = None;
        for (i, element) in path.iter().enumerate() {
            if element.kind.is_empty() {
                return Err(CoreError::invalid_key("empty kind in key path"));
            }
            let id = match &element.id_type {
                IdType::Id(id) => KeyId::Id(*id),
                IdType::Name(name) => KeyId::Name(name.clone()),
                IdType::Incomplete if i + 1 == path.len() => KeyId::Incomplete,
                IdType::Incomplete => {
                    return Err(CoreError::invalid_key(format!(
                        "incomplete ancestor {} in key path",
                        element.kind
                    )))
                }
            };
            key = Some(Key {
                kind: element.kind.clone(),
                id,
                parent: key.map(Box::new),
                namespace: namespace.to_string(),
            });
        }
        key.ok_or_else(|| CoreError::invalid_key("empty key path"))
    }

    /// Returns the canonical string form of this key.
    ///
    /// The form is URL-safe base64 (no padding) of a canonical CBOR array:
    /// the namespace, then one `[kind, id]` pair per path element, root
    /// first. A numeric id is an integer, a name is text and an incomplete
    /// id is null. Equal keys always encode identically and distinct keys
    /// never share an encoding.
    pub fn encode(&self) -> String {
        let path = self.path();
        let mut writer = CanonicalWriter::default();
        writer.header(4, path.len() as u64 + 1);
        writer.text(&self.namespace);
        for element in &path {
            writer.header(4, 2);
            writer.text(&element.kind);
            match &element.id_type {
                IdType::Id(id) => writer.integer(*id),
                IdType::Name(name) => writer.text(name),
                IdType::Incomplete => writer.null(),
            }
        }
        URL_SAFE_NO_PAD.encode(writer.buffer)
    }

    /// Parses a key produced by [`Key::encode`].
    pub fn decode(encoded: &str) -> CoreResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| CoreError::invalid_key(format!("bad key encoding: {}", e)))?;
        let value: Cbor = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| CoreError::invalid_key(format!("bad key encoding: {}", e)))?;

        let malformed = || CoreError::invalid_key("malformed key encoding");
        let mut items = value.into_array().map_err(|_| malformed())?.into_iter();
        let namespace = items.next().and_then(|v| v.into_text().ok()).ok_or_else(malformed)?;
        let path = items
            .map(|item| {
                let pair = item.into_array().map_err(|_| malformed())?;
                let [kind, id]: [Cbor; 2] = pair.try_into().map_err(|_| malformed())?;
                let kind = kind.into_text().map_err(|_| malformed())?;
                let id_type = match id {
                    Cbor::Integer(id) => IdType::Id(i64::try_from(id).map_err(|_| malformed())?),
                    Cbor::Text(name) => IdType::Name(name),
                    Cbor::Null => IdType::Incomplete,
                    _ => return Err(malformed()),
                };
                Ok(PathElement::new(kind, id_type))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Self::from_path(&namespace, &path)
    }
}

/// Writes the canonical CBOR subset used by [`Key::encode`].
#[derive(Default)]
struct CanonicalWriter {
    buffer: Vec<u8>,
}

impl CanonicalWriter {
    #[allow(clippy::cast_possible_truncation)]
    fn header(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;
        if value < 24 {
            self.buffer.push(mt | value as u8);
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn integer(&mut self, n: i64) {
        if n >= 0 {
            self.header(0, n as u64);
        } else {
            // -1 is stored as 0, -2 as 1, and so on.
            self.header(1, (-(n + 1)) as u64);
        }
    }

    fn text(&mut self, text: &str) {
        self.header(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn null(&mut self) {
        self.buffer.push(0xf6);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{}", parent)?;
        }
        match &self.id {
            KeyId::Id(id) => write!(f, "/{},{}", self.kind, id),
            KeyId::Name(name) => write!(f, "/{},{}", self.kind, name),
            KeyId::Incomplete => write!(f, "/{},0", self.kind),
        }
    }
}

/// Converts a key to its wire form for the given project and database.
pub fn key_to_proto(key: &Key, project_id: &str, database_id: &str) -> dsx_protocol::Key {
    let partition_id =
        PartitionId::new(project_id, database_id).with_namespace(key.namespace.clone());
    dsx_protocol::Key::new(partition_id, key.path())
}

/// Converts a wire key to an application key.
///
/// Project and database ids are dropped; the namespace is kept.
pub fn proto_to_key(key: &dsx_protocol::Key) -> CoreResult<Key> {
    Key::from_path(&key.partition_id.namespace_id, &key.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Key {
        Key::id_key("TaskGroup", 7, None)
    }

    #[test]
    fn display_matches_path() {
        let task = Key::name_key("Task", "docs", Some(group()));
        assert_eq!(task.to_string(), "/TaskGroup,7/Task,docs");
        assert_eq!(Key::incomplete_key("Task", None).to_string(), "/Task,0");
    }

    #[test]
    fn encode_decode() {
        let task = Key::id_key("Task", 99, Some(group())).with_namespace("tenant");
        let decoded = Key::decode(&task.encode()).unwrap();
        assert_eq!(decoded, task);
        assert_eq!(decoded.namespace(), "tenant");
        assert_eq!(decoded.parent().map(Key::namespace), Some("tenant"));
    }

    #[test]
    fn encoding_distinguishes_id_and_name() {
        let by_id = Key::id_key("Task", 1, None);
        let by_name = Key::name_key("Task", "1", None);
        assert_ne!(by_id.encode(), by_name.encode());

        let other_ns = by_id.clone().with_namespace("x");
        assert_ne!(by_id.encode(), other_ns.encode());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Key::decode("!!not base64!!").is_err());
        assert!(Key::decode("AAAA").is_err());
        assert!(Key::decode("").is_err());
    }

    #[test]
    fn encoding_is_canonical_cbor() {
        let key = Key::id_key("T", -2, None);
        // [ "", ["T", -2] ]
        let expected = [0x82, 0x60, 0x82, 0x61, b'T', 0x21];
        assert_eq!(key.encode(), URL_SAFE_NO_PAD.encode(expected));

        let wide = Key::id_key("T", i64::MIN, None);
        assert_eq!(Key::decode(&wide.encode()).unwrap(), wide);
    }

    #[test]
    fn proto_passthrough() {
        let task = Key::id_key("Task", 3, Some(group()));
        let proto = key_to_proto(&task, "demo", "(default)");
        assert_eq!(proto.partition_id.project_id, "demo");
        assert_eq!(proto.path.len(), 2);
        assert_eq!(proto.path[0].kind, "TaskGroup");
        assert_eq!(proto_to_key(&proto).unwrap(), task);
    }

    #[test]
    fn proto_rejects_bad_paths() {
        let empty = dsx_protocol::Key::new(PartitionId::default(), vec![]);
        assert!(proto_to_key(&empty).is_err());

        let bad_ancestor = dsx_protocol::Key::new(
            PartitionId::default(),
            vec![
                PathElement::new("TaskGroup", IdType::Incomplete),
                PathElement::new("Task", IdType::Id(1)),
            ],
        );
        assert!(proto_to_key(&bad_ancestor).is_err());

        let incomplete_leaf = dsx_protocol::Key::new(
            PartitionId::default(),
            vec![PathElement::new("Task", IdType::Incomplete)],
        );
        assert!(proto_to_key(&incomplete_leaf).unwrap().is_incomplete());
    }
}
