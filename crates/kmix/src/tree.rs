//! mapping-rooted value trees and their merge
//!
//! A [ValueTree] is what values resolve to and what documents are made of.
//!
//! Merging follows these rules:
//! - two objects merge key by key, recursively
//! - keys only present in the base keep their position, new keys are appended
//! - anything else is replaced wholesale by the overriding side (arrays are never concatenated)
//!
//! Merging never modifies its operands.
use crate::value::{Key, Mapping, Value};

/// A [Value::Object] at the root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTree(Mapping);

/// One output unit
pub type Document = ValueTree;

impl ValueTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_mapping(self) -> Mapping {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.0.keys()
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.0.get(&key.into())
    }

    /// Insert a top level entry, builder style
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge `overlay` on top of `self` into a new tree
    pub fn merge(&self, overlay: &ValueTree) -> ValueTree {
        ValueTree(merge_mapping(&self.0, &overlay.0))
    }

    /// Look up a dotted path such as `service.ports.0.name`
    ///
    /// Segments index objects by their (stringified) key and arrays by position.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = find_key(&self.0, first)?;

        for segment in segments {
            current = match current {
                Value::Object(mapping) => find_key(mapping, segment)?,
                Value::Array(array) => array.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Set the value at a dotted path, creating (or replacing with) objects along the way
    pub fn set_path(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };

        let mut mapping = &mut self.0;
        for segment in parents {
            let entry = mapping
                .entry(Key::from(*segment))
                .or_insert_with(|| Value::Object(Mapping::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(Mapping::new());
            }
            mapping = match entry {
                Value::Object(next) => next,
                _ => return,
            };
        }

        mapping.insert(Key::from(*last), value);
    }
}

fn find_key<'a>(mapping: &'a Mapping, segment: &str) -> Option<&'a Value> {
    if let Some(value) = mapping.get(&Key::from(segment)) {
        return Some(value);
    }

    mapping
        .iter()
        .find(|(key, _)| !matches!(key, Key::String(_)) && key.to_string() == segment)
        .map(|(_, value)| value)
}

/// Merge `overlay` on top of `base` (see module documentation)
pub fn merge_value(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            Value::Object(merge_mapping(base, overlay))
        }
        (_, overlay) => overlay.clone(),
    }
}

fn merge_mapping(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut merged = base.clone();

    for (key, value) in overlay {
        let value = match merged.get(key) {
            Some(existing) => merge_value(existing, value),
            None => value.clone(),
        };
        // an existing key keeps its position
        merged.insert(key.clone(), value);
    }

    merged
}

impl From<Mapping> for ValueTree {
    fn from(value: Mapping) -> Self {
        ValueTree(value)
    }
}

impl From<ValueTree> for Value {
    fn from(value: ValueTree) -> Self {
        Value::Object(value.0)
    }
}

impl TryFrom<Value> for ValueTree {
    type Error = Value;

    /// Objects become trees, `null` becomes the empty tree, everything else is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(mapping) => Ok(ValueTree(mapping)),
            Value::Null => Ok(ValueTree::default()),
            other => Err(other),
        }
    }
}

impl serde::ser::Serialize for ValueTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut ser = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            ser.serialize_entry(key, value)?;
        }
        ser.end()
    }
}

/// Ordered documents produced by mixers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSet(Vec<Document>);

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, document: Document) {
        self.0.push(document);
    }

    /// Append all documents of `other`, keeping their order
    pub fn append(&mut self, other: DocumentSet) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.0
    }
}

impl From<Vec<Document>> for DocumentSet {
    fn from(value: Vec<Document>) -> Self {
        DocumentSet(value)
    }
}

impl FromIterator<Document> for DocumentSet {
    fn from_iter<T: IntoIterator<Item = Document>>(iter: T) -> Self {
        DocumentSet(iter.into_iter().collect())
    }
}

impl IntoIterator for DocumentSet {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DocumentSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl serde::ser::Serialize for DocumentSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(&self.0)
    }
}
