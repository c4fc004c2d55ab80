//! Flat, ordered view of every tag in a tree.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::DmError;
use crate::io::ByteSource;

use super::codec::load_array;
use super::header::ByteOrder;
use super::tree::{TagEntry, TagTree};
use super::value::Value;

/// Every leaf of a tag tree keyed by dotted path, in traversal order.
///
/// Arrays show their decoded values; arrays flagged as bulk data show only
/// where their bytes are.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagMap {
    entries: IndexMap<String, Value>,
}

impl TagMap {
    /// Flatten `tree`, reporting entries for which `is_bulk` holds as unread.
    ///
    /// Other arrays the walk did not keep are read from `source`.
    pub fn from_tree<S: ByteSource + ?Sized>(
        tree: &TagTree,
        source: &S,
        order: ByteOrder,
        is_bulk: impl Fn(&TagEntry) -> bool,
    ) -> Result<Self, DmError> {
        let mut leaves = Vec::new();
        tree.root()
            .for_each_entry(|path, entry| leaves.push((path.to_string(), entry)));

        let mut entries = IndexMap::with_capacity(leaves.len());
        for (path, entry) in leaves {
            let value = match entry.value.as_array() {
                Some(array) if is_bulk(entry) => Value::Unread(array.summary()),
                Some(array) => Value::Array(load_array(array, source, order)?),
                None => Value::from(&entry.value),
            };
            entries.insert(path, value);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
