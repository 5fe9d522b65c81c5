//! Core domain types shared by the locator, extractor, inferencer and protocol.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::HostValue;

/// A string-keyed map that iterates in insertion order.
///
/// Host objects, collection mappings and inferred schemas all promise
/// first-seen ordering on the wire. Re-inserting a key keeps its position.
pub type OrderedMap<V> = IndexMap<String, V>;

// ---------------------------------------------------------------------------
// ConfigModule / CollectionsMap
// ---------------------------------------------------------------------------

/// Collection name → collection definition, in source-export order.
pub type CollectionsMap = OrderedMap<HostValue>;

/// The exports of one loaded config module, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigModule {
    exports: OrderedMap<HostValue>,
}

impl ConfigModule {
    pub fn new(exports: OrderedMap<HostValue>) -> Self {
        Self { exports }
    }

    /// Look up a single export by name (`"default"` for the default export).
    pub fn export(&self, name: &str) -> Option<&HostValue> {
        self.exports.get(name)
    }

    /// All exports, in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.exports.iter().map(|(name, value)| (name.as_str(), value))
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// An entry exactly as the host returned it.
///
/// Every field is optional; the session controller normalizes it into an [`Entry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<HostValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<HostValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HostValue>,
}

/// One normalized content entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub data: OrderedMap<HostValue>,
}
