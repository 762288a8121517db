//! Raw backend records as returned by the catalog's REST API.
//!
//! A record is a flat JSON document with a handful of well-known meta fields
//! (`_id`, `_type`, `_name`, `_context`) and an open set of typed
//! properties. Reference-valued properties hold either a single reference
//! object or an array of them; `RawAsset::references` normalizes both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One ancestor in a record's containment hierarchy, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(rename = "_type")]
    pub asset_type: String,
    #[serde(rename = "_name")]
    pub name: String,
}

/// A reference from one record to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    #[serde(rename = "_id")]
    pub rid: String,
    #[serde(rename = "_type")]
    pub asset_type: String,
    #[serde(rename = "_name", default)]
    pub name: String,
}

/// A raw backend record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAsset {
    #[serde(rename = "_id")]
    pub rid: String,
    #[serde(rename = "_type")]
    pub asset_type: String,
    #[serde(rename = "_name", default)]
    pub name: String,
    #[serde(rename = "_context", default)]
    pub context: Vec<ContextEntry>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl RawAsset {
    pub fn new(
        rid: impl Into<String>,
        asset_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            rid: rid.into(),
            asset_type: asset_type.into(),
            name: name.into(),
            context: Vec::new(),
            properties: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<ContextEntry>) -> Self {
        self.context = context;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, reference: RawReference) -> Self {
        let name = name.into();
        let value = serde_json::to_value(&reference).unwrap_or(Value::Null);
        match self.properties.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.properties.insert(name, Value::Array(vec![value]));
            }
        }
        self
    }

    /// Property lookup covering the meta fields the search API also exposes.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            crate::search::RECORD_ID_PROPERTY => Some(Value::String(self.rid.clone())),
            "_type" => Some(Value::String(self.asset_type.clone())),
            "_name" => Some(Value::String(self.name.clone())),
            _ => self.properties.get(name).cloned(),
        }
    }

    pub fn string_property(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// All references held by a property, whether stored as a single object
    /// or an array. Non-reference values yield nothing.
    pub fn references(&self, property: &str) -> Vec<RawReference> {
        let Some(value) = self.properties.get(property) else {
            return Vec::new();
        };
        let parse = |v: &Value| serde_json::from_value::<RawReference>(v.clone()).ok();
        match value {
            Value::Array(items) => items.iter().filter_map(parse).collect(),
            Value::Object(_) => parse(value).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}
