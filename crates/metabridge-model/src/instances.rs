//! Materialized instances handed back to the federation framework.
//!
//! These are the "already translated" shapes: every instance carries the
//! GUID produced by the identity codec and the abstract type name resolved
//! through the mapping registry. Properties use `serde_json::Value` so the
//! backend's JSON property values pass through without an intermediate
//! value model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A classification attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInstance {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Header-only view of an entity (GUID, type, classifications).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub guid: String,
    pub type_name: String,
    pub home_id: String,
    #[serde(default)]
    pub classifications: Vec<ClassificationInstance>,
}

/// A fully materialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub guid: String,
    pub type_name: String,
    pub home_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub classifications: Vec<ClassificationInstance>,
}

impl EntityDetail {
    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            guid: self.guid.clone(),
            type_name: self.type_name.clone(),
            home_id: self.home_id.clone(),
            classifications: self.classifications.clone(),
        }
    }

    /// The entity's unique (qualified) name, when mapped.
    pub fn qualified_name(&self) -> Option<&str> {
        self.properties
            .get(crate::query::QUALIFIED_NAME)
            .and_then(Value::as_str)
    }
}

/// Lightweight stand-in for a relationship endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProxy {
    pub guid: String,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
}

/// A fully materialized relationship between two entity proxies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipInstance {
    pub guid: String,
    pub type_name: String,
    pub home_id: String,
    pub end_1: EntityProxy,
    pub end_2: EntityProxy,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}
