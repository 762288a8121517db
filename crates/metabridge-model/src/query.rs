//! Find-request criteria accepted from the federation framework.
//!
//! String match values follow the framework's regex conventions: a value is
//! interpreted as a pattern, and the translator classifies it into the small
//! set of pattern shapes the backend can evaluate natively (exact,
//! starts-with, ends-with, contains). Classification of the pattern happens
//! in the translator, not here; this module only carries the request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical unique-name property of every mapped entity type. A sole exact
/// condition on this property may short-circuit the subtype fan-out.
pub const QUALIFIED_NAME: &str = "qualifiedName";

/// How multiple property conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCriteria {
    /// Every condition must match.
    All,
    /// At least one condition must match.
    Any,
    /// No condition may match.
    None,
}

/// One abstract property condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub property: String,
    pub value: Value,
}

impl PropertyMatch {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Filter on an attached classification. Always applies conjunctively with
/// the property conditions, whatever their match criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationFilter {
    pub name: String,
    #[serde(default)]
    pub matches: Vec<PropertyMatch>,
    pub criteria: MatchCriteria,
}

/// Paging window. `page_size == 0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub from: usize,
    pub page_size: usize,
}

impl Paging {
    pub const UNBOUNDED: Paging = Paging {
        from: 0,
        page_size: 0,
    };

    pub fn new(from: usize, page_size: usize) -> Self {
        Self { from, page_size }
    }

    pub fn is_unbounded(&self) -> bool {
        self.page_size == 0
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingOrder {
    Ascending,
    Descending,
}

/// Requested result ordering. With no property, the translator injects a
/// deterministic record-id sort so page windows stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequencing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub order: SequencingOrder,
}

impl Default for Sequencing {
    fn default() -> Self {
        Self {
            property: None,
            order: SequencingOrder::Ascending,
        }
    }
}

/// A complete entity find request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityFindRequest {
    /// Abstract type to search; `None` searches every mapped type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Optional narrowing of a supertype query to specific subtypes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype_filter: Option<Vec<String>>,
    #[serde(default)]
    pub matches: Vec<PropertyMatch>,
    #[serde(default = "default_criteria")]
    pub criteria: MatchCriteria,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationFilter>,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub sequencing: Sequencing,
    /// Historical queries are not supported; any value fails fast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_time: Option<DateTime<Utc>>,
}

fn default_criteria() -> MatchCriteria {
    MatchCriteria::All
}

impl Default for MatchCriteria {
    fn default() -> Self {
        MatchCriteria::All
    }
}

impl EntityFindRequest {
    pub fn for_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }
}
