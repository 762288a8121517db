//! Native search requests and the search-condition tree.
//!
//! A condition node is either a leaf `(property, operator, value)` or a
//! nested group of child nodes combined with AND/OR, optionally negated.
//! Groups derived from classification filters are always kept as their own
//! nested group rather than flattened into the caller's group, so a
//! match-any caller cannot accidentally loosen a constraint that must apply
//! conjunctively.

use crate::asset::RawAsset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pseudo-property addressing the backend record id in conditions and sorts.
pub const RECORD_ID_PROPERTY: &str = "_id";

/// Native condition operators, serialized as the backend's wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "<>")]
    NotEquals,
    #[serde(rename = "like {0}%")]
    StartsWith,
    #[serde(rename = "like %{0}")]
    EndsWith,
    #[serde(rename = "like %{0}%")]
    Contains,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "isNull")]
    IsNull,
}

/// A leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCondition {
    pub property: String,
    pub operator: SearchOperator,
    #[serde(default)]
    pub value: Value,
}

impl SearchCondition {
    pub fn new(property: impl Into<String>, operator: SearchOperator, value: Value) -> Self {
        Self {
            property: property.into(),
            operator,
            value,
        }
    }

    fn matches(&self, asset: &RawAsset) -> bool {
        let actual = resolve_property(asset, &self.property);
        if self.operator == SearchOperator::IsNull {
            return actual.iter().all(Value::is_null) || actual.is_empty();
        }
        // A multi-valued property matches when any of its values does.
        actual.iter().any(|value| self.matches_value(value))
    }

    fn matches_value(&self, actual: &Value) -> bool {
        match self.operator {
            SearchOperator::IsNull => actual.is_null(),
            SearchOperator::Equals => actual == &self.value,
            SearchOperator::NotEquals => actual != &self.value,
            SearchOperator::StartsWith => {
                str_pair(actual, &self.value).is_some_and(|(a, b)| a.starts_with(b))
            }
            SearchOperator::EndsWith => {
                str_pair(actual, &self.value).is_some_and(|(a, b)| a.ends_with(b))
            }
            SearchOperator::Contains => {
                str_pair(actual, &self.value).is_some_and(|(a, b)| a.contains(b))
            }
            SearchOperator::GreaterThan => {
                num_pair(actual, &self.value).is_some_and(|(a, b)| a > b)
            }
            SearchOperator::LessThan => num_pair(actual, &self.value).is_some_and(|(a, b)| a < b),
            SearchOperator::In => match &self.value {
                Value::Array(allowed) => allowed.contains(actual),
                _ => false,
            },
        }
    }
}

/// Resolve a condition property against a record. A single dotted hop
/// (`reference_property.field`) reaches into reference values, yielding one
/// value per referenced record.
fn resolve_property(asset: &RawAsset, path: &str) -> Vec<Value> {
    match path.split_once('.') {
        None => asset.property(path).into_iter().collect(),
        Some((head, field)) => {
            let Some(value) = asset.property(head) else {
                return Vec::new();
            };
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            items
                .into_iter()
                .filter_map(|item| item.get(field).cloned())
                .collect()
        }
    }
}

fn str_pair<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn num_pair(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

/// A group node: leaf conditions plus nested groups, AND or OR combined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchConditionSet {
    #[serde(default)]
    pub conditions: Vec<SearchCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<SearchConditionSet>,
    /// OR when true, AND when false.
    #[serde(default)]
    pub match_any: bool,
    /// Negate the whole group (NONE-match semantics).
    #[serde(default)]
    pub negated: bool,
}

impl SearchConditionSet {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn any() -> Self {
        Self {
            match_any: true,
            ..Self::default()
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn push(&mut self, condition: SearchCondition) {
        self.conditions.push(condition);
    }

    /// Attach a child group without flattening it.
    pub fn nest(&mut self, group: SearchConditionSet) {
        self.nested.push(group);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.nested.is_empty()
    }

    /// Evaluate against a record. An empty group matches everything.
    pub fn matches(&self, asset: &RawAsset) -> bool {
        let result = if self.is_empty() {
            true
        } else {
            let leaves = self.conditions.iter().map(|c| c.matches(asset));
            let groups = self.nested.iter().map(|g| g.matches(asset));
            let mut all = leaves.chain(groups);
            if self.match_any {
                all.any(|m| m)
            } else {
                all.all(|m| m)
            }
        };
        result != self.negated
    }
}

/// Requested result ordering for a native search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSort {
    pub property: String,
    pub ascending: bool,
}

impl SearchSort {
    /// The deterministic fallback sort injected when the caller requests no
    /// sequencing: without it the backend does not guarantee stable ordering
    /// and page windows could overlap or skip records.
    pub fn by_record_id() -> Self {
        Self {
            property: RECORD_ID_PROPERTY.to_string(),
            ascending: true,
        }
    }
}

/// A complete native search request against one backend asset type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeSearch {
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Properties to project into the returned records.
    pub properties: Vec<String>,
    #[serde(rename = "where")]
    pub conditions: SearchConditionSet,
    pub begin: usize,
    /// Records per transport page; 0 lets the backend choose.
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SearchSort>,
}

impl NativeSearch {
    pub fn new(asset_type: impl Into<String>, conditions: SearchConditionSet) -> Self {
        Self {
            asset_type: asset_type.into(),
            properties: Vec::new(),
            conditions,
            begin: 0,
            page_size: 0,
            sort: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rid: &str, name: &str) -> RawAsset {
        RawAsset::new(rid, "database_table", name).with_property("short_description", name)
    }

    #[test]
    fn operators_serialize_as_wire_strings() {
        let condition = SearchCondition::new("name", SearchOperator::StartsWith, json!("EMP"));
        let wire = serde_json::to_value(&condition).unwrap();
        assert_eq!(wire["operator"], json!("like {0}%"));
    }

    #[test]
    fn all_group_requires_every_condition() {
        let mut set = SearchConditionSet::all();
        set.push(SearchCondition::new("_name", SearchOperator::Equals, json!("EMPLOYEE")));
        set.push(SearchCondition::new(
            "short_description",
            SearchOperator::Contains,
            json!("EMP"),
        ));
        assert!(set.matches(&table("t1", "EMPLOYEE")));
        assert!(!set.matches(&table("t1", "DEPT")));
    }

    #[test]
    fn any_group_requires_one_condition() {
        let mut set = SearchConditionSet::any();
        set.push(SearchCondition::new("_name", SearchOperator::Equals, json!("DEPT")));
        set.push(SearchCondition::new("_name", SearchOperator::EndsWith, json!("YEE")));
        assert!(set.matches(&table("t1", "EMPLOYEE")));
        assert!(!set.matches(&table("t1", "SALARY")));
    }

    #[test]
    fn negated_group_inverts_the_whole_group() {
        let mut set = SearchConditionSet::any().negated();
        set.push(SearchCondition::new("_name", SearchOperator::Equals, json!("EMPLOYEE")));
        assert!(!set.matches(&table("t1", "EMPLOYEE")));
        assert!(set.matches(&table("t1", "DEPT")));
    }

    #[test]
    fn nested_group_keeps_conjunctive_semantics_under_any_parent() {
        // Caller asked for ANY of its own conditions, but the nested
        // classification group must still hold on its own terms.
        let mut classification = SearchConditionSet::all();
        classification.push(SearchCondition::new(
            "assigned_to_terms._name",
            SearchOperator::Equals,
            json!("Confidential"),
        ));

        let mut caller = SearchConditionSet::any();
        caller.push(SearchCondition::new("_name", SearchOperator::Equals, json!("X")));

        let mut outer = SearchConditionSet::all();
        outer.nest(caller);
        outer.nest(classification);

        let tagged = table("t1", "X").with_property(
            "assigned_to_terms",
            json!([{"_id": "tm1", "_type": "term", "_name": "Confidential"}]),
        );
        let untagged = table("t2", "X");
        assert!(outer.matches(&tagged));
        assert!(!outer.matches(&untagged));
    }

    #[test]
    fn is_null_matches_missing_and_null() {
        let mut set = SearchConditionSet::all();
        set.push(SearchCondition::new("long_description", SearchOperator::IsNull, Value::Null));
        assert!(set.matches(&table("t1", "EMPLOYEE")));
        let with_value = table("t2", "DEPT").with_property("long_description", "filled");
        assert!(!set.matches(&with_value));
    }
}
