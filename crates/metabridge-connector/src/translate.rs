//! Query translation: abstract match criteria → native searches.
//!
//! One abstract query fans out to one native search per expanded type
//! mapping. Translation is pure (no transport calls) and fails fast on
//! anything the backend cannot evaluate (general regex, historical queries,
//! sequencing on an unmapped property) instead of attempting a best-effort
//! approximation that would silently change semantics.

use crate::FederationError;
use metabridge_catalog::{
    AssetPath, NativeSearch, SearchCondition, SearchConditionSet, SearchOperator, SearchSort,
};
use metabridge_mapping::{ClassificationMapping, MappingRegistry, TypeMapping};
use metabridge_model::{
    ClassificationFilter, EntityDetail, EntityFindRequest, MatchCriteria, PropertyMatch,
    SequencingOrder, QUALIFIED_NAME,
};
use serde_json::Value;

/// A native search tagged with the abstract type whose mapping produced it,
/// so the materializer can convert its hits back.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSearch {
    pub abstract_type: String,
    pub native: NativeSearch,
    /// Constraints the native condition tree cannot express, applied to
    /// each materialized entity before it counts against the page.
    pub post_filters: Vec<QualifiedNameFilter>,
}

impl TranslatedSearch {
    pub fn new(abstract_type: impl Into<String>, native: NativeSearch) -> Self {
        Self {
            abstract_type: abstract_type.into(),
            native,
            post_filters: Vec::new(),
        }
    }

    /// True when the entity passes every post-materialization filter.
    pub fn accepts(&self, entity: &EntityDetail) -> bool {
        self.post_filters
            .iter()
            .all(|filter| filter.accepts(entity.qualified_name()))
    }
}

/// A match on the rendered unique name of a materialized entity.
///
/// The unique name is derived from a record's containment context, which the
/// backend search API cannot constrain; a native leaf on `_name` can only
/// narrow by the final segment. The authoritative check therefore runs after
/// materialization, against the fully rendered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedNameFilter {
    pub kind: MatchKind,
    /// True when the entity must NOT match (NONE criteria).
    pub exclude: bool,
}

impl QualifiedNameFilter {
    pub fn accepts(&self, qualified_name: Option<&str>) -> bool {
        let matched = qualified_name.is_some_and(|name| self.kind.matches(name));
        matched != self.exclude
    }
}

// ============================================================================
// Match-kind classification
// ============================================================================

/// The pattern shapes the backend can evaluate natively. Callers pass
/// regex-style values; only these four shapes map to native operators, and
/// a general regex is refused rather than approximated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    Exact(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    /// Anything needing a real regex engine.
    General,
}

/// Classify a regex-style match value.
///
/// Recognizes `\Q…\E`-quoted literals with optional `.*` affixes (the
/// framework's canonical encodings for exact/starts-with/ends-with/contains)
/// and unquoted values that contain no regex metacharacters.
pub fn match_kind(pattern: &str) -> MatchKind {
    if let Some(kind) = quoted_literal_kind(pattern) {
        return kind;
    }

    let (stripped, leading) = match pattern.strip_prefix(".*") {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    let (stripped, trailing) = match stripped.strip_suffix(".*") {
        Some(rest) => (rest, true),
        None => (stripped, false),
    };
    if !is_plain_literal(stripped) {
        return MatchKind::General;
    }
    let literal = stripped.to_string();
    match (leading, trailing) {
        (false, false) => MatchKind::Exact(literal),
        (false, true) => MatchKind::StartsWith(literal),
        (true, false) => MatchKind::EndsWith(literal),
        (true, true) => MatchKind::Contains(literal),
    }
}

fn quoted_literal_kind(pattern: &str) -> Option<MatchKind> {
    let (rest, leading) = match pattern.strip_prefix(".*") {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    let (rest, trailing) = match rest.strip_suffix(".*") {
        Some(rest) => (rest, true),
        None => (rest, false),
    };
    let body = rest.strip_prefix("\\Q")?.strip_suffix("\\E")?;
    // A quote boundary inside the body means concatenated regex fragments,
    // which no single native operator can express.
    if body.contains("\\E") || body.contains("\\Q") {
        return None;
    }
    let literal = body.to_string();
    Some(match (leading, trailing) {
        (false, false) => MatchKind::Exact(literal),
        (false, true) => MatchKind::StartsWith(literal),
        (true, false) => MatchKind::EndsWith(literal),
        (true, true) => MatchKind::Contains(literal),
    })
}

/// A string is a plain literal iff escaping it for a regex engine changes
/// nothing.
fn is_plain_literal(s: &str) -> bool {
    regex::escape(s) == s
}

impl MatchKind {
    /// The native operator and value for this pattern shape.
    pub fn to_condition(&self, property: &str) -> Option<SearchCondition> {
        let (operator, literal) = match self {
            MatchKind::Exact(v) => (SearchOperator::Equals, v),
            MatchKind::StartsWith(v) => (SearchOperator::StartsWith, v),
            MatchKind::EndsWith(v) => (SearchOperator::EndsWith, v),
            MatchKind::Contains(v) => (SearchOperator::Contains, v),
            MatchKind::General => return None,
        };
        Some(SearchCondition::new(
            property,
            operator,
            Value::String(literal.clone()),
        ))
    }

    /// Evaluate this pattern shape against a concrete string.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            MatchKind::Exact(v) => text == v,
            MatchKind::StartsWith(v) => text.starts_with(v.as_str()),
            MatchKind::EndsWith(v) => text.ends_with(v.as_str()),
            MatchKind::Contains(v) => text.contains(v.as_str()),
            MatchKind::General => false,
        }
    }
}

// ============================================================================
// Per-mapping translation
// ============================================================================

/// Outcome of translating conditions for one mapping: either a condition
/// group (plus any post-materialization filters), or the knowledge that
/// this mapping can never match the request.
enum Translated {
    Conditions {
        group: SearchConditionSet,
        filters: Vec<QualifiedNameFilter>,
    },
    ProvablyEmpty,
}

/// Outcome of translating one unique-name condition for one mapping.
enum QualifiedName {
    /// An optional native pre-filter on the leaf name, narrowing the search,
    /// plus the authoritative post-materialization filter.
    Constrained {
        pre: Option<SearchCondition>,
        filter: QualifiedNameFilter,
    },
    /// No name this mapping renders can ever satisfy the condition.
    ProvablyEmpty,
    /// The condition is trivially false; NONE criteria excludes nothing.
    Dropped,
}

fn leaf_for_match(
    operation: &'static str,
    backend_property: &str,
    value: &Value,
) -> Result<SearchCondition, FederationError> {
    match value {
        Value::String(pattern) => match_kind(pattern)
            .to_condition(backend_property)
            .ok_or(FederationError::FunctionNotSupported {
                operation,
                function: "general regular expression matching",
            }),
        other => Ok(SearchCondition::new(
            backend_property,
            SearchOperator::Equals,
            other.clone(),
        )),
    }
}

/// Translate the caller's property conditions for one mapping.
///
/// Unmapped properties degrade by criteria: under ALL the whole mapping is
/// provably empty, under ANY/NONE the condition is dropped (a property the
/// type does not have trivially fails to match).
fn translate_property_conditions(
    operation: &'static str,
    mapping: &TypeMapping,
    matches: &[PropertyMatch],
    criteria: MatchCriteria,
) -> Result<Translated, FederationError> {
    let mut group = match criteria {
        MatchCriteria::All => SearchConditionSet::all(),
        MatchCriteria::Any => SearchConditionSet::any(),
        MatchCriteria::None => SearchConditionSet::any().negated(),
    };
    let mut filters = Vec::new();
    let sole_condition = matches.len() == 1;

    for condition in matches {
        let backend_property = if condition.property == QUALIFIED_NAME {
            match qualified_name_condition(operation, mapping, condition, criteria, sole_condition)?
            {
                QualifiedName::Constrained { pre, filter } => {
                    if let Some(pre) = pre {
                        group.push(pre);
                    }
                    filters.push(filter);
                }
                QualifiedName::ProvablyEmpty => {
                    tracing::debug!(
                        abstract_type = %mapping.abstract_type,
                        "unique-name condition can never match this mapping, search is provably empty"
                    );
                    return Ok(Translated::ProvablyEmpty);
                }
                QualifiedName::Dropped => {}
            }
            continue;
        } else {
            mapping.backend_property_for(&condition.property)
        };
        match backend_property {
            Some(backend_property) => {
                group.push(leaf_for_match(operation, backend_property, &condition.value)?);
            }
            None if criteria == MatchCriteria::All => {
                tracing::debug!(
                    abstract_type = %mapping.abstract_type,
                    property = %condition.property,
                    "unmapped property under ALL criteria, search is provably empty"
                );
                return Ok(Translated::ProvablyEmpty);
            }
            None => {
                tracing::debug!(
                    abstract_type = %mapping.abstract_type,
                    property = %condition.property,
                    "dropping condition on unmapped property"
                );
            }
        }
    }
    Ok(Translated::Conditions { group, filters })
}

/// Translate a condition on the canonical unique name.
///
/// A rendered name is `type_tag::Context…::leaf`; the context segments are
/// not natively searchable, so every shape is enforced by a post-filter and
/// the native leaf is only a sound narrowing:
/// - exact, full identity: the tag must be this mapping's own and the leaf
///   segment must equal the record name;
/// - ends-with: the record name must end with the text after the last
///   separator of the literal;
/// - starts-with: a literal reaching past the tag pins the tag exactly;
/// - contains: no narrowing (the text may sit entirely in the context).
fn qualified_name_condition(
    operation: &'static str,
    mapping: &TypeMapping,
    condition: &PropertyMatch,
    criteria: MatchCriteria,
    sole_condition: bool,
) -> Result<QualifiedName, FederationError> {
    let Value::String(pattern) = &condition.value else {
        // The unique name is always a string; equality with anything else
        // never holds.
        return Ok(match criteria {
            MatchCriteria::None => QualifiedName::Dropped,
            _ => QualifiedName::ProvablyEmpty,
        });
    };
    let kind = match_kind(pattern);
    if kind == MatchKind::General {
        return Err(FederationError::FunctionNotSupported {
            operation,
            function: "general regular expression matching",
        });
    }
    if criteria == MatchCriteria::Any && !sole_condition {
        // The OR-group is evaluated natively; a client-side filter cannot
        // reproduce "this condition or any of the others".
        return Err(FederationError::FunctionNotSupported {
            operation,
            function: "unique-name matching alongside other ANY-criteria conditions",
        });
    }
    if criteria == MatchCriteria::None {
        // Exclusion of a name the backend cannot render as a condition
        // happens entirely after materialization.
        return Ok(QualifiedName::Constrained {
            pre: None,
            filter: QualifiedNameFilter {
                kind,
                exclude: true,
            },
        });
    }

    let pre = match &kind {
        MatchKind::Exact(literal) => match AssetPath::parse(literal) {
            // A rendered name always carries a separator.
            None => return Ok(QualifiedName::ProvablyEmpty),
            Some(path) if !path.partial => {
                if path.type_tag != mapping.type_tag() {
                    return Ok(QualifiedName::ProvablyEmpty);
                }
                path.leaf_name().map(|name| {
                    SearchCondition::new("_name", SearchOperator::Equals, Value::String(name.into()))
                })
            }
            Some(_) => None,
        },
        MatchKind::StartsWith(literal) => {
            if let Some((tag, _)) = literal.split_once("::") {
                if tag != mapping.type_tag() {
                    return Ok(QualifiedName::ProvablyEmpty);
                }
            }
            None
        }
        MatchKind::EndsWith(literal) => {
            let suffix = literal.rsplit("::").next().unwrap_or(literal);
            if suffix.is_empty() {
                None
            } else {
                Some(SearchCondition::new(
                    "_name",
                    SearchOperator::EndsWith,
                    Value::String(suffix.to_string()),
                ))
            }
        }
        MatchKind::Contains(_) => None,
        MatchKind::General => unreachable!(),
    };
    Ok(QualifiedName::Constrained {
        pre,
        filter: QualifiedNameFilter {
            kind,
            exclude: false,
        },
    })
}

/// Translate a classification filter through this mapping's classification
/// sub-mapping. The result is the mapping's own nested group, AND-combined
/// by the caller: it never joins the property group, so ANY/NONE criteria
/// there cannot loosen it.
fn translate_classification(
    operation: &'static str,
    mapping: &TypeMapping,
    filter: &ClassificationFilter,
) -> Result<Option<SearchConditionSet>, FederationError> {
    let Some(rule) = mapping.classification_mapping(&filter.name) else {
        tracing::debug!(
            abstract_type = %mapping.abstract_type,
            classification = %filter.name,
            "classification not mapped for this type, search is provably empty"
        );
        return Ok(None);
    };
    let mut group = match filter.criteria {
        MatchCriteria::All => SearchConditionSet::all(),
        MatchCriteria::Any => SearchConditionSet::any(),
        MatchCriteria::None => SearchConditionSet::any().negated(),
    };
    if filter.matches.is_empty() {
        return Ok(Some(classification_exists(rule)));
    }
    let value_path = format!("{}._name", rule.backend_property);
    for condition in &filter.matches {
        if condition.property != rule.value_property {
            // The classification carries exactly one mapped property; a
            // condition on anything else can never hold.
            if filter.criteria == MatchCriteria::All {
                return Ok(None);
            }
            continue;
        }
        group.push(leaf_for_match(operation, &value_path, &condition.value)?);
    }
    if group.is_empty() {
        // Every condition was dropped. Under ALL/ANY nothing can match;
        // under NONE the dropped conditions are trivially absent and the
        // filter degrades to classification presence.
        return match filter.criteria {
            MatchCriteria::None => Ok(Some(classification_exists(rule))),
            _ => Ok(None),
        };
    }
    Ok(Some(group))
}

/// Bare classification filter: the reference property must be set.
fn classification_exists(rule: &ClassificationMapping) -> SearchConditionSet {
    let mut exists = SearchConditionSet::all().negated();
    exists.push(SearchCondition::new(
        &rule.backend_property,
        SearchOperator::IsNull,
        Value::Null,
    ));
    exists
}

fn resolve_sort(
    operation: &'static str,
    mapping: &TypeMapping,
    request: &EntityFindRequest,
) -> Result<SearchSort, FederationError> {
    match &request.sequencing.property {
        None => Ok(SearchSort::by_record_id()),
        Some(property) => {
            let backend_property = mapping.backend_property_for(property).ok_or(
                FederationError::FunctionNotSupported {
                    operation,
                    function: "sequencing on an unmapped property",
                },
            )?;
            Ok(SearchSort {
                property: backend_property.to_string(),
                ascending: request.sequencing.order == SequencingOrder::Ascending,
            })
        }
    }
}

/// Translate one request against one mapping. `Ok(None)` means this mapping
/// is provably empty for the request and no search should be issued.
pub fn translate_for_mapping(
    operation: &'static str,
    mapping: &TypeMapping,
    request: &EntityFindRequest,
) -> Result<Option<TranslatedSearch>, FederationError> {
    let (property_group, post_filters) = match translate_property_conditions(
        operation,
        mapping,
        &request.matches,
        request.criteria,
    )? {
        Translated::ProvablyEmpty => return Ok(None),
        Translated::Conditions { group, filters } => (group, filters),
    };

    let classification_group = match &request.classification {
        None => None,
        Some(filter) => match translate_classification(operation, mapping, filter)? {
            None => return Ok(None),
            group => group,
        },
    };

    let mut conditions = SearchConditionSet::all();
    if !property_group.is_empty() {
        conditions.nest(property_group);
    }
    if let Some(group) = classification_group {
        conditions.nest(group);
    }

    let mut native = NativeSearch::new(&mapping.backend_type, conditions);
    native.properties = mapping.projected_properties();
    native.begin = request.paging.from;
    native.page_size = request.paging.page_size;
    native.sort = Some(resolve_sort(operation, mapping, request)?);
    let mut search = TranslatedSearch::new(mapping.abstract_type.clone(), native);
    search.post_filters = post_filters;
    Ok(Some(search))
}

// ============================================================================
// Fan-out
// ============================================================================

/// Translate a find request into the native searches that cover it.
pub fn translate_query<'a>(
    operation: &'static str,
    registry: &'a MappingRegistry,
    request: &EntityFindRequest,
) -> Result<Vec<TranslatedSearch>, FederationError> {
    if request.as_of_time.is_some() {
        return Err(FederationError::FunctionNotSupported {
            operation,
            function: "historical (as-of-time) queries",
        });
    }

    let mut candidates: Vec<&'a TypeMapping> = match &request.type_name {
        Some(name) => registry
            .expand_to_searchable_subtypes(name, request.subtype_filter.as_deref())
            .map_err(|e| FederationError::from_mapping(operation, e))?,
        None => {
            let all = registry.searchable_mappings();
            match &request.subtype_filter {
                Some(filter) => all
                    .into_iter()
                    .filter(|m| filter.iter().any(|t| *t == m.abstract_type))
                    .collect(),
                None => all,
            }
        }
    };

    if let Some(mapping) = identity_short_circuit(registry, request) {
        if candidates
            .iter()
            .any(|m| m.abstract_type == mapping.abstract_type)
        {
            tracing::debug!(
                abstract_type = %mapping.abstract_type,
                "structured identity narrowed fan-out to a single mapping"
            );
            candidates = vec![mapping];
        } else {
            // The identity names a type outside the requested hierarchy.
            return Ok(Vec::new());
        }
    }

    let mut searches = Vec::new();
    for mapping in candidates {
        if let Some(search) = translate_for_mapping(operation, mapping, request)? {
            searches.push(search);
        }
    }
    Ok(searches)
}

/// When the only condition is an exact match on the canonical unique name
/// and that value parses as a full structured identity, the search narrows
/// to the identity's own mapping. NONE-match queries must still fan out:
/// narrowing would wrongly exclude the types to be checked for absence.
fn identity_short_circuit<'a>(
    registry: &'a MappingRegistry,
    request: &EntityFindRequest,
) -> Option<&'a TypeMapping> {
    if request.criteria == MatchCriteria::None || request.matches.len() != 1 {
        return None;
    }
    let condition = &request.matches[0];
    if condition.property != QUALIFIED_NAME {
        return None;
    }
    let pattern = condition.value.as_str()?;
    let MatchKind::Exact(literal) = match_kind(pattern) else {
        return None;
    };
    let path = AssetPath::parse(&literal)?;
    if path.partial {
        return None;
    }
    registry.mapping_for_type_tag(&path.type_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_and_plain_literals_classify_identically() {
        assert_eq!(match_kind("EMPLOYEE"), MatchKind::Exact("EMPLOYEE".into()));
        assert_eq!(
            match_kind("\\QEMPLOYEE\\E"),
            MatchKind::Exact("EMPLOYEE".into())
        );
        assert_eq!(
            match_kind("EMP.*"),
            MatchKind::StartsWith("EMP".into())
        );
        assert_eq!(
            match_kind("\\QEMP\\E.*"),
            MatchKind::StartsWith("EMP".into())
        );
        assert_eq!(match_kind(".*YEE"), MatchKind::EndsWith("YEE".into()));
        assert_eq!(match_kind(".*PLO.*"), MatchKind::Contains("PLO".into()));
        assert_eq!(
            match_kind(".*\\QPLO\\E.*"),
            MatchKind::Contains("PLO".into())
        );
    }

    #[test]
    fn general_patterns_are_refused() {
        assert_eq!(match_kind("a.*b|c"), MatchKind::General);
        assert_eq!(match_kind("[A-Z]+"), MatchKind::General);
        assert_eq!(match_kind("a+?"), MatchKind::General);
        // Concatenated quoted fragments cannot map to one operator.
        assert_eq!(match_kind("\\Qa\\E.\\Qb\\E"), MatchKind::General);
    }

    #[test]
    fn shapes_evaluate_against_concrete_strings() {
        assert!(MatchKind::Exact("a::b".into()).matches("a::b"));
        assert!(!MatchKind::Exact("a::b".into()).matches("a::b::c"));
        assert!(MatchKind::StartsWith("a::b".into()).matches("a::b::c"));
        assert!(MatchKind::EndsWith("b::c".into()).matches("a::b::c"));
        assert!(MatchKind::Contains("::b::".into()).matches("a::b::c"));
        assert!(!MatchKind::Contains("::d::".into()).matches("a::b::c"));
    }

    #[test]
    fn quoted_literal_preserves_metacharacters() {
        assert_eq!(
            match_kind("\\Qa.b(c)\\E"),
            MatchKind::Exact("a.b(c)".into())
        );
    }
}
