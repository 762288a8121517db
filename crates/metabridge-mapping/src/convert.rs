//! Pure conversion from raw backend records to federation instances.
//!
//! These functions interpret the tagged descriptor variants; they never
//! touch the transport. Conversion failures are values the caller decides
//! how to handle: the materializer drops and warns, the resolver fails the
//! whole lookup.

use crate::{ComplexRule, RelationshipEndDef, RelationshipMappingDef, TypeMapping};
use metabridge_catalog::{AssetPath, RawAsset, RawReference};
use metabridge_model::{
    ClassificationInstance, EntityDetail, EntityProxy, EntityRef, EndpointRef,
    RelationshipInstance, RelationshipRef,
};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("record `{rid}` is missing required property `{property}`")]
    MissingProperty { rid: String, property: String },
    #[error("record `{rid}` has backend type `{actual}`, mapping expects `{expected}`")]
    TypeMismatch {
        rid: String,
        actual: String,
        expected: String,
    },
}

/// Convert one raw record through its owning type mapping.
pub fn entity_from_asset(
    home_id: &str,
    mapping: &TypeMapping,
    asset: &RawAsset,
) -> Result<EntityDetail, ConvertError> {
    if asset.asset_type != mapping.backend_type {
        return Err(ConvertError::TypeMismatch {
            rid: asset.rid.clone(),
            actual: asset.asset_type.clone(),
            expected: mapping.backend_type.clone(),
        });
    }

    let mut properties = BTreeMap::new();
    for rule in &mapping.properties {
        match asset.property(&rule.backend_property) {
            Some(value) if !value.is_null() => {
                properties.insert(rule.abstract_name.clone(), value);
            }
            _ if rule.required => {
                return Err(ConvertError::MissingProperty {
                    rid: asset.rid.clone(),
                    property: rule.backend_property.clone(),
                });
            }
            _ => {}
        }
    }
    for complex in &mapping.complex {
        if let Some(value) = apply_complex_rule(&complex.rule, mapping, asset) {
            properties.insert(complex.abstract_name.clone(), value);
        }
    }

    let classifications = classifications_from_asset(mapping, asset);
    let guid = EntityRef::new(
        home_id,
        &mapping.backend_type,
        &asset.rid,
        mapping.prefix.clone(),
    )
    .to_guid();

    Ok(EntityDetail {
        guid,
        type_name: mapping.abstract_type.clone(),
        home_id: home_id.to_string(),
        properties,
        classifications,
    })
}

fn apply_complex_rule(rule: &ComplexRule, mapping: &TypeMapping, asset: &RawAsset) -> Option<Value> {
    match rule {
        ComplexRule::Constant { value } => Some(value.clone()),
        ComplexRule::QualifiedName => Some(Value::String(
            AssetPath::from_asset(asset, mapping.prefix.as_deref()).render(),
        )),
        ComplexRule::FirstNonEmpty { backend_properties } => backend_properties
            .iter()
            .filter_map(|p| asset.string_property(p))
            .find(|s| !s.is_empty())
            .map(Value::String),
    }
}

fn classifications_from_asset(mapping: &TypeMapping, asset: &RawAsset) -> Vec<ClassificationInstance> {
    let mut out = Vec::new();
    for rule in &mapping.classifications {
        for reference in asset.references(&rule.backend_property) {
            let mut properties = BTreeMap::new();
            properties.insert(rule.value_property.clone(), Value::String(reference.name));
            out.push(ClassificationInstance {
                name: rule.abstract_name.clone(),
                properties,
            });
        }
    }
    out
}

/// Proxy for an endpoint record we fetched in full.
pub fn proxy_from_asset(home_id: &str, end: &RelationshipEndDef, asset: &RawAsset) -> EntityProxy {
    EntityProxy {
        guid: EntityRef::new(home_id, &asset.asset_type, &asset.rid, end.prefix.clone()).to_guid(),
        type_name: end.abstract_type.clone(),
        unique_name: Some(AssetPath::from_asset(asset, end.prefix.as_deref()).render()),
    }
}

/// Proxy for an endpoint known only through a reference value. References
/// carry no containment context, so no unique name is derived.
pub fn proxy_from_reference(
    home_id: &str,
    end: &RelationshipEndDef,
    reference: &RawReference,
) -> EntityProxy {
    EntityProxy {
        guid: EntityRef::new(
            home_id,
            &reference.asset_type,
            &reference.rid,
            end.prefix.clone(),
        )
        .to_guid(),
        type_name: end.abstract_type.clone(),
        unique_name: None,
    }
}

/// Materialize a reference-level relationship between two endpoint records.
pub fn relationship_between(
    home_id: &str,
    def: &RelationshipMappingDef,
    end_1: &RawAsset,
    end_2: &RawAsset,
) -> RelationshipInstance {
    let guid = RelationshipRef::new(
        home_id,
        &def.abstract_name,
        EndpointRef::new(&end_1.asset_type, &end_1.rid),
        EndpointRef::new(&end_2.asset_type, &end_2.rid),
        false,
    )
    .to_guid();
    RelationshipInstance {
        guid,
        type_name: def.abstract_name.clone(),
        home_id: home_id.to_string(),
        end_1: proxy_from_asset(home_id, &def.end_1, end_1),
        end_2: proxy_from_asset(home_id, &def.end_2, end_2),
        properties: BTreeMap::new(),
    }
}

/// Materialize a reference-level relationship where only one endpoint
/// record is in hand and the other is known through a reference value, as
/// during one-hop enumeration. `record_is_end_1` gives the held record's
/// role.
pub fn relationship_with_reference(
    home_id: &str,
    def: &RelationshipMappingDef,
    record_is_end_1: bool,
    record: &RawAsset,
    other: &RawReference,
) -> RelationshipInstance {
    let guid = RelationshipRef::new(
        home_id,
        &def.abstract_name,
        EndpointRef::new(&record.asset_type, &record.rid),
        EndpointRef::new(&other.asset_type, &other.rid),
        false,
    )
    .to_guid();
    let record_end = if record_is_end_1 { &def.end_1 } else { &def.end_2 };
    let other_end = if record_is_end_1 { &def.end_2 } else { &def.end_1 };
    let record_proxy = proxy_from_asset(home_id, record_end, record);
    let other_proxy = proxy_from_reference(home_id, other_end, other);
    let (end_1, end_2) = if record_is_end_1 {
        (record_proxy, other_proxy)
    } else {
        (other_proxy, record_proxy)
    };
    RelationshipInstance {
        guid,
        type_name: def.abstract_name.clone(),
        home_id: home_id.to_string(),
        end_1,
        end_2,
        properties: BTreeMap::new(),
    }
}

/// Materialize a relationship-level relationship from its linking record.
/// The identity's endpoint descriptors both name the linking record itself;
/// the endpoint proxies come from the linking record's reference properties.
pub fn relationship_from_linking(
    home_id: &str,
    def: &RelationshipMappingDef,
    linking: &RawAsset,
    end_1: &RawAsset,
    end_2: &RawAsset,
) -> RelationshipInstance {
    let guid = RelationshipRef::new(
        home_id,
        &def.abstract_name,
        EndpointRef::new(&linking.asset_type, &linking.rid),
        EndpointRef::new(&linking.asset_type, &linking.rid),
        true,
    )
    .to_guid();
    RelationshipInstance {
        guid,
        type_name: def.abstract_name.clone(),
        home_id: home_id.to_string(),
        end_1: proxy_from_asset(home_id, &def.end_1, end_1),
        end_2: proxy_from_asset(home_id, &def.end_2, end_2),
        properties: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;
    use metabridge_catalog::ContextEntry;
    use serde_json::json;

    fn term_asset() -> RawAsset {
        RawAsset::new("t100", "term", "Employee Number")
            .with_context(vec![ContextEntry {
                asset_type: "category".into(),
                name: "HR".into(),
            }])
            .with_property("short_description", "Employee payroll identifier")
    }

    #[test]
    fn entity_conversion_applies_simple_and_complex_rules() {
        let registry = default_registry();
        let mapping = registry.mapping_for_abstract_type("GlossaryTerm").unwrap();
        let entity = entity_from_asset("repo-1", mapping, &term_asset()).unwrap();

        assert_eq!(entity.type_name, "GlossaryTerm");
        assert_eq!(entity.properties["displayName"], json!("Employee Number"));
        assert_eq!(entity.properties["summary"], json!("Employee payroll identifier"));
        assert_eq!(
            entity.qualified_name(),
            Some("term::HR::Employee Number")
        );
        let decoded = EntityRef::from_guid(&entity.guid, "repo-1").unwrap();
        assert_eq!(decoded.rid, "t100");
        assert_eq!(decoded.prefix, None);
    }

    #[test]
    fn required_property_misses_and_type_mismatches_are_errors() {
        let mapping = TypeMapping::new("RelationalTable", "database_table")
            .with_required_property("dataType", "data_type");
        let missing = RawAsset::new("t1", "database_table", "EMPLOYEE");
        assert_eq!(
            entity_from_asset("repo-1", &mapping, &missing),
            Err(ConvertError::MissingProperty {
                rid: "t1".into(),
                property: "data_type".into(),
            })
        );

        let wrong_type = RawAsset::new("t1", "database_view", "V");
        assert_eq!(
            entity_from_asset("repo-1", &mapping, &wrong_type),
            Err(ConvertError::TypeMismatch {
                rid: "t1".into(),
                actual: "database_view".into(),
                expected: "database_table".into(),
            })
        );
    }

    #[test]
    fn classification_references_become_attached_classifications() {
        let registry = default_registry();
        let mapping = registry.mapping_for_abstract_type("RelationalColumn").unwrap();
        let asset = RawAsset::new("c1", "database_column", "SSN").with_reference(
            "assigned_to_terms",
            RawReference {
                rid: "t9".into(),
                asset_type: "term".into(),
                name: "Confidential".into(),
            },
        );
        let entity = entity_from_asset("repo-1", mapping, &asset).unwrap();
        assert_eq!(entity.classifications.len(), 1);
        assert_eq!(entity.classifications[0].name, "Confidentiality");
        assert_eq!(
            entity.classifications[0].properties["level"],
            json!("Confidential")
        );
    }

    #[test]
    fn prefixed_mapping_yields_prefixed_guid_and_tag() {
        let registry = default_registry();
        let mapping = registry
            .mapping_for_abstract_type("RelationalDBSchemaType")
            .unwrap();
        let asset = RawAsset::new("s1", "database_schema", "HR");
        let entity = entity_from_asset("repo-1", mapping, &asset).unwrap();
        let decoded = EntityRef::from_guid(&entity.guid, "repo-1").unwrap();
        assert_eq!(decoded.prefix.as_deref(), Some("RDBST"));
        assert_eq!(entity.qualified_name(), Some("RDBST_database_schema::HR"));
    }

    #[test]
    fn reference_and_relationship_level_instances_share_shape() {
        let registry = default_registry();
        let defs = registry.relationship_defs_for_pair(
            "SemanticAssignment",
            "database_column",
            "term",
        );
        let (def, _) = defs[0];
        let column = RawAsset::new("c1", "database_column", "SSN");
        let term = RawAsset::new("t1", "term", "Social Security Number");
        let rel = relationship_between("repo-1", def, &column, &term);
        assert_eq!(rel.type_name, "SemanticAssignment");
        let decoded = RelationshipRef::from_guid(&rel.guid, "repo-1").unwrap();
        assert!(!decoded.rel_level);
        assert_eq!(rel.end_1.type_name, "RelationalColumn");
        assert_eq!(rel.end_2.type_name, "GlossaryTerm");
    }
}
