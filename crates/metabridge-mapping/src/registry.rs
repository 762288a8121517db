//! The immutable mapping registry.
//!
//! Built once at process start from a fixed list of mapping descriptors and
//! supertype edges, then shared read-only across concurrent requests. All
//! lookups are direct table lookups; an unmapped type is a data miss, not a
//! reflection failure.

use crate::hierarchy::{TypeHierarchy, UNIVERSAL_BASE_TYPE};
use crate::{
    ClassificationMapping, ComplexRule, MappingError, RelationshipEndDef, RelationshipMappingDef,
    TypeMapping,
};
use std::collections::{HashMap, HashSet};

pub struct MappingRegistry {
    mappings: Vec<TypeMapping>,
    by_abstract: HashMap<String, usize>,
    by_backend: HashMap<String, Vec<usize>>,
    hierarchy: TypeHierarchy,
    /// Known types whose implementation is deliberately absent.
    unsupported: HashSet<String>,
}

#[derive(Default)]
pub struct MappingRegistryBuilder {
    mappings: Vec<TypeMapping>,
    hierarchy: TypeHierarchy,
    unsupported: HashSet<String>,
}

impl MappingRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapping(mut self, mapping: TypeMapping) -> Self {
        assert!(
            !(mapping.sentinel && mapping.prefix.is_some()),
            "mapping `{}`: a synthetic prefix on a sentinel is a configuration defect",
            mapping.abstract_type
        );
        self.mappings.push(mapping);
        self
    }

    pub fn subtype(mut self, subtype: &str, supertype: &str) -> Self {
        self.hierarchy.add(subtype, supertype);
        self
    }

    pub fn unsupported(mut self, abstract_type: &str) -> Self {
        self.unsupported.insert(abstract_type.to_string());
        self
    }

    pub fn build(mut self) -> MappingRegistry {
        // Deterministic fan-out order for multi-mapping searches.
        self.mappings.sort_by(|a, b| a.abstract_type.cmp(&b.abstract_type));
        let mut by_abstract = HashMap::new();
        let mut by_backend: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, mapping) in self.mappings.iter().enumerate() {
            by_abstract.insert(mapping.abstract_type.clone(), i);
            if !mapping.sentinel {
                by_backend
                    .entry(mapping.backend_type.clone())
                    .or_default()
                    .push(i);
            }
        }
        MappingRegistry {
            mappings: self.mappings,
            by_abstract,
            by_backend,
            hierarchy: self.hierarchy,
            unsupported: self.unsupported,
        }
    }
}

impl MappingRegistry {
    pub fn builder() -> MappingRegistryBuilder {
        MappingRegistryBuilder::new()
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn mapping_for_abstract_type(&self, name: &str) -> Option<&TypeMapping> {
        self.by_abstract.get(name).map(|&i| &self.mappings[i])
    }

    /// All mappings backed by one backend type, one per synthetic prefix.
    pub fn mappings_for_backend_type(&self, asset_type: &str) -> Vec<&TypeMapping> {
        self.by_backend
            .get(asset_type)
            .map(|indexes| indexes.iter().map(|&i| &self.mappings[i]).collect())
            .unwrap_or_default()
    }

    /// The one mapping for a backend type under a specific prefix.
    pub fn mapping_for_backend(&self, asset_type: &str, prefix: Option<&str>) -> Option<&TypeMapping> {
        self.mappings_for_backend_type(asset_type)
            .into_iter()
            .find(|m| m.prefix.as_deref() == prefix)
    }

    /// Lookup by a structured identity's type tag (`[prefix_]backend_type`).
    pub fn mapping_for_type_tag(&self, type_tag: &str) -> Option<&TypeMapping> {
        self.mappings
            .iter()
            .find(|m| !m.sentinel && m.type_tag() == type_tag)
    }

    /// Every non-sentinel searchable mapping, in deterministic order; the
    /// fan-out set for unqualified searches.
    pub fn searchable_mappings(&self) -> Vec<&TypeMapping> {
        self.mappings
            .iter()
            .filter(|m| !m.sentinel && m.searchable)
            .collect()
    }

    /// Expand an abstract type (or supertype) to the searchable mappings a
    /// query for it must cover.
    ///
    /// The direct mapping is included when present and non-sentinel; every
    /// mapped transitive subtype that is searchable is added, except the
    /// universal base type. An `allowed_subtypes` filter narrows the result
    /// to the named abstract types.
    pub fn expand_to_searchable_subtypes(
        &self,
        name: &str,
        allowed_subtypes: Option<&[String]>,
    ) -> Result<Vec<&TypeMapping>, MappingError> {
        if self.unsupported.contains(name) {
            return Err(MappingError::TypeNotSupported(name.to_string()));
        }
        let direct = self.mapping_for_abstract_type(name);
        if direct.is_none() && !self.hierarchy.is_known(name) {
            return Err(MappingError::TypeNotMapped(name.to_string()));
        }

        let allowed = |candidate: &str| {
            allowed_subtypes
                .map(|list| list.iter().any(|t| t == candidate))
                .unwrap_or(true)
        };

        let mut out: Vec<&TypeMapping> = Vec::new();
        if let Some(mapping) = direct {
            if !mapping.sentinel && mapping.searchable && allowed(&mapping.abstract_type) {
                out.push(mapping);
            }
        }
        for mapping in &self.mappings {
            if mapping.sentinel
                || !mapping.searchable
                || mapping.abstract_type == name
                || mapping.abstract_type == UNIVERSAL_BASE_TYPE
            {
                continue;
            }
            if self.hierarchy.is_subtype_of(&mapping.abstract_type, name)
                && allowed(&mapping.abstract_type)
            {
                out.push(mapping);
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Relationship sub-mapping lookups
    // ------------------------------------------------------------------

    /// Relationship defs linking a pair of backend types under an abstract
    /// name, with the orientation of `(t1, t2)` relative to `(end_1, end_2)`.
    /// Includes relationship-level defs, so a reference-level alias of a
    /// relationship-level relationship still resolves.
    pub fn relationship_defs_for_pair(
        &self,
        abstract_name: &str,
        t1: &str,
        t2: &str,
    ) -> Vec<(&RelationshipMappingDef, bool)> {
        let mut out = Vec::new();
        for mapping in &self.mappings {
            for def in &mapping.relationships {
                if def.abstract_name != abstract_name {
                    continue;
                }
                if let Some(forward) = def.orientation(t1, t2) {
                    if !out.iter().any(|(existing, _): &(&RelationshipMappingDef, bool)| *existing == def) {
                        out.push((def, forward));
                    }
                }
            }
        }
        out
    }

    /// Relationship defs materialized from a relationship-level record of
    /// the given backend type.
    pub fn relationship_defs_for_linking_type(
        &self,
        abstract_name: &str,
        linking_type: &str,
    ) -> Vec<&RelationshipMappingDef> {
        let mut out: Vec<&RelationshipMappingDef> = Vec::new();
        for mapping in &self.mappings {
            for def in &mapping.relationships {
                if def.abstract_name == abstract_name
                    && def.linking_type.as_deref() == Some(linking_type)
                    && !out.iter().any(|existing| *existing == def)
                {
                    out.push(def);
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Type-gallery listings
    // ------------------------------------------------------------------

    /// Abstract entity types this connector implements.
    pub fn mapped_entity_types(&self) -> Vec<&str> {
        self.mappings
            .iter()
            .map(|m| m.abstract_type.as_str())
            .collect()
    }

    /// Abstract relationship types this connector implements.
    pub fn mapped_relationship_types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .mappings
            .iter()
            .flat_map(|m| m.relationships.iter().map(|d| d.abstract_name.as_str()))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Abstract classification types this connector implements.
    pub fn mapped_classification_types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .mappings
            .iter()
            .flat_map(|m| m.classifications.iter().map(|c| c.abstract_name.as_str()))
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

// ============================================================================
// Built-in mapping set
// ============================================================================

/// The statically declared mapping table for the supported backend catalog.
///
/// Population happens here, at startup, from this fixed list, never by
/// scanning for mapper implementations at runtime.
pub fn default_registry() -> MappingRegistry {
    let attribute_for_schema = RelationshipMappingDef {
        abstract_name: "AttributeForSchema".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "RelationalDBSchemaType".to_string(),
            backend_type: "database_schema".to_string(),
            prefix: Some("RDBST".to_string()),
            ref_property: Some("database_tables".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "RelationalTable".to_string(),
            backend_type: "database_table".to_string(),
            prefix: None,
            ref_property: Some("database_schema".to_string()),
        },
        linking_type: None,
    };
    let nested_schema_attribute = RelationshipMappingDef {
        abstract_name: "NestedSchemaAttribute".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "RelationalTable".to_string(),
            backend_type: "database_table".to_string(),
            prefix: None,
            ref_property: Some("database_columns".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "RelationalColumn".to_string(),
            backend_type: "database_column".to_string(),
            prefix: None,
            ref_property: Some("database_table_or_view".to_string()),
        },
        linking_type: None,
    };
    let semantic_assignment = RelationshipMappingDef {
        abstract_name: "SemanticAssignment".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "RelationalColumn".to_string(),
            backend_type: "database_column".to_string(),
            prefix: None,
            ref_property: Some("assigned_to_terms".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("assigned_assets".to_string()),
        },
        linking_type: None,
    };
    let synonym = RelationshipMappingDef {
        abstract_name: "Synonym".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("synonyms".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("synonyms".to_string()),
        },
        linking_type: None,
    };
    let related_term = RelationshipMappingDef {
        abstract_name: "RelatedTerm".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("related_terms".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("related_terms".to_string()),
        },
        linking_type: None,
    };
    let term_categorization = RelationshipMappingDef {
        abstract_name: "TermCategorization".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "GlossaryCategory".to_string(),
            backend_type: "category".to_string(),
            prefix: None,
            ref_property: Some("terms".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "GlossaryTerm".to_string(),
            backend_type: "term".to_string(),
            prefix: None,
            ref_property: Some("parent_category".to_string()),
        },
        linking_type: None,
    };
    // Relationship-level: the backend stores data-class assignments as
    // first-class `classification` records pointing at both ends.
    let data_class_assignment = RelationshipMappingDef {
        abstract_name: "DataClassAssignment".to_string(),
        end_1: RelationshipEndDef {
            abstract_type: "RelationalColumn".to_string(),
            backend_type: "database_column".to_string(),
            prefix: None,
            ref_property: Some("classifies_asset".to_string()),
        },
        end_2: RelationshipEndDef {
            abstract_type: "DataClass".to_string(),
            backend_type: "data_class".to_string(),
            prefix: None,
            ref_property: Some("data_class".to_string()),
        },
        linking_type: Some("classification".to_string()),
    };

    let confidentiality = ClassificationMapping {
        abstract_name: "Confidentiality".to_string(),
        backend_property: "assigned_to_terms".to_string(),
        value_property: "level".to_string(),
    };
    let subject_area = ClassificationMapping {
        abstract_name: "SubjectArea".to_string(),
        backend_property: "category_path".to_string(),
        value_property: "name".to_string(),
    };

    MappingRegistry::builder()
        // Supertype placeholders: expanded, never searched directly.
        .mapping(TypeMapping::sentinel("Asset"))
        .mapping(TypeMapping::sentinel("DataStore"))
        .mapping(TypeMapping::sentinel("SchemaElement"))
        .mapping(TypeMapping::sentinel("SchemaAttribute"))
        .mapping(TypeMapping::sentinel("SchemaType"))
        .mapping(
            TypeMapping::new("Database", "database")
                .with_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_property("databaseType", "dbms_type")
                .with_complex("qualifiedName", ComplexRule::QualifiedName),
        )
        .mapping(
            TypeMapping::new("DeployedDatabaseSchema", "database_schema")
                .with_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_complex("qualifiedName", ComplexRule::QualifiedName),
        )
        .mapping(
            // Synthesized sub-entity: same backend record as
            // DeployedDatabaseSchema, distinguished by prefix.
            TypeMapping::new("RelationalDBSchemaType", "database_schema")
                .with_prefix("RDBST")
                .with_property("displayName", "_name")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_relationship(attribute_for_schema.clone()),
        )
        .mapping(
            TypeMapping::new("RelationalTable", "database_table")
                .with_required_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_classification(confidentiality.clone())
                .with_relationship(attribute_for_schema)
                .with_relationship(nested_schema_attribute.clone()),
        )
        .mapping(
            TypeMapping::new("RelationalColumn", "database_column")
                .with_required_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_property("dataType", "data_type")
                .with_property("position", "position")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_classification(confidentiality)
                .with_relationship(nested_schema_attribute)
                .with_relationship(semantic_assignment.clone())
                .with_relationship(data_class_assignment.clone()),
        )
        .mapping(
            TypeMapping::new("DataClass", "data_class")
                .with_property("name", "_name")
                .with_property("example", "example")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_relationship(data_class_assignment),
        )
        .mapping(
            TypeMapping::new("GlossaryTerm", "term")
                .with_required_property("displayName", "_name")
                .with_property("summary", "short_description")
                .with_property("description", "long_description")
                .with_property("examples", "example")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_relationship(semantic_assignment)
                .with_relationship(synonym)
                .with_relationship(related_term)
                .with_relationship(term_categorization.clone()),
        )
        .mapping(
            TypeMapping::new("GlossaryCategory", "category")
                .with_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_complex("qualifiedName", ComplexRule::QualifiedName)
                .with_classification(subject_area)
                .with_relationship(term_categorization),
        )
        .mapping(
            // Synthesized from root-level category records.
            TypeMapping::new("Glossary", "category")
                .with_prefix("GLOSSARY")
                .with_property("displayName", "_name")
                .with_property("description", "short_description")
                .with_complex("qualifiedName", ComplexRule::QualifiedName),
        )
        .subtype("Asset", UNIVERSAL_BASE_TYPE)
        .subtype("DataStore", "Asset")
        .subtype("Database", "DataStore")
        .subtype("DeployedDatabaseSchema", "Asset")
        .subtype("SchemaElement", UNIVERSAL_BASE_TYPE)
        .subtype("SchemaType", "SchemaElement")
        .subtype("SchemaAttribute", "SchemaElement")
        .subtype("RelationalDBSchemaType", "SchemaType")
        .subtype("RelationalTable", "SchemaAttribute")
        .subtype("RelationalColumn", "SchemaAttribute")
        .subtype("DataClass", UNIVERSAL_BASE_TYPE)
        .subtype("GlossaryTerm", UNIVERSAL_BASE_TYPE)
        .subtype("GlossaryCategory", UNIVERSAL_BASE_TYPE)
        .subtype("Glossary", UNIVERSAL_BASE_TYPE)
        .subtype("InformalTag", UNIVERSAL_BASE_TYPE)
        .unsupported("InformalTag")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_for_leaf_type_is_exactly_its_own_mapping() {
        let registry = default_registry();
        let expanded = registry
            .expand_to_searchable_subtypes("GlossaryTerm", None)
            .unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].abstract_type, "GlossaryTerm");
    }

    #[test]
    fn supertype_expansion_includes_all_mapped_subtypes() {
        let registry = default_registry();
        let expanded = registry
            .expand_to_searchable_subtypes("SchemaElement", None)
            .unwrap();
        let names: Vec<&str> = expanded.iter().map(|m| m.abstract_type.as_str()).collect();
        assert_eq!(
            names,
            vec!["RelationalColumn", "RelationalDBSchemaType", "RelationalTable"]
        );
    }

    #[test]
    fn expansion_never_includes_the_universal_base_or_sentinels() {
        let registry = default_registry();
        let expanded = registry
            .expand_to_searchable_subtypes(UNIVERSAL_BASE_TYPE, None)
            .unwrap();
        assert!(!expanded.is_empty());
        for mapping in &expanded {
            assert_ne!(mapping.abstract_type, UNIVERSAL_BASE_TYPE);
            assert!(!mapping.sentinel);
            assert!(mapping.searchable);
        }
    }

    #[test]
    fn subtype_filter_narrows_without_rederiving_the_hierarchy() {
        let registry = default_registry();
        let expanded = registry
            .expand_to_searchable_subtypes(
                "SchemaElement",
                Some(&["RelationalColumn".to_string()]),
            )
            .unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].abstract_type, "RelationalColumn");
    }

    #[test]
    fn unknown_vs_unsupported_types_are_distinguished() {
        let registry = default_registry();
        assert_eq!(
            registry.expand_to_searchable_subtypes("NoSuchType", None),
            Err(MappingError::TypeNotMapped("NoSuchType".to_string()))
        );
        assert_eq!(
            registry.expand_to_searchable_subtypes("InformalTag", None),
            Err(MappingError::TypeNotSupported("InformalTag".to_string()))
        );
    }

    #[test]
    fn one_backend_type_backs_several_abstract_types_via_prefixes() {
        let registry = default_registry();
        let mappings = registry.mappings_for_backend_type("database_schema");
        let mut names: Vec<&str> = mappings.iter().map(|m| m.abstract_type.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["DeployedDatabaseSchema", "RelationalDBSchemaType"]);

        let prefixed = registry
            .mapping_for_backend("database_schema", Some("RDBST"))
            .unwrap();
        assert_eq!(prefixed.abstract_type, "RelationalDBSchemaType");
        assert_eq!(prefixed.type_tag(), "RDBST_database_schema");
    }

    #[test]
    fn type_tag_lookup_resolves_prefixed_and_plain_tags() {
        let registry = default_registry();
        assert_eq!(
            registry.mapping_for_type_tag("term").unwrap().abstract_type,
            "GlossaryTerm"
        );
        assert_eq!(
            registry
                .mapping_for_type_tag("GLOSSARY_category")
                .unwrap()
                .abstract_type,
            "Glossary"
        );
        assert!(registry.mapping_for_type_tag("no_such_tag").is_none());
    }

    #[test]
    fn relationship_defs_resolve_by_pair_in_either_orientation() {
        let registry = default_registry();
        let forward =
            registry.relationship_defs_for_pair("SemanticAssignment", "database_column", "term");
        assert_eq!(forward.len(), 1);
        assert!(forward[0].1);

        let backward =
            registry.relationship_defs_for_pair("SemanticAssignment", "term", "database_column");
        assert_eq!(backward.len(), 1);
        assert!(!backward[0].1);
    }

    #[test]
    fn relationship_defs_resolve_by_linking_type() {
        let registry = default_registry();
        let defs =
            registry.relationship_defs_for_linking_type("DataClassAssignment", "classification");
        assert_eq!(defs.len(), 1);
        assert!(defs[0].is_relationship_level());
    }

    #[test]
    fn type_gallery_listings_are_deduplicated() {
        let registry = default_registry();
        assert!(registry.mapped_entity_types().contains(&"GlossaryTerm"));
        let rels = registry.mapped_relationship_types();
        assert_eq!(
            rels.iter().filter(|r| **r == "SemanticAssignment").count(),
            1
        );
        assert!(registry
            .mapped_classification_types()
            .contains(&"Confidentiality"));
    }
}
