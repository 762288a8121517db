//! Type-mapping descriptors and the inheritance-aware registry.
//!
//! A `TypeMapping` binds one abstract (federation-side) type to one backend
//! asset type, with declared property, classification, and relationship
//! sub-mappings. Mappings are plain data: tagged variants plus pure
//! translation functions, composed through an immutable `MappingRegistry`
//! built once at startup. There is no mapper class hierarchy and no runtime
//! name resolution: "type not mapped" is a table-lookup miss.

pub mod convert;
pub mod hierarchy;
pub mod registry;

pub use convert::{
    entity_from_asset, proxy_from_asset, proxy_from_reference, relationship_between,
    relationship_from_linking, relationship_with_reference, ConvertError,
};
pub use hierarchy::{TypeHierarchy, UNIVERSAL_BASE_TYPE};
pub use registry::{default_registry, MappingRegistry, MappingRegistryBuilder};

use metabridge_catalog::AssetPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Abstract type unknown, or known but mapped to nothing.
    #[error("abstract type `{0}` is not mapped to any backend type")]
    TypeNotMapped(String),
    /// Known type whose implementation is deliberately absent.
    #[error("abstract type `{0}` is known but not supported by this connector")]
    TypeNotSupported(String),
}

// ============================================================================
// Property sub-mappings
// ============================================================================

/// Simple 1:1 property mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMapping {
    pub abstract_name: String,
    pub backend_property: String,
    /// A record missing this property cannot be converted and is dropped.
    #[serde(default)]
    pub required: bool,
}

/// Computed property rules. These replace per-type mapper subclasses: each
/// rule is a closed variant the conversion function interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ComplexRule {
    /// A fixed value, identical for every record of the type.
    Constant { value: Value },
    /// The record's structured identity rendered as a unique name
    /// (`[prefix_]TYPE::Seg::…`).
    QualifiedName,
    /// First non-empty string among the named backend properties.
    FirstNonEmpty { backend_properties: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexMapping {
    pub abstract_name: String,
    pub rule: ComplexRule,
}

// ============================================================================
// Classification sub-mappings
// ============================================================================

/// Maps an abstract classification to a reference-valued backend property:
/// each referenced record becomes one attached classification, its name
/// carried in `value_property`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationMapping {
    pub abstract_name: String,
    pub backend_property: String,
    /// Abstract property receiving the referenced record's name.
    pub value_property: String,
}

// ============================================================================
// Relationship sub-mappings
// ============================================================================

/// One endpoint of a relationship sub-mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEndDef {
    pub abstract_type: String,
    pub backend_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Reference-level: property on *this end's* record listing the other
    /// end. Relationship-level: property on the *linking* record naming this
    /// end. `None` when the backend stores no reference in this direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_property: Option<String>,
}

/// Binds one abstract relationship type to the backend structures that
/// imply it: either a reference field between two first-class records, or a
/// single relationship-level record (`linking_type`) standing for the
/// relationship itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMappingDef {
    pub abstract_name: String,
    pub end_1: RelationshipEndDef,
    pub end_2: RelationshipEndDef,
    /// Backend type of the relationship-level record, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linking_type: Option<String>,
}

impl RelationshipMappingDef {
    pub fn is_relationship_level(&self) -> bool {
        self.linking_type.is_some()
    }

    /// Whether this def links the given pair of backend types, and if so,
    /// whether `(t1, t2)` is the `(end_1, end_2)` orientation.
    pub fn orientation(&self, t1: &str, t2: &str) -> Option<bool> {
        if self.end_1.backend_type == t1 && self.end_2.backend_type == t2 {
            Some(true)
        } else if self.end_1.backend_type == t2 && self.end_2.backend_type == t1 {
            Some(false)
        } else {
            None
        }
    }
}

// ============================================================================
// Type mapping
// ============================================================================

/// Binds one abstract type to one backend asset type.
///
/// A mapping with a synthetic prefix represents a sub-entity synthesized
/// from a parent backend record; it is never a sentinel. Sentinel mappings
/// exist only so an abstract supertype with no backend counterpart can be
/// expanded to its mapped subtypes before any search executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    pub abstract_type: String,
    pub backend_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default = "default_true")]
    pub searchable: bool,
    #[serde(default)]
    pub sentinel: bool,
    #[serde(default)]
    pub properties: Vec<PropertyMapping>,
    #[serde(default)]
    pub complex: Vec<ComplexMapping>,
    #[serde(default)]
    pub classifications: Vec<ClassificationMapping>,
    #[serde(default)]
    pub relationships: Vec<RelationshipMappingDef>,
}

fn default_true() -> bool {
    true
}

impl TypeMapping {
    pub fn new(abstract_type: impl Into<String>, backend_type: impl Into<String>) -> Self {
        Self {
            abstract_type: abstract_type.into(),
            backend_type: backend_type.into(),
            prefix: None,
            searchable: true,
            sentinel: false,
            properties: Vec::new(),
            complex: Vec::new(),
            classifications: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// A supertype-only placeholder; expanded to subtypes, never searched.
    pub fn sentinel(abstract_type: impl Into<String>) -> Self {
        let abstract_type = abstract_type.into();
        Self {
            backend_type: String::new(),
            searchable: false,
            sentinel: true,
            ..Self::new(abstract_type, "")
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        debug_assert!(!self.sentinel, "sentinel mappings never carry a prefix");
        self.prefix = Some(prefix.into());
        self
    }

    pub fn unsearchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    pub fn with_property(
        mut self,
        abstract_name: impl Into<String>,
        backend_property: impl Into<String>,
    ) -> Self {
        self.properties.push(PropertyMapping {
            abstract_name: abstract_name.into(),
            backend_property: backend_property.into(),
            required: false,
        });
        self
    }

    pub fn with_required_property(
        mut self,
        abstract_name: impl Into<String>,
        backend_property: impl Into<String>,
    ) -> Self {
        self.properties.push(PropertyMapping {
            abstract_name: abstract_name.into(),
            backend_property: backend_property.into(),
            required: true,
        });
        self
    }

    pub fn with_complex(mut self, abstract_name: impl Into<String>, rule: ComplexRule) -> Self {
        self.complex.push(ComplexMapping {
            abstract_name: abstract_name.into(),
            rule,
        });
        self
    }

    pub fn with_classification(mut self, classification: ClassificationMapping) -> Self {
        self.classifications.push(classification);
        self
    }

    pub fn with_relationship(mut self, def: RelationshipMappingDef) -> Self {
        self.relationships.push(def);
        self
    }

    /// The tag this mapping renders in structured identities.
    pub fn type_tag(&self) -> String {
        AssetPath::type_tag_for(&self.backend_type, self.prefix.as_deref())
    }

    pub fn backend_property_for(&self, abstract_name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.abstract_name == abstract_name)
            .map(|p| p.backend_property.as_str())
    }

    pub fn classification_mapping(&self, abstract_name: &str) -> Option<&ClassificationMapping> {
        self.classifications
            .iter()
            .find(|c| c.abstract_name == abstract_name)
    }

    /// Every backend property this mapping reads; used to project searches
    /// and by-id fetches.
    pub fn projected_properties(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .properties
            .iter()
            .map(|p| p.backend_property.clone())
            .collect();
        for complex in &self.complex {
            if let ComplexRule::FirstNonEmpty { backend_properties } = &complex.rule {
                out.extend(backend_properties.iter().cloned());
            }
        }
        out.extend(
            self.classifications
                .iter()
                .map(|c| c.backend_property.clone()),
        );
        for def in &self.relationships {
            for end in [&def.end_1, &def.end_2] {
                if let Some(p) = &end.ref_property {
                    out.push(p.clone());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }
}
