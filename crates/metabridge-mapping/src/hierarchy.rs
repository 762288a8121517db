//! Abstract type hierarchy.
//!
//! Single-inheritance supertype edges, declared statically alongside the
//! mapping table. Expansion walks this to include every mapped subtype of a
//! requested supertype.

use std::collections::HashMap;

/// Root of the abstract type system. Deliberately excluded from subtype
/// expansion: a search over it would silently include ungoverned internal
/// object kinds the backend exposes but the federation does not govern.
pub const UNIVERSAL_BASE_TYPE: &str = "Referenceable";

#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    /// subtype → direct supertype.
    supertypes: HashMap<String, String>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subtype: impl Into<String>, supertype: impl Into<String>) {
        self.supertypes.insert(subtype.into(), supertype.into());
    }

    pub fn is_known(&self, name: &str) -> bool {
        name == UNIVERSAL_BASE_TYPE
            || self.supertypes.contains_key(name)
            || self.supertypes.values().any(|s| s == name)
    }

    pub fn direct_supertype(&self, name: &str) -> Option<&str> {
        self.supertypes.get(name).map(String::as_str)
    }

    /// Transitive, irreflexive subtype check.
    pub fn is_subtype_of(&self, subtype: &str, supertype: &str) -> bool {
        let mut current = subtype;
        // Walk up; hierarchies are shallow and acyclic by construction, but
        // bound the walk anyway so a miswired table cannot loop.
        for _ in 0..64 {
            match self.direct_supertype(current) {
                Some(parent) if parent == supertype => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> TypeHierarchy {
        let mut h = TypeHierarchy::new();
        h.add("Asset", UNIVERSAL_BASE_TYPE);
        h.add("DataStore", "Asset");
        h.add("Database", "DataStore");
        h.add("SchemaElement", UNIVERSAL_BASE_TYPE);
        h.add("SchemaAttribute", "SchemaElement");
        h.add("RelationalTable", "SchemaAttribute");
        h
    }

    #[test]
    fn transitive_walk_reaches_distant_supertypes() {
        let h = hierarchy();
        assert!(h.is_subtype_of("Database", "Asset"));
        assert!(h.is_subtype_of("Database", UNIVERSAL_BASE_TYPE));
        assert!(h.is_subtype_of("RelationalTable", "SchemaElement"));
        assert!(!h.is_subtype_of("Database", "SchemaElement"));
    }

    #[test]
    fn subtyping_is_irreflexive() {
        let h = hierarchy();
        assert!(!h.is_subtype_of("Database", "Database"));
    }

    #[test]
    fn known_covers_both_edge_directions_and_the_root() {
        let h = hierarchy();
        assert!(h.is_known("RelationalTable"));
        assert!(h.is_known("Asset"));
        assert!(h.is_known(UNIVERSAL_BASE_TYPE));
        assert!(!h.is_known("NoSuchType"));
    }
}
