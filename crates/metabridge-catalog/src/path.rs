//! Structured hierarchical identities (`[prefix_]TYPE::Seg::Seg…`).
//!
//! The canonical unique name of a mapped entity is its backend containment
//! path rendered behind a type tag, e.g. `database_table::SAMPLE::EMPLOYEE`
//! or, for a synthesized sub-entity, `DEPLOYED_database_schema::DB2::HR`.
//! The query translator parses caller-supplied unique names back into this
//! structure: a full (non-partial) parse lets a search be narrowed to the
//! one mapping whose type tag matches, instead of fanning out to every
//! registered mapping.

use crate::asset::RawAsset;
use serde::{Deserialize, Serialize};

const PATH_SEPARATOR: &str = "::";

/// A parsed or derived hierarchical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPath {
    /// `backend_type` or `prefix_backend_type` for synthesized sub-entities.
    pub type_tag: String,
    /// Containment path, outermost first, ending with the record's own name.
    pub segments: Vec<String>,
    /// True when the string was missing segments (leading/trailing
    /// separator or no path at all). Partial identities never narrow a
    /// search.
    pub partial: bool,
}

impl AssetPath {
    /// The tag a mapping with this backend type and prefix renders.
    pub fn type_tag_for(backend_type: &str, prefix: Option<&str>) -> String {
        match prefix {
            Some(p) => format!("{p}_{backend_type}"),
            None => backend_type.to_string(),
        }
    }

    /// Derive the identity of a record under a given synthetic prefix.
    pub fn from_asset(asset: &RawAsset, prefix: Option<&str>) -> Self {
        let mut segments: Vec<String> = asset.context.iter().map(|c| c.name.clone()).collect();
        segments.push(asset.name.clone());
        Self {
            type_tag: Self::type_tag_for(&asset.asset_type, prefix),
            segments,
            partial: false,
        }
    }

    /// Parse an identity-shaped string. Returns `None` for strings that are
    /// not identity-shaped at all (no separator); callers fall back to
    /// ordinary value matching for those.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.contains(PATH_SEPARATOR) {
            return None;
        }
        let raw: Vec<&str> = text.split(PATH_SEPARATOR).collect();
        let partial = raw.iter().any(|segment| segment.is_empty());
        let mut parts = raw.into_iter().filter(|s| !s.is_empty());
        let type_tag = parts.next()?.to_string();
        let segments: Vec<String> = parts.map(str::to_string).collect();
        Some(Self {
            type_tag,
            segments,
            partial: partial || text.starts_with(PATH_SEPARATOR),
        })
    }

    pub fn render(&self) -> String {
        let mut out = self.type_tag.clone();
        for segment in &self.segments {
            out.push_str(PATH_SEPARATOR);
            out.push_str(segment);
        }
        out
    }

    /// The record's own name (last path segment).
    pub fn leaf_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}
