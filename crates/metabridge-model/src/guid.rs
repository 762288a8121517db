//! Stable identity codec for entities and relationships.
//!
//! A GUID is an opaque string the federation framework hands back to us on
//! later calls, so encoding must be deterministic and unambiguous: the same
//! components always produce the same string, and a string decomposes into
//! exactly one component tuple. Component values (record ids in particular)
//! may contain any character, so components are percent-escaped before being
//! joined; naive delimiter-joining would make `a:b` + `c` indistinguishable
//! from `a` + `b:c`.
//!
//! Entity GUIDs carry the home collection id, the backend asset type, the
//! backend record id, and the optional synthetic prefix (non-empty only for
//! sub-entities synthesized out of a parent backend record). Relationship
//! GUIDs additionally carry both endpoint descriptors in canonical order and
//! a flag saying whether the relationship is materialized from a single
//! relationship-level backend record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading tag for entity GUIDs.
const ENTITY_TAG: &str = "e";
/// Leading tag for relationship GUIDs.
const RELATIONSHIP_TAG: &str = "r";
/// Component separator; escaped inside component values.
const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The string does not decompose into the expected components.
    #[error("identity `{guid}` is malformed: {reason}")]
    Malformed { guid: String, reason: String },
    /// Structurally valid, but owned by a different home collection.
    #[error("identity `{guid}` belongs to home collection `{actual}`, not `{expected}`")]
    ForeignHome {
        guid: String,
        actual: String,
        expected: String,
    },
}

impl IdentityError {
    fn malformed(guid: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            guid: guid.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Component escaping
// ============================================================================

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(component: &str, guid: &str) -> Result<String, IdentityError> {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take(2).collect();
        match hex.as_str() {
            "25" => out.push('%'),
            "3A" => out.push(SEPARATOR),
            other => {
                return Err(IdentityError::malformed(
                    guid,
                    format!("invalid escape sequence `%{other}`"),
                ));
            }
        }
    }
    Ok(out)
}

fn split_components<'a>(
    guid: &'a str,
    expected_tag: &str,
    expected_len: usize,
) -> Result<Vec<&'a str>, IdentityError> {
    let parts: Vec<&str> = guid.split(SEPARATOR).collect();
    if parts.len() != expected_len {
        return Err(IdentityError::malformed(
            guid,
            format!("expected {expected_len} components, found {}", parts.len()),
        ));
    }
    if parts[0] != expected_tag {
        return Err(IdentityError::malformed(
            guid,
            format!("expected `{expected_tag}` tag, found `{}`", parts[0]),
        ));
    }
    Ok(parts)
}

fn check_home(guid: &str, actual: String, expected: &str) -> Result<String, IdentityError> {
    if actual != expected {
        return Err(IdentityError::ForeignHome {
            guid: guid.to_string(),
            actual,
            expected: expected.to_string(),
        });
    }
    Ok(actual)
}

// ============================================================================
// Entity identity
// ============================================================================

/// Composite identity of a federated entity.
///
/// Never persisted: always recomputed from the backend record plus its
/// owning type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub home_id: String,
    pub asset_type: String,
    pub rid: String,
    /// Synthetic prefix, set only when the abstract type is synthesized from
    /// part of the parent backend record.
    pub prefix: Option<String>,
}

impl EntityRef {
    pub fn new(
        home_id: impl Into<String>,
        asset_type: impl Into<String>,
        rid: impl Into<String>,
        prefix: Option<String>,
    ) -> Self {
        Self {
            home_id: home_id.into(),
            asset_type: asset_type.into(),
            rid: rid.into(),
            prefix,
        }
    }

    /// Encode into an opaque GUID string. Pure: identical inputs always
    /// produce the identical string.
    pub fn to_guid(&self) -> String {
        format!(
            "{ENTITY_TAG}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            escape(&self.home_id),
            escape(&self.asset_type),
            escape(&self.rid),
            escape(self.prefix.as_deref().unwrap_or("")),
        )
    }

    /// Decode a GUID, verifying it belongs to `expected_home`.
    pub fn from_guid(guid: &str, expected_home: &str) -> Result<Self, IdentityError> {
        let parts = split_components(guid, ENTITY_TAG, 5)?;
        let home_id = check_home(guid, unescape(parts[1], guid)?, expected_home)?;
        let asset_type = unescape(parts[2], guid)?;
        let rid = unescape(parts[3], guid)?;
        let prefix = unescape(parts[4], guid)?;
        if asset_type.is_empty() || rid.is_empty() {
            return Err(IdentityError::malformed(
                guid,
                "asset type and record id must be non-empty",
            ));
        }
        Ok(Self {
            home_id,
            asset_type,
            rid,
            prefix: if prefix.is_empty() { None } else { Some(prefix) },
        })
    }
}

// ============================================================================
// Relationship identity
// ============================================================================

/// One endpoint of a relationship identity: the backend descriptor only.
/// Abstract endpoint types are recovered from the relationship sub-mapping
/// during resolution, not stored in the GUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointRef {
    pub asset_type: String,
    pub rid: String,
}

impl EndpointRef {
    pub fn new(asset_type: impl Into<String>, rid: impl Into<String>) -> Self {
        Self {
            asset_type: asset_type.into(),
            rid: rid.into(),
        }
    }
}

/// Composite identity of a federated relationship.
///
/// Endpoints are held in canonical `(asset_type, rid)` order so the same
/// logical relationship yields the same GUID regardless of which endpoint
/// initiated the lookup. `rel_level` is true when the relationship is
/// materialized from a single backend record standing for the relationship
/// itself; in that case both endpoint descriptors name that linking record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub home_id: String,
    pub rel_type: String,
    pub endpoint_a: EndpointRef,
    pub endpoint_b: EndpointRef,
    pub rel_level: bool,
}

impl RelationshipRef {
    /// Construct with canonical endpoint ordering applied.
    pub fn new(
        home_id: impl Into<String>,
        rel_type: impl Into<String>,
        end_1: EndpointRef,
        end_2: EndpointRef,
        rel_level: bool,
    ) -> Self {
        let (endpoint_a, endpoint_b) = if end_1 <= end_2 {
            (end_1, end_2)
        } else {
            (end_2, end_1)
        };
        Self {
            home_id: home_id.into(),
            rel_type: rel_type.into(),
            endpoint_a,
            endpoint_b,
            rel_level,
        }
    }

    pub fn to_guid(&self) -> String {
        format!(
            "{RELATIONSHIP_TAG}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            escape(&self.home_id),
            escape(&self.rel_type),
            if self.rel_level { "1" } else { "0" },
            escape(&self.endpoint_a.asset_type),
            escape(&self.endpoint_a.rid),
            escape(&self.endpoint_b.asset_type),
            escape(&self.endpoint_b.rid),
        )
    }

    pub fn from_guid(guid: &str, expected_home: &str) -> Result<Self, IdentityError> {
        let parts = split_components(guid, RELATIONSHIP_TAG, 8)?;
        let home_id = check_home(guid, unescape(parts[1], guid)?, expected_home)?;
        let rel_type = unescape(parts[2], guid)?;
        let rel_level = match parts[3] {
            "1" => true,
            "0" => false,
            other => {
                return Err(IdentityError::malformed(
                    guid,
                    format!("invalid relationship-level flag `{other}`"),
                ));
            }
        };
        let endpoint_a = EndpointRef::new(unescape(parts[4], guid)?, unescape(parts[5], guid)?);
        let endpoint_b = EndpointRef::new(unescape(parts[6], guid)?, unescape(parts[7], guid)?);
        if rel_type.is_empty() {
            return Err(IdentityError::malformed(guid, "empty relationship type"));
        }
        if endpoint_a > endpoint_b {
            return Err(IdentityError::malformed(
                guid,
                "endpoints are not in canonical order",
            ));
        }
        Ok(Self {
            home_id,
            rel_type,
            endpoint_a,
            endpoint_b,
            rel_level,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
