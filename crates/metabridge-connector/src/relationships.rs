//! Relationship resolution and one-hop enumeration.
//!
//! A relationship GUID decomposes into its endpoint descriptors plus the
//! relationship-level flag, so resolution re-derives the instance from the
//! backend instead of looking anything up in local state:
//!
//! - relationship-level: both endpoint descriptors name the linking record;
//!   fetch it, follow its reference properties to the true endpoints.
//! - reference-level: fetch both endpoint records and verify the reference
//!   that implies the relationship actually exists. Both endpoints are
//!   checked symmetrically, whichever direction the backend stores the
//!   reference in.
//!
//! A reference-level GUID whose endpoints are linked through a
//! relationship-level record still resolves: the canonical
//! relationship-level instance is returned in its place.

use crate::{CancelFlag, FederationError};
use metabridge_catalog::{
    CatalogClient, NativeSearch, RawAsset, RecordCache, SearchCondition, SearchConditionSet,
    SearchOperator, SearchSort, RECORD_ID_PROPERTY,
};
use metabridge_mapping::{convert, MappingRegistry, RelationshipEndDef, RelationshipMappingDef};
use metabridge_model::{EntityRef, Paging, RelationshipInstance, RelationshipRef};
use serde_json::Value;

pub struct RelationshipResolver<'a> {
    home_id: &'a str,
    registry: &'a MappingRegistry,
    client: &'a dyn CatalogClient,
    cancel: &'a CancelFlag,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(
        home_id: &'a str,
        registry: &'a MappingRegistry,
        client: &'a dyn CatalogClient,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            home_id,
            registry,
            client,
            cancel,
        }
    }

    fn not_known(&self, operation: &'static str, guid: &str) -> FederationError {
        FederationError::RelationshipNotKnown {
            operation,
            guid: guid.to_string(),
            home_id: self.home_id.to_string(),
        }
    }

    async fn fetch(
        &self,
        operation: &'static str,
        cache: &mut RecordCache,
        rid: &str,
    ) -> Result<Option<RawAsset>, FederationError> {
        self.cancel.guard(operation)?;
        cache
            .record_by_id(self.client, rid, &[])
            .await
            .map_err(|e| FederationError::backend(operation, e))
    }

    /// Resolve a relationship GUID back to its instance.
    pub async fn resolve(
        &self,
        operation: &'static str,
        guid: &str,
    ) -> Result<RelationshipInstance, FederationError> {
        let identity = RelationshipRef::from_guid(guid, self.home_id).map_err(|source| {
            FederationError::MalformedIdentity {
                operation,
                guid: guid.to_string(),
                source,
            }
        })?;
        let mut cache = RecordCache::new();
        if identity.rel_level {
            self.resolve_relationship_level(operation, guid, &identity, &mut cache)
                .await
        } else {
            self.resolve_reference_level(operation, guid, &identity, &mut cache)
                .await
        }
    }

    async fn resolve_relationship_level(
        &self,
        operation: &'static str,
        guid: &str,
        identity: &RelationshipRef,
        cache: &mut RecordCache,
    ) -> Result<RelationshipInstance, FederationError> {
        // Both endpoint descriptors of a relationship-level GUID name the
        // linking record itself.
        if identity.endpoint_a != identity.endpoint_b {
            return Err(self.not_known(operation, guid));
        }
        let defs = self
            .registry
            .relationship_defs_for_linking_type(&identity.rel_type, &identity.endpoint_a.asset_type);
        if defs.is_empty() {
            return Err(FederationError::TypeNotMapped {
                operation,
                type_name: identity.rel_type.clone(),
            });
        }
        let linking = self
            .fetch(operation, cache, &identity.endpoint_a.rid)
            .await?
            .filter(|record| record.asset_type == identity.endpoint_a.asset_type)
            .ok_or_else(|| self.not_known(operation, guid))?;

        for def in defs {
            if let Some(instance) = self
                .materialize_from_linking(operation, cache, def, &linking)
                .await?
            {
                if instance.guid == guid {
                    return Ok(instance);
                }
            }
        }
        Err(self.not_known(operation, guid))
    }

    /// Follow a linking record's reference properties to both endpoints and
    /// materialize the relationship-level instance, or `None` when either
    /// reference is absent or points at a vanished record.
    async fn materialize_from_linking(
        &self,
        operation: &'static str,
        cache: &mut RecordCache,
        def: &RelationshipMappingDef,
        linking: &RawAsset,
    ) -> Result<Option<RelationshipInstance>, FederationError> {
        let (Some(ref_1), Some(ref_2)) = (
            def.end_1.ref_property.as_deref(),
            def.end_2.ref_property.as_deref(),
        ) else {
            return Ok(None);
        };
        let (Some(target_1), Some(target_2)) = (
            linking.references(ref_1).into_iter().next(),
            linking.references(ref_2).into_iter().next(),
        ) else {
            return Ok(None);
        };
        let Some(end_1) = self
            .fetch(operation, cache, &target_1.rid)
            .await?
            .filter(|r| r.asset_type == def.end_1.backend_type)
        else {
            return Ok(None);
        };
        let Some(end_2) = self
            .fetch(operation, cache, &target_2.rid)
            .await?
            .filter(|r| r.asset_type == def.end_2.backend_type)
        else {
            return Ok(None);
        };
        Ok(Some(convert::relationship_from_linking(
            self.home_id,
            def,
            linking,
            &end_1,
            &end_2,
        )))
    }

    async fn resolve_reference_level(
        &self,
        operation: &'static str,
        guid: &str,
        identity: &RelationshipRef,
        cache: &mut RecordCache,
    ) -> Result<RelationshipInstance, FederationError> {
        let defs = self.registry.relationship_defs_for_pair(
            &identity.rel_type,
            &identity.endpoint_a.asset_type,
            &identity.endpoint_b.asset_type,
        );
        if defs.is_empty() {
            return Err(FederationError::TypeNotMapped {
                operation,
                type_name: identity.rel_type.clone(),
            });
        }

        // Symmetric validation: both endpoint records must exist, whichever
        // side the backend stores the implying reference on.
        let record_a = self
            .fetch(operation, cache, &identity.endpoint_a.rid)
            .await?
            .filter(|r| r.asset_type == identity.endpoint_a.asset_type)
            .ok_or_else(|| self.not_known(operation, guid))?;
        let record_b = self
            .fetch(operation, cache, &identity.endpoint_b.rid)
            .await?
            .filter(|r| r.asset_type == identity.endpoint_b.asset_type)
            .ok_or_else(|| self.not_known(operation, guid))?;

        for (def, a_is_end_1) in defs {
            let (end_1, end_2) = if a_is_end_1 {
                (&record_a, &record_b)
            } else {
                (&record_b, &record_a)
            };
            if def.is_relationship_level() {
                // The endpoints are linked through a relationship-level
                // record; resolve to the canonical instance.
                if let Some(instance) = self
                    .find_linking_between(operation, cache, def, end_1, end_2)
                    .await?
                {
                    return Ok(instance);
                }
                continue;
            }
            if reference_exists(def, end_1, end_2) {
                return Ok(convert::relationship_between(
                    self.home_id,
                    def,
                    end_1,
                    end_2,
                ));
            }
        }
        Err(self.not_known(operation, guid))
    }

    /// Search for a relationship-level record linking two known endpoints.
    async fn find_linking_between(
        &self,
        operation: &'static str,
        cache: &mut RecordCache,
        def: &RelationshipMappingDef,
        end_1: &RawAsset,
        end_2: &RawAsset,
    ) -> Result<Option<RelationshipInstance>, FederationError> {
        let (Some(linking_type), Some(ref_1), Some(ref_2)) = (
            def.linking_type.as_deref(),
            def.end_1.ref_property.as_deref(),
            def.end_2.ref_property.as_deref(),
        ) else {
            return Ok(None);
        };
        let mut conditions = SearchConditionSet::all();
        conditions.push(SearchCondition::new(
            format!("{ref_1}.{RECORD_ID_PROPERTY}"),
            SearchOperator::Equals,
            Value::String(end_1.rid.clone()),
        ));
        conditions.push(SearchCondition::new(
            format!("{ref_2}.{RECORD_ID_PROPERTY}"),
            SearchOperator::Equals,
            Value::String(end_2.rid.clone()),
        ));
        let mut search = NativeSearch::new(linking_type, conditions);
        search.properties = vec![ref_1.to_string(), ref_2.to_string()];
        search.sort = Some(SearchSort::by_record_id());

        self.cancel.guard(operation)?;
        let page = self
            .client
            .search(&search)
            .await
            .map_err(|e| FederationError::backend(operation, e))?;
        let Some(linking) = page.items.into_iter().next() else {
            return Ok(None);
        };
        cache.seed(linking.clone());
        self.materialize_from_linking(operation, cache, def, &linking)
            .await
    }

    // ------------------------------------------------------------------
    // One-hop enumeration
    // ------------------------------------------------------------------

    /// Every relationship in which the entity participates, optionally
    /// narrowed to one abstract relationship type. Results are in GUID
    /// order so the paging window is stable across calls.
    pub async fn relationships_for_entity(
        &self,
        operation: &'static str,
        entity_guid: &str,
        type_filter: Option<&str>,
        paging: Paging,
    ) -> Result<Vec<RelationshipInstance>, FederationError> {
        let identity = EntityRef::from_guid(entity_guid, self.home_id).map_err(|source| {
            FederationError::MalformedIdentity {
                operation,
                guid: entity_guid.to_string(),
                source,
            }
        })?;
        let mapping = self
            .registry
            .mapping_for_backend(&identity.asset_type, identity.prefix.as_deref())
            .ok_or_else(|| FederationError::TypeNotMapped {
                operation,
                type_name: identity.asset_type.clone(),
            })?;

        let mut cache = RecordCache::new();
        let record = self
            .fetch(operation, &mut cache, &identity.rid)
            .await?
            .filter(|r| r.asset_type == identity.asset_type)
            .ok_or_else(|| FederationError::EntityNotKnown {
                operation,
                guid: entity_guid.to_string(),
                home_id: self.home_id.to_string(),
            })?;

        let mut out: Vec<RelationshipInstance> = Vec::new();
        for def in &mapping.relationships {
            if let Some(wanted) = type_filter {
                if def.abstract_name != wanted {
                    continue;
                }
            }
            if def.is_relationship_level() {
                self.enumerate_linking(operation, &mut cache, def, &record, &mut out)
                    .await?;
            } else {
                self.enumerate_references(operation, &mut cache, def, &record, &mut out)
                    .await?;
            }
        }

        out.sort_by(|x, y| x.guid.cmp(&y.guid));
        out.dedup_by(|x, y| x.guid == y.guid);
        Ok(apply_paging(out, paging))
    }

    /// Relationship-level defs: find every linking record that names this
    /// entity on either end.
    async fn enumerate_linking(
        &self,
        operation: &'static str,
        cache: &mut RecordCache,
        def: &RelationshipMappingDef,
        record: &RawAsset,
        out: &mut Vec<RelationshipInstance>,
    ) -> Result<(), FederationError> {
        let Some(linking_type) = def.linking_type.as_deref() else {
            return Ok(());
        };
        for end in [&def.end_1, &def.end_2] {
            if end.backend_type != record.asset_type {
                continue;
            }
            let Some(ref_property) = end.ref_property.as_deref() else {
                continue;
            };
            let mut conditions = SearchConditionSet::all();
            conditions.push(SearchCondition::new(
                format!("{ref_property}.{RECORD_ID_PROPERTY}"),
                SearchOperator::Equals,
                Value::String(record.rid.clone()),
            ));
            let mut search = NativeSearch::new(linking_type, conditions);
            search.properties = linking_properties(def);
            search.sort = Some(SearchSort::by_record_id());

            self.cancel.guard(operation)?;
            let mut page = self
                .client
                .search(&search)
                .await
                .map_err(|e| FederationError::backend(operation, e))?;
            loop {
                for linking in &page.items {
                    cache.seed(linking.clone());
                    if let Some(instance) = self
                        .materialize_from_linking(operation, cache, def, linking)
                        .await?
                    {
                        out.push(instance);
                    }
                }
                self.cancel.guard(operation)?;
                match self
                    .client
                    .next_page(&page)
                    .await
                    .map_err(|e| FederationError::backend(operation, e))?
                {
                    Some(next) => page = next,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Reference-level defs: enumerate from this record's own reference
    /// property when it has one, otherwise search the other end's type for
    /// records whose reference points back here.
    async fn enumerate_references(
        &self,
        operation: &'static str,
        cache: &mut RecordCache,
        def: &RelationshipMappingDef,
        record: &RawAsset,
        out: &mut Vec<RelationshipInstance>,
    ) -> Result<(), FederationError> {
        for record_is_end_1 in [true, false] {
            let (own, other) = if record_is_end_1 {
                (&def.end_1, &def.end_2)
            } else {
                (&def.end_2, &def.end_1)
            };
            if own.backend_type != record.asset_type {
                continue;
            }
            if let Some(ref_property) = own.ref_property.as_deref() {
                for reference in record.references(ref_property) {
                    if reference.asset_type != other.backend_type {
                        continue;
                    }
                    out.push(convert::relationship_with_reference(
                        self.home_id,
                        def,
                        record_is_end_1,
                        record,
                        &reference,
                    ));
                }
            } else if let Some(inverse) = other.ref_property.as_deref() {
                self.enumerate_inverse(
                    operation,
                    cache,
                    def,
                    record,
                    record_is_end_1,
                    inverse,
                    out,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// The backend stores the reference only on the other end: search that
    /// end's type for records referencing this one.
    #[allow(clippy::too_many_arguments)]
    async fn enumerate_inverse(
        &self,
        operation: &'static str,
        _cache: &mut RecordCache,
        def: &RelationshipMappingDef,
        record: &RawAsset,
        record_is_end_1: bool,
        inverse_property: &str,
        out: &mut Vec<RelationshipInstance>,
    ) -> Result<(), FederationError> {
        let other = if record_is_end_1 { &def.end_2 } else { &def.end_1 };
        let mut conditions = SearchConditionSet::all();
        conditions.push(SearchCondition::new(
            format!("{inverse_property}.{RECORD_ID_PROPERTY}"),
            SearchOperator::Equals,
            Value::String(record.rid.clone()),
        ));
        let mut search = NativeSearch::new(&other.backend_type, conditions);
        search.sort = Some(SearchSort::by_record_id());

        self.cancel.guard(operation)?;
        let mut page = self
            .client
            .search(&search)
            .await
            .map_err(|e| FederationError::backend(operation, e))?;
        loop {
            for hit in &page.items {
                let (end_1, end_2) = if record_is_end_1 {
                    (record, hit)
                } else {
                    (hit, record)
                };
                out.push(convert::relationship_between(
                    self.home_id,
                    def,
                    end_1,
                    end_2,
                ));
            }
            self.cancel.guard(operation)?;
            match self
                .client
                .next_page(&page)
                .await
                .map_err(|e| FederationError::backend(operation, e))?
            {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(())
    }
}

/// Reference-level relationships exist iff the implying reference does, on
/// whichever end the backend stores it.
fn reference_exists(def: &RelationshipMappingDef, end_1: &RawAsset, end_2: &RawAsset) -> bool {
    let forward = refers_to(&def.end_1, end_1, end_2);
    let backward = refers_to(&def.end_2, end_2, end_1);
    forward || backward
}

fn refers_to(end: &RelationshipEndDef, holder: &RawAsset, target: &RawAsset) -> bool {
    match end.ref_property.as_deref() {
        Some(property) => holder
            .references(property)
            .iter()
            .any(|r| r.rid == target.rid),
        None => false,
    }
}

fn linking_properties(def: &RelationshipMappingDef) -> Vec<String> {
    [&def.end_1, &def.end_2]
        .iter()
        .filter_map(|end| end.ref_property.clone())
        .collect()
}

fn apply_paging(items: Vec<RelationshipInstance>, paging: Paging) -> Vec<RelationshipInstance> {
    let mut iter = items.into_iter().skip(paging.from);
    if paging.is_unbounded() {
        iter.collect()
    } else {
        iter.by_ref().take(paging.page_size).collect()
    }
}
