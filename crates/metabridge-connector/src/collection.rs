//! The metadata collection: the find/get surface the federation framework
//! calls.
//!
//! Every operation is read-only and stateless between calls; the only
//! shared state is the immutable mapping registry and the transport
//! client. Per-request record caching lives inside the relationship
//! resolver and never outlives a call.

use crate::materialize::Materializer;
use crate::relationships::RelationshipResolver;
use crate::translate::{match_kind, translate_query, MatchKind, TranslatedSearch};
use crate::{CancelFlag, FederationError};
use metabridge_catalog::{
    CatalogClient, NativeSearch, SearchConditionSet, SearchSort, LONG_TEXT_PROPERTY,
};
use metabridge_mapping::{convert, MappingRegistry, TypeMapping};
use metabridge_model::{
    ClassificationFilter, EntityDetail, EntityFindRequest, EntityRef, EntitySummary, Paging,
    RelationshipInstance,
};
use std::sync::Arc;

/// An entity together with its one-hop relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    pub entity: EntityDetail,
    pub relationships: Vec<RelationshipInstance>,
}

pub struct MetadataCollection<C: CatalogClient> {
    home_id: String,
    registry: Arc<MappingRegistry>,
    client: Arc<C>,
    cancel: CancelFlag,
}

impl<C: CatalogClient> MetadataCollection<C> {
    pub fn new(
        home_id: impl Into<String>,
        registry: Arc<MappingRegistry>,
        client: Arc<C>,
    ) -> Self {
        Self {
            home_id: home_id.into(),
            registry,
            client,
            cancel: CancelFlag::new(),
        }
    }

    /// Install a shared cancellation handle. Cancelling it aborts any
    /// in-flight operation before its next transport round trip.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn home_id(&self) -> &str {
        &self.home_id
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(&self.home_id, &self.registry, self.client.as_ref(), &self.cancel)
    }

    fn resolver(&self) -> RelationshipResolver<'_> {
        RelationshipResolver::new(&self.home_id, &self.registry, self.client.as_ref(), &self.cancel)
    }

    // ------------------------------------------------------------------
    // Entity search
    // ------------------------------------------------------------------

    /// Find entities matching abstract property conditions.
    pub async fn find_entities(
        &self,
        request: &EntityFindRequest,
    ) -> Result<Vec<EntityDetail>, FederationError> {
        const OPERATION: &str = "find_entities";
        let searches = translate_query(OPERATION, &self.registry, request)?;
        self.materializer()
            .collect_entities(OPERATION, &searches, request.paging.page_size)
            .await
    }

    /// Find entities whose string properties match one pattern, across
    /// every searchable mapping of `type_name` (or every mapped type).
    ///
    /// The backend's long-text property is excluded from the searched set
    /// on releases that cannot search it.
    pub async fn find_entities_by_property_value(
        &self,
        type_name: Option<&str>,
        pattern: &str,
        paging: Paging,
    ) -> Result<Vec<EntityDetail>, FederationError> {
        const OPERATION: &str = "find_entities_by_property_value";
        let kind = match_kind(pattern);
        if kind == MatchKind::General {
            return Err(FederationError::FunctionNotSupported {
                operation: OPERATION,
                function: "general regular expression matching",
            });
        }

        let candidates: Vec<&TypeMapping> = match type_name {
            Some(name) => self
                .registry
                .expand_to_searchable_subtypes(name, None)
                .map_err(|e| FederationError::from_mapping(OPERATION, e))?,
            None => self.registry.searchable_mappings(),
        };
        let long_text_searchable = self.client.capabilities().supports_long_text_search();

        let mut searches = Vec::new();
        for mapping in candidates {
            self.cancel.guard(OPERATION)?;
            let properties = self
                .client
                .string_properties_for_type(&mapping.backend_type)
                .await
                .map_err(|e| FederationError::backend(OPERATION, e))?;
            let mut group = SearchConditionSet::any();
            for property in properties {
                if !long_text_searchable && property == LONG_TEXT_PROPERTY {
                    tracing::debug!(
                        backend_type = %mapping.backend_type,
                        "excluding long-text property on this catalog release"
                    );
                    continue;
                }
                if let Some(condition) = kind.to_condition(&property) {
                    group.push(condition);
                }
            }
            if group.is_empty() {
                continue;
            }
            let mut conditions = SearchConditionSet::all();
            conditions.nest(group);
            let mut native = NativeSearch::new(&mapping.backend_type, conditions);
            native.properties = mapping.projected_properties();
            native.begin = paging.from;
            native.page_size = paging.page_size;
            native.sort = Some(SearchSort::by_record_id());
            searches.push(TranslatedSearch::new(mapping.abstract_type.clone(), native));
        }
        self.materializer()
            .collect_entities(OPERATION, &searches, paging.page_size)
            .await
    }

    /// Find entities carrying a classification, optionally filtered by the
    /// classification's properties.
    pub async fn find_entities_by_classification(
        &self,
        type_name: Option<&str>,
        filter: ClassificationFilter,
        paging: Paging,
    ) -> Result<Vec<EntityDetail>, FederationError> {
        const OPERATION: &str = "find_entities_by_classification";
        let request = EntityFindRequest {
            type_name: type_name.map(String::from),
            classification: Some(filter),
            paging,
            ..EntityFindRequest::default()
        };
        let searches = translate_query(OPERATION, &self.registry, &request)?;
        self.materializer()
            .collect_entities(OPERATION, &searches, paging.page_size)
            .await
    }

    // ------------------------------------------------------------------
    // By-identity lookups
    // ------------------------------------------------------------------

    async fn entity_by_guid(
        &self,
        operation: &'static str,
        guid: &str,
    ) -> Result<EntityDetail, FederationError> {
        let identity = EntityRef::from_guid(guid, &self.home_id).map_err(|source| {
            FederationError::MalformedIdentity {
                operation,
                guid: guid.to_string(),
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

        self.cancel.guard(operation)?;
        let not_known = || FederationError::EntityNotKnown {
            operation,
            guid: guid.to_string(),
            home_id: self.home_id.clone(),
        };
        let record = self
            .client
            .record_by_id(&identity.rid, &mapping.projected_properties())
            .await
            .map_err(|e| FederationError::backend(operation, e))?
            .filter(|r| r.asset_type == identity.asset_type)
            .ok_or_else(not_known)?;

        convert::entity_from_asset(&self.home_id, mapping, &record).map_err(|error| {
            tracing::warn!(rid = %identity.rid, %error, "record cannot be materialized");
            not_known()
        })
    }

    pub async fn get_entity(&self, guid: &str) -> Result<EntityDetail, FederationError> {
        self.entity_by_guid("get_entity", guid).await
    }

    pub async fn get_entity_summary(&self, guid: &str) -> Result<EntitySummary, FederationError> {
        Ok(self.entity_by_guid("get_entity_summary", guid).await?.summary())
    }

    pub async fn get_relationship(
        &self,
        guid: &str,
    ) -> Result<RelationshipInstance, FederationError> {
        self.resolver().resolve("get_relationship", guid).await
    }

    /// Every relationship the entity participates in, in stable GUID order.
    pub async fn relationships_for_entity(
        &self,
        entity_guid: &str,
        type_filter: Option<&str>,
        paging: Paging,
    ) -> Result<Vec<RelationshipInstance>, FederationError> {
        self.resolver()
            .relationships_for_entity("relationships_for_entity", entity_guid, type_filter, paging)
            .await
    }

    /// The entity plus its one-hop relationships. Only a traversal depth of
    /// one is supported; deeper traversals fail fast rather than returning
    /// a silently truncated graph.
    pub async fn neighborhood(
        &self,
        entity_guid: &str,
        level: usize,
    ) -> Result<Neighborhood, FederationError> {
        const OPERATION: &str = "neighborhood";
        if level != 1 {
            return Err(FederationError::FunctionNotSupported {
                operation: OPERATION,
                function: "multi-hop neighborhood traversal",
            });
        }
        let entity = self.entity_by_guid(OPERATION, entity_guid).await?;
        let relationships = self
            .resolver()
            .relationships_for_entity(OPERATION, entity_guid, None, Paging::UNBOUNDED)
            .await?;
        Ok(Neighborhood {
            entity,
            relationships,
        })
    }

    // ------------------------------------------------------------------
    // Type gallery
    // ------------------------------------------------------------------

    /// Abstract entity types this connector implements.
    pub fn supported_entity_types(&self) -> Vec<&str> {
        self.registry.mapped_entity_types()
    }

    /// Abstract relationship types this connector implements.
    pub fn supported_relationship_types(&self) -> Vec<&str> {
        self.registry.mapped_relationship_types()
    }

    /// Abstract classification types this connector implements.
    pub fn supported_classification_types(&self) -> Vec<&str> {
        self.registry.mapped_classification_types()
    }
}
