//! Integration tests for the complete connector stack
//!
//! These tests verify end-to-end behavior across crates:
//! - find request → translation → native searches → materialized entities
//! - entity/relationship GUIDs → backend lookups → instances
//! - fan-out bookkeeping observed through the in-memory catalog's search log
//!
//! Run with: cargo test --test integration_tests

use metabridge_catalog::{ContextEntry, MemoryCatalog, RawAsset, RawReference};
use metabridge_connector::{FederationError, MetadataCollection};
use metabridge_mapping::default_registry;
use metabridge_model::{EntityFindRequest, EntityRef, Paging, PropertyMatch};
use std::sync::Arc;

const HOME: &str = "repo-1";

fn context(entries: &[(&str, &str)]) -> Vec<ContextEntry> {
    entries
        .iter()
        .map(|(asset_type, name)| ContextEntry {
            asset_type: asset_type.to_string(),
            name: name.to_string(),
        })
        .collect()
}

fn reference(rid: &str, asset_type: &str, name: &str) -> RawReference {
    RawReference {
        rid: rid.to_string(),
        asset_type: asset_type.to_string(),
        name: name.to_string(),
    }
}

/// A small catalog: one database, one schema, two tables, two columns, and
/// a glossary term assigned to one of the columns.
fn sample_catalog() -> MemoryCatalog {
    MemoryCatalog::new(vec![
        RawAsset::new("db1", "database", "SAMPLE"),
        RawAsset::new("s1", "database_schema", "HR")
            .with_context(context(&[("database", "SAMPLE")])),
        RawAsset::new("t1", "database_table", "EMPLOYEE")
            .with_context(context(&[("database", "SAMPLE"), ("database_schema", "HR")]))
            .with_property("short_description", "employee master data")
            .with_reference("database_columns", reference("c1", "database_column", "SALARY")),
        RawAsset::new("t2", "database_table", "DEPARTMENT")
            .with_context(context(&[("database", "SAMPLE"), ("database_schema", "HR")])),
        RawAsset::new("c1", "database_column", "SALARY")
            .with_context(context(&[
                ("database", "SAMPLE"),
                ("database_schema", "HR"),
                ("database_table", "EMPLOYEE"),
            ]))
            .with_property("data_type", "DECIMAL")
            .with_reference("database_table_or_view", reference("t1", "database_table", "EMPLOYEE"))
            .with_reference("assigned_to_terms", reference("g1", "term", "Salary")),
        RawAsset::new("c2", "database_column", "DEPT_ID")
            .with_context(context(&[
                ("database", "SAMPLE"),
                ("database_schema", "HR"),
                ("database_table", "EMPLOYEE"),
            ])),
        RawAsset::new("g1", "term", "Salary")
            .with_context(context(&[("category", "Compensation")]))
            .with_reference("assigned_assets", reference("c1", "database_column", "SALARY")),
    ])
}

fn connector(catalog: Arc<MemoryCatalog>) -> MetadataCollection<MemoryCatalog> {
    MetadataCollection::new(HOME, Arc::new(default_registry()), catalog)
}

// ============================================================================
// Search, end to end
// ============================================================================

#[tokio::test]
async fn find_by_display_name_materializes_the_full_entity() {
    let connector = connector(Arc::new(sample_catalog()));
    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.matches = vec![PropertyMatch::new("displayName", "EMPLOYEE")];

    let entities = connector.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 1);
    let table = &entities[0];
    assert_eq!(table.type_name, "RelationalTable");
    assert_eq!(table.home_id, HOME);
    assert_eq!(table.properties["displayName"], "EMPLOYEE");
    assert_eq!(table.properties["description"], "employee master data");
    assert_eq!(
        table.qualified_name(),
        Some("database_table::SAMPLE::HR::EMPLOYEE")
    );
}

#[tokio::test]
async fn supertype_search_issues_one_native_search_per_subtype() {
    let catalog = Arc::new(sample_catalog());
    let connector = connector(catalog.clone());

    let entities = connector
        .find_entities(&EntityFindRequest::for_type("SchemaAttribute"))
        .await
        .unwrap();
    assert_eq!(entities.len(), 4);
    let searched: Vec<String> = catalog
        .searches()
        .iter()
        .map(|s| s.asset_type.clone())
        .collect();
    assert_eq!(searched, vec!["database_column", "database_table"]);
}

#[tokio::test]
async fn full_identity_search_issues_exactly_one_native_search() {
    let catalog = Arc::new(sample_catalog());
    let connector = connector(catalog.clone());
    let mut request = EntityFindRequest::for_type("SchemaAttribute");
    request.matches = vec![PropertyMatch::new(
        "qualifiedName",
        "database_column::SAMPLE::HR::EMPLOYEE::SALARY",
    )];

    let entities = connector.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].type_name, "RelationalColumn");
    assert_eq!(catalog.search_count(), 1);
}

#[tokio::test]
async fn synthesized_sub_entities_share_the_backend_record() {
    // The same backend schema record materializes as two abstract types
    // with distinct GUIDs, distinguished by the synthetic prefix.
    let connector = connector(Arc::new(sample_catalog()));

    let deployed = connector
        .find_entities(&EntityFindRequest::for_type("DeployedDatabaseSchema"))
        .await
        .unwrap();
    let schema_type = connector
        .find_entities(&EntityFindRequest::for_type("RelationalDBSchemaType"))
        .await
        .unwrap();
    assert_eq!(deployed.len(), 1);
    assert_eq!(schema_type.len(), 1);
    assert_ne!(deployed[0].guid, schema_type[0].guid);
    assert_eq!(
        schema_type[0].qualified_name(),
        Some("RDBST_database_schema::SAMPLE::HR")
    );
}

// ============================================================================
// Identity round trips
// ============================================================================

#[tokio::test]
async fn search_result_guid_fetches_the_same_entity() {
    let connector = connector(Arc::new(sample_catalog()));
    let mut request = EntityFindRequest::for_type("GlossaryTerm");
    request.matches = vec![PropertyMatch::new("displayName", "Salary")];

    let found = connector.find_entities(&request).await.unwrap();
    let fetched = connector.get_entity(&found[0].guid).await.unwrap();
    assert_eq!(fetched, found[0]);

    let summary = connector.get_entity_summary(&found[0].guid).await.unwrap();
    assert_eq!(summary.guid, found[0].guid);
    assert_eq!(summary.type_name, "GlossaryTerm");
}

#[tokio::test]
async fn foreign_home_guid_is_rejected_as_malformed() {
    let connector = connector(Arc::new(sample_catalog()));
    let foreign = EntityRef::new("other-repo", "database_table", "t1", None).to_guid();
    let err = connector.get_entity(&foreign).await.unwrap_err();
    assert!(matches!(err, FederationError::MalformedIdentity { .. }));
}

#[tokio::test]
async fn vanished_record_is_not_known() {
    let connector = connector(Arc::new(sample_catalog()));
    let gone = EntityRef::new(HOME, "database_table", "t99", None).to_guid();
    let err = connector.get_entity(&gone).await.unwrap_err();
    assert!(matches!(err, FederationError::EntityNotKnown { .. }));
}

#[tokio::test]
async fn one_hop_relationships_resolve_back_to_themselves() {
    let connector = connector(Arc::new(sample_catalog()));
    let column = EntityRef::new(HOME, "database_column", "c1", None).to_guid();

    let relationships = connector
        .relationships_for_entity(&column, None, Paging::UNBOUNDED)
        .await
        .unwrap();
    assert!(!relationships.is_empty());
    for relationship in relationships {
        let resolved = connector.get_relationship(&relationship.guid).await.unwrap();
        assert_eq!(resolved.guid, relationship.guid);
        assert_eq!(resolved.type_name, relationship.type_name);
    }
}

// ============================================================================
// Type gallery
// ============================================================================

#[tokio::test]
async fn type_gallery_lists_the_built_in_mapping_set() {
    let connector = connector(Arc::new(sample_catalog()));
    assert!(connector
        .supported_entity_types()
        .contains(&"RelationalTable"));
    assert!(connector
        .supported_relationship_types()
        .contains(&"SemanticAssignment"));
    assert!(connector
        .supported_classification_types()
        .contains(&"Confidentiality"));
}
