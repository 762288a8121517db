//! Materialization behavior: the page budget spans the whole fan-out, and
//! unconvertible records are dropped without failing the page.

use metabridge_catalog::{
    CatalogCapabilities, CatalogClient, CatalogError, CatalogVersion, ContextEntry, MemoryCatalog,
    NativeSearch, RawAsset, SearchPage,
};
use metabridge_connector::{CancelFlag, FederationError, MetadataCollection};
use metabridge_mapping::{default_registry, MappingRegistry, TypeMapping};
use metabridge_model::{
    EntityFindRequest, MatchCriteria, Paging, PropertyMatch, Sequencing, SequencingOrder,
};
use std::sync::Arc;

fn collection(catalog: MemoryCatalog) -> MetadataCollection<MemoryCatalog> {
    MetadataCollection::new("repo-1", Arc::new(default_registry()), Arc::new(catalog))
}

fn columns_and_tables() -> Vec<RawAsset> {
    let mut assets = Vec::new();
    for i in 0..7 {
        assets.push(RawAsset::new(
            format!("c{i}"),
            "database_column",
            format!("COL_{i}"),
        ));
    }
    for i in 0..8 {
        assets.push(RawAsset::new(
            format!("t{i}"),
            "database_table",
            format!("TAB_{i}"),
        ));
    }
    assets
}

#[tokio::test]
async fn page_budget_spans_the_whole_fan_out() {
    let collection = collection(MemoryCatalog::new(columns_and_tables()));
    let mut request = EntityFindRequest::for_type("SchemaAttribute");
    request.paging = Paging::new(0, 10);

    let entities = collection.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 10);
    // Searches run in deterministic abstract-type order: every column is
    // drawn before the first table, and the budget cuts the tables short.
    let columns = entities
        .iter()
        .filter(|e| e.type_name == "RelationalColumn")
        .count();
    let tables = entities
        .iter()
        .filter(|e| e.type_name == "RelationalTable")
        .count();
    assert_eq!(columns, 7);
    assert_eq!(tables, 3);
}

#[tokio::test]
async fn budget_filled_by_the_first_search_skips_the_rest() {
    let catalog = MemoryCatalog::new(columns_and_tables());
    let collection = collection(catalog);
    let mut request = EntityFindRequest::for_type("SchemaAttribute");
    request.paging = Paging::new(0, 5);

    let entities = collection.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 5);
    assert!(entities.iter().all(|e| e.type_name == "RelationalColumn"));
}

#[tokio::test]
async fn budget_over_three_searches_never_reaches_the_last() {
    // SchemaElement expands to three mappings; the budget fills during the
    // second search, so the third type is never queried.
    let mut assets = columns_and_tables();
    for i in 0..5 {
        assets.push(RawAsset::new(
            format!("s{i}"),
            "database_schema",
            format!("SCHEMA_{i}"),
        ));
    }
    let catalog = Arc::new(MemoryCatalog::new(assets));
    let collection = MetadataCollection::new(
        "repo-1",
        Arc::new(default_registry()),
        catalog.clone(),
    );
    let mut request = EntityFindRequest::for_type("SchemaElement");
    request.paging = Paging::new(0, 10);

    let entities = collection.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 10);
    let searched: Vec<String> = catalog
        .searches()
        .iter()
        .map(|s| s.asset_type.clone())
        .collect();
    assert_eq!(searched, vec!["database_column", "database_schema"]);
}

#[tokio::test]
async fn unbounded_request_drains_every_search() {
    let collection = collection(MemoryCatalog::new(columns_and_tables()).with_page_size(4));
    let request = EntityFindRequest::for_type("SchemaAttribute");

    let entities = collection.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 15);
}

#[tokio::test]
async fn unconvertible_records_are_dropped_not_fatal() {
    // abbreviation is required here, and the second term does not carry it.
    let registry = MappingRegistry::builder()
        .mapping(
            TypeMapping::new("GlossaryTerm", "term")
                .with_required_property("abbreviation", "abbreviation"),
        )
        .build();
    let catalog = MemoryCatalog::new(vec![
        RawAsset::new("g1", "term", "Salary").with_property("abbreviation", "SAL"),
        RawAsset::new("g2", "term", "Bonus"),
    ]);
    let collection = MetadataCollection::new("repo-1", Arc::new(registry), Arc::new(catalog));

    let entities = collection
        .find_entities(&EntityFindRequest::for_type("GlossaryTerm"))
        .await
        .unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].properties["abbreviation"], "SAL");
}

#[tokio::test]
async fn cancelled_flag_aborts_before_the_first_round_trip() {
    let catalog = MemoryCatalog::new(columns_and_tables());
    let cancel = CancelFlag::new();
    cancel.cancel();
    let collection = MetadataCollection::new(
        "repo-1",
        Arc::new(default_registry()),
        Arc::new(catalog),
    )
    .with_cancel_flag(cancel);

    let err = collection
        .find_entities(&EntityFindRequest::for_type("SchemaAttribute"))
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::Cancelled { .. }));
    assert_eq!(collection.registry().searchable_mappings().len(), 9);
}

#[tokio::test]
async fn broad_value_search_covers_every_string_property() {
    let catalog = MemoryCatalog::new(vec![
        RawAsset::new("g1", "term", "Salary").with_property("short_description", "pay amount"),
        RawAsset::new("g2", "term", "Bonus"),
    ]);
    let collection = collection(catalog);

    let hits = collection
        .find_entities_by_property_value(Some("GlossaryTerm"), ".*pay.*", Paging::UNBOUNDED)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].properties["displayName"], "Salary");
}

#[tokio::test]
async fn long_text_property_is_skipped_on_older_releases() {
    let catalog = MemoryCatalog::new(vec![RawAsset::new("g1", "term", "Salary")
        .with_property("long_description", "paid monthly")])
    .with_version(CatalogVersion::new(11, 5, 0))
    .with_string_properties(
        "term",
        vec!["_name".to_string(), "long_description".to_string()],
    );
    let collection = collection(catalog);

    let hits = collection
        .find_entities_by_property_value(Some("GlossaryTerm"), ".*monthly.*", Paging::UNBOUNDED)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

fn table_in(rid: &str, name: &str, db: &str, schema: &str) -> RawAsset {
    RawAsset::new(rid, "database_table", name).with_context(vec![
        ContextEntry {
            asset_type: "database".to_string(),
            name: db.to_string(),
        },
        ContextEntry {
            asset_type: "database_schema".to_string(),
            name: schema.to_string(),
        },
    ])
}

fn employee_tables() -> Vec<RawAsset> {
    vec![
        table_in("t1", "EMPLOYEE", "SAMPLE", "HR"),
        table_in("t2", "EMPLOYEE", "OTHERDB", "FINANCE"),
        table_in("t3", "DEPT", "SAMPLE", "HR"),
    ]
}

#[tokio::test]
async fn exact_unique_name_is_scoped_to_its_container() {
    // Both tables are named EMPLOYEE; only the one whose full containment
    // path matches may come back.
    let collection = collection(MemoryCatalog::new(employee_tables()));
    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.matches = vec![PropertyMatch::new(
        "qualifiedName",
        "database_table::SAMPLE::HR::EMPLOYEE",
    )];

    let entities = collection.find_entities(&request).await.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(
        entities[0].qualified_name(),
        Some("database_table::SAMPLE::HR::EMPLOYEE")
    );
}

#[tokio::test]
async fn starts_with_unique_name_covers_the_whole_container() {
    let collection = collection(MemoryCatalog::new(employee_tables()));
    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.matches = vec![PropertyMatch::new(
        "qualifiedName",
        "database_table::SAMPLE::HR.*",
    )];

    let entities = collection.find_entities(&request).await.unwrap();
    let mut names: Vec<&str> = entities
        .iter()
        .filter_map(|e| e.properties["displayName"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["DEPT", "EMPLOYEE"]);
}

#[tokio::test]
async fn excluded_unique_name_spares_same_named_records_elsewhere() {
    let collection = collection(MemoryCatalog::new(employee_tables()));
    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.criteria = MatchCriteria::None;
    request.matches = vec![PropertyMatch::new(
        "qualifiedName",
        "database_table::SAMPLE::HR::EMPLOYEE",
    )];

    let entities = collection.find_entities(&request).await.unwrap();
    let mut names: Vec<Option<&str>> = entities.iter().map(|e| e.qualified_name()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            Some("database_table::OTHERDB::FINANCE::EMPLOYEE"),
            Some("database_table::SAMPLE::HR::DEPT"),
        ]
    );
}

// ----------------------------------------------------------------------
// Batch ordering
// ----------------------------------------------------------------------

/// A backend that ignores the requested sort and returns its records in
/// insertion order.
struct ScrambledCatalog {
    assets: Vec<RawAsset>,
}

#[async_trait::async_trait]
impl CatalogClient for ScrambledCatalog {
    async fn search(
        &self,
        search: &NativeSearch,
    ) -> Result<SearchPage, CatalogError> {
        let items: Vec<RawAsset> = self
            .assets
            .iter()
            .filter(|a| a.asset_type == search.asset_type)
            .filter(|a| search.conditions.matches(a))
            .cloned()
            .collect();
        Ok(SearchPage {
            search: search.clone(),
            total: items.len(),
            items,
        })
    }

    async fn record_by_id(
        &self,
        rid: &str,
        _properties: &[String],
    ) -> Result<Option<RawAsset>, CatalogError> {
        Ok(self.assets.iter().find(|a| a.rid == rid).cloned())
    }

    async fn string_properties_for_type(
        &self,
        _asset_type: &str,
    ) -> Result<Vec<String>, CatalogError> {
        Ok(vec!["_name".to_string()])
    }

    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::for_version(CatalogVersion::new(11, 7, 1))
    }
}

fn scrambled_tables() -> ScrambledCatalog {
    ScrambledCatalog {
        assets: vec![
            RawAsset::new("t9", "database_table", "NINE"),
            RawAsset::new("t2", "database_table", "TWO"),
            RawAsset::new("t7", "database_table", "SEVEN"),
        ],
    }
}

#[tokio::test]
async fn record_id_ordered_batches_come_back_in_guid_order() {
    let collection = MetadataCollection::new(
        "repo-1",
        Arc::new(default_registry()),
        Arc::new(scrambled_tables()),
    );

    let entities = collection
        .find_entities(&EntityFindRequest::for_type("RelationalTable"))
        .await
        .unwrap();
    let guids: Vec<&str> = entities.iter().map(|e| e.guid.as_str()).collect();
    let mut sorted = guids.clone();
    sorted.sort_unstable();
    assert_eq!(guids, sorted);
    let names: Vec<&str> = entities
        .iter()
        .filter_map(|e| e.properties["displayName"].as_str())
        .collect();
    assert_eq!(names, vec!["TWO", "SEVEN", "NINE"]);
}

#[tokio::test]
async fn requested_sequencing_is_kept_as_the_backend_returns_it() {
    let collection = MetadataCollection::new(
        "repo-1",
        Arc::new(default_registry()),
        Arc::new(scrambled_tables()),
    );
    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.sequencing = Sequencing {
        property: Some("displayName".to_string()),
        order: SequencingOrder::Descending,
    };

    let entities = collection.find_entities(&request).await.unwrap();
    let names: Vec<&str> = entities
        .iter()
        .filter_map(|e| e.properties["displayName"].as_str())
        .collect();
    assert_eq!(names, vec!["NINE", "TWO", "SEVEN"]);
}
