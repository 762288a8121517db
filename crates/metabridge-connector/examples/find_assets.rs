//! Run a few find/get operations against an in-memory catalog.
//!
//! ```sh
//! cargo run -p metabridge-connector --example find_assets
//! ```

use metabridge_catalog::{ContextEntry, MemoryCatalog, RawAsset, RawReference};
use metabridge_connector::MetadataCollection;
use metabridge_mapping::default_registry;
use metabridge_model::{EntityFindRequest, Paging, PropertyMatch};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let catalog = MemoryCatalog::new(vec![
        RawAsset::new("t1", "database_table", "EMPLOYEE")
            .with_context(vec![
                ContextEntry {
                    asset_type: "database".into(),
                    name: "SAMPLE".into(),
                },
                ContextEntry {
                    asset_type: "database_schema".into(),
                    name: "HR".into(),
                },
            ])
            .with_property("short_description", "employee master data"),
        RawAsset::new("c1", "database_column", "SALARY")
            .with_reference(
                "assigned_to_terms",
                RawReference {
                    rid: "g1".into(),
                    asset_type: "term".into(),
                    name: "Salary".into(),
                },
            ),
        RawAsset::new("g1", "term", "Salary")
            .with_reference(
                "assigned_assets",
                RawReference {
                    rid: "c1".into(),
                    asset_type: "database_column".into(),
                    name: "SALARY".into(),
                },
            ),
    ]);
    let connector =
        MetadataCollection::new("demo-repo", Arc::new(default_registry()), Arc::new(catalog));

    let mut request = EntityFindRequest::for_type("RelationalTable");
    request.matches = vec![PropertyMatch::new("displayName", "EMP.*")];
    for entity in connector.find_entities(&request).await? {
        println!(
            "{} {} ({})",
            entity.type_name,
            entity.qualified_name().unwrap_or("<unnamed>"),
            entity.guid
        );
    }

    let mut term_request = EntityFindRequest::for_type("GlossaryTerm");
    term_request.matches = vec![PropertyMatch::new("displayName", "Salary")];
    let term = connector
        .find_entities(&term_request)
        .await?
        .into_iter()
        .next()
        .expect("demo term is present");
    for relationship in connector
        .relationships_for_entity(&term.guid, None, Paging::UNBOUNDED)
        .await?
    {
        println!(
            "{}: {} <-> {}",
            relationship.type_name, relationship.end_1.type_name, relationship.end_2.type_name
        );
    }
    Ok(())
}
