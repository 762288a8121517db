//! Backend asset-catalog model and transport boundary
//!
//! Everything the backend catalog speaks lives here: the raw JSON record
//! shape (`RawAsset`), the native search-condition tree (`NativeSearch`),
//! structured hierarchical identities (`AssetPath`), and the transport
//! trait (`CatalogClient`) with two implementations:
//!
//! - `RestCatalog`: the real HTTP client (reqwest, bounded timeout)
//! - `MemoryCatalog`: an in-memory catalog that evaluates native searches
//!   against scripted records, used by tests and examples
//!
//! Nothing in this crate knows about abstract (federation-side) types; the
//! translation between the two type systems lives in `metabridge-mapping`
//! and `metabridge-connector`.

pub mod asset;
pub mod cache;
pub mod client;
pub mod memory;
pub mod path;
pub mod search;

pub use asset::{ContextEntry, RawAsset, RawReference};
pub use cache::RecordCache;
pub use client::{
    CatalogCapabilities, CatalogClient, CatalogConfig, CatalogError, CatalogVersion, RestCatalog,
    SearchPage, LONG_TEXT_PROPERTY,
};
pub use memory::MemoryCatalog;
pub use path::AssetPath;
pub use search::{
    NativeSearch, SearchCondition, SearchConditionSet, SearchOperator, SearchSort,
    RECORD_ID_PROPERTY,
};
