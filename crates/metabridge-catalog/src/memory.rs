//! In-memory catalog used by tests and examples.
//!
//! Evaluates native searches against scripted records with the same
//! condition semantics the real backend applies, and keeps a log of every
//! search it receives so tests can assert on fan-out behavior.

use crate::asset::RawAsset;
use crate::client::{CatalogCapabilities, CatalogClient, CatalogError, CatalogVersion, SearchPage};
use crate::search::{NativeSearch, RECORD_ID_PROPERTY};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

pub struct MemoryCatalog {
    assets: Vec<RawAsset>,
    string_properties: HashMap<String, Vec<String>>,
    capabilities: CatalogCapabilities,
    /// Transport page size; small by default so paging paths get exercised.
    page_size: usize,
    search_log: Mutex<Vec<NativeSearch>>,
    record_fetches: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new(assets: Vec<RawAsset>) -> Self {
        Self {
            assets,
            string_properties: HashMap::new(),
            capabilities: CatalogCapabilities::for_version(CatalogVersion::new(11, 7, 1)),
            page_size: 10,
            search_log: Mutex::new(Vec::new()),
            record_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_version(mut self, version: CatalogVersion) -> Self {
        self.capabilities = CatalogCapabilities::for_version(version);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_string_properties(
        mut self,
        asset_type: impl Into<String>,
        properties: Vec<String>,
    ) -> Self {
        self.string_properties.insert(asset_type.into(), properties);
        self
    }

    /// Every native search received so far, in call order.
    pub fn searches(&self) -> Vec<NativeSearch> {
        self.search_log.lock().clone()
    }

    pub fn search_count(&self) -> usize {
        self.search_log.lock().len()
    }

    pub fn record_fetch_count(&self) -> usize {
        self.record_fetches.load(AtomicOrdering::SeqCst)
    }

    fn sorted_hits(&self, search: &NativeSearch) -> Vec<RawAsset> {
        let mut hits: Vec<RawAsset> = self
            .assets
            .iter()
            .filter(|a| a.asset_type == search.asset_type)
            .filter(|a| search.conditions.matches(a))
            .cloned()
            .collect();
        let sort = search.sort.clone();
        if let Some(sort) = sort {
            hits.sort_by(|a, b| {
                let left = a.property(&sort.property);
                let right = b.property(&sort.property);
                let ord = compare_values(&left, &right)
                    .then_with(|| a.rid.cmp(&b.rid));
                if sort.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        hits
    }
}

fn compare_values(left: &Option<Value>, right: &Option<Value>) -> Ordering {
    match (left, right) {
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        (Some(Value::Number(l)), Some(Value::Number(r))) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn search(&self, search: &NativeSearch) -> Result<SearchPage, CatalogError> {
        self.search_log.lock().push(search.clone());
        let hits = self.sorted_hits(search);
        let total = hits.len();
        let page_size = if search.page_size == 0 {
            self.page_size
        } else {
            search.page_size.min(self.page_size)
        };
        let items: Vec<RawAsset> = hits
            .into_iter()
            .skip(search.begin)
            .take(page_size)
            .collect();
        Ok(SearchPage {
            search: search.clone(),
            total,
            items,
        })
    }

    async fn record_by_id(
        &self,
        rid: &str,
        _properties: &[String],
    ) -> Result<Option<RawAsset>, CatalogError> {
        self.record_fetches.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.assets.iter().find(|a| a.rid == rid).cloned())
    }

    async fn string_properties_for_type(
        &self,
        asset_type: &str,
    ) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .string_properties
            .get(asset_type)
            .cloned()
            .unwrap_or_else(|| vec!["_name".to_string(), "short_description".to_string()]))
    }

    fn capabilities(&self) -> CatalogCapabilities {
        self.capabilities
    }
}
