//! Per-request record cache.
//!
//! One logical federation call can need the same backend record several
//! times (endpoint validation, relationship derivation, proxy building).
//! The cache lives for exactly one request and is never shared across
//! requests: mapping state is immutable, but record contents are not, so a
//! longer-lived cache would serve stale reads across calls.

use crate::asset::RawAsset;
use crate::client::{CatalogClient, CatalogError};
use std::collections::HashMap;

#[derive(Default)]
pub struct RecordCache {
    /// rid → record; `None` caches a confirmed miss.
    records: HashMap<String, Option<RawAsset>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch through the cache. Repeated lookups for the same rid within
    /// this request hit the transport at most once, including misses.
    pub async fn record_by_id(
        &mut self,
        client: &dyn CatalogClient,
        rid: &str,
        properties: &[String],
    ) -> Result<Option<RawAsset>, CatalogError> {
        if let Some(cached) = self.records.get(rid) {
            return Ok(cached.clone());
        }
        let fetched = client.record_by_id(rid, properties).await?;
        self.records.insert(rid.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Seed a record obtained from a search hit, so later by-id lookups in
    /// the same request skip the transport.
    pub fn seed(&mut self, asset: RawAsset) {
        self.records.insert(asset.rid.clone(), Some(asset));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;

    #[tokio::test]
    async fn repeated_lookups_hit_transport_once() {
        let catalog = MemoryCatalog::new(vec![RawAsset::new("r1", "term", "Employee")]);
        let mut cache = RecordCache::new();

        for _ in 0..3 {
            let hit = cache.record_by_id(&catalog, "r1", &[]).await.unwrap();
            assert!(hit.is_some());
        }
        let miss = cache.record_by_id(&catalog, "absent", &[]).await.unwrap();
        assert!(miss.is_none());
        // Misses are cached too.
        let _ = cache.record_by_id(&catalog, "absent", &[]).await.unwrap();

        assert_eq!(catalog.record_fetch_count(), 2);
    }
}
