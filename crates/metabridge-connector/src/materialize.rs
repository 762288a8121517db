//! Result materialization: native search hits → federation entities.
//!
//! One abstract query fans out to several native searches, but the caller
//! asked for at most one page of results. The budget therefore spans the
//! whole fan-out: searches run in their translated (deterministic) order,
//! and once the budget is filled no further transport round trips happen.

use crate::translate::TranslatedSearch;
use crate::{CancelFlag, FederationError};
use metabridge_catalog::{CatalogClient, RECORD_ID_PROPERTY};
use metabridge_mapping::{convert, MappingRegistry};
use metabridge_model::EntityDetail;

pub struct Materializer<'a> {
    home_id: &'a str,
    registry: &'a MappingRegistry,
    client: &'a dyn CatalogClient,
    cancel: &'a CancelFlag,
}

impl<'a> Materializer<'a> {
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

    /// Run the translated searches and convert their hits, drawing at most
    /// `budget` entities across the whole fan-out (0 means unbounded).
    ///
    /// A record that fails conversion is logged and dropped rather than
    /// failing the page: one malformed backend record must not hide the
    /// rest of the results. Entities rejected by a search's post-filters
    /// are dropped without counting against the budget. Under the injected
    /// record-id order each search's batch is sorted by GUID before being
    /// appended; a caller-requested sequencing is kept as returned.
    pub async fn collect_entities(
        &self,
        operation: &'static str,
        searches: &[TranslatedSearch],
        budget: usize,
    ) -> Result<Vec<EntityDetail>, FederationError> {
        let mut out: Vec<EntityDetail> = Vec::new();

        for translated in searches {
            let remaining = match budget {
                0 => usize::MAX,
                _ => budget - out.len(),
            };
            if remaining == 0 {
                tracing::debug!(
                    abstract_type = %translated.abstract_type,
                    "page budget filled, skipping remaining searches"
                );
                break;
            }
            let mapping = match self
                .registry
                .mapping_for_abstract_type(&translated.abstract_type)
            {
                Some(mapping) => mapping,
                None => continue,
            };

            self.cancel.guard(operation)?;
            let mut page = self
                .client
                .search(&translated.native)
                .await
                .map_err(|e| FederationError::backend(operation, e))?;

            let mut batch: Vec<EntityDetail> = Vec::new();
            loop {
                for asset in &page.items {
                    if batch.len() >= remaining {
                        break;
                    }
                    match convert::entity_from_asset(self.home_id, mapping, asset) {
                        Ok(entity) if !translated.accepts(&entity) => {
                            tracing::debug!(
                                rid = %asset.rid,
                                asset_type = %asset.asset_type,
                                "dropping hit excluded by a unique-name filter"
                            );
                        }
                        Ok(entity) => batch.push(entity),
                        Err(error) => {
                            tracing::warn!(
                                rid = %asset.rid,
                                asset_type = %asset.asset_type,
                                %error,
                                "dropping record that failed conversion"
                            );
                        }
                    }
                }
                if batch.len() >= remaining {
                    break;
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
            if record_id_ordered(translated) {
                batch.sort_by(|a, b| a.guid.cmp(&b.guid));
            }
            out.append(&mut batch);
        }
        Ok(out)
    }
}

/// True when the search carries the injected record-id order, whose batches
/// may be re-sorted by GUID without disturbing a requested sequencing.
fn record_id_ordered(translated: &TranslatedSearch) -> bool {
    translated
        .native
        .sort
        .as_ref()
        .is_some_and(|sort| sort.property == RECORD_ID_PROPERTY && sort.ascending)
}
