//! Transport boundary to the backend catalog.
//!
//! `CatalogClient` is the only suspension point in the whole query path:
//! every federation call performs zero or more sequential round trips
//! through it. Implementations must bound each round trip with a timeout so
//! a slow backend cannot block a query indefinitely. Retry policy belongs
//! here, not in the translation core.

use crate::asset::RawAsset;
use crate::search::NativeSearch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Long-text property excluded from full-text conditions on backend
/// releases that cannot index it (see `CatalogCapabilities`).
pub const LONG_TEXT_PROPERTY: &str = "long_description";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("backend call `{operation}` failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("backend call `{operation}` returned an unusable payload: {message}")]
    Protocol {
        operation: &'static str,
        message: String,
    },
    #[error("backend call `{operation}` timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

// ============================================================================
// Version / capability probe
// ============================================================================

/// Backend release, as reported by the version probe at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CatalogVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Known per-release quirks, resolved once from the version probe so the
/// translation layer can special-case them without re-probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCapabilities {
    pub version: CatalogVersion,
}

impl CatalogCapabilities {
    pub fn for_version(version: CatalogVersion) -> Self {
        Self { version }
    }

    /// Releases before 11.7 cannot evaluate full-text conditions against the
    /// long-text property; it must be left out of broad value searches.
    pub fn supports_long_text_search(&self) -> bool {
        self.version >= CatalogVersion::new(11, 7, 0)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the REST transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-round-trip timeout in seconds.
    pub timeout_secs: u64,
    /// Transport page size used when a search does not name one.
    pub default_page_size: usize,
}

impl CatalogConfig {
    /// Load from environment variables (`CATALOG_URL`, `CATALOG_USER`,
    /// `CATALOG_PASSWORD`, optional `CATALOG_TIMEOUT_SECS`).
    pub fn from_env() -> Result<Self, CatalogError> {
        let base_url = std::env::var("CATALOG_URL").map_err(|_| CatalogError::Protocol {
            operation: "from_env",
            message: "CATALOG_URL is not set".to_string(),
        })?;
        Ok(Self {
            base_url,
            username: std::env::var("CATALOG_USER").unwrap_or_default(),
            password: std::env::var("CATALOG_PASSWORD").unwrap_or_default(),
            timeout_secs: std::env::var("CATALOG_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            default_page_size: 100,
        })
    }
}

// ============================================================================
// Client trait
// ============================================================================

/// One transport page of search results. Finite and restartable only from a
/// fresh offset: `next_page` re-issues the originating search with the
/// offset advanced, it does not resume a server-side cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub search: NativeSearch,
    pub total: usize,
    pub items: Vec<RawAsset>,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.search.begin + self.items.len() < self.total
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Execute one native search, returning the first page.
    async fn search(&self, search: &NativeSearch) -> Result<SearchPage, CatalogError>;

    /// Fetch one record by id with the given projected properties.
    async fn record_by_id(
        &self,
        rid: &str,
        properties: &[String],
    ) -> Result<Option<RawAsset>, CatalogError>;

    /// All string-valued property names of a backend type, for broad value
    /// searches.
    async fn string_properties_for_type(
        &self,
        asset_type: &str,
    ) -> Result<Vec<String>, CatalogError>;

    /// Release-derived capabilities, probed once at connect time.
    fn capabilities(&self) -> CatalogCapabilities;

    /// Fetch the page after `page`, or `None` when exhausted.
    async fn next_page(&self, page: &SearchPage) -> Result<Option<SearchPage>, CatalogError> {
        if !page.has_more() || page.items.is_empty() {
            return Ok(None);
        }
        let mut next = page.search.clone();
        next.begin = page.search.begin + page.items.len();
        self.search(&next).await.map(Some)
    }
}

// ============================================================================
// REST implementation
// ============================================================================

/// The real HTTP transport. All round trips share one pooled client with a
/// bounded timeout; every failure is wrapped with the failing operation
/// name.
pub struct RestCatalog {
    http: reqwest::Client,
    config: CatalogConfig,
    capabilities: CatalogCapabilities,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    major: u32,
    minor: u32,
    patch: u32,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    items: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct PropertyListPayload {
    #[serde(default)]
    properties: Vec<String>,
}

impl RestCatalog {
    /// Connect and probe the backend version.
    pub async fn connect(config: CatalogConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Transport {
                operation: "connect",
                message: e.to_string(),
            })?;
        let url = format!("{}/api/version", config.base_url);
        let payload: VersionPayload = Self::get_json(&http, &config, &url, "connect").await?;
        let capabilities = CatalogCapabilities::for_version(CatalogVersion::new(
            payload.major,
            payload.minor,
            payload.patch,
        ));
        tracing::debug!(?capabilities.version, "connected to backend catalog");
        Ok(Self {
            http,
            config,
            capabilities,
        })
    }

    fn wrap(operation: &'static str, timeout: Duration, err: reqwest::Error) -> CatalogError {
        if err.is_timeout() {
            CatalogError::Timeout { operation, timeout }
        } else {
            CatalogError::Transport {
                operation,
                message: err.to_string(),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        http: &reqwest::Client,
        config: &CatalogConfig,
        url: &str,
        operation: &'static str,
    ) -> Result<T, CatalogError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let response = http
            .get(url)
            .basic_auth(&config.username, Some(&config.password))
            .send()
            .await
            .map_err(|e| Self::wrap(operation, timeout, e))?;
        response
            .error_for_status()
            .map_err(|e| Self::wrap(operation, timeout, e))?
            .json()
            .await
            .map_err(|e| CatalogError::Protocol {
                operation,
                message: e.to_string(),
            })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &impl Serialize,
        operation: &'static str,
    ) -> Result<T, CatalogError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(body)
            .send()
            .await
            .map_err(|e| Self::wrap(operation, timeout, e))?;
        response
            .error_for_status()
            .map_err(|e| Self::wrap(operation, timeout, e))?
            .json()
            .await
            .map_err(|e| CatalogError::Protocol {
                operation,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl CatalogClient for RestCatalog {
    async fn search(&self, search: &NativeSearch) -> Result<SearchPage, CatalogError> {
        let mut search = search.clone();
        if search.page_size == 0 {
            search.page_size = self.config.default_page_size;
        }
        let url = format!("{}/api/search", self.config.base_url);
        let payload: SearchPayload = self.post_json(&url, &search, "search").await?;
        Ok(SearchPage {
            search,
            total: payload.total,
            items: payload.items,
        })
    }

    async fn record_by_id(
        &self,
        rid: &str,
        properties: &[String],
    ) -> Result<Option<RawAsset>, CatalogError> {
        let url = format!(
            "{}/api/assets/{}?properties={}",
            self.config.base_url,
            rid,
            properties.join(",")
        );
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| Self::wrap("record_by_id", timeout, e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let asset = response
            .error_for_status()
            .map_err(|e| Self::wrap("record_by_id", timeout, e))?
            .json()
            .await
            .map_err(|e| CatalogError::Protocol {
                operation: "record_by_id",
                message: e.to_string(),
            })?;
        Ok(Some(asset))
    }

    async fn string_properties_for_type(
        &self,
        asset_type: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let url = format!(
            "{}/api/types/{}/properties?kind=string",
            self.config.base_url, asset_type
        );
        let payload: PropertyListPayload =
            Self::get_json(&self.http, &self.config, &url, "string_properties_for_type").await?;
        Ok(payload.properties)
    }

    fn capabilities(&self) -> CatalogCapabilities {
        self.capabilities
    }
}
