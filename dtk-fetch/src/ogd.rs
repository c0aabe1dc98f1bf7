//! Open Government Data (OGD) platform client
//!
//! Two hosts are involved:
//! - backend (`/dmspublic/v1/catalogs`, `/dataapi/v1/catalog/{uuid}`): catalog
//!   listing and catalog metadata, no key required
//! - API (`/catalog/{uuid}`): catalog records, requires an API key
//!
//! The platform rate limit is strict; keep collector concurrency low when
//! pulling catalog records.

use crate::error::FetchError;
use crate::fetcher::RemoteFetcher;
use crate::json_page::JsonPageSource;
use crate::transport::FetchRequest;
use dtk_common::config::OgdConfig;
use serde_json::Value;

/// OGD platform client
#[derive(Clone)]
pub struct OgdClient {
    fetcher: RemoteFetcher,
    api_key: Option<String>,
    backend_url: String,
    api_url: String,
}

impl OgdClient {
    pub fn new(fetcher: RemoteFetcher, config: &OgdConfig, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            api_key,
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Paginated catalog listing
    pub fn catalogs_source(&self) -> JsonPageSource {
        JsonPageSource::new(
            self.fetcher.clone(),
            format!("{}/dmspublic/v1/catalogs", self.backend_url),
        )
        .total_at("/total")
        .records_at("/data/rows")
    }

    /// Paginated records of one catalog
    pub fn catalog_source(&self, catalog_uuid: &str) -> Result<JsonPageSource, FetchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FetchError::InvalidRequest("OGD API key not configured".to_string())
        })?;
        if catalog_uuid.trim().is_empty() {
            return Err(FetchError::InvalidRequest("Catalog UUID must not be empty".to_string()));
        }

        Ok(JsonPageSource::new(
            self.fetcher.clone(),
            format!("{}/catalog/{}", self.api_url, catalog_uuid),
        )
        .param("api_key", api_key)
        .param("format", "json")
        .total_at("/total")
        .records_at("/records"))
    }

    /// Catalog metadata document
    pub async fn catalog_metadata(&self, catalog_uuid: &str) -> Result<Value, FetchError> {
        let request = FetchRequest::get(format!(
            "{}/dataapi/v1/catalog/{}",
            self.backend_url, catalog_uuid
        ))
        .query("format", "json");

        tracing::debug!(catalog = %catalog_uuid, "Fetching OGD catalog metadata");
        self.fetcher.fetch_json(&request).await
    }
}
