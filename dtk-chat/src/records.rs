//! Record retrieval for accepted resources

use crate::session::{AcceptedItem, OGD_CATALOG_INTERFACE};
use anyhow::{bail, Context};
use async_trait::async_trait;
use dtk_fetch::ogd::OgdClient;
use dtk_fetch::PaginatedCollector;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Field filters for a record fetch
///
/// Written inline in a chat message: `state=Kerala` keeps records whose
/// `state` equals `Kerala`, `district!=Idukki` drops records whose `district`
/// equals `Idukki`. Values may be quoted but cannot contain spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilters {
    pub include: BTreeMap<String, String>,
    pub exclude: BTreeMap<String, String>,
}

impl RecordFilters {
    pub fn parse(message: &str) -> Self {
        let mut filters = Self::default();
        for token in message.split_whitespace() {
            let token = token.trim_end_matches(|c| matches!(c, ',' | ';' | '.' | '?' | '!'));
            if let Some((field, value)) = token.split_once("!=") {
                if let Some((field, value)) = filter_pair(field, value) {
                    filters.exclude.insert(field, value);
                }
            } else if let Some((field, value)) = token.split_once('=') {
                if let Some((field, value)) = filter_pair(field, value) {
                    filters.include.insert(field, value);
                }
            }
        }
        filters
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// OGD query parameters: `filters[field]` and `notfilters[field]`
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let include = self
            .include
            .iter()
            .map(|(field, value)| (format!("filters[{}]", field), value.clone()));
        let exclude = self
            .exclude
            .iter()
            .map(|(field, value)| (format!("notfilters[{}]", field), value.clone()));
        include.chain(exclude).collect()
    }

    /// `field=value` pairs, included first
    pub fn describe(&self) -> String {
        let include = self.include.iter().map(|(f, v)| format!("{}={}", f, v));
        let exclude = self.exclude.iter().map(|(f, v)| format!("{}!={}", f, v));
        include.chain(exclude).collect::<Vec<_>>().join(", ")
    }
}

fn filter_pair(field: &str, value: &str) -> Option<(String, String)> {
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    let valid_field = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    (valid_field && !value.is_empty()).then(|| (field.to_string(), value.to_string()))
}

/// Pulls the full record set behind an accepted resource
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(
        &self,
        item: &AcceptedItem,
        filters: &RecordFilters,
    ) -> anyhow::Result<Vec<Value>>;
}

/// OGD catalog records, collected page by page
pub struct OgdRecordSource {
    client: OgdClient,
    collector: PaginatedCollector,
    page_size: usize,
}

impl OgdRecordSource {
    pub fn new(client: OgdClient, collector: PaginatedCollector, page_size: usize) -> Self {
        Self {
            client,
            collector,
            page_size,
        }
    }
}

#[async_trait]
impl RecordSource for OgdRecordSource {
    async fn fetch_records(
        &self,
        item: &AcceptedItem,
        filters: &RecordFilters,
    ) -> anyhow::Result<Vec<Value>> {
        if item.interface() != OGD_CATALOG_INTERFACE {
            bail!("Unsupported resource interface '{}'", item.interface());
        }

        let catalog = item.catalog_id();
        let source = self.client.catalog_source(catalog)?;
        let records = self
            .collector
            .collect_all(&source, self.page_size, &filters.to_params())
            .await
            .with_context(|| format!("Failed to collect records for catalog '{}'", catalog))?;

        info!(
            catalog = %catalog,
            records = records.len(),
            filters = %filters.describe(),
            "Collected catalog records"
        );
        Ok(records)
    }
}
