//! JSON endpoint adapter for [`PaginatedCollector`](crate::PaginatedCollector)
//!
//! Endpoints disagree on parameter and field names, so every one is supplied
//! by the caller:
//!
//! ```rust,ignore
//! let source = JsonPageSource::new(fetcher, "https://demo.ckan.org/api/3/action/package_search")
//!     .offset_param("start")
//!     .limit_param("rows")
//!     .total_at("/result/count")
//!     .records_at("/result/results");
//! ```

use crate::collector::{PageRequest, PageResponse, PageSource};
use crate::error::FetchError;
use crate::fetcher::RemoteFetcher;
use crate::transport::FetchRequest;
use async_trait::async_trait;
use serde_json::Value;

/// Paginated GET endpoint returning a JSON body
#[derive(Clone)]
pub struct JsonPageSource {
    fetcher: RemoteFetcher,
    url: String,
    base_params: Vec<(String, String)>,
    offset_param: String,
    limit_param: String,
    total_pointer: String,
    records_pointer: String,
    success_pointer: Option<String>,
}

impl JsonPageSource {
    /// Defaults: `offset`/`limit` parameters, `/total` and `/records` fields
    pub fn new(fetcher: RemoteFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            base_params: Vec::new(),
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            total_pointer: "/total".to_string(),
            records_pointer: "/records".to_string(),
            success_pointer: None,
        }
    }

    pub fn offset_param(mut self, name: impl Into<String>) -> Self {
        self.offset_param = name.into();
        self
    }

    pub fn limit_param(mut self, name: impl Into<String>) -> Self {
        self.limit_param = name.into();
        self
    }

    /// JSON pointer (RFC 6901) to the total count
    pub fn total_at(mut self, pointer: impl Into<String>) -> Self {
        self.total_pointer = pointer.into();
        self
    }

    /// JSON pointer (RFC 6901) to the records array
    pub fn records_at(mut self, pointer: impl Into<String>) -> Self {
        self.records_pointer = pointer.into();
        self
    }

    /// JSON pointer to a boolean flag; a body where it is not `true` is an upstream error
    pub fn check_success(mut self, pointer: impl Into<String>) -> Self {
        self.success_pointer = Some(pointer.into());
        self
    }

    /// Parameter sent with every page
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_params.push((key.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn decode_error(&self, message: String) -> FetchError {
        FetchError::Decode {
            url: self.url.clone(),
            message,
        }
    }

    /// Split a page body into total and records
    pub fn decode_page(&self, body: &Value) -> Result<PageResponse<Value>, FetchError> {
        if let Some(pointer) = &self.success_pointer {
            if body.pointer(pointer).and_then(Value::as_bool) != Some(true) {
                let message = body
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("endpoint reported success=false")
                    .to_string();
                return Err(FetchError::Upstream {
                    status: 200,
                    url: self.url.clone(),
                    body: message,
                });
            }
        }

        let total_value = body.pointer(&self.total_pointer).ok_or_else(|| {
            self.decode_error(format!("missing total field at '{}'", self.total_pointer))
        })?;

        // Some portals return counts as strings
        let total = match total_value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| self.decode_error(format!("total is not a count: {}", total_value)))?;

        let records = body
            .pointer(&self.records_pointer)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                self.decode_error(format!("missing records array at '{}'", self.records_pointer))
            })?
            .clone();

        Ok(PageResponse {
            total: total as usize,
            records,
        })
    }
}

#[async_trait]
impl PageSource for JsonPageSource {
    type Record = Value;

    async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse<Value>, FetchError> {
        let fetch = FetchRequest::get(&self.url)
            .params(self.base_params.iter().cloned())
            .params(request.params)
            .query(&self.offset_param, request.offset.to_string())
            .query(&self.limit_param, request.limit.to_string());

        let body: Value = self.fetcher.fetch_json(&fetch).await?;
        self.decode_page(&body)
    }
}
