//! CKAN action API client
//!
//! Every action answers `{"success": bool, "result": ...}` under
//! `/api/3/action/{action}`. `success: false` is treated as an upstream error
//! even when the HTTP status is 2xx.

use crate::error::FetchError;
use crate::fetcher::RemoteFetcher;
use crate::json_page::JsonPageSource;
use crate::transport::FetchRequest;
use serde_json::Value;

#[derive(Clone)]
pub struct CkanClient {
    fetcher: RemoteFetcher,
    base_url: String,
}

impl CkanClient {
    pub fn new(fetcher: RemoteFetcher, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.base_url, action)
    }

    /// Call an action and unwrap its `result`
    pub async fn action(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = self.action_url(action);
        let request = FetchRequest::get(&url).params(params.iter().copied());
        let body: Value = self.fetcher.fetch_json(&request).await?;
        unwrap_result(&url, body)
    }

    pub async fn package_list(&self) -> Result<Vec<String>, FetchError> {
        let url = self.action_url("package_list");
        let result = self.action("package_list", &[]).await?;
        serde_json::from_value(result).map_err(|e| FetchError::Decode {
            url,
            message: e.to_string(),
        })
    }

    pub async fn package_show(&self, package_id: &str) -> Result<Value, FetchError> {
        self.action("package_show", &[("id", package_id)]).await
    }

    pub async fn resource_show(&self, resource_id: &str) -> Result<Value, FetchError> {
        self.action("resource_show", &[("id", resource_id)]).await
    }

    pub async fn datastore_info(&self, resource_id: &str) -> Result<Value, FetchError> {
        self.action("datastore_info", &[("id", resource_id)]).await
    }

    /// `package_search` paged through `start`/`rows`
    pub fn package_search_source(&self, query: &str) -> JsonPageSource {
        JsonPageSource::new(self.fetcher.clone(), self.action_url("package_search"))
            .param("q", query)
            .offset_param("start")
            .limit_param("rows")
            .check_success("/success")
            .total_at("/result/count")
            .records_at("/result/results")
    }
}

fn unwrap_result(url: &str, mut body: Value) -> Result<Value, FetchError> {
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("action reported success=false")
            .to_string();
        return Err(FetchError::Upstream {
            status: 200,
            url: url.to_string(),
            body: message,
        });
    }

    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| FetchError::Decode {
            url: url.to_string(),
            message: "missing 'result' field".to_string(),
        })
}
