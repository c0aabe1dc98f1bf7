//! Similarity index capability and its HTTP adapter

use async_trait::async_trait;
use dtk_common::config::IndexConfig;
use dtk_fetch::{FetchRequest, RemoteFetcher};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Document returned by a similarity search, not yet judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Index-defined similarity; not a probability
    #[serde(default)]
    pub score: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Map::new(),
            score: 0.0,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// `metadata.title`, falling back to the id
    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
    }
}

/// External nearest-neighbour search
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` candidates, best first
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Candidate>>;
}

/// Search service reached over HTTP
///
/// POSTs `{query, k, collection}` and expects `{results: [Candidate]}`.
#[derive(Clone)]
pub struct HttpSearchIndex {
    fetcher: RemoteFetcher,
    search_url: String,
    collection: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Candidate>,
}

impl HttpSearchIndex {
    pub fn new(fetcher: RemoteFetcher, config: &IndexConfig) -> Self {
        Self {
            fetcher,
            search_url: config.search_url.clone(),
            collection: config.collection.clone(),
        }
    }
}

#[async_trait]
impl SimilarityIndex for HttpSearchIndex {
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Candidate>> {
        let request = FetchRequest::post_json(
            &self.search_url,
            json!({
                "query": query,
                "k": k,
                "collection": self.collection,
            }),
        );
        let response: SearchResponse = self.fetcher.fetch_json(&request).await?;
        debug!(
            collection = %self.collection,
            returned = response.results.len(),
            "Similarity search complete"
        );
        Ok(response.results)
    }
}
