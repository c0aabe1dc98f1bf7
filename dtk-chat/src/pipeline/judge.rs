//! Relevance verdicts on similarity-search candidates

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Relevance verdict for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub is_relevant: bool,
    #[serde(alias = "how", default)]
    pub rationale: String,
}

impl Judgment {
    pub fn relevant(rationale: impl Into<String>) -> Self {
        Self {
            is_relevant: true,
            rationale: rationale.into(),
        }
    }

    pub fn irrelevant(rationale: impl Into<String>) -> Self {
        Self {
            is_relevant: false,
            rationale: rationale.into(),
        }
    }
}

/// External relevance-judgment capability
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn judge(&self, text: &str, query: &str) -> anyhow::Result<Judgment>;
}
