use super::index::{Candidate, SimilarityIndex};
use super::judge::RelevanceJudge;
use crate::router::BoxError;
use futures::Stream;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// One step of a retrieval run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(String),
    Accepted { candidate: Candidate, rationale: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Similarity search failed for '{query}': {source}")]
    SearchFailed {
        query: String,
        #[source]
        source: BoxError,
    },

    #[error("Relevance judgment failed for candidate '{candidate_id}': {source}")]
    JudgmentFailed {
        candidate_id: String,
        #[source]
        source: BoxError,
    },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::SearchFailed { .. } => "SEARCH_FAILED",
            PipelineError::JudgmentFailed { .. } => "JUDGMENT_FAILED",
        }
    }
}

/// Similarity retrieval followed by per-candidate relevance judgment
///
/// Holds shared handles only; both capabilities outlive any retrieval.
#[derive(Clone)]
pub struct ResourcePipeline {
    index: Arc<dyn SimilarityIndex>,
    judge: Arc<dyn RelevanceJudge>,
}

impl ResourcePipeline {
    pub fn new(index: Arc<dyn SimilarityIndex>, judge: Arc<dyn RelevanceJudge>) -> Self {
        Self { index, judge }
    }

    /// Lazy, finite event sequence for `query`
    ///
    /// Nothing happens until the stream is polled. Candidates are judged one at
    /// a time in index order; the first judge failure ends the stream with
    /// [`PipelineError::JudgmentFailed`].
    pub fn retrieve(
        &self,
        query: impl Into<String>,
        k: usize,
    ) -> impl Stream<Item = Result<PipelineEvent, PipelineError>> + Send + 'static {
        let index = self.index.clone();
        let judge = self.judge.clone();
        let query: String = query.into();

        async_stream::try_stream! {
            let candidates = index.search(&query, k).await.map_err(|e| {
                PipelineError::SearchFailed {
                    query: query.clone(),
                    source: e.into(),
                }
            })?;

            info!(query = %query, found = candidates.len(), "Similarity search returned candidates");
            yield PipelineEvent::Progress(format!(
                "Found {} similar documents for query '{}'",
                candidates.len(),
                query
            ));

            for candidate in candidates {
                let judgment = judge.judge(&candidate.text, &query).await.map_err(|e| {
                    PipelineError::JudgmentFailed {
                        candidate_id: candidate.id.clone(),
                        source: e.into(),
                    }
                })?;

                let verdict = if judgment.is_relevant { "relevant" } else { "irrelevant" };
                debug!(candidate = %candidate.id, verdict, "Judged candidate");
                yield PipelineEvent::Progress(format!(
                    "Judged resource '{}' as '{}'",
                    candidate.title(),
                    verdict
                ));

                if judgment.is_relevant {
                    yield PipelineEvent::Accepted {
                        candidate,
                        rationale: judgment.rationale,
                    };
                }
            }
        }
    }
}
