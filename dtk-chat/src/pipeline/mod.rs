//! Retrieval-and-relevance pipeline
//!
//! [`ResourcePipeline::retrieve`] queries a [`SimilarityIndex`] for the top-k
//! candidates, then asks a [`RelevanceJudge`] about each one in index order,
//! yielding progress and acceptance events as it goes. The sequence is lazy:
//! dropping it stops further judgment calls.
//!
//! The query itself comes from a [`QueryFormulator`], which may rewrite the
//! latest message using earlier turns of the conversation.

mod index;
mod judge;
mod query;
mod retriever;

pub use index::{Candidate, HttpSearchIndex, SimilarityIndex};
pub use judge::{Judgment, RelevanceJudge};
pub use query::{QueryFormulator, VerbatimQuery};
pub use retriever::{PipelineError, PipelineEvent, ResourcePipeline};
