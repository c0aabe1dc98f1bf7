//! Integration tests for the retrieval-and-relevance pipeline

mod helpers;

use dtk_chat::pipeline::{PipelineError, PipelineEvent, ResourcePipeline};
use futures::{StreamExt, TryStreamExt};
use helpers::{candidate, rainfall_fixture, FixedIndex, ScriptedJudge};
use std::sync::Arc;

fn accepted(events: &[PipelineEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Accepted {
                candidate,
                rationale,
            } => Some((candidate.id.clone(), rationale.clone())),
            PipelineEvent::Progress(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_zero_candidates_yields_single_progress() {
    let pipeline = ResourcePipeline::new(
        Arc::new(FixedIndex::new(Vec::new())),
        Arc::new(ScriptedJudge::new()),
    );

    let events: Vec<_> = pipeline.retrieve("glacier melt", 7).try_collect().await.unwrap();

    assert_eq!(
        events,
        vec![PipelineEvent::Progress(
            "Found 0 similar documents for query 'glacier melt'".to_string()
        )]
    );
}

#[tokio::test]
async fn test_accepts_m_of_k_in_index_order() {
    let (index, judge) = rainfall_fixture();
    let pipeline = ResourcePipeline::new(index, judge.clone());

    let events: Vec<_> = pipeline.retrieve("rainfall", 7).try_collect().await.unwrap();

    assert_eq!(
        accepted(&events),
        vec![
            ("rain-1".to_string(), "Rainfall by district".to_string()),
            ("rain-2".to_string(), "Seasonal rainfall totals".to_string()),
        ]
    );
    assert_eq!(judge.judged().len(), 3);
}

#[tokio::test]
async fn test_event_sequence() {
    let (index, judge) = rainfall_fixture();
    let pipeline = ResourcePipeline::new(index, judge);

    let events: Vec<_> = pipeline.retrieve("rainfall", 7).try_collect().await.unwrap();

    let progress: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            "Found 3 similar documents for query 'rainfall'",
            "Judged resource 'District Rainfall' as 'relevant'",
            "Judged resource 'Tourist Arrivals' as 'irrelevant'",
            "Judged resource 'Monsoon Rainfall' as 'relevant'",
        ]
    );

    // Each acceptance directly follows its verdict
    assert!(matches!(events[2], PipelineEvent::Accepted { .. }));
    assert!(matches!(events[3], PipelineEvent::Progress(_)));
    assert!(matches!(events[5], PipelineEvent::Accepted { .. }));
    assert_eq!(events.len(), 6);
}

#[tokio::test]
async fn test_k_bounds_candidates() {
    let (index, judge) = rainfall_fixture();
    let pipeline = ResourcePipeline::new(index, judge.clone());

    let events: Vec<_> = pipeline.retrieve("rainfall", 1).try_collect().await.unwrap();

    assert_eq!(accepted(&events).len(), 1);
    assert_eq!(judge.judged(), vec!["District Rainfall description"]);
}

#[tokio::test]
async fn test_judge_failure_terminates_stream() {
    let index = Arc::new(FixedIndex::new(vec![
        candidate("a", "Alpha"),
        candidate("b", "Beta"),
        candidate("c", "Gamma"),
    ]));
    let judge = Arc::new(
        ScriptedJudge::new()
            .relevant("Alpha description", "ok")
            .failing_on("Beta description"),
    );
    let pipeline = ResourcePipeline::new(index, judge.clone());

    let results: Vec<_> = pipeline.retrieve("q", 7).collect().await;

    // found, judged(a), accepted(a), error
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(Result::is_ok));
    match results.last().unwrap() {
        Err(PipelineError::JudgmentFailed { candidate_id, .. }) => assert_eq!(candidate_id, "b"),
        other => panic!("Expected JudgmentFailed, got {:?}", other),
    }
    assert_eq!(
        judge.judged(),
        vec!["Alpha description", "Beta description"],
        "no candidate is judged after a failure"
    );
}

#[tokio::test]
async fn test_search_failure() {
    let pipeline = ResourcePipeline::new(
        Arc::new(FixedIndex::failing()),
        Arc::new(ScriptedJudge::new()),
    );

    let err = pipeline
        .retrieve("q", 7)
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SearchFailed { ref query, .. } if query == "q"));
    assert_eq!(err.code(), "SEARCH_FAILED");
}

#[tokio::test]
async fn test_retrieval_is_lazy() {
    let (index, judge) = rainfall_fixture();
    let pipeline = ResourcePipeline::new(index.clone(), judge.clone());

    let stream = pipeline.retrieve("rainfall", 7);
    assert_eq!(index.calls(), 0, "nothing runs before the first poll");

    let mut stream = Box::pin(stream);
    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, PipelineEvent::Progress(_)));
    let second = stream.next().await.unwrap().unwrap();
    assert!(matches!(second, PipelineEvent::Progress(_)));
    drop(stream);

    assert_eq!(index.calls(), 1);
    assert_eq!(judge.judged().len(), 1, "dropping the stream stops judgment");
}

#[tokio::test]
async fn test_each_retrieval_requeries() {
    let (index, judge) = rainfall_fixture();
    let pipeline = ResourcePipeline::new(index.clone(), judge.clone());

    let _: Vec<_> = pipeline.retrieve("rainfall", 7).try_collect().await.unwrap();
    let _: Vec<_> = pipeline.retrieve("rainfall", 7).try_collect().await.unwrap();

    assert_eq!(index.calls(), 2);
    assert_eq!(judge.judged().len(), 6);
}
