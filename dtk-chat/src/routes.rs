//! Built-in intent handlers and dispatcher assembly

use crate::pipeline::{PipelineError, PipelineEvent, QueryFormulator, ResourcePipeline};
use crate::records::{RecordFilters, RecordSource};
use crate::render::resource_markdown;
use crate::router::{
    Chunk, Dispatcher, FallbackHandler, HandlerFuture, IntentModel, IntentResult, Reply,
    RouteError, RouteHandler,
};
use crate::session::{AcceptedItem, Session};
use anyhow::Context;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub const DATASET_DISCOVERY: &str = "dataset_discovery";
pub const FETCH_DATA: &str = "fetch_data";

pub const NO_RESOURCES_FOUND: &str = "No relevant resources were found";
pub const NO_DATASETS_IN_CONTEXT: &str =
    "No datasets are in context. Ask me to find datasets on a topic first.";

/// Field names listed in the fetch summary
const SUMMARY_FIELDS: usize = 8;

/// Finds datasets for the message and adds accepted ones to the session
///
/// The search query is formulated from the message and the earlier turns of
/// the session before retrieval starts.
#[derive(Clone)]
pub struct DatasetDiscoveryRoute {
    pipeline: ResourcePipeline,
    formulator: Arc<dyn QueryFormulator>,
    top_k: usize,
}

impl DatasetDiscoveryRoute {
    pub fn new(pipeline: ResourcePipeline, formulator: Arc<dyn QueryFormulator>, top_k: usize) -> Self {
        Self {
            pipeline,
            formulator,
            top_k,
        }
    }
}

impl RouteHandler<Arc<Session>> for DatasetDiscoveryRoute {
    fn call(&self, message: String, session: Arc<Session>) -> HandlerFuture {
        let pipeline = self.pipeline.clone();
        let formulator = self.formulator.clone();
        let top_k = self.top_k;
        Box::pin(async move {
            let earlier = session.history_before(&message).await;
            let formulated = formulator
                .formulate(&message, &earlier)
                .await
                .context("Search query formulation failed")?;
            let query = match formulated.trim() {
                "" => message,
                query => query.to_string(),
            };
            info!(session = %session.id, query = %query, "Search query formulated");

            let events = pipeline.retrieve(query, top_k);
            Ok::<_, anyhow::Error>(Reply::Stream(Box::pin(discovery_chunks(events, session))))
        })
    }
}

fn discovery_chunks<E>(events: E, session: Arc<Session>) -> impl Stream<Item = anyhow::Result<Chunk>> + Send + 'static
where
    E: Stream<Item = Result<PipelineEvent, PipelineError>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut events = Box::pin(events);
        let mut accepted = 0usize;

        while let Some(event) = events.next().await {
            match event? {
                PipelineEvent::Progress(text) => {
                    yield Chunk::thought(text);
                }
                PipelineEvent::Accepted { candidate, rationale } => {
                    let item = AcceptedItem::from_candidate(candidate, rationale);
                    let chunk = Chunk::Resource {
                        id: item.id.clone(),
                        markdown: resource_markdown(&item),
                    };
                    session.accept(item).await;
                    accepted += 1;
                    yield chunk;
                }
            }
        }

        info!(session = %session.id, accepted, "Dataset discovery finished");
        if accepted == 0 {
            yield Chunk::message(NO_RESOURCES_FOUND);
        }
    }
}

/// Pulls the records of the most recently accepted resource
///
/// `field=value` and `field!=value` tokens in the message become record filters.
#[derive(Clone)]
pub struct FetchDataRoute {
    source: Arc<dyn RecordSource>,
}

impl FetchDataRoute {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

impl RouteHandler<Arc<Session>> for FetchDataRoute {
    fn call(&self, message: String, session: Arc<Session>) -> HandlerFuture {
        let source = self.source.clone();
        Box::pin(async move {
            let Some(item) = session.latest_resource().await else {
                return Ok(Reply::text(NO_DATASETS_IN_CONTEXT));
            };

            let filters = RecordFilters::parse(&message);
            let records = source.fetch_records(&item, &filters).await?;
            Ok::<_, anyhow::Error>(Reply::Text(records_summary(&item, &filters, &records)))
        })
    }
}

fn records_summary(item: &AcceptedItem, filters: &RecordFilters, records: &[Value]) -> String {
    let mut summary = format!("Fetched {} records from '{}'", records.len(), item.title());
    if !filters.is_empty() {
        summary.push_str(&format!(" with filters {}", filters.describe()));
    }
    summary.push('.');

    let fields: Vec<&str> = records
        .first()
        .and_then(Value::as_object)
        .map(|row| row.keys().take(SUMMARY_FIELDS).map(String::as_str).collect())
        .unwrap_or_default();
    if !fields.is_empty() {
        summary.push_str(&format!(" Fields: {}", fields.join(", ")));
    }
    summary
}

/// Reply for messages no route claims
#[derive(Clone, Copy, Default)]
pub struct CapabilitiesFallback;

impl FallbackHandler<Arc<Session>> for CapabilitiesFallback {
    fn call(&self, _message: String, intent: IntentResult, _session: Arc<Session>) -> HandlerFuture {
        Box::pin(async move {
            Ok::<_, anyhow::Error>(Reply::Text(format!(
                "I can find open government datasets on a topic and fetch the records of a \
                 dataset we found. I read your message as '{}' (confidence {:.2}), which \
                 isn't something I can act on.",
                intent.category, intent.confidence
            )))
        })
    }
}

/// Dispatcher with the built-in routes and fallback registered
pub fn build_dispatcher(
    model: Arc<dyn IntentModel>,
    threshold: f64,
    pipeline: ResourcePipeline,
    formulator: Arc<dyn QueryFormulator>,
    top_k: usize,
    records: Arc<dyn RecordSource>,
) -> Result<Dispatcher<Arc<Session>>, RouteError> {
    Ok(Dispatcher::builder(model)
        .threshold(threshold)
        .route(
            DATASET_DISCOVERY,
            DatasetDiscoveryRoute::new(pipeline, formulator, top_k),
        )?
        .route(FETCH_DATA, FetchDataRoute::new(records))?
        .default_handler(CapabilitiesFallback)
        .build())
}
