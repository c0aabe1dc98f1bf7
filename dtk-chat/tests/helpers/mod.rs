//! Scripted capabilities for dtk-chat integration tests

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use dtk_chat::pipeline::{
    Candidate, Judgment, QueryFormulator, RelevanceJudge, ResourcePipeline, SimilarityIndex,
    VerbatimQuery,
};
use dtk_chat::records::{RecordFilters, RecordSource};
use dtk_chat::router::{IntentModel, IntentResult};
use dtk_chat::session::{AcceptedItem, ChatMessage};
use dtk_chat::{build_dispatcher, AppState, SessionDispatcher};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Intent model answering from keyword rules, else a fixed default
pub struct ScriptedIntentModel {
    rules: Vec<(String, IntentResult)>,
    default: Option<IntentResult>,
    pub calls: AtomicUsize,
    pub seen_categories: Mutex<Vec<Vec<String>>>,
}

impl ScriptedIntentModel {
    pub fn returning(category: &str, confidence: f64) -> Self {
        Self {
            rules: Vec::new(),
            default: Some(IntentResult::new(category, confidence)),
            calls: AtomicUsize::new(0),
            seen_categories: Mutex::new(Vec::new()),
        }
    }

    /// Every classification fails
    pub fn failing() -> Self {
        Self {
            rules: Vec::new(),
            default: None,
            calls: AtomicUsize::new(0),
            seen_categories: Mutex::new(Vec::new()),
        }
    }

    /// Messages containing `keyword` classify as `category`
    pub fn when(mut self, keyword: &str, category: &str, confidence: f64) -> Self {
        self.rules
            .push((keyword.to_string(), IntentResult::new(category, confidence)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_categories(&self) -> Vec<String> {
        self.seen_categories
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl IntentModel for ScriptedIntentModel {
    async fn classify(&self, message: &str, categories: &[String]) -> anyhow::Result<IntentResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_categories.lock().unwrap().push(categories.to_vec());

        if let Some((_, result)) = self.rules.iter().find(|(k, _)| message.contains(k.as_str())) {
            return Ok(result.clone());
        }
        self.default
            .clone()
            .ok_or_else(|| anyhow!("classification backend unavailable"))
    }
}

/// Index returning a fixed candidate list
pub struct FixedIndex {
    candidates: Vec<Candidate>,
    fail: bool,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl FixedIndex {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            fail: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimilarityIndex for FixedIndex {
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(anyhow!("search service unreachable"));
        }
        Ok(self.candidates.iter().take(k).cloned().collect())
    }
}

/// Judge keyed by candidate text; unknown texts are irrelevant
pub struct ScriptedJudge {
    verdicts: HashMap<String, Judgment>,
    fail_on: Option<String>,
    pub judged: Mutex<Vec<String>>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self {
            verdicts: HashMap::new(),
            fail_on: None,
            judged: Mutex::new(Vec::new()),
        }
    }

    pub fn relevant(mut self, text: &str, rationale: &str) -> Self {
        self.verdicts
            .insert(text.to_string(), Judgment::relevant(rationale));
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub fn judged(&self) -> Vec<String> {
        self.judged.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelevanceJudge for ScriptedJudge {
    async fn judge(&self, text: &str, _query: &str) -> anyhow::Result<Judgment> {
        self.judged.lock().unwrap().push(text.to_string());
        if self.fail_on.as_deref() == Some(text) {
            return Err(anyhow!("model returned garbage"));
        }
        Ok(self
            .verdicts
            .get(text)
            .cloned()
            .unwrap_or_else(|| Judgment::irrelevant("not about the query")))
    }
}

/// Formulator returning a fixed query and remembering what it was shown
pub struct ScriptedFormulator {
    query: Option<String>,
    pub seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedFormulator {
    pub fn rewriting_to(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            query: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// (message, earlier turn contents) per call
    pub fn seen(&self) -> Vec<(String, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryFormulator for ScriptedFormulator {
    async fn formulate(&self, message: &str, earlier: &[ChatMessage]) -> anyhow::Result<String> {
        let turns = earlier.iter().map(|m| m.content.clone()).collect();
        self.seen.lock().unwrap().push((message.to_string(), turns));
        self.query
            .clone()
            .ok_or_else(|| anyhow!("query model unavailable"))
    }
}

/// Record source serving fixed rows and remembering which items were asked for
///
/// Filters are applied to the rows the way the OGD API applies them.
pub struct FakeRecordSource {
    records: Vec<Value>,
    pub requested: Mutex<Vec<String>>,
    pub filters: Mutex<Vec<RecordFilters>>,
}

impl FakeRecordSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            requested: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<RecordFilters> {
        self.filters.lock().unwrap().clone()
    }
}

fn field_equals(record: &Value, field: &str, value: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

#[async_trait]
impl RecordSource for FakeRecordSource {
    async fn fetch_records(
        &self,
        item: &AcceptedItem,
        filters: &RecordFilters,
    ) -> anyhow::Result<Vec<Value>> {
        self.requested.lock().unwrap().push(item.id.clone());
        self.filters.lock().unwrap().push(filters.clone());
        Ok(self
            .records
            .iter()
            .filter(|r| filters.include.iter().all(|(f, v)| field_equals(r, f, v)))
            .filter(|r| !filters.exclude.iter().any(|(f, v)| field_equals(r, f, v)))
            .cloned()
            .collect())
    }
}

pub fn candidate(id: &str, title: &str) -> Candidate {
    Candidate::new(id, format!("{} description", title))
        .with_metadata("title", title)
        .with_metadata("url", format!("https://data.example/{}", id))
}

/// Three candidates; the judge accepts the first and last
pub fn rainfall_fixture() -> (Arc<FixedIndex>, Arc<ScriptedJudge>) {
    let index = Arc::new(FixedIndex::new(vec![
        candidate("rain-1", "District Rainfall"),
        candidate("tour-1", "Tourist Arrivals"),
        candidate("rain-2", "Monsoon Rainfall"),
    ]));
    let judge = Arc::new(
        ScriptedJudge::new()
            .relevant("District Rainfall description", "Rainfall by district")
            .relevant("Monsoon Rainfall description", "Seasonal rainfall totals"),
    );
    (index, judge)
}

pub fn sample_records() -> Vec<Value> {
    vec![
        json!({"state": "Kerala", "district": "Idukki", "rainfall_mm": 3100}),
        json!({"state": "Kerala", "district": "Wayanad", "rainfall_mm": 2800}),
    ]
}

/// Production route set over scripted capabilities
pub fn test_dispatcher(model: Arc<ScriptedIntentModel>) -> SessionDispatcher {
    let (index, judge) = rainfall_fixture();
    dispatcher_with_pipeline(model, ResourcePipeline::new(index, judge))
}

pub fn dispatcher_with_pipeline(
    model: Arc<ScriptedIntentModel>,
    pipeline: ResourcePipeline,
) -> SessionDispatcher {
    let records = Arc::new(FakeRecordSource::new(sample_records()));
    build_dispatcher(model, 0.6, pipeline, Arc::new(VerbatimQuery), 7, records).unwrap()
}

/// Keyword model: "find" → discovery, "fetch" → fetch_data, else low-confidence none
pub fn keyword_model() -> ScriptedIntentModel {
    ScriptedIntentModel::returning("none", 0.3)
        .when("find", "dataset_discovery", 0.9)
        .when("fetch", "fetch_data", 0.85)
}

pub fn test_state(model: ScriptedIntentModel) -> AppState {
    AppState::new(test_dispatcher(Arc::new(model)))
}
