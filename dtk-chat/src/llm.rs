//! OpenAI-compatible chat-completion client
//!
//! Backs the intent classifier, the search-query formulator and the relevance
//! judge. Requests go
//! through [`RemoteFetcher`], so transient network faults are retried with the
//! fetcher's policy; malformed model output is returned as an error and never
//! retried here.

use crate::pipeline::{Judgment, QueryFormulator, RelevanceJudge};
use crate::router::{IntentModel, IntentResult, NONE_CATEGORY};
use crate::session::ChatMessage;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use dtk_common::config::LlmConfig;
use dtk_fetch::{FetchRequest, RemoteFetcher};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Clone)]
pub struct ChatCompletionClient {
    fetcher: RemoteFetcher,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct IntentReply {
    category: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct QueryReply {
    query: String,
}

/// Earlier turns shown to the query formulator
const QUERY_CONTEXT_TURNS: usize = 6;

impl ChatCompletionClient {
    pub fn new(fetcher: RemoteFetcher, config: &LlmConfig, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json<T: DeserializeOwned>(&self, system: &str, user: &str) -> anyhow::Result<T> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = FetchRequest::post_json(format!("{}/chat/completions", self.base_url), body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: CompletionResponse = self.fetcher.fetch_json(&request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Completion returned no choices"))?;

        debug!(model = %self.model, chars = content.len(), "Completion received");
        parse_json_content(&content)
    }
}

/// Decode model output, tolerating a fenced code block around the JSON
fn parse_json_content<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .with_context(|| format!("Model output is not the expected JSON: {}", truncate(trimmed, 200)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn intent_prompt(categories: &[String]) -> String {
    let mut options: Vec<&str> = categories.iter().map(String::as_str).collect();
    options.push(NONE_CATEGORY);
    format!(
        "Classify the intent of the user's message into exactly one of these categories: {}. \
         Use \"{}\" when none of the others fit. Answer with a JSON object \
         {{\"category\": string, \"confidence\": number between 0 and 1}} and nothing else.",
        options.join(", "),
        NONE_CATEGORY
    )
}

const QUERY_PROMPT: &str = "You turn the user's latest message into a standalone search query \
for an open government data catalog. Use the earlier conversation to resolve references such as \
\"that\" or \"the same for Kerala\". Answer with a JSON object {\"query\": string} and nothing else.";

fn query_context(message: &str, earlier: &[ChatMessage]) -> String {
    let skip = earlier.len().saturating_sub(QUERY_CONTEXT_TURNS);
    let turns: Vec<String> = earlier[skip..]
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect();
    format!(
        "Conversation so far:\n{}\n\nLatest message: {}",
        turns.join("\n"),
        message
    )
}

const JUDGE_PROMPT: &str = "You decide whether a dataset description is relevant to a user's \
search query. Answer with a JSON object {\"is_relevant\": boolean, \"rationale\": string} where \
the rationale explains in one or two sentences how the dataset relates to the query.";

#[async_trait]
impl IntentModel for ChatCompletionClient {
    async fn classify(&self, message: &str, categories: &[String]) -> anyhow::Result<IntentResult> {
        let reply: IntentReply = self
            .complete_json(&intent_prompt(categories), message)
            .await
            .context("Intent classification request failed")?;
        Ok(IntentResult::new(reply.category, reply.confidence))
    }
}

#[async_trait]
impl QueryFormulator for ChatCompletionClient {
    async fn formulate(&self, message: &str, earlier: &[ChatMessage]) -> anyhow::Result<String> {
        if earlier.is_empty() {
            return Ok(message.to_string());
        }
        let reply: QueryReply = self
            .complete_json(QUERY_PROMPT, &query_context(message, earlier))
            .await
            .context("Search query formulation request failed")?;
        debug!(query = %reply.query, "Query reformulated");
        Ok(reply.query)
    }
}

#[async_trait]
impl RelevanceJudge for ChatCompletionClient {
    async fn judge(&self, text: &str, query: &str) -> anyhow::Result<Judgment> {
        let user = format!("Query: {}\n\nDataset description:\n{}", query, text);
        self.complete_json(JUDGE_PROMPT, &user)
            .await
            .context("Relevance judgment request failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let judgment: Judgment =
            parse_json_content(r#"{"is_relevant": true, "rationale": "covers rainfall"}"#).unwrap();
        assert_eq!(judgment, Judgment::relevant("covers rainfall"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"category\": \"fetch_data\", \"confidence\": 0.9}\n```";
        let reply: IntentReply = parse_json_content(content).unwrap();
        assert_eq!(reply.category, "fetch_data");
        assert_eq!(reply.confidence, 0.9);
    }

    #[test]
    fn test_parse_accepts_how_alias() {
        let judgment: Judgment =
            parse_json_content(r#"{"is_relevant": false, "how": "about tourism"}"#).unwrap();
        assert_eq!(judgment, Judgment::irrelevant("about tourism"));
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_json_content::<Judgment>("Sure! The dataset looks relevant.").unwrap_err();
        assert!(err.to_string().contains("not the expected JSON"));
    }

    #[test]
    fn test_query_context_keeps_recent_turns() {
        use crate::session::Role;

        let earlier: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn {}", i),
                timestamp: chrono::Utc::now(),
            })
            .collect();

        let context = query_context("and for Kerala?", &earlier);
        assert!(!context.contains("turn 1\n"));
        assert!(context.contains("user: turn 2\nassistant: turn 3"));
        assert!(context.ends_with("Latest message: and for Kerala?"));
    }

    #[test]
    fn test_intent_prompt_lists_none() {
        let prompt = intent_prompt(&["dataset_discovery".to_string(), "fetch_data".to_string()]);
        assert!(prompt.contains("dataset_discovery, fetch_data, none"));
    }
}
