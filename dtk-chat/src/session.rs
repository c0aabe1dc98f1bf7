//! Conversation sessions and their accepted-resource registry
//!
//! A session is the only mutable state a chat turn touches: the history of
//! user/assistant messages and the resources accepted by discovery. Both sit
//! behind async locks and are written only by the consumer of a turn's reply.

use crate::pipeline::Candidate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Interface tag for OGD catalog resources
pub const OGD_CATALOG_INTERFACE: &str = "ogd:catalog";

/// Candidate that passed relevance judgment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedItem {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub rationale: String,
}

impl AcceptedItem {
    pub fn from_candidate(candidate: Candidate, rationale: impl Into<String>) -> Self {
        Self {
            id: candidate.id,
            text: candidate.text,
            metadata: candidate.metadata,
            rationale: rationale.into(),
        }
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn title(&self) -> &str {
        self.metadata_str("title").unwrap_or(&self.id)
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata_str("url")
    }

    /// Upstream interface the records are pulled from
    pub fn interface(&self) -> &str {
        self.metadata_str("interface").unwrap_or(OGD_CATALOG_INTERFACE)
    }

    /// Upstream catalog identifier (`metadata.uuid`, else the id)
    pub fn catalog_id(&self) -> &str {
        self.metadata_str("uuid").unwrap_or(&self.id)
    }
}

/// Insertion-ordered id → item mapping
///
/// Re-inserting an existing id replaces the item but keeps its position.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    order: Vec<String>,
    items: HashMap<String, AcceptedItem>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: AcceptedItem) {
        if !self.items.contains_key(&item.id) {
            self.order.push(item.id.clone());
        }
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&AcceptedItem> {
        self.items.get(id)
    }

    /// Most recently first-inserted item
    pub fn latest(&self) -> Option<&AcceptedItem> {
        self.order.last().and_then(|id| self.items.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcceptedItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    history: RwLock<Vec<ChatMessage>>,
    resources: RwLock<ResourceRegistry>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            history: RwLock::new(Vec::new()),
            resources: RwLock::new(ResourceRegistry::new()),
        }
    }

    pub async fn record(&self, role: Role, content: impl Into<String>) {
        self.history.write().await.push(ChatMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.read().await.clone()
    }

    /// History preceding `message`, without the trailing user entry recording it
    pub async fn history_before(&self, message: &str) -> Vec<ChatMessage> {
        let mut history = self.history().await;
        if matches!(history.last(), Some(last) if last.role == Role::User && last.content == message) {
            history.pop();
        }
        history
    }

    pub async fn accept(&self, item: AcceptedItem) {
        tracing::debug!(session = %self.id, resource = %item.id, "Resource accepted into session");
        self.resources.write().await.insert(item);
    }

    /// Accepted items in registry order
    pub async fn resources(&self) -> Vec<AcceptedItem> {
        self.resources.read().await.iter().cloned().collect()
    }

    pub async fn latest_resource(&self) -> Option<AcceptedItem> {
        self.resources.read().await.latest().cloned()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions kept before the oldest is evicted
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-memory session store
///
/// Holds at most `max_sessions` sessions; creating one beyond that evicts the
/// session created earliest.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Existing session for `id`, or a new one (under `id` when given)
    pub async fn get_or_create(&self, id: Option<Uuid>) -> Arc<Session> {
        if let Some(id) = id {
            if let Some(session) = self.sessions.read().await.get(&id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        let id = id.unwrap_or_else(Uuid::new_v4);
        if !sessions.contains_key(&id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.id);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::info!(session = %oldest, "Session evicted");
            }
        }
        sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::info!(session = %id, "Session created");
                Arc::new(Session::with_id(id))
            })
            .clone()
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
