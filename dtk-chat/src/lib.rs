//! dtk-chat library interface
//!
//! Conversational front end over open-government-data catalogs:
//! - [`router`]: intent classification and route dispatch
//! - [`pipeline`]: similarity retrieval filtered by relevance judgment
//! - [`routes`]: the built-in intent handlers
//! - [`api`]: HTTP + SSE surface

pub mod api;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod records;
pub mod render;
pub mod router;
pub mod routes;
pub mod session;

pub use crate::error::{ApiError, ApiResult};
pub use crate::routes::build_dispatcher;

use axum::Router;
use chrono::{DateTime, Utc};
use router::Dispatcher;
use session::{Session, SessionStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Dispatcher specialised to conversation sessions
pub type SessionDispatcher = Dispatcher<Arc<Session>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Fully-registered dispatcher; read-only once serving starts
    pub dispatcher: Arc<SessionDispatcher>,
    /// Conversation sessions keyed by id
    pub sessions: Arc<SessionStore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last dispatch or reply-stream error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(dispatcher: SessionDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            sessions: Arc::new(SessionStore::new()),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::chat_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
