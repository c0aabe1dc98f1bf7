//! Chat turn endpoint streamed as server-sent events
//!
//! Event sequence for one turn:
//! `session` → `intent` → (`thought` | `message` | `resource`)* → `done`,
//! with an `error` event replacing the remainder when dispatch or the reply
//! stream fails. Error events carry plain-language text; the typed error is
//! logged and kept as the service's last error.

use crate::error::{ApiError, ApiResult};
use crate::pipeline::PipelineError;
use crate::router::{Chunk, Dispatched, Reply};
use crate::session::Role;
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const STREAM_FAILED_MESSAGE: &str =
    "Something went wrong while working on your request. Please try again.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
}

fn event(name: &str, data: Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

fn chunk_event(chunk: &Chunk) -> Event {
    let data = match chunk {
        Chunk::Thought { text } | Chunk::Message { text } => json!({ "text": text }),
        Chunk::Resource { id, markdown } => json!({ "id": id, "markdown": markdown }),
    };
    event(chunk.event_name(), data)
}

fn error_event(code: &str, message: &str) -> Event {
    event("error", json!({ "code": code, "message": message }))
}

fn stream_error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::code)
        .unwrap_or("HANDLER_FAILED")
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session = state.sessions.get_or_create(request.session_id).await;
    session.record(Role::User, message.as_str()).await;
    info!(session = %session.id, "Chat turn received");

    let stream = async_stream::stream! {
        yield Ok(event("session", json!({ "session_id": session.id })));

        match state.dispatcher.dispatch(&message, session.clone()).await {
            Ok(Dispatched { intent, resolution, reply }) => {
                yield Ok(event("intent", json!({
                    "category": intent.category,
                    "confidence": intent.confidence,
                    "resolution": resolution,
                })));

                let mut transcript: Vec<String> = Vec::new();
                match reply {
                    Reply::Text(text) => {
                        yield Ok(chunk_event(&Chunk::message(text.as_str())));
                        transcript.push(text);
                    }
                    Reply::Stream(mut chunks) => {
                        while let Some(item) = chunks.next().await {
                            match item {
                                Ok(chunk) => {
                                    match &chunk {
                                        Chunk::Message { text } => transcript.push(text.clone()),
                                        Chunk::Resource { markdown, .. } => transcript.push(markdown.clone()),
                                        Chunk::Thought { .. } => {}
                                    }
                                    yield Ok(chunk_event(&chunk));
                                }
                                Err(err) => {
                                    warn!(session = %session.id, error = %err, "Reply stream failed");
                                    *state.last_error.write().await = Some(err.to_string());
                                    yield Ok(error_event(stream_error_code(&err), STREAM_FAILED_MESSAGE));
                                    break;
                                }
                            }
                        }
                    }
                }

                if !transcript.is_empty() {
                    session.record(Role::Assistant, transcript.join("\n")).await;
                }
            }
            Err(err) => {
                warn!(session = %session.id, code = err.code(), error = %err, "Dispatch failed");
                *state.last_error.write().await = Some(err.to_string());
                session.record(Role::Assistant, err.user_message()).await;
                yield Ok(error_event(err.code(), err.user_message()));
            }
        }

        yield Ok(event("done", json!({})));
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}
