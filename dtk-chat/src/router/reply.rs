//! Handler replies: single-shot text or a stream of chunks

use futures::stream::BoxStream;
use serde::Serialize;
use std::fmt;

/// One piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    /// Intermediate progress, not part of the final answer
    Thought { text: String },
    /// Answer text
    Message { text: String },
    /// An accepted resource rendered for display
    Resource { id: String, markdown: String },
}

impl Chunk {
    pub fn thought(text: impl Into<String>) -> Self {
        Chunk::Thought { text: text.into() }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Chunk::Message { text: text.into() }
    }

    /// SSE event name for this chunk
    pub fn event_name(&self) -> &'static str {
        match self {
            Chunk::Thought { .. } => "thought",
            Chunk::Message { .. } => "message",
            Chunk::Resource { .. } => "resource",
        }
    }
}

/// Lazy, finite chunk sequence; an `Err` item terminates the reply
pub type ChunkStream = BoxStream<'static, anyhow::Result<Chunk>>;

/// What a handler produces
pub enum Reply {
    Text(String),
    Stream(ChunkStream),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Reply::Stream(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
