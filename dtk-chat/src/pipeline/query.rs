//! Search-query formulation

use crate::session::ChatMessage;
use async_trait::async_trait;

/// Turns the latest message plus earlier turns into a standalone search query
///
/// "and for Kerala?" after a rainfall question should search for Kerala
/// rainfall, not for "and for Kerala?".
#[async_trait]
pub trait QueryFormulator: Send + Sync {
    async fn formulate(&self, message: &str, earlier: &[ChatMessage]) -> anyhow::Result<String>;
}

/// Searches for the message as typed
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimQuery;

#[async_trait]
impl QueryFormulator for VerbatimQuery {
    async fn formulate(&self, message: &str, _earlier: &[ChatMessage]) -> anyhow::Result<String> {
        Ok(message.to_string())
    }
}
