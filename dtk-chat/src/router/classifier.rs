//! Intent classification over the registered route names

use super::dispatcher::DispatchError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Category returned when no registered intent fits the message
pub const NONE_CATEGORY: &str = "none";

/// Outcome of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub category: String,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
}

impl IntentResult {
    pub fn new(category: impl Into<String>, confidence: f64) -> Self {
        Self {
            category: category.into(),
            confidence,
        }
    }

    /// Sentinel result meaning "no registered intent fits"
    pub fn none(confidence: f64) -> Self {
        Self::new(NONE_CATEGORY, confidence)
    }
}

/// External text-classification capability
///
/// Must answer with one of `categories` or [`NONE_CATEGORY`]. Retrying is the
/// implementation's own business; the dispatcher never retries.
#[async_trait]
pub trait IntentModel: Send + Sync {
    async fn classify(&self, message: &str, categories: &[String]) -> anyhow::Result<IntentResult>;
}

/// Classification capability bound to a fixed category list
///
/// Rebuilt by the dispatcher whenever the route table changes.
pub struct Classifier {
    model: Arc<dyn IntentModel>,
    categories: Vec<String>,
}

impl Classifier {
    pub fn build(model: Arc<dyn IntentModel>, categories: Vec<String>) -> Self {
        debug!(categories = ?categories, "Classifier rebuilt");
        Self { model, categories }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub async fn classify(&self, message: &str) -> Result<IntentResult, DispatchError> {
        let result = self
            .model
            .classify(message, &self.categories)
            .await
            .map_err(|e| DispatchError::ClassificationFailed { source: e.into() })?;

        if !(0.0..=1.0).contains(&result.confidence) {
            // Also catches NaN
            return Err(DispatchError::ClassificationFailed {
                source: format!(
                    "confidence {} for '{}' is outside [0, 1]",
                    result.confidence, result.category
                )
                .into(),
            });
        }

        Ok(result)
    }
}
