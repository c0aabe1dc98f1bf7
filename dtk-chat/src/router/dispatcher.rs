//! Confidence-gated dispatch over the route table

use super::classifier::{Classifier, IntentModel, IntentResult};
use super::reply::Reply;
use super::table::{FallbackHandler, RouteError, RouteHandler, RouteTable};
use super::BoxError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default minimum confidence for a match
pub const DEFAULT_THRESHOLD: f64 = 0.6;

const FALLBACK_ROUTE: &str = "default";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No routes registered")]
    NoRoutesRegistered,

    #[error("Intent classification failed: {source}")]
    ClassificationFailed {
        #[source]
        source: BoxError,
    },

    #[error("No route for intent '{category}' (confidence {confidence:.2})")]
    RouteNotFound { category: String, confidence: f64 },

    #[error("Handler for route '{route}' failed: {source}")]
    HandlerFailed {
        route: String,
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NoRoutesRegistered => "NO_ROUTES_REGISTERED",
            DispatchError::ClassificationFailed { .. } => "CLASSIFICATION_FAILED",
            DispatchError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            DispatchError::HandlerFailed { .. } => "HANDLER_FAILED",
        }
    }

    /// Plain-language text shown to the end user in place of the raw error
    pub fn user_message(&self) -> &'static str {
        match self {
            DispatchError::NoRoutesRegistered => {
                "I'm not able to answer questions right now. Please try again later."
            }
            DispatchError::ClassificationFailed { .. } => {
                "Sorry, I couldn't work out what you're asking for. Could you rephrase it?"
            }
            DispatchError::RouteNotFound { .. } => {
                "I'm not sure how to help with that. Try asking me to find datasets on a topic."
            }
            DispatchError::HandlerFailed { .. } => {
                "Something went wrong while working on your request. Please try again."
            }
        }
    }
}

/// How a dispatched message was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "route", rename_all = "snake_case")]
pub enum Resolution {
    Matched(String),
    Defaulted,
}

#[derive(Debug)]
pub struct Dispatched {
    pub intent: IntentResult,
    pub resolution: Resolution,
    pub reply: Reply,
}

/// Intent router
///
/// `C` is the per-call context handed to handlers (a session, for instance).
/// Registration takes `&mut self` and dispatch `&self`; share the dispatcher
/// behind an `Arc` only after setup is done.
pub struct Dispatcher<C> {
    routes: RouteTable<C>,
    model: Arc<dyn IntentModel>,
    classifier: Option<Classifier>,
    threshold: f64,
    fallback: Option<Arc<dyn FallbackHandler<C>>>,
}

impl<C: Send + 'static> Dispatcher<C> {
    pub fn new(model: Arc<dyn IntentModel>, threshold: f64) -> Self {
        Self {
            routes: RouteTable::new(),
            model,
            classifier: None,
            threshold,
            fallback: None,
        }
    }

    pub fn builder(model: Arc<dyn IntentModel>) -> DispatcherBuilder<C> {
        DispatcherBuilder::new(model)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_default_handler(&mut self, handler: impl FallbackHandler<C> + 'static) {
        self.fallback = Some(Arc::new(handler));
    }

    pub fn has_default_handler(&self) -> bool {
        self.fallback.is_some()
    }

    /// Register a route and rebuild the classifier
    pub fn add_route(
        &mut self,
        name: &str,
        handler: impl RouteHandler<C> + 'static,
    ) -> Result<(), RouteError> {
        self.routes.insert(name, Arc::new(handler))?;
        info!(route = %name, "Route registered");
        self.rebuild_classifier();
        Ok(())
    }

    /// Unregister a route and rebuild the classifier
    pub fn remove_route(&mut self, name: &str) -> Result<(), RouteError> {
        self.routes.remove(name)?;
        info!(route = %name, "Route removed");
        self.rebuild_classifier();
        Ok(())
    }

    /// Route names in registration order
    pub fn registered_intents(&self) -> Vec<String> {
        self.routes.names()
    }

    fn rebuild_classifier(&mut self) {
        self.classifier = if self.routes.is_empty() {
            None
        } else {
            Some(Classifier::build(self.model.clone(), self.routes.names()))
        };
    }

    /// Classify `message` and run the selected handler
    pub async fn dispatch(&self, message: &str, ctx: C) -> Result<Dispatched, DispatchError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(DispatchError::NoRoutesRegistered)?;

        let intent = classifier.classify(message).await.map_err(|e| {
            warn!(error = %e, "Intent classification failed");
            e
        })?;
        info!(
            category = %intent.category,
            confidence = intent.confidence,
            threshold = self.threshold,
            "Classified intent"
        );

        if intent.confidence >= self.threshold {
            if let Some(route) = self.routes.get(&intent.category) {
                debug!(route = %route.name, "Invoking route handler");
                let reply = route
                    .handler
                    .call(message.to_string(), ctx)
                    .await
                    .map_err(|e| DispatchError::HandlerFailed {
                        route: route.name.clone(),
                        source: e.into(),
                    })?;
                return Ok(Dispatched {
                    resolution: Resolution::Matched(route.name.clone()),
                    intent,
                    reply,
                });
            }
        }

        match &self.fallback {
            Some(fallback) => {
                debug!(category = %intent.category, "Invoking default handler");
                let reply = fallback
                    .call(message.to_string(), intent.clone(), ctx)
                    .await
                    .map_err(|e| DispatchError::HandlerFailed {
                        route: FALLBACK_ROUTE.to_string(),
                        source: e.into(),
                    })?;
                Ok(Dispatched {
                    intent,
                    resolution: Resolution::Defaulted,
                    reply,
                })
            }
            None => Err(DispatchError::RouteNotFound {
                category: intent.category,
                confidence: intent.confidence,
            }),
        }
    }
}

/// Setup-phase builder for [`Dispatcher`]
///
/// ```ignore
/// let dispatcher = Dispatcher::builder(model)
///     .threshold(0.6)
///     .route("dataset_discovery", discovery)?
///     .route("fetch_data", fetch)?
///     .build();
/// ```
pub struct DispatcherBuilder<C> {
    dispatcher: Dispatcher<C>,
}

impl<C: Send + 'static> DispatcherBuilder<C> {
    pub fn new(model: Arc<dyn IntentModel>) -> Self {
        Self {
            dispatcher: Dispatcher::new(model, DEFAULT_THRESHOLD),
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.dispatcher.threshold = threshold;
        self
    }

    pub fn route(mut self, name: &str, handler: impl RouteHandler<C> + 'static) -> Result<Self, RouteError> {
        self.dispatcher.add_route(name, handler)?;
        Ok(self)
    }

    pub fn default_handler(mut self, handler: impl FallbackHandler<C> + 'static) -> Self {
        self.dispatcher.set_default_handler(handler);
        self
    }

    pub fn build(self) -> Dispatcher<C> {
        self.dispatcher
    }
}
