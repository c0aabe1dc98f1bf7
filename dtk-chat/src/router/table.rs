//! Route table: intent name → handler, in registration order

use super::classifier::{IntentResult, NONE_CATEGORY};
use super::reply::Reply;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Future returned by route and fallback handlers
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Reply>>;

/// Handler for a named intent
///
/// Implemented for any `Fn(String, C) -> impl Future<Output = anyhow::Result<Reply>>`.
pub trait RouteHandler<C>: Send + Sync {
    fn call(&self, message: String, ctx: C) -> HandlerFuture;
}

impl<C, F, Fut> RouteHandler<C> for F
where
    F: Fn(String, C) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn call(&self, message: String, ctx: C) -> HandlerFuture {
        Box::pin(self(message, ctx))
    }
}

/// Handler invoked when no route matches; also receives the classification
pub trait FallbackHandler<C>: Send + Sync {
    fn call(&self, message: String, intent: IntentResult, ctx: C) -> HandlerFuture;
}

impl<C, F, Fut> FallbackHandler<C> for F
where
    F: Fn(String, IntentResult, C) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn call(&self, message: String, intent: IntentResult, ctx: C) -> HandlerFuture {
        Box::pin(self(message, intent, ctx))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("Route name must not be empty")]
    EmptyName,

    #[error("Route name '{0}' is reserved")]
    ReservedName(String),

    #[error("Route '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("Route '{0}' is not registered")]
    UnknownRoute(String),
}

/// A registered (name, handler) pair
pub struct Route<C> {
    pub name: String,
    pub handler: Arc<dyn RouteHandler<C>>,
}

pub struct RouteTable<C> {
    routes: Vec<Route<C>>,
}

impl<C> Default for RouteTable<C> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<C> RouteTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route; an existing route with the same name is left untouched
    pub fn insert(&mut self, name: &str, handler: Arc<dyn RouteHandler<C>>) -> Result<(), RouteError> {
        if name.trim().is_empty() {
            return Err(RouteError::EmptyName);
        }
        if name == NONE_CATEGORY {
            return Err(RouteError::ReservedName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(RouteError::DuplicateRoute(name.to_string()));
        }
        self.routes.push(Route {
            name: name.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Route<C>, RouteError> {
        let index = self
            .routes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?;
        Ok(self.routes.remove(index))
    }

    /// Exact-match lookup
    pub fn get(&self, name: &str) -> Option<&Route<C>> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
