//! Intent-routed dispatch
//!
//! A message is classified against the registered intent names; the matching
//! route runs if the classifier is confident enough, otherwise the default
//! handler (if any) runs, otherwise dispatch fails with
//! [`DispatchError::RouteNotFound`].
//!
//! ```text
//! RECEIVED ──classify──▶ CLASSIFIED ──┬─▶ MATCHED    (registered name, confidence ≥ threshold)
//!                                     ├─▶ DEFAULTED  (otherwise, default handler configured)
//!                                     └─▶ UNMATCHED  (otherwise) → RouteNotFound
//! ```
//!
//! All routes are registered during setup, before the first dispatch:
//! [`Dispatcher::add_route`] takes `&mut self`, so registration cannot overlap
//! with an in-flight dispatch.

mod classifier;
mod dispatcher;
mod reply;
mod table;

pub use classifier::{Classifier, IntentModel, IntentResult, NONE_CATEGORY};
pub use dispatcher::{DispatchError, Dispatched, Dispatcher, DispatcherBuilder, Resolution};
pub use reply::{Chunk, ChunkStream, Reply};
pub use table::{FallbackHandler, HandlerFuture, Route, RouteError, RouteHandler, RouteTable};

/// Boxed error carried as the source of dispatch and pipeline failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
