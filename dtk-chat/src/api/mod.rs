//! HTTP API handlers
//!
//! - `POST /chat`: one dispatched turn, streamed as server-sent events
//! - `GET /sessions/:id/resources`: accepted resources of a session
//! - `GET /health`

pub mod chat;
pub mod health;
pub mod sessions;

pub use chat::chat_routes;
pub use health::health_routes;
pub use sessions::session_routes;
