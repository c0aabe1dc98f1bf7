use crate::error::{ApiError, ApiResult};
use crate::session::AcceptedItem;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

/// GET /sessions/:id/resources
///
/// Accepted resources in registry order.
pub async fn list_resources(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<AcceptedItem>>> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session {}", id)))?;

    Ok(Json(session.resources().await))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/sessions/:id/resources", get(list_resources))
}
