//! Audit event routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::models::{ApiResponse, EventListQuery};
use crate::api::server::AppState;
use crate::database::time::now_ms;
use crate::events::EventRecord;

const MAX_EVENT_LIMIT: u32 = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/{id}", get(get_event))
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<EventRecord>>>> {
    let events = state
        .event_log
        .list(now_ms(), query.limit.min(MAX_EVENT_LIMIT))
        .await?;
    Ok(Json(ApiResponse::new(
        format!("{} event(s)", events.len()),
        events,
    )))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<EventRecord>>> {
    let event = state.event_log.get(&id).await?;
    Ok(Json(ApiResponse::new("Event", event)))
}
