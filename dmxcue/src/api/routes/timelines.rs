//! Timeline routes: CRUD plus play/stop control.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::OriginIp;
use crate::api::models::{
    ApiResponse, CreateTimelineRequest, PlayResponse, UpdateTimelineRequest,
};
use crate::api::server::AppState;
use crate::domain::Timeline;
use crate::events::EventKind;
use crate::playback::{PlayRequest, ProcessId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_timelines)
                .post(create_timeline)
                .put(update_timeline),
        )
        .route("/processes", get(list_processes))
        .route("/stop", post(stop_all))
        .route("/stop/{pid}", post(stop_process))
        .route("/play/{id}", post(play_timeline))
        .route("/{id}", get(get_timeline).delete(delete_timeline))
}

async fn list_timelines(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<Timeline>>>> {
    let timelines = state.timelines.list().await?;
    Ok(Json(ApiResponse::new(
        format!("{} timeline(s)", timelines.len()),
        timelines,
    )))
}

async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Timeline>>> {
    let timeline = state.timelines.get(&id).await?;
    Ok(Json(ApiResponse::new("Timeline", timeline)))
}

async fn create_timeline(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Json(request): Json<CreateTimelineRequest>,
) -> ApiResult<Json<ApiResponse<Timeline>>> {
    if request.frames.is_empty() {
        return Err(ApiError::bad_request("at least one frame must be included"));
    }

    let timeline = state
        .timelines
        .create(&request.name, request.frames, request.usb_device_path)
        .await?;

    state.events.record(
        EventKind::TimelineCreated,
        &format!("Timeline {} ({}) created", timeline.name, timeline.id),
        &origin_ip,
    );
    Ok(Json(ApiResponse::new("Timeline created", timeline)))
}

async fn update_timeline(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Json(request): Json<UpdateTimelineRequest>,
) -> ApiResult<Json<ApiResponse<Timeline>>> {
    let id = request.id.trim().to_string();
    if id.is_empty() {
        return Err(ApiError::bad_request("the timeline id is required"));
    }

    let existing = state.timelines.get(&id).await?;
    let updated = state.timelines.update(request.apply_to(existing)).await?;

    state.events.record(
        EventKind::TimelineUpdated,
        &format!("Timeline {} ({}) updated", updated.name, updated.id),
        &origin_ip,
    );
    Ok(Json(ApiResponse::new("Timeline updated", updated)))
}

async fn delete_timeline(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<String>>> {
    state.timelines.delete(&id).await?;

    state
        .events
        .record(EventKind::TimelineDeleted, &id, &origin_ip);
    Ok(Json(ApiResponse::new("Timeline deleted", id)))
}

async fn play_timeline(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<PlayResponse>>> {
    let timeline = state.timelines.get(&id).await?;
    let process_id = uuid::Uuid::new_v4().to_string();

    state
        .scheduler
        .play(PlayRequest::new(process_id.clone(), timeline.clone()).with_origin(origin_ip))?;

    Ok(Json(ApiResponse::new(
        "Timeline played",
        PlayResponse {
            process_id,
            timeline,
        },
    )))
}

async fn stop_process(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    Path(pid): Path<String>,
) -> ApiResult<Json<ApiResponse<String>>> {
    state.scheduler.stop(pid.clone(), origin_ip)?;
    Ok(Json(ApiResponse::new("Timeline stopping", pid)))
}

async fn stop_all(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
) -> ApiResult<Json<ApiResponse<Vec<ProcessId>>>> {
    let running = state.scheduler.live_processes();
    state.scheduler.stop_all(origin_ip)?;
    Ok(Json(ApiResponse::new("All Timelines stopping", running)))
}

async fn list_processes(State(state): State<AppState>) -> Json<ApiResponse<Vec<ProcessId>>> {
    let processes = state.scheduler.live_processes();
    Json(ApiResponse::new(
        format!("{} process(es)", processes.len()),
        processes,
    ))
}
