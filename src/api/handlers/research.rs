use crate::{
    AppState,
    research::{ResearchRun, RunSnapshot},
    types::{CreateRunResponse, ResearchRequest, Result, StartRunResponse},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};

/// Create a run, plan it and wait for approval
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Run created; awaiting approval unless planning failed", body = CreateRunResponse),
        (status = 400, description = "Empty query")
    ),
    tag = "research"
)]
pub async fn create_research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<CreateRunResponse>> {
    let created = state.service.create_run(&payload.query).await?;
    Ok(Json(created))
}

/// Create a run and start researching without an approval step
#[utoipa::path(
    post,
    path = "/api/research/immediate",
    request_body = ResearchRequest,
    responses(
        (status = 202, description = "Run started", body = StartRunResponse),
        (status = 400, description = "Empty query")
    ),
    tag = "research"
)]
pub async fn start_immediate(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>)> {
    let started = state.service.start_immediate(&payload.query)?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

/// Approve the plan of a two-phase run
#[utoipa::path(
    post,
    path = "/api/research/{run_id}/approve",
    params(("run_id" = String, Path, description = "Run identifier")),
    responses(
        (status = 200, description = "Run approved", body = ResearchRun),
        (status = 404, description = "Unknown run"),
        (status = 409, description = "Run is not awaiting approval")
    ),
    tag = "research"
)]
pub async fn approve_research(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>> {
    Ok(Json(state.service.approve(&run_id)?))
}

/// Cancel a run that is awaiting approval or researching
#[utoipa::path(
    post,
    path = "/api/research/{run_id}/cancel",
    params(("run_id" = String, Path, description = "Run identifier")),
    responses(
        (status = 200, description = "Cancellation requested", body = ResearchRun),
        (status = 404, description = "Unknown run"),
        (status = 409, description = "Run can no longer be cancelled")
    ),
    tag = "research"
)]
pub async fn cancel_research(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>> {
    Ok(Json(state.service.cancel(&run_id)?))
}

/// Get the current state of a run
#[utoipa::path(
    get,
    path = "/api/status/{run_id}",
    params(("run_id" = String, Path, description = "Run identifier")),
    responses(
        (status = 200, description = "Run snapshot", body = ResearchRun),
        (status = 404, description = "Unknown run")
    ),
    tag = "research"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSnapshot>> {
    Ok(Json(state.service.get_status(&run_id).await?))
}

/// Stream a run's live events as Server-Sent Events.
///
/// Each SSE event is named after the event type and carries the JSON event.
#[utoipa::path(
    get,
    path = "/api/research/{run_id}/events",
    params(("run_id" = String, Path, description = "Run identifier")),
    responses(
        (status = 200, description = "Event stream", body = String, content_type = "text/event-stream"),
        (status = 404, description = "Unknown run")
    ),
    tag = "research"
)]
pub async fn stream_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let events = state.service.subscribe_events(&run_id).await?;
    tracing::debug!(run_id = %run_id, "SSE subscriber attached");

    let stream = events.into_stream().map(|event| {
        Event::default()
            .event(event.event_type.as_str())
            .id(event.sequence.to_string())
            .json_data(&event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// List the runs held in memory, newest first
#[utoipa::path(
    get,
    path = "/api/runs",
    responses(
        (status = 200, description = "Run snapshots", body = Vec<ResearchRun>)
    ),
    tag = "research"
)]
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSnapshot>> {
    Json(state.service.list_runs())
}
