use crate::{AppState, types::HealthResponse};
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// Report which agents and generators are configured
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health())
}

/// Describe the service and its endpoints
#[utoipa::path(
    get,
    path = "/api",
    responses(
        (status = 200, description = "Service description")
    ),
    tag = "system"
)]
pub async fn api_root() -> Json<Value> {
    Json(json!({
        "service": "Meta-Deep Research API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/research": "Create a research run and return its plan",
            "POST /api/research/immediate": "Start a research run without approval",
            "POST /api/research/{run_id}/approve": "Approve a planned run",
            "POST /api/research/{run_id}/cancel": "Cancel a run",
            "GET /api/research/{run_id}/events": "Stream live run events (SSE)",
            "GET /api/status/{run_id}": "Get research run status",
            "GET /api/runs": "List runs held in memory",
            "GET /api/health": "Health check"
        }
    }))
}
