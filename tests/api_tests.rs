//! HTTP API tests
//!
//! The full router is served in-process with axum-test on top of a service
//! wired to scripted agents.

mod common;

use axum_test::TestServer;
use common::mocks::{Harness, MockGenerator, ScriptedAgentClient};
use meta_research::agents::AgentKind;
use meta_research::api::routes::build_app;
use meta_research::{AppState, ResearchConfigManager, RunStatus};
use serde_json::{Value, json};
use std::sync::Arc;

// ============= Helper Functions =============

fn hanging_harness() -> Harness {
    Harness::new(
        ScriptedAgentClient::hanging(AgentKind::Gemini),
        ScriptedAgentClient::hanging(AgentKind::OpenAI),
        ScriptedAgentClient::hanging(AgentKind::Perplexity),
    )
}

fn create_test_server(harness: &Harness) -> (TestServer, AppState) {
    let state = AppState {
        config_manager: Arc::new(ResearchConfigManager::from_config(harness.config.clone())),
        service: harness.service(),
    };
    let server = TestServer::new(build_app(state.clone())).expect("Failed to create test server");
    (server, state)
}

// ============= System Endpoints =============

#[tokio::test]
async fn test_health_reports_configuration() {
    let harness = hanging_harness().with_synthesizer(MockGenerator::new("report"));
    let (server, _) = create_test_server(&harness);

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["gemini_configured"], true);
    assert_eq!(body["planner_configured"], false);
    assert_eq!(body["synthesizer_configured"], true);
    assert_eq!(body["active_runs"], 0);
}

#[tokio::test]
async fn test_api_root_lists_endpoints() {
    let (server, _) = create_test_server(&hanging_harness());

    let response = server.get("/api").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["service"], "Meta-Deep Research API");
    assert!(body["endpoints"]["POST /api/research"].is_string());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (server, _) = create_test_server(&hanging_harness());

    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["paths"]["/api/research"].is_object());
    assert!(body["paths"]["/api/status/{run_id}"].is_object());
}

// ============= Research Endpoints =============

#[tokio::test]
async fn test_create_research_returns_plan() {
    let harness = hanging_harness().with_planner(MockGenerator::new("Check primary sources first."));
    let (server, _) = create_test_server(&harness);

    let response = server
        .post("/api/research")
        .json(&json!({"query": "Why is the sky blue?"}))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "awaiting_approval");
    assert_eq!(body["research_plan"], "Check primary sources first.");

    let run_id = body["run_id"].as_str().unwrap();
    let status = server.get(&format!("/api/status/{}", run_id)).await;
    status.assert_status_ok();
    let run: Value = status.json();
    assert_eq!(run["user_query"], "Why is the sky blue?");
    assert_eq!(run["agents"]["gemini"]["status"], "idle");
}

#[tokio::test]
async fn test_create_research_rejects_blank_query() {
    let (server, _) = create_test_server(&hanging_harness());

    let response = server
        .post("/api/research")
        .json(&json!({"query": "   "}))
        .await;
    response.assert_status_bad_request();

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_immediate_research_is_accepted() {
    let (server, state) = create_test_server(&hanging_harness());

    let response = server
        .post("/api/research/immediate")
        .json(&json!({"query": "battery chemistry"}))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    let body: Value = response.json();
    let run_id = body["run_id"].as_str().unwrap();
    assert!(body["message"].as_str().unwrap().contains(run_id));

    let runs: Value = server.get("/api/runs").await.json();
    assert_eq!(runs.as_array().unwrap().len(), 1);

    state.service.cancel(run_id).ok();
}

#[tokio::test]
async fn test_approve_and_cancel_status_codes() {
    let (server, state) = create_test_server(&hanging_harness());

    server
        .post("/api/research/00000000-0000-0000-0000-000000000000/approve")
        .await
        .assert_status_not_found();

    let created: Value = server
        .post("/api/research")
        .json(&json!({"query": "ocean acidification"}))
        .await
        .json();
    let run_id = created["run_id"].as_str().unwrap().to_string();

    let cancelled = server
        .post(&format!("/api/research/{}/cancel", run_id))
        .await;
    cancelled.assert_status_ok();
    assert_eq!(cancelled.json::<Value>()["cancelled"], true);

    assert_eq!(
        state.service.wait_for(&run_id).await,
        Some(RunStatus::Cancelled)
    );

    server
        .post(&format!("/api/research/{}/approve", run_id))
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let (server, _) = create_test_server(&hanging_harness());

    let response = server.get("/api/status/no-such-run").await;
    response.assert_status_not_found();

    server
        .get("/api/research/no-such-run/events")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_events_of_finished_run_end_immediately() {
    let (server, state) = create_test_server(&hanging_harness());

    let created: Value = server
        .post("/api/research")
        .json(&json!({"query": "q"}))
        .await
        .json();
    let run_id = created["run_id"].as_str().unwrap().to_string();
    state.service.cancel(&run_id).unwrap();
    state.service.wait_for(&run_id).await;

    let response = server
        .get(&format!("/api/research/{}/events", run_id))
        .await;
    response.assert_status_ok();
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    assert!(response.text().is_empty());
}
