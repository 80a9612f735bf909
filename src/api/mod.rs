//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for the research server, built on
//! the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research` - Create a run and return its plan (two-phase)
//! - `POST /api/research/immediate` - Create a run and start researching at once
//! - `POST /api/research/{run_id}/approve` - Approve the plan of a two-phase run
//! - `POST /api/research/{run_id}/cancel` - Cancel a waiting or researching run
//! - `GET /api/research/{run_id}/events` - Server-Sent Events stream of live progress
//!
//! ## Status
//! - `GET /api/status/{run_id}` - Full run snapshot
//! - `GET /api/runs` - Snapshots of every run held in memory
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Which agents and generators are configured
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api-docs/openapi.json`. When the
//! `swagger-ui` feature is enabled, interactive documentation is available
//! at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use utoipa::OpenApi;

/// OpenAPI description of the HTTP API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Meta-Deep Research API",
        description = "Orchestrates parallel deep research across Gemini, OpenAI, and Perplexity"
    ),
    paths(
        handlers::research::create_research,
        handlers::research::start_immediate,
        handlers::research::approve_research,
        handlers::research::cancel_research,
        handlers::research::get_status,
        handlers::research::stream_events,
        handlers::research::list_runs,
        handlers::health::health,
        handlers::health::api_root,
    ),
    components(schemas(
        crate::types::ResearchRequest,
        crate::types::CreateRunResponse,
        crate::types::StartRunResponse,
        crate::types::HealthResponse,
        crate::research::ResearchRun,
        crate::research::SubAgentState,
        crate::research::Citation,
        crate::research::RunStatus,
        crate::research::AgentStatus,
        crate::research::LiveEvent,
        crate::research::EventType,
        crate::agents::AgentKind,
        crate::agents::RawCitation,
    )),
    tags(
        (name = "research", description = "Research run lifecycle"),
        (name = "system", description = "Health and service information")
    )
)]
pub struct ApiDoc;
