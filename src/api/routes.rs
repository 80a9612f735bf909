use crate::AppState;
use crate::api::ApiDoc;
use crate::api::handlers::{health, research};
use axum::{
    Json, Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// Routes mounted under `/api`
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::api_root))
        .route("/health", get(health::health))
        .route("/research", post(research::create_research))
        .route("/research/immediate", post(research::start_immediate))
        .route(
            "/research/{run_id}/approve",
            post(research::approve_research),
        )
        .route("/research/{run_id}/cancel", post(research::cancel_research))
        .route("/research/{run_id}/events", get(research::stream_events))
        .route("/status/{run_id}", get(research::get_status))
        .route("/runs", get(research::list_runs))
}

/// The full application: API routes, OpenAPI document, CORS and request
/// tracing.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .nest("/api", create_router())
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/swagger.json", ApiDoc::openapi()),
    );

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
