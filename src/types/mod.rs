use crate::research::run::RunStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    pub query: String,
}

/// Returned by the two-phase entry point once the plan step has run.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateRunResponse {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_plan: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartRunResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub gemini_configured: bool,
    pub openai_configured: bool,
    pub perplexity_configured: bool,
    pub planner_configured: bool,
    pub synthesizer_configured: bool,
    pub active_runs: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Planning failed: {0}")]
    Plan(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Plan(_) | AppError::Synthesis(_) | AppError::LLM(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            AppError::NotFound(msg)
            | AppError::InvalidInput(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg)
            | AppError::Configuration(msg)
            | AppError::LLM(msg)
            | AppError::Plan(msg)
            | AppError::Synthesis(msg) => msg,
            other @ AppError::InvalidTransition { .. } => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AppError::NotFound("run".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("q".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("busy".into()), StatusCode::CONFLICT),
            (
                AppError::InvalidTransition {
                    from: "completed".into(),
                    to: "planning".into(),
                },
                StatusCode::CONFLICT,
            ),
            (AppError::Plan("down".into()), StatusCode::BAD_GATEWAY),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = AppError::InvalidTransition {
            from: "completed".into(),
            to: "researching".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition from completed to researching"
        );
    }
}
