//! Shared HTTP plumbing for the agent clients.

use super::AgentError;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// Which half of the submit/poll contract a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Submit,
    Poll,
}

impl Phase {
    fn permanent(self, message: String) -> AgentError {
        match self {
            Phase::Submit => AgentError::Dispatch(message),
            Phase::Poll => AgentError::Poll(message),
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a non-success status to the agent error taxonomy.
pub(crate) fn classify_status(phase: Phase, status: StatusCode, body: &str) -> AgentError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, MAX_ERROR_BODY));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AgentError::Transient(message)
    } else {
        phase.permanent(message)
    }
}

pub(crate) fn classify_transport(phase: Phase, err: &reqwest::Error) -> AgentError {
    if err.is_timeout() || err.is_connect() {
        AgentError::Transient(err.to_string())
    } else {
        phase.permanent(err.to_string())
    }
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    phase: Phase,
    request: RequestBuilder,
) -> Result<T, AgentError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(phase, &e))?;
    read_json(phase, response).await
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    phase: Phase,
    response: Response,
) -> Result<T, AgentError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| classify_transport(phase, &e))?;

    if !status.is_success() {
        return Err(classify_status(phase, status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| phase.permanent(format!("malformed response body: {}", e)))
}

pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
