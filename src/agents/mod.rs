//! External deep-research agents
//!
//! Each agent family is a slow remote service reached through a
//! job-submission + job-status-polling contract. [`AgentClient`] is the
//! uniform interface; the concrete clients only differ in wire details.
//!
//! - [`gemini::GeminiClient`] - Gemini background interactions
//! - [`openai::OpenAIResearchClient`] - OpenAI Responses API in background mode
//! - [`perplexity::PerplexityClient`] - Perplexity async chat completions
//! - [`registry::UnconfiguredAgent`] - stands in for an agent without credentials

pub mod gemini;
mod http;
pub mod openai;
pub mod perplexity;
pub mod registry;

use crate::research::events::EventType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

pub use registry::{AgentSet, UnconfiguredAgent};

/// The three fixed agent slots of every run, in aggregation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Gemini,
    OpenAI,
    Perplexity,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Gemini, AgentKind::OpenAI, AgentKind::Perplexity];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Gemini => "gemini",
            AgentKind::OpenAI => "openai",
            AgentKind::Perplexity => "perplexity",
        }
    }

    /// Human-readable name used in report headings
    pub fn display_name(self) -> &'static str {
        match self {
            AgentKind::Gemini => "Gemini",
            AgentKind::OpenAI => "OpenAI",
            AgentKind::Perplexity => "Perplexity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gemini" => Some(AgentKind::Gemini),
            "openai" => Some(AgentKind::OpenAI),
            "perplexity" => Some(AgentKind::Perplexity),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent-specific submission parameters
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub model: String,
    /// Fully rendered research prompt
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub query: String,
    pub params: AgentParams,
}

/// A citation as reported by one agent, before normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct RawCitation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl RawCitation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = Some(title);
        }
        self
    }
}

/// Intermediate progress surfaced while a job is still running.
#[derive(Debug, Clone)]
pub struct AgentProgress {
    /// One of `progress`, `reasoning` or `source`
    pub event_type: EventType,
    pub payload: Value,
    /// Stable identity of the item; items already emitted are skipped
    pub key: Option<String>,
}

impl AgentProgress {
    pub fn progress(payload: Value) -> Self {
        Self {
            event_type: EventType::Progress,
            payload,
            key: None,
        }
    }

    pub fn keyed(event_type: EventType, key: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            key: Some(key.into()),
        }
    }
}

/// Result of one status poll
#[derive(Debug, Clone)]
pub enum PollUpdate {
    Running { progress: Vec<AgentProgress> },
    Done {
        output: String,
        citations: Vec<RawCitation>,
    },
    Failed { reason: String },
}

/// Agent-level error taxonomy.
///
/// Only [`AgentError::Transient`] is retried by the poller; everything else
/// terminates the agent immediately.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("transient upstream error: {0}")]
    Transient(String),

    #[error("poll failed: {0}")]
    Poll(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Transient(_))
    }
}

/// Uniform interface to one external research agent family.
#[async_trait]
pub trait AgentClient: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Submit a research job, returning the remote job id
    async fn submit(&self, request: &AgentRequest) -> Result<String, AgentError>;

    /// Query the status of a previously submitted job
    async fn poll(&self, job_id: &str) -> Result<PollUpdate, AgentError>;

    /// Ask the remote service to stop a job.
    ///
    /// Returns `Ok(false)` when the agent has no cancel operation.
    async fn cancel(&self, _job_id: &str) -> Result<bool, AgentError> {
        Ok(false)
    }

    /// Whether credentials for this agent are present
    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_order_is_fixed() {
        let mut kinds = vec![AgentKind::Perplexity, AgentKind::Gemini, AgentKind::OpenAI];
        kinds.sort();
        assert_eq!(kinds, AgentKind::ALL.to_vec());
    }

    #[test]
    fn test_agent_kind_serde_names() {
        assert_eq!(serde_json::to_value(AgentKind::OpenAI).unwrap(), "openai");
        assert_eq!(AgentKind::parse("Perplexity"), Some(AgentKind::Perplexity));
        assert_eq!(AgentKind::parse("claude"), None);
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(AgentError::Transient("503".into()).is_transient());
        assert!(!AgentError::Dispatch("401".into()).is_transient());
        assert!(!AgentError::Poll("bad body".into()).is_transient());
        assert!(!AgentError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(!AgentError::Cancelled.is_transient());
    }

    #[test]
    fn test_raw_citation_ignores_blank_title() {
        let citation = RawCitation::new("https://example.com").with_title("  ");
        assert!(citation.title.is_none());
    }
}
