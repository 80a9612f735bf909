//! Gemini Deep Research via the background Interactions API.
//!
//! A job is created with `POST {base}/interactions` and `background: true`;
//! its state is read back with `GET {base}/interactions/{id}`.

use super::http::{self, Phase};
use super::{AgentClient, AgentError, AgentKind, AgentProgress, AgentRequest, PollUpdate, RawCitation};
use crate::research::events::EventType;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Interaction {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    outputs: Vec<InteractionOutput>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct InteractionOutput {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    annotations: Vec<Value>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
            api_key: api_key.into(),
            base_url: http::trim_base(base_url),
        }
    }

    fn interaction_into_update(interaction: Interaction) -> PollUpdate {
        match interaction.status.as_str() {
            "completed" => {
                let mut output = String::new();
                let mut citations = Vec::new();
                for item in interaction.outputs.iter().filter(|o| o.kind == "text") {
                    if let Some(text) = &item.text {
                        if !output.is_empty() {
                            output.push_str("\n\n");
                        }
                        output.push_str(text);
                    }
                    citations.extend(item.annotations.iter().filter_map(annotation_citation));
                }
                PollUpdate::Done { output, citations }
            }
            "failed" | "cancelled" => PollUpdate::Failed {
                reason: interaction
                    .error
                    .as_ref()
                    .and_then(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("interaction {}", interaction.status)),
            },
            _ => {
                let progress = interaction
                    .outputs
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.kind == "thought")
                    .filter_map(|(i, o)| {
                        let summary = thought_summary(o.summary.as_ref()?)?;
                        Some(AgentProgress::keyed(
                            EventType::Reasoning,
                            format!("thought-{}", i),
                            json!({ "summary": summary }),
                        ))
                    })
                    .collect();
                PollUpdate::Running { progress }
            }
        }
    }
}

fn thought_summary(summary: &Value) -> Option<String> {
    match summary {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then(|| text.join("\n"))
        }
        _ => None,
    }
}

fn annotation_citation(annotation: &Value) -> Option<RawCitation> {
    let url = annotation
        .get("url")
        .or_else(|| annotation.get("source"))
        .and_then(Value::as_str)?;
    let mut citation = RawCitation::new(url);
    if let Some(title) = annotation.get("title").and_then(Value::as_str) {
        citation = citation.with_title(title);
    }
    Some(citation)
}

#[async_trait]
impl AgentClient for GeminiClient {
    fn kind(&self) -> AgentKind {
        AgentKind::Gemini
    }

    async fn submit(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let body = json!({
            "input": request.params.prompt,
            "agent": request.params.model,
            "background": true,
        });

        let interaction: Interaction = http::send_json(
            Phase::Submit,
            self.client
                .post(format!("{}/interactions", self.base_url))
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        Ok(interaction.id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollUpdate, AgentError> {
        let interaction: Interaction = http::send_json(
            Phase::Poll,
            self.client
                .get(format!("{}/interactions/{}", self.base_url, job_id))
                .header("x-goog-api-key", &self.api_key),
        )
        .await?;

        Ok(Self::interaction_into_update(interaction))
    }
}
