//! OpenAI Deep Research through the Responses API in background mode.

use super::http::{self, Phase};
use super::{AgentClient, AgentError, AgentKind, AgentProgress, AgentRequest, PollUpdate, RawCitation};
use crate::research::events::EventType;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIResearchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ResponseObject {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(default)]
    incomplete_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Reasoning {
        #[serde(default)]
        id: String,
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    WebSearchCall {
        #[serde(default)]
        id: String,
        #[serde(default)]
        action: Option<Value>,
    },
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SummaryPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl OpenAIResearchClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
            api_key: api_key.into(),
            base_url: http::trim_base(base_url),
        }
    }

    fn response_into_update(response: ResponseObject) -> PollUpdate {
        match response.status.as_str() {
            "completed" => {
                let mut output = String::new();
                let mut citations = Vec::new();

                for item in &response.output {
                    let OutputItem::Message { content } = item else {
                        continue;
                    };
                    for part in content.iter().filter(|p| p.kind == "output_text") {
                        if !output.is_empty() {
                            output.push_str("\n\n");
                        }
                        output.push_str(&part.text);
                        citations.extend(
                            part.annotations
                                .iter()
                                .filter(|a| a.kind == "url_citation")
                                .filter_map(|a| {
                                    let url = a.url.as_ref()?;
                                    let citation = RawCitation::new(url.clone());
                                    Some(match &a.title {
                                        Some(title) => citation.with_title(title.clone()),
                                        None => citation,
                                    })
                                }),
                        );
                    }
                }

                PollUpdate::Done { output, citations }
            }
            "failed" | "cancelled" | "incomplete" => {
                let reason = response
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .or_else(|| response.incomplete_details.map(|d| d.to_string()))
                    .unwrap_or_else(|| format!("response {}", response.status));
                PollUpdate::Failed { reason }
            }
            _ => {
                let progress = response
                    .output
                    .iter()
                    .filter_map(|item| match item {
                        OutputItem::Reasoning { id, summary } if !summary.is_empty() => {
                            let text: Vec<&str> =
                                summary.iter().map(|s| s.text.as_str()).collect();
                            Some(AgentProgress::keyed(
                                EventType::Reasoning,
                                id.clone(),
                                json!({ "summary": text.join("\n") }),
                            ))
                        }
                        OutputItem::WebSearchCall { id, action } => Some(AgentProgress::keyed(
                            EventType::Source,
                            id.clone(),
                            json!({ "action": action.clone().unwrap_or(Value::Null) }),
                        )),
                        _ => None,
                    })
                    .collect();
                PollUpdate::Running { progress }
            }
        }
    }
}

#[async_trait]
impl AgentClient for OpenAIResearchClient {
    fn kind(&self) -> AgentKind {
        AgentKind::OpenAI
    }

    async fn submit(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let mut body = json!({
            "model": request.params.model,
            "input": request.params.prompt,
            "background": true,
            "reasoning": { "summary": "auto" },
            "tools": [{ "type": "web_search_preview" }],
        });
        if let Some(max_tokens) = request.params.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }

        let response: ResponseObject = http::send_json(
            Phase::Submit,
            self.client
                .post(format!("{}/responses", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        Ok(response.id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollUpdate, AgentError> {
        let response: ResponseObject = http::send_json(
            Phase::Poll,
            self.client
                .get(format!("{}/responses/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key),
        )
        .await?;

        Ok(Self::response_into_update(response))
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, AgentError> {
        let _: Value = http::send_json(
            Phase::Poll,
            self.client
                .post(format!("{}/responses/{}/cancel", self.base_url, job_id))
                .bearer_auth(&self.api_key),
        )
        .await?;
        Ok(true)
    }
}
