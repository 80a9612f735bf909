//! Perplexity Sonar Deep Research through the async chat completions API.

use super::http::{self, Phase};
use super::{AgentClient, AgentError, AgentKind, AgentProgress, AgentRequest, PollUpdate, RawCitation};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

pub struct PerplexityClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AsyncJob {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    response: Option<Completion>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl PerplexityClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http::build_client(timeout),
            api_key: api_key.into(),
            base_url: http::trim_base(base_url),
        }
    }

    fn job_into_update(job: AsyncJob) -> PollUpdate {
        match job.status.as_str() {
            "COMPLETED" => {
                let Some(completion) = job.response else {
                    return PollUpdate::Failed {
                        reason: "completed job carried no response".to_string(),
                    };
                };

                let output = completion
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();

                // Structured search results first; the bare citation list only
                // adds URLs the search results did not cover.
                let mut citations: Vec<RawCitation> = completion
                    .search_results
                    .into_iter()
                    .map(|r| RawCitation {
                        url: r.url,
                        title: r.title.filter(|t| !t.trim().is_empty()),
                        date: r.date,
                        snippet: r.snippet,
                    })
                    .collect();
                for url in completion.citations {
                    if !citations.iter().any(|c| c.url == url) {
                        citations.push(RawCitation::new(url));
                    }
                }

                PollUpdate::Done { output, citations }
            }
            "FAILED" => PollUpdate::Failed {
                reason: job
                    .error_message
                    .unwrap_or_else(|| "research job failed".to_string()),
            },
            status => PollUpdate::Running {
                progress: vec![AgentProgress::progress(json!({ "status": status }))],
            },
        }
    }
}

#[async_trait]
impl AgentClient for PerplexityClient {
    fn kind(&self) -> AgentKind {
        AgentKind::Perplexity
    }

    async fn submit(&self, request: &AgentRequest) -> Result<String, AgentError> {
        let mut inner = json!({
            "model": request.params.model,
            "messages": [{ "role": "user", "content": request.params.prompt }],
        });
        if let Some(max_tokens) = request.params.max_tokens {
            inner["max_tokens"] = json!(max_tokens);
        }

        let job: AsyncJob = http::send_json(
            Phase::Submit,
            self.client
                .post(format!("{}/async/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({ "request": inner })),
        )
        .await?;

        Ok(job.id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollUpdate, AgentError> {
        let job: AsyncJob = http::send_json(
            Phase::Poll,
            self.client
                .get(format!("{}/async/chat/completions/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key),
        )
        .await?;

        Ok(Self::job_into_update(job))
    }
}
