//! Drives one agent through submit → poll → terminal.
//!
//! The poller is the only writer of its agent's slot in the run. Transient
//! upstream failures consume retries from a per-agent budget shared by
//! submit and poll; everything else ends the agent immediately.

use crate::agents::{AgentClient, AgentError, AgentKind, AgentRequest, PollUpdate, RawCitation};
use crate::research::checkpoint::{CheckpointReason, CheckpointStore};
use crate::research::events::EventType;
use crate::research::registry::RunHandle;
use crate::research::run::AgentStatus;
use crate::research::thinking::strip_thinking;
use crate::utils::toml_config::ResearchConfig;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const REMOTE_CANCEL_TIMEOUT: Duration = Duration::from_secs(10);
const EMPTY_OUTPUT: &str = "agent returned empty output";

/// Cumulative retry budget with a stepped backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based). The last delay is reused
    /// once the list runs out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or(Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(15),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    /// Budget measured from the moment the agent enters `polling`
    pub max_poll_duration: Duration,
    pub retry: RetryPolicy,
}

impl PollerSettings {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_poll_duration: config.max_poll_duration(),
            retry: RetryPolicy {
                max_retries: config.polling.max_retries,
                backoff: config
                    .polling
                    .backoff_secs
                    .iter()
                    .map(|s| Duration::from_secs(*s))
                    .collect(),
            },
        }
    }
}

/// How the drive loop ended
#[derive(Debug)]
enum Outcome {
    Done {
        output: String,
        citations: Vec<RawCitation>,
    },
    Failed(String),
    TimedOut(Duration),
    Cancelled,
}

pub struct SubAgentPoller {
    handle: Arc<RunHandle>,
    client: Arc<dyn AgentClient>,
    request: AgentRequest,
    settings: PollerSettings,
    checkpoint: Arc<dyn CheckpointStore>,
    kind: AgentKind,
    job_id: Option<String>,
    retries: u32,
    seen_progress: HashSet<String>,
}

impl SubAgentPoller {
    pub fn new(
        handle: Arc<RunHandle>,
        client: Arc<dyn AgentClient>,
        request: AgentRequest,
        settings: PollerSettings,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> Self {
        let kind = client.kind();
        Self {
            handle,
            client,
            request,
            settings,
            checkpoint,
            kind,
            job_id: None,
            retries: 0,
            seen_progress: HashSet::new(),
        }
    }

    /// Run the agent to a terminal status and return it.
    pub async fn run(mut self) -> AgentStatus {
        let outcome = self.drive().await;
        self.finish(outcome).await
    }

    async fn drive(&mut self) -> Outcome {
        let job_id = match self.dispatch().await {
            Ok(job_id) => job_id,
            Err(outcome) => return outcome,
        };

        let deadline = Instant::now() + self.settings.max_poll_duration;

        loop {
            if let Err(outcome) = self.sleep_or_cancel(self.settings.poll_interval, Some(deadline)).await {
                return outcome;
            }

            let polled = tokio::select! {
                biased;
                _ = self.handle.cancel_token().cancelled() => return Outcome::Cancelled,
                result = tokio::time::timeout_at(deadline, self.client.poll(&job_id)) => result,
            };

            let Ok(result) = polled else {
                return Outcome::TimedOut(self.settings.max_poll_duration);
            };

            match result {
                Ok(PollUpdate::Running { progress }) => {
                    for item in progress {
                        if let Some(key) = &item.key
                            && !self.seen_progress.insert(key.clone())
                        {
                            continue;
                        }
                        self.handle
                            .events()
                            .publish(self.kind, item.event_type, item.payload);
                    }
                }
                Ok(PollUpdate::Done { output, citations }) => {
                    return Outcome::Done { output, citations };
                }
                Ok(PollUpdate::Failed { reason }) => return Outcome::Failed(reason),
                Err(e) if e.is_transient() => {
                    if let Err(outcome) = self.consume_retry(&e, Some(deadline)).await {
                        return outcome;
                    }
                }
                Err(e) => return Outcome::Failed(e.to_string()),
            }
        }
    }

    /// Submit the job, retrying transient failures. Leaves the slot in
    /// `polling` on success.
    async fn dispatch(&mut self) -> Result<String, Outcome> {
        if self.handle.cancel_token().is_cancelled() {
            return Err(Outcome::Cancelled);
        }

        self.set_status(AgentStatus::Dispatched);
        self.handle.events().publish(
            self.kind,
            EventType::Progress,
            json!({ "status": "dispatched", "model": self.request.params.model }),
        );

        let job_id = loop {
            let submitted = tokio::select! {
                biased;
                _ = self.handle.cancel_token().cancelled() => return Err(Outcome::Cancelled),
                result = self.client.submit(&self.request) => result,
            };

            match submitted {
                Ok(job_id) => break job_id,
                Err(e) if e.is_transient() => self.consume_retry(&e, None).await?,
                Err(e) => return Err(Outcome::Failed(e.to_string())),
            }
        };

        tracing::info!(run_id = %self.handle.run_id(), agent = %self.kind, job_id = %job_id, "Agent job submitted");
        self.job_id = Some(job_id.clone());
        self.handle.update(|run| {
            run.agent_mut(self.kind).job_id = Some(job_id.clone());
        });
        self.set_status(AgentStatus::Polling);
        self.handle.events().publish(
            self.kind,
            EventType::Progress,
            json!({ "status": "polling", "job_id": job_id }),
        );

        Ok(job_id)
    }

    /// Spend one retry on `cause` and sleep its backoff, or give up.
    async fn consume_retry(&mut self, cause: &AgentError, deadline: Option<Instant>) -> Result<(), Outcome> {
        if self.retries >= self.settings.retry.max_retries {
            return Err(Outcome::Failed(format!(
                "{} (gave up after {} retries)",
                cause, self.retries
            )));
        }

        self.retries += 1;
        let retry = self.retries;
        let delay = self.settings.retry.delay_for(retry);

        tracing::warn!(
            run_id = %self.handle.run_id(),
            agent = %self.kind,
            retry,
            delay_secs = delay.as_secs(),
            cause = %cause,
            "Transient agent failure, retrying"
        );
        self.handle.update(|run| run.agent_mut(self.kind).retry_count = retry);
        self.handle.events().publish(
            self.kind,
            EventType::Progress,
            json!({ "retry": retry, "cause": cause.to_string(), "delay_secs": delay.as_secs() }),
        );

        self.sleep_or_cancel(delay, deadline).await
    }

    /// Sleep for `duration`, waking early on cancellation or when the
    /// polling deadline would be crossed.
    async fn sleep_or_cancel(&self, duration: Duration, deadline: Option<Instant>) -> Result<(), Outcome> {
        let wake = Instant::now() + duration;

        if let Some(deadline) = deadline
            && wake >= deadline
        {
            tokio::select! {
                biased;
                _ = self.handle.cancel_token().cancelled() => return Err(Outcome::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Outcome::TimedOut(self.settings.max_poll_duration));
                }
            }
        }

        tokio::select! {
            biased;
            _ = self.handle.cancel_token().cancelled() => Err(Outcome::Cancelled),
            _ = tokio::time::sleep_until(wake) => Ok(()),
        }
    }

    fn set_status(&self, status: AgentStatus) {
        let kind = self.kind;
        self.handle.update(|run| {
            if let Err(e) = run.agent_mut(kind).advance(status) {
                tracing::error!(run_id = %run.run_id, agent = %kind, error = %e, "Agent state regression refused");
            }
        });
    }

    async fn finish(self, outcome: Outcome) -> AgentStatus {
        let kind = self.kind;
        let run_id = self.handle.run_id().to_string();

        // Blank output after filtering counts as a failure, never a completion
        let outcome = match outcome {
            Outcome::Done { output, citations } => {
                let filtered = strip_thinking(&output);
                if filtered.had_thinking {
                    tracing::debug!(run_id = %run_id, agent = %kind, "Stripped reasoning markup from agent output");
                }
                if filtered.text.trim().is_empty() {
                    Outcome::Failed(EMPTY_OUTPUT.to_string())
                } else {
                    Outcome::Done {
                        output: filtered.text,
                        citations,
                    }
                }
            }
            other => other,
        };

        let (status, error) = match outcome {
            Outcome::Done { output, citations } => {
                let chars = output.chars().count();
                let citation_count = citations.len();

                self.handle.update(|run| {
                    let slot = run.agent_mut(kind);
                    slot.output = Some(output);
                    slot.citations = citations;
                });
                self.set_status(AgentStatus::Completed);
                self.handle.events().publish(
                    kind,
                    EventType::Completed,
                    json!({ "output_chars": chars, "citations": citation_count }),
                );
                tracing::info!(run_id = %run_id, agent = %kind, chars, "Agent completed");
                (AgentStatus::Completed, None)
            }
            Outcome::Failed(reason) => (AgentStatus::Failed, Some(reason)),
            Outcome::TimedOut(budget) => (
                AgentStatus::Timeout,
                Some(format!("timed out after {}s", budget.as_secs())),
            ),
            Outcome::Cancelled => (AgentStatus::Failed, Some("cancelled".to_string())),
        };

        if let Some(error) = error {
            tracing::warn!(run_id = %run_id, agent = %kind, status = %status, error = %error, "Agent ended without output");
            self.handle.update(|run| run.agent_mut(kind).error = Some(error.clone()));
            self.set_status(status);
            self.handle.events().publish(
                kind,
                EventType::Error,
                json!({ "status": status, "error": error }),
            );

            if matches!(status, AgentStatus::Timeout) || error == "cancelled" {
                self.cancel_remote().await;
            }
        }

        let snapshot = self.handle.snapshot();
        self.checkpoint
            .save(&snapshot, CheckpointReason::AgentTerminal(kind))
            .await;

        status
    }

    async fn cancel_remote(&self) {
        let Some(job_id) = &self.job_id else {
            return;
        };

        match tokio::time::timeout(REMOTE_CANCEL_TIMEOUT, self.client.cancel(job_id)).await {
            Ok(Ok(true)) => {
                tracing::info!(run_id = %self.handle.run_id(), agent = %self.kind, job_id = %job_id, "Remote job cancelled")
            }
            Ok(Ok(false)) => {}
            Ok(Err(e)) => {
                tracing::warn!(run_id = %self.handle.run_id(), agent = %self.kind, error = %e, "Remote cancel failed")
            }
            Err(_) => {
                tracing::warn!(run_id = %self.handle.run_id(), agent = %self.kind, "Remote cancel timed out")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_reuses_last_value() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(15));
        assert_eq!(policy.delay_for(7), Duration::from_secs(15));

        let single = RetryPolicy {
            max_retries: 5,
            backoff: vec![Duration::from_secs(2)],
        };
        assert_eq!(single.delay_for(4), Duration::from_secs(2));
    }

    #[test]
    fn test_settings_from_config() {
        let config: ResearchConfig = toml::from_str(
            r#"
[polling]
interval_secs = 12
max_duration_secs = 600
max_retries = 1
backoff_secs = [3]
"#,
        )
        .unwrap();

        let settings = PollerSettings::from_config(&config);
        assert_eq!(settings.poll_interval, Duration::from_secs(12));
        assert_eq!(settings.max_poll_duration, Duration::from_secs(600));
        assert_eq!(settings.retry.max_retries, 1);
        assert_eq!(settings.retry.backoff, vec![Duration::from_secs(3)]);
    }
}
