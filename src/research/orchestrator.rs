//! Run orchestration: plan → approval → parallel research → synthesis.
//!
//! A [`RunOrchestrator`] owns one run. Its entry points never return errors:
//! every failure ends up in the run's state and is reported through a final
//! supervisor event.

use crate::agents::{AgentKind, AgentParams, AgentRequest, AgentSet};
use crate::llm::{GeneratorFactory, GeneratorRole, PromptTemplate, TemplateVars, TextGenerator};
use crate::research::checkpoint::{CheckpointReason, CheckpointStore, FileCheckpointStore, NoopCheckpoint};
use crate::research::citations;
use crate::research::events::{EventSource, EventType};
use crate::research::poller::{PollerSettings, SubAgentPoller};
use crate::research::prompts;
use crate::research::registry::RunHandle;
use crate::research::run::{AgentStatus, RunStatus};
use crate::research::thinking::strip_thinking;
use crate::types::{AppError, Result};
use crate::utils::toml_config::ResearchConfig;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;

/// Collaborators shared by every run, built once at startup.
pub struct ResearchDeps {
    pub agents: AgentSet,
    pub planner: Option<Arc<dyn TextGenerator>>,
    pub synthesizer: Option<Arc<dyn TextGenerator>>,
    pub checkpoint: Arc<dyn CheckpointStore>,
}

impl ResearchDeps {
    pub fn from_config(config: &ResearchConfig) -> Self {
        let factory = GeneratorFactory::new(config);
        let checkpoint: Arc<dyn CheckpointStore> = match &config.checkpoint.dir {
            Some(dir) => {
                tracing::info!(dir = %dir, "File checkpointing enabled");
                Arc::new(FileCheckpointStore::new(dir))
            }
            None => Arc::new(NoopCheckpoint),
        };

        Self {
            agents: AgentSet::from_config(config),
            planner: factory.create(GeneratorRole::Planner),
            synthesizer: factory.create(GeneratorRole::Synthesizer),
            checkpoint,
        }
    }
}

/// How the research phase ended
enum ResearchOutcome {
    Joined,
    Cancelled,
}

#[derive(Clone)]
pub struct RunOrchestrator {
    handle: Arc<RunHandle>,
    deps: Arc<ResearchDeps>,
}

impl RunOrchestrator {
    pub fn new(handle: Arc<RunHandle>, deps: Arc<ResearchDeps>) -> Self {
        Self { handle, deps }
    }

    pub fn handle(&self) -> &Arc<RunHandle> {
        &self.handle
    }

    /// Produce and store the research plan.
    ///
    /// On failure the run is finalized `failed` and the error is returned so
    /// the caller can stop.
    pub async fn plan(&self) -> Result<String> {
        if let Err(e) = self.handle.transition(RunStatus::Planning) {
            self.finalize(RunStatus::Failed, Some(e.to_string())).await;
            return Err(e);
        }

        let query = self.query();
        let plan = match &self.deps.planner {
            Some(planner) => {
                let config = Arc::clone(self.handle.config());
                let template = GeneratorFactory::new(&config)
                    .template(GeneratorRole::Planner)
                    .unwrap_or(prompts::PLAN_TEMPLATE);
                let vars = TemplateVars::new()
                    .with("query", query.as_str())
                    .with("date", today());

                tracing::debug!(run_id = %self.handle.run_id(), model = planner.model_name(), "Generating research plan");
                match planner.generate(&PromptTemplate::new(template), &vars).await {
                    Ok(raw) => strip_thinking(&raw).text.trim().to_string(),
                    Err(e) => {
                        let error = AppError::Plan(e.to_string());
                        self.finalize(RunStatus::Failed, Some(error.to_string())).await;
                        return Err(error);
                    }
                }
            }
            None => prompts::fallback_plan(&query),
        };

        if plan.is_empty() {
            let error = AppError::Plan("planner returned an empty plan".to_string());
            self.finalize(RunStatus::Failed, Some(error.to_string())).await;
            return Err(error);
        }

        if let Err(e) = self.handle.update(|run| run.set_plan(plan.clone())) {
            self.finalize(RunStatus::Failed, Some(e.to_string())).await;
            return Err(e);
        }

        tracing::info!(run_id = %self.handle.run_id(), "Research plan created");
        self.handle.events().publish(
            EventSource::Supervisor,
            EventType::PlanStep,
            json!({ "plan": plan }),
        );
        self.checkpoint(CheckpointReason::PlanCreated).await;

        Ok(plan)
    }

    /// Plan, then park the run in `awaiting_approval`.
    pub async fn plan_for_approval(&self) -> Result<String> {
        let plan = self.plan().await?;
        if let Err(e) = self.handle.transition(RunStatus::AwaitingApproval) {
            self.finalize(RunStatus::Failed, Some(e.to_string())).await;
            return Err(e);
        }
        self.handle.events().publish(
            EventSource::Supervisor,
            EventType::Progress,
            json!({ "status": RunStatus::AwaitingApproval }),
        );
        Ok(plan)
    }

    /// Continuation of a two-phase run once its plan exists.
    pub async fn run_two_phase_after_plan(self) {
        if !self.await_approval().await {
            self.finalize(RunStatus::Cancelled, Some("cancelled by user".to_string()))
                .await;
            return;
        }
        self.research_and_synthesize().await;
    }

    /// Single-call entry point: optional plan, then research and synthesis
    /// with no approval gate.
    pub async fn run_immediate(self) {
        if self.handle.config().research.immediate_plan && self.plan().await.is_err() {
            return;
        }
        self.research_and_synthesize().await;
    }

    /// Block until approved. Returns `false` when the run was cancelled
    /// first.
    pub async fn await_approval(&self) -> bool {
        let Some(approval) = self.handle.take_approval() else {
            tracing::error!(run_id = %self.handle.run_id(), "Approval gate already consumed");
            return false;
        };

        tokio::select! {
            biased;
            _ = self.handle.cancel_token().cancelled() => false,
            approved = approval => approved.is_ok(),
        }
    }

    async fn research_and_synthesize(&self) {
        let started = self.handle.update(|run| {
            if run.cancelled {
                return Ok(false);
            }
            run.transition(RunStatus::Researching).map(|_| true)
        });

        match started {
            Ok(true) => {}
            Ok(false) => {
                self.finalize(RunStatus::Cancelled, Some("cancelled by user".to_string()))
                    .await;
                return;
            }
            Err(e) => {
                self.finalize(RunStatus::Failed, Some(e.to_string())).await;
                return;
            }
        }

        if let ResearchOutcome::Cancelled = self.research().await {
            self.finalize(RunStatus::Cancelled, Some("cancelled by user".to_string()))
                .await;
            return;
        }

        self.synthesize().await;
    }

    /// Fan out to every agent and wait for all of them, or for cancellation.
    async fn research(&self) -> ResearchOutcome {
        let config = Arc::clone(self.handle.config());
        let settings = PollerSettings::from_config(&config);
        let query = self.query();
        let date = today();

        tracing::info!(run_id = %self.handle.run_id(), "Dispatching research agents");
        self.handle.events().publish(
            EventSource::Supervisor,
            EventType::Progress,
            json!({ "status": RunStatus::Researching, "agents": AgentKind::ALL }),
        );

        let tasks: Vec<_> = AgentKind::ALL
            .into_iter()
            .map(|kind| {
                let endpoint = config.agents.resolve(kind);
                let template = endpoint
                    .prompt
                    .as_deref()
                    .unwrap_or(prompts::default_agent_template(kind));
                let prompt = PromptTemplate::new(template).render(
                    &TemplateVars::new()
                        .with("query", query.as_str())
                        .with("date", date.as_str()),
                );

                let request = AgentRequest {
                    query: query.clone(),
                    params: AgentParams {
                        model: endpoint.model,
                        prompt,
                        max_tokens: endpoint.max_tokens,
                    },
                };

                let poller = SubAgentPoller::new(
                    Arc::clone(&self.handle),
                    self.deps.agents.get(kind),
                    request,
                    settings.clone(),
                    Arc::clone(&self.deps.checkpoint),
                );
                tokio::spawn(poller.run())
            })
            .collect();

        let results = tokio::select! {
            biased;
            _ = self.handle.cancel_token().cancelled() => {
                tracing::info!(run_id = %self.handle.run_id(), "Run cancelled during research");
                return ResearchOutcome::Cancelled;
            }
            results = join_all(tasks) => results,
        };

        for (kind, result) in AgentKind::ALL.into_iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(run_id = %self.handle.run_id(), agent = %kind, error = %e, "Agent task aborted");
                self.handle.update(|run| {
                    let slot = run.agent_mut(kind);
                    if !slot.status.is_terminal() {
                        slot.error = Some(format!("agent task aborted: {}", e));
                        let _ = slot.advance(AgentStatus::Failed);
                    }
                });
            }
        }

        ResearchOutcome::Joined
    }

    async fn synthesize(&self) {
        // Cancellation can land between the join and this point.
        let outputs = self.handle.update(|run| {
            if run.cancelled {
                return Err(RunStatus::Cancelled);
            }
            let outputs = run.completed_outputs();
            if outputs.is_empty() {
                return Err(RunStatus::Failed);
            }
            run.transition(RunStatus::Synthesizing)
                .map(|_| outputs)
                .map_err(|_| RunStatus::Failed)
        });

        let outputs = match outputs {
            Ok(outputs) => outputs,
            Err(RunStatus::Cancelled) => {
                self.finalize(RunStatus::Cancelled, Some("cancelled by user".to_string()))
                    .await;
                return;
            }
            Err(_) => {
                self.finalize(
                    RunStatus::Failed,
                    Some("no research agents completed".to_string()),
                )
                .await;
                return;
            }
        };

        let query = self.query();
        let combined = prompts::combine_reports(&outputs);
        self.handle.events().publish(
            EventSource::Supervisor,
            EventType::Progress,
            json!({
                "status": RunStatus::Synthesizing,
                "reports": outputs.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            }),
        );

        let (report, synthesis_error) = match &self.deps.synthesizer {
            Some(synthesizer) => {
                let config = Arc::clone(self.handle.config());
                let template = GeneratorFactory::new(&config)
                    .template(GeneratorRole::Synthesizer)
                    .unwrap_or(prompts::SYNTHESIS_TEMPLATE);
                let vars = TemplateVars::new()
                    .with("query", query.as_str())
                    .with("date", today())
                    .with("reports", combined.as_str());

                tracing::info!(
                    run_id = %self.handle.run_id(),
                    model = synthesizer.model_name(),
                    reports = outputs.len(),
                    "Synthesizing consensus report"
                );
                let generated = synthesizer
                    .generate(&PromptTemplate::new(template), &vars)
                    .await
                    .and_then(|raw| {
                        let filtered = strip_thinking(&raw).text.trim().to_string();
                        if filtered.is_empty() {
                            Err(AppError::Synthesis("synthesizer returned no text".to_string()))
                        } else {
                            Ok(filtered)
                        }
                    });

                match generated {
                    Ok(report) => (report, None),
                    Err(e) => {
                        let error = e.to_string();
                        tracing::warn!(run_id = %self.handle.run_id(), error = %error, "Synthesis failed, keeping raw reports");
                        (
                            prompts::degraded_consensus(&query, &error, &combined),
                            Some(error),
                        )
                    }
                }
            }
            None => (prompts::fallback_consensus(&query, &combined), None),
        };

        let stored = self.handle.update(|run| {
            run.synthesis_error = synthesis_error;
            run.set_consensus(report)?;

            let citations = citations::aggregate(run.agents.iter().filter_map(|(kind, slot)| {
                (slot.status == AgentStatus::Completed).then(|| {
                    (
                        *kind,
                        slot.citations.as_slice(),
                        slot.output.as_deref().unwrap_or_default(),
                    )
                })
            }));
            run.set_citations(citations)
        });

        if let Err(e) = stored {
            self.finalize(RunStatus::Failed, Some(e.to_string())).await;
            return;
        }

        self.checkpoint(CheckpointReason::SynthesisDone).await;
        self.finalize(RunStatus::Completed, None).await;
    }

    /// Apply the single terminal transition, announce it and checkpoint.
    async fn finalize(&self, status: RunStatus, reason: Option<String>) {
        let applied = self.handle.update(|run| {
            if run.overall_status.is_terminal() {
                return None;
            }

            if let Err(e) = run.transition(status) {
                tracing::error!(run_id = %run.run_id, error = %e, "Invalid terminal transition, failing run");
                // Failed is reachable from every non-terminal state.
                let _ = run.transition(RunStatus::Failed);
                run.failure_reason = Some(e.to_string());
            } else if let Some(reason) = &reason {
                run.failure_reason = Some(reason.clone());
            }

            Some((
                run.overall_status,
                run.failure_reason.clone(),
                run.citations.len(),
                run.synthesis_error.clone(),
            ))
        });

        let Some((final_status, failure_reason, citation_count, synthesis_error)) = applied else {
            return;
        };

        match final_status {
            RunStatus::Completed => {
                tracing::info!(run_id = %self.handle.run_id(), citations = citation_count, "Research run completed");
                self.handle.events().publish(
                    EventSource::Supervisor,
                    EventType::Completed,
                    json!({
                        "status": final_status,
                        "citations": citation_count,
                        "synthesis_error": synthesis_error,
                    }),
                );
            }
            _ => {
                tracing::warn!(
                    run_id = %self.handle.run_id(),
                    status = %final_status,
                    reason = failure_reason.as_deref().unwrap_or_default(),
                    "Research run ended"
                );
                self.handle.events().publish(
                    EventSource::Supervisor,
                    EventType::Error,
                    json!({ "status": final_status, "error": failure_reason }),
                );
            }
        }

        self.checkpoint(CheckpointReason::RunTerminal).await;
    }

    async fn checkpoint(&self, reason: CheckpointReason) {
        let snapshot = self.handle.snapshot();
        self.deps.checkpoint.save(&snapshot, reason).await;
    }

    fn query(&self) -> String {
        self.handle.read(|run| run.user_query.clone())
    }
}

/// Date string substituted for `{date}` in prompts
fn today() -> String {
    chrono::Utc::now().format("%B %d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deps_without_keys_fall_back() {
        let config: ResearchConfig = toml::from_str(
            r#"
[agents.gemini]
api_key_env = "MR_TEST_UNSET_GEMINI"

[agents.openai]
api_key_env = "MR_TEST_UNSET_OPENAI"

[agents.perplexity]
api_key_env = "MR_TEST_UNSET_PERPLEXITY"
"#,
        )
        .unwrap();

        let deps = ResearchDeps::from_config(&config);
        assert!(deps.planner.is_none());
        assert!(deps.synthesizer.is_none());
        for kind in AgentKind::ALL {
            assert!(!deps.agents.is_configured(kind));
        }
    }

    #[test]
    fn test_today_is_human_readable() {
        let date = today();
        assert!(date.contains(", "));
        assert!(date.chars().any(|c| c.is_ascii_digit()));
    }
}
