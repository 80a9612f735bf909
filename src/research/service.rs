//! Inbound interface used by the HTTP layer and tests.

use crate::agents::AgentKind;
use crate::research::events::EventStream;
use crate::research::orchestrator::{ResearchDeps, RunOrchestrator};
use crate::research::registry::{RunHandle, RunRegistry};
use crate::research::run::{ResearchRun, RunSnapshot, RunStatus};
use crate::types::{AppError, CreateRunResponse, HealthResponse, Result, StartRunResponse};
use crate::utils::toml_config::ResearchConfigManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ResearchService {
    config_manager: Arc<ResearchConfigManager>,
    registry: Arc<RunRegistry>,
    deps: Arc<ResearchDeps>,
}

impl ResearchService {
    pub fn new(config_manager: Arc<ResearchConfigManager>, deps: ResearchDeps) -> Self {
        Self {
            config_manager,
            registry: Arc::new(RunRegistry::new()),
            deps: Arc::new(deps),
        }
    }

    /// Build agents, generators and the checkpoint store from the current
    /// configuration.
    pub fn from_config_manager(config_manager: Arc<ResearchConfigManager>) -> Self {
        let deps = ResearchDeps::from_config(&config_manager.config());
        Self::new(config_manager, deps)
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn deps(&self) -> &Arc<ResearchDeps> {
        &self.deps
    }

    fn register(&self, query: &str) -> Result<Arc<RunHandle>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }

        let handle = RunHandle::new(ResearchRun::new(query), self.config_manager.config());
        self.registry.insert(Arc::clone(&handle));
        tracing::info!(run_id = %handle.run_id(), "Research run created");
        Ok(handle)
    }

    fn handle(&self, run_id: &str) -> Result<Arc<RunHandle>> {
        self.registry
            .get(run_id)
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
    }

    /// Two-phase entry point. Plans inline and leaves the run waiting for
    /// [`ResearchService::approve`].
    ///
    /// A failed plan still returns the run id; the run is then `failed`.
    pub async fn create_run(&self, query: &str) -> Result<CreateRunResponse> {
        let handle = self.register(query)?;
        let orchestrator = RunOrchestrator::new(Arc::clone(&handle), Arc::clone(&self.deps));

        let research_plan = match orchestrator.plan_for_approval().await {
            Ok(plan) => {
                tokio::spawn(orchestrator.run_two_phase_after_plan());
                Some(plan)
            }
            Err(e) => {
                tracing::warn!(run_id = %handle.run_id(), error = %e, "Run failed during planning");
                None
            }
        };

        Ok(CreateRunResponse {
            run_id: handle.run_id().to_string(),
            status: handle.status(),
            research_plan,
        })
    }

    /// Release a run from `awaiting_approval`.
    pub fn approve(&self, run_id: &str) -> Result<RunSnapshot> {
        let handle = self.handle(run_id)?;
        handle.approve()?;
        tracing::info!(run_id, "Research run approved");
        Ok(handle.snapshot())
    }

    /// Single-call entry point; research starts in the background.
    pub fn start_immediate(&self, query: &str) -> Result<StartRunResponse> {
        let handle = self.register(query)?;
        let orchestrator = RunOrchestrator::new(Arc::clone(&handle), Arc::clone(&self.deps));
        tokio::spawn(orchestrator.run_immediate());

        Ok(StartRunResponse {
            run_id: handle.run_id().to_string(),
            status: handle.status(),
            message: format!(
                "Research started. Poll /api/status/{0} or stream /api/research/{0}/events.",
                handle.run_id()
            ),
        })
    }

    /// Request cancellation. Repeating it is harmless.
    pub fn cancel(&self, run_id: &str) -> Result<RunSnapshot> {
        let handle = self.handle(run_id)?;
        if handle.request_cancel()? {
            tracing::info!(run_id, "Cancellation requested");
        }
        Ok(handle.snapshot())
    }

    /// Live state from memory, falling back to the last checkpoint.
    pub async fn get_status(&self, run_id: &str) -> Result<RunSnapshot> {
        if let Some(handle) = self.registry.get(run_id) {
            return Ok(handle.snapshot());
        }

        self.deps
            .checkpoint
            .load(run_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
    }

    /// Subscribe to a run's live events.
    ///
    /// There is no replay: a run that already ended yields an empty stream.
    pub async fn subscribe_events(&self, run_id: &str) -> Result<EventStream> {
        match self.registry.get(run_id) {
            Some(handle) => {
                // Subscribe before checking status so the terminal event
                // can't slip between the two.
                let stream = handle.events().subscribe();
                if handle.status().is_terminal() {
                    Ok(EventStream::finished(run_id))
                } else {
                    Ok(stream)
                }
            }
            None => {
                self.get_status(run_id).await?;
                Ok(EventStream::finished(run_id))
            }
        }
    }

    pub fn list_runs(&self) -> Vec<RunSnapshot> {
        self.registry.list()
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            gemini_configured: self.deps.agents.is_configured(AgentKind::Gemini),
            openai_configured: self.deps.agents.is_configured(AgentKind::OpenAI),
            perplexity_configured: self.deps.agents.is_configured(AgentKind::Perplexity),
            planner_configured: self.deps.planner.is_some(),
            synthesizer_configured: self.deps.synthesizer.is_some(),
            active_runs: self.registry.active_count(),
        }
    }

    /// Evict terminal runs past the configured retention. Nothing is evicted
    /// unless the checkpoint store can serve the run afterwards.
    pub fn sweep(&self) -> usize {
        if !self.deps.checkpoint.persists() {
            return 0;
        }
        let retention = self.config_manager.config().retention();
        let evicted = self.registry.evict_terminal(retention);
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.registry.len(), "Swept finished runs");
        }
        evicted
    }

    /// Periodically call [`ResearchService::sweep`] until `shutdown` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let every = Duration::from_secs(
            self.config_manager
                .config()
                .registry
                .sweep_interval_secs
                .max(1),
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        service.sweep();
                    }
                }
            }
            tracing::debug!("Run sweeper stopped");
        })
    }

    /// Wait for a live run to end. `None` if the run is not in memory.
    pub async fn wait_for(&self, run_id: &str) -> Option<RunStatus> {
        let handle = self.registry.get(run_id)?;
        Some(handle.wait_terminal().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::ResearchConfig;

    fn service() -> ResearchService {
        let manager = Arc::new(ResearchConfigManager::from_config(ResearchConfig::default()));
        let deps = ResearchDeps {
            agents: crate::agents::AgentSet::from_clients(Vec::new()),
            planner: None,
            synthesizer: None,
            checkpoint: Arc::new(crate::research::checkpoint::NoopCheckpoint),
        };
        ResearchService::new(manager, deps)
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let service = service();
        assert!(matches!(
            service.create_run("   ").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service.start_immediate(""),
            Err(AppError::InvalidInput(_))
        ));
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let service = service();
        assert!(matches!(service.approve("nope"), Err(AppError::NotFound(_))));
        assert!(matches!(service.cancel("nope"), Err(AppError::NotFound(_))));
        assert!(matches!(
            service.get_status("nope").await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.subscribe_events("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_create_run_with_fallback_plan_awaits_approval() {
        let service = service();
        let created = service.create_run("What is CRISPR?").await.unwrap();
        assert_eq!(created.status, RunStatus::AwaitingApproval);
        assert!(created
            .research_plan
            .unwrap()
            .starts_with("Research plan for: What is CRISPR?"));

        let health = service.health();
        assert_eq!(health.active_runs, 1);
        assert!(!health.gemini_configured);
        assert!(!health.planner_configured);
    }

    #[tokio::test]
    async fn test_sweep_keeps_runs_without_persistent_store() {
        let mut config = ResearchConfig::default();
        config.registry.retention_secs = 0;
        let manager = Arc::new(ResearchConfigManager::from_config(config));
        let deps = ResearchDeps {
            agents: crate::agents::AgentSet::from_clients(Vec::new()),
            planner: None,
            synthesizer: None,
            checkpoint: Arc::new(crate::research::checkpoint::NoopCheckpoint),
        };
        let service = ResearchService::new(manager, deps);

        let created = service.create_run("q").await.unwrap();
        service.cancel(&created.run_id).unwrap();
        assert_eq!(
            service.wait_for(&created.run_id).await,
            Some(RunStatus::Cancelled)
        );

        assert_eq!(service.sweep(), 0);
        let run = service.get_status(&created.run_id).await.unwrap();
        assert_eq!(run.overall_status, RunStatus::Cancelled);
    }
}
