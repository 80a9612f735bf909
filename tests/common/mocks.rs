//! Mock implementations for testing.
//!
//! Scripted agent clients and text generators that stand in for the real
//! HTTP agents and LLM providers, plus helpers to assemble a service around
//! them.

use async_trait::async_trait;
use meta_research::agents::{
    AgentClient, AgentError, AgentKind, AgentProgress, AgentRequest, AgentSet, PollUpdate,
    RawCitation,
};
use meta_research::llm::{PromptTemplate, TemplateVars, TextGenerator};
use meta_research::research::checkpoint::{CheckpointStore, NoopCheckpoint};
use meta_research::types::{AppError, Result};
use meta_research::{ResearchConfig, ResearchConfigManager, ResearchDeps, ResearchService};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Text generator with a canned answer that records every rendered prompt.
pub struct MockGenerator {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A generator whose every call fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, template: &PromptTemplate, vars: &TemplateVars) -> Result<String> {
        self.prompts.lock().push(template.render(vars));
        self.response
            .clone()
            .ok_or_else(|| AppError::LLM("mock generator failure".to_string()))
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Agent client that replays scripted submit and poll results.
///
/// Once the poll script runs out every further poll reports the job as
/// still running.
pub struct ScriptedAgentClient {
    kind: AgentKind,
    submits: Mutex<VecDeque<std::result::Result<String, AgentError>>>,
    polls: Mutex<VecDeque<std::result::Result<PollUpdate, AgentError>>>,
    requests: Mutex<Vec<AgentRequest>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl ScriptedAgentClient {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            submits: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Submits succeed and the first poll returns `output`.
    pub fn completing(kind: AgentKind, output: &str, citations: Vec<RawCitation>) -> Arc<Self> {
        Arc::new(Self::new(kind).then_poll(Ok(PollUpdate::Done {
            output: output.to_string(),
            citations,
        })))
    }

    /// Submits succeed and the job never finishes.
    pub fn hanging(kind: AgentKind) -> Arc<Self> {
        Arc::new(Self::new(kind))
    }

    /// Submit fails permanently.
    pub fn rejecting(kind: AgentKind, reason: &str) -> Arc<Self> {
        Arc::new(Self::new(kind).then_submit(Err(AgentError::Dispatch(reason.to_string()))))
    }

    pub fn then_submit(self, result: std::result::Result<String, AgentError>) -> Self {
        self.submits.lock().push_back(result);
        self
    }

    pub fn then_poll(self, result: std::result::Result<PollUpdate, AgentError>) -> Self {
        self.polls.lock().push_back(result);
        self
    }

    pub fn then_progress(self, progress: Vec<AgentProgress>) -> Self {
        self.then_poll(Ok(PollUpdate::Running { progress }))
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    fn job_id(&self) -> String {
        format!("job-{}", self.kind)
    }
}

#[async_trait]
impl AgentClient for ScriptedAgentClient {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn submit(&self, request: &AgentRequest) -> std::result::Result<String, AgentError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.submits
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.job_id()))
    }

    async fn poll(&self, _job_id: &str) -> std::result::Result<PollUpdate, AgentError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PollUpdate::Running { progress: vec![] }))
    }

    async fn cancel(&self, _job_id: &str) -> std::result::Result<bool, AgentError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Configuration with short, test-friendly polling settings.
pub fn test_config(interval_secs: u64, max_duration_secs: u64) -> ResearchConfig {
    let mut config = ResearchConfig::default();
    config.polling.interval_secs = interval_secs;
    config.polling.max_duration_secs = max_duration_secs;
    config
}

/// Everything a test needs to drive runs through a [`ResearchService`].
pub struct Harness {
    pub gemini: Arc<ScriptedAgentClient>,
    pub openai: Arc<ScriptedAgentClient>,
    pub perplexity: Arc<ScriptedAgentClient>,
    pub planner: Option<Arc<MockGenerator>>,
    pub synthesizer: Option<Arc<MockGenerator>>,
    pub checkpoint: Arc<dyn CheckpointStore>,
    pub config: ResearchConfig,
}

impl Harness {
    pub fn new(
        gemini: Arc<ScriptedAgentClient>,
        openai: Arc<ScriptedAgentClient>,
        perplexity: Arc<ScriptedAgentClient>,
    ) -> Self {
        Self {
            gemini,
            openai,
            perplexity,
            planner: None,
            synthesizer: None,
            checkpoint: Arc::new(NoopCheckpoint),
            config: test_config(10, 600),
        }
    }

    pub fn with_planner(mut self, planner: Arc<MockGenerator>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<MockGenerator>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_config(mut self, config: ResearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn deps(&self) -> ResearchDeps {
        let agents: Vec<Arc<dyn AgentClient>> = vec![
            self.gemini.clone(),
            self.openai.clone(),
            self.perplexity.clone(),
        ];
        ResearchDeps {
            agents: AgentSet::from_clients(agents),
            planner: self
                .planner
                .clone()
                .map(|p| p as Arc<dyn TextGenerator>),
            synthesizer: self
                .synthesizer
                .clone()
                .map(|s| s as Arc<dyn TextGenerator>),
            checkpoint: Arc::clone(&self.checkpoint),
        }
    }

    pub fn service(&self) -> Arc<ResearchService> {
        let manager = Arc::new(ResearchConfigManager::from_config(self.config.clone()));
        Arc::new(ResearchService::new(manager, self.deps()))
    }
}
