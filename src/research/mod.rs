//! Multi-Agent Deep Research Orchestration
//!
//! One user query fans out to three external deep-research agents (Gemini,
//! OpenAI, Perplexity) whose reports are merged into a single consensus
//! report with deduplicated citations.
//!
//! # Architecture
//!
//! - [`service::ResearchService`] - Entry points used by the HTTP layer
//! - [`orchestrator::RunOrchestrator`] - Drives one run through its lifecycle
//! - [`poller::SubAgentPoller`] - Submits and polls one agent with retry,
//!   timeout and cancellation
//! - [`registry::RunRegistry`] - Live runs, each behind a [`registry::RunHandle`]
//! - [`events::LiveEventBus`] - Per-run broadcast of [`events::LiveEvent`]s
//!
//! # Usage
//!
//! ```ignore
//! use meta_research::research::service::ResearchService;
//!
//! let service = ResearchService::from_config_manager(config_manager);
//!
//! let created = service.create_run("What are the latest developments in quantum computing?").await?;
//! println!("Plan:\n{}", created.research_plan.unwrap_or_default());
//!
//! let mut events = service.subscribe_events(&created.run_id).await?;
//! service.approve(&created.run_id)?;
//! while let Some(event) = events.next().await {
//!     println!("[{}] {} {}", event.agent, event.event_type, event.payload);
//! }
//!
//! let run = service.get_status(&created.run_id).await?;
//! println!("{}", run.consensus_report.unwrap_or_default());
//! ```
//!
//! # Run Lifecycle
//!
//! 1. **Plan** - A planner model (or a fixed fallback) writes the plan
//! 2. **Approval** - Two-phase runs wait here; immediate runs skip it
//! 3. **Research** - All three agents run concurrently
//! 4. **Synthesis** - Completed reports are merged into the consensus
//! 5. **Citations** - Sources are normalized and deduplicated across agents

/// Run checkpoint stores.
pub mod checkpoint;
/// Citation normalization and cross-agent deduplication.
pub mod citations;
/// Live event bus and subscriptions.
pub mod events;
/// Run lifecycle driver.
pub mod orchestrator;
/// Per-agent submit/poll loop.
pub mod poller;
/// Default prompts and fallback reports.
pub mod prompts;
/// In-memory run registry.
pub mod registry;
/// Run and agent state machines.
pub mod run;
/// Inbound service interface.
pub mod service;
/// Reasoning-markup filter.
pub mod thinking;

pub use events::{EventSource, EventStream, EventType, LiveEvent, LiveEventBus};
pub use orchestrator::{ResearchDeps, RunOrchestrator};
pub use registry::{RunHandle, RunRegistry};
pub use run::{AgentStatus, Citation, ResearchRun, RunSnapshot, RunStatus, SubAgentState};
pub use service::ResearchService;
