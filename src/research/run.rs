//! Run and per-agent state machines.
//!
//! A [`ResearchRun`] is the single source of truth for a research request:
//! every failure is reified into its `overall_status`, `failure_reason` or an
//! agent's `error` field rather than propagated as an error.

use crate::agents::{AgentKind, RawCitation};
use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Overall lifecycle of a run.
///
/// ```text
/// created -> planning -> awaiting_approval -> researching -> synthesizing -> completed
///    |          |                                 ^
///    +----------+---------------------------------+   (immediate path)
/// ```
///
/// `failed` is reachable from every non-terminal state, `cancelled` only
/// from `awaiting_approval` and `researching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Planning,
    AwaitingApproval,
    Researching,
    Synthesizing,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the run graph.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;

        match (self, next) {
            (Created, Planning | Researching) => true,
            (Planning, AwaitingApproval | Researching) => true,
            (AwaitingApproval, Researching | Cancelled) => true,
            (Researching, Synthesizing | Cancelled) => true,
            (Synthesizing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Planning => "planning",
            RunStatus::AwaitingApproval => "awaiting_approval",
            RunStatus::Researching => "researching",
            RunStatus::Synthesizing => "synthesizing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a single agent slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Dispatched,
    Polling,
    Completed,
    Failed,
    Timeout,
}

impl AgentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Failed | AgentStatus::Timeout
        )
    }

    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;

        matches!(
            (self, next),
            (Idle, Dispatched | Failed)
                | (Dispatched, Polling | Failed)
                | (Polling, Completed | Failed | Timeout)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Dispatched => "dispatched",
            AgentStatus::Polling => "polling",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent progress, written only by the agent's poller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubAgentState {
    pub status: AgentStatus,
    pub job_id: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    /// Citations reported by the agent, before cross-agent aggregation
    #[serde(default)]
    pub citations: Vec<RawCitation>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for SubAgentState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            job_id: None,
            output: None,
            error: None,
            retry_count: 0,
            citations: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

impl SubAgentState {
    /// Move to `next`, rejecting regressions and skipped edges.
    pub fn advance(&mut self, next: AgentStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match next {
            AgentStatus::Dispatched => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.finished_at = Some(Utc::now()),
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}

/// A deduplicated source merged across agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Citation {
    pub title: String,
    /// Normalized URL, the dedup key
    pub url: String,
    /// Agent that reported the citation first
    pub source_agent: AgentKind,
    /// Every agent that reported it, in aggregation order
    pub agents: Vec<AgentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One orchestration instance for a single user query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchRun {
    pub run_id: String,
    pub user_query: String,
    pub research_plan: Option<String>,
    pub overall_status: RunStatus,
    pub agents: BTreeMap<AgentKind, SubAgentState>,
    pub consensus_report: Option<String>,
    /// Set when synthesis failed but at least one agent succeeded
    pub synthesis_error: Option<String>,
    /// Why the run ended `failed` or `cancelled`
    pub failure_reason: Option<String>,
    pub citations: Vec<Citation>,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serializable point-in-time copy of a run, as returned by status queries
/// and handed to checkpoint stores.
pub type RunSnapshot = ResearchRun;

impl ResearchRun {
    pub fn new(query: impl Into<String>) -> Self {
        let now = Utc::now();
        let agents = AgentKind::ALL
            .into_iter()
            .map(|kind| (kind, SubAgentState::default()))
            .collect();

        Self {
            run_id: Uuid::new_v4().to_string(),
            user_query: query.into(),
            research_plan: None,
            overall_status: RunStatus::Created,
            agents,
            consensus_report: None,
            synthesis_error: None,
            failure_reason: None,
            citations: Vec::new(),
            cancelled: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.overall_status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.overall_status.to_string(),
                to: next.to_string(),
            });
        }
        self.overall_status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_plan(&mut self, plan: String) -> Result<()> {
        if self.research_plan.is_some() {
            return Err(AppError::Conflict("research plan already set".to_string()));
        }
        self.research_plan = Some(plan);
        Ok(())
    }

    pub fn set_consensus(&mut self, report: String) -> Result<()> {
        if self.consensus_report.is_some() {
            return Err(AppError::Conflict(
                "consensus report already set".to_string(),
            ));
        }
        self.consensus_report = Some(report);
        Ok(())
    }

    pub fn set_citations(&mut self, citations: Vec<Citation>) -> Result<()> {
        if self.agents.values().any(|a| !a.status.is_terminal()) {
            return Err(AppError::Conflict(
                "citations require every agent to be terminal".to_string(),
            ));
        }
        self.citations = citations;
        Ok(())
    }

    /// Flip the cancel flag. Returns `true` only on the first call.
    pub fn mark_cancelled(&mut self) -> bool {
        let first = !self.cancelled;
        self.cancelled = true;
        first
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.clone()
    }

    pub fn agent(&self, kind: AgentKind) -> &SubAgentState {
        // Every slot is populated in `new` and never removed.
        &self.agents[&kind]
    }

    pub fn agent_mut(&mut self, kind: AgentKind) -> &mut SubAgentState {
        self.agents.entry(kind).or_default()
    }

    pub fn all_agents_terminal(&self) -> bool {
        self.agents.values().all(|a| a.status.is_terminal())
    }

    /// Agents that reached `completed` with non-empty output, in fixed order.
    pub fn completed_outputs(&self) -> Vec<(AgentKind, String)> {
        self.agents
            .iter()
            .filter(|(_, state)| state.status == AgentStatus::Completed)
            .filter_map(|(kind, state)| {
                state
                    .output
                    .as_ref()
                    .filter(|o| !o.trim().is_empty())
                    .map(|o| (*kind, o.clone()))
            })
            .collect()
    }
}
