//! Live event fan-out for a single run.
//!
//! Every run owns one [`LiveEventBus`] backed by a `tokio::sync::broadcast`
//! channel. Publishing never blocks; subscribers see events from the moment
//! they subscribe, and a subscriber that falls behind skips what it missed.

use crate::agents::AgentKind;
use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PlanStep,
    Reasoning,
    Source,
    Progress,
    Completed,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::PlanStep => "plan_step",
            EventType::Reasoning => "reasoning",
            EventType::Source => "source",
            EventType::Progress => "progress",
            EventType::Completed => "completed",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who emitted an event: the supervisor or one of the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventSource {
    Supervisor,
    Agent(AgentKind),
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::Supervisor => "supervisor",
            EventSource::Agent(kind) => kind.as_str(),
        }
    }
}

impl From<EventSource> for String {
    fn from(source: EventSource) -> Self {
        source.as_str().to_string()
    }
}

impl TryFrom<String> for EventSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "supervisor" {
            return Ok(EventSource::Supervisor);
        }
        AgentKind::parse(&value)
            .map(EventSource::Agent)
            .ok_or_else(|| format!("unknown event source: {}", value))
    }
}

impl From<AgentKind> for EventSource {
    fn from(kind: AgentKind) -> Self {
        EventSource::Agent(kind)
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LiveEvent {
    pub run_id: String,
    /// `supervisor`, `gemini`, `openai` or `perplexity`
    #[schema(value_type = String)]
    pub agent: EventSource,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    /// Per-run, strictly increasing in publish order
    pub sequence: u64,
}

impl LiveEvent {
    /// A supervisor `completed` or `error` event marks the end of the run.
    pub fn is_run_terminal(&self) -> bool {
        self.agent == EventSource::Supervisor
            && matches!(self.event_type, EventType::Completed | EventType::Error)
    }
}

pub struct LiveEventBus {
    run_id: String,
    sender: broadcast::Sender<LiveEvent>,
    sequence: Mutex<u64>,
}

impl LiveEventBus {
    /// `capacity` must be non-zero; configuration validation enforces it.
    pub fn new(run_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            run_id: run_id.into(),
            sender,
            sequence: Mutex::new(0),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(
        &self,
        source: impl Into<EventSource>,
        event_type: EventType,
        payload: Value,
    ) -> LiveEvent {
        // Numbering and sending under one lock keeps sequence order equal to
        // delivery order.
        let mut sequence = self.sequence.lock();
        *sequence += 1;

        let event = LiveEvent {
            run_id: self.run_id.clone(),
            agent: source.into(),
            event_type,
            payload,
            timestamp: Utc::now(),
            sequence: *sequence,
        };

        if self.sender.send(event.clone()).is_err() {
            tracing::trace!(run_id = %self.run_id, "No subscribers for live event");
        }
        event
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            run_id: self.run_id.clone(),
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscription to one run's events.
pub struct EventStream {
    run_id: String,
    receiver: Option<broadcast::Receiver<LiveEvent>>,
}

impl EventStream {
    /// A stream that yields nothing, handed out for runs that already ended.
    pub fn finished(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            receiver: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Next event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        run_id = %self.run_id,
                        skipped,
                        "Event subscriber lagged, dropped events"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt into a `Stream` that ends after the run-terminal event.
    pub fn into_stream(mut self) -> impl Stream<Item = LiveEvent> + Send {
        async_stream::stream! {
            while let Some(event) = self.next().await {
                let terminal = event.is_run_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        }
    }
}
