//! Run checkpointing.
//!
//! The orchestrator and pollers call [`CheckpointStore::save`] at every
//! milestone of a run. The default store does nothing; the file store keeps
//! one JSON document per run so `get_status` keeps working after a run has
//! been evicted from memory.

use crate::agents::AgentKind;
use crate::research::run::RunSnapshot;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a checkpoint was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointReason {
    PlanCreated,
    AgentTerminal(AgentKind),
    SynthesisDone,
    RunTerminal,
}

impl fmt::Display for CheckpointReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointReason::PlanCreated => f.write_str("plan_created"),
            CheckpointReason::AgentTerminal(kind) => write!(f, "agent_terminal:{}", kind),
            CheckpointReason::SynthesisDone => f.write_str("synthesis_done"),
            CheckpointReason::RunTerminal => f.write_str("run_terminal"),
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a snapshot. Failures are logged by the store, never returned.
    async fn save(&self, snapshot: &RunSnapshot, reason: CheckpointReason);

    async fn load(&self, run_id: &str) -> Option<RunSnapshot>;

    /// Whether saved runs can be loaded back. Runs are only evicted from
    /// memory when this holds.
    fn persists(&self) -> bool;
}

/// Store that keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCheckpoint;

#[async_trait]
impl CheckpointStore for NoopCheckpoint {
    async fn save(&self, _snapshot: &RunSnapshot, _reason: CheckpointReason) {}

    async fn load(&self, _run_id: &str) -> Option<RunSnapshot> {
        None
    }

    fn persists(&self) -> bool {
        false
    }
}

/// One pretty-printed JSON file per run under `dir`
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run ids are UUIDs; anything else is refused so ids can't escape `dir`.
    fn path_for(&self, run_id: &str) -> Option<PathBuf> {
        uuid::Uuid::parse_str(run_id).ok()?;
        Some(self.dir.join(format!("{}.json", run_id)))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        // Pollers of one run save concurrently, so each write gets its own tmp file
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, snapshot: &RunSnapshot, reason: CheckpointReason) {
        let Some(path) = self.path_for(&snapshot.run_id) else {
            tracing::warn!(run_id = %snapshot.run_id, "Refusing to checkpoint non-UUID run id");
            return;
        };

        let bytes = match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(run_id = %snapshot.run_id, error = %e, "Failed to serialize checkpoint");
                return;
            }
        };

        match self.write_atomic(&path, &bytes).await {
            Ok(()) => tracing::debug!(
                run_id = %snapshot.run_id,
                reason = %reason,
                status = %snapshot.overall_status,
                "Checkpoint saved"
            ),
            Err(e) => tracing::warn!(
                run_id = %snapshot.run_id,
                reason = %reason,
                error = %e,
                "Failed to write checkpoint"
            ),
        }
    }

    async fn load(&self, run_id: &str) -> Option<RunSnapshot> {
        let path = self.path_for(run_id)?;
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(run_id, error = %e, "Corrupt checkpoint file");
                None
            }
        }
    }

    fn persists(&self) -> bool {
        true
    }
}
