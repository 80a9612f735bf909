//! In-memory run registry and per-run handles.

use crate::research::events::LiveEventBus;
use crate::research::run::{ResearchRun, RunSnapshot, RunStatus};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ResearchConfig;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Everything shared between the service, the orchestrator task and the
/// pollers of one run.
///
/// The run state sits behind a synchronous lock; callers go through
/// [`RunHandle::read`] / [`RunHandle::update`] so no guard can be held
/// across an `.await`.
pub struct RunHandle {
    run_id: String,
    run: RwLock<ResearchRun>,
    events: LiveEventBus,
    cancel: CancellationToken,
    approval_tx: Mutex<Option<oneshot::Sender<()>>>,
    approval_rx: Mutex<Option<oneshot::Receiver<()>>>,
    status: watch::Sender<RunStatus>,
    config: Arc<ResearchConfig>,
}

impl RunHandle {
    /// `config` is the snapshot the run keeps for its whole lifetime.
    pub fn new(run: ResearchRun, config: Arc<ResearchConfig>) -> Arc<Self> {
        let run_id = run.run_id.clone();
        let (approval_tx, approval_rx) = oneshot::channel();
        let (status, _) = watch::channel(run.overall_status);

        Arc::new(Self {
            events: LiveEventBus::new(run_id.clone(), config.events.channel_capacity),
            run_id,
            run: RwLock::new(run),
            cancel: CancellationToken::new(),
            approval_tx: Mutex::new(Some(approval_tx)),
            approval_rx: Mutex::new(Some(approval_rx)),
            status,
            config,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &Arc<ResearchConfig> {
        &self.config
    }

    pub fn events(&self) -> &LiveEventBus {
        &self.events
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.run.read().clone()
    }

    pub fn status(&self) -> RunStatus {
        self.run.read().overall_status
    }

    pub fn read<R>(&self, f: impl FnOnce(&ResearchRun) -> R) -> R {
        f(&self.run.read())
    }

    /// Mutate the run under its write lock and publish the resulting status
    /// to [`RunHandle::wait_terminal`] waiters.
    pub fn update<R>(&self, f: impl FnOnce(&mut ResearchRun) -> R) -> R {
        let mut run = self.run.write();
        let result = f(&mut run);
        self.status.send_replace(run.overall_status);
        result
    }

    pub fn transition(&self, next: RunStatus) -> Result<()> {
        self.update(|run| run.transition(next))
    }

    /// Release the approval gate. Only valid while awaiting approval.
    pub fn approve(&self) -> Result<()> {
        self.update(|run| {
            if run.overall_status != RunStatus::AwaitingApproval || run.cancelled {
                return Err(AppError::Conflict(format!(
                    "run {} is {} and cannot be approved",
                    run.run_id, run.overall_status
                )));
            }

            let sender = self.approval_tx.lock().take().ok_or_else(|| {
                AppError::Conflict(format!("run {} was already approved", run.run_id))
            })?;
            // The receiver only disappears once the run has moved on.
            let _ = sender.send(());
            Ok(())
        })
    }

    /// Receiver half of the approval gate; handed out once.
    pub fn take_approval(&self) -> Option<oneshot::Receiver<()>> {
        self.approval_rx.lock().take()
    }

    /// Request cancellation. Returns `true` on the first effective request.
    ///
    /// Allowed while awaiting approval or researching; repeating it on an
    /// already-cancelled run is a no-op.
    pub fn request_cancel(&self) -> Result<bool> {
        self.update(|run| {
            if run.cancelled || run.overall_status == RunStatus::Cancelled {
                return Ok(false);
            }
            if !matches!(
                run.overall_status,
                RunStatus::AwaitingApproval | RunStatus::Researching
            ) {
                return Err(AppError::Conflict(format!(
                    "run {} is {} and cannot be cancelled",
                    run.run_id, run.overall_status
                )));
            }

            run.mark_cancelled();
            self.cancel.cancel();
            Ok(true)
        })
    }

    /// Wait until the run reaches a terminal status.
    pub async fn wait_terminal(&self) -> RunStatus {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            // The sender lives as long as `self`.
            Err(_) => self.status(),
        }
    }
}

/// Live runs keyed by id
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Arc<RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: Arc<RunHandle>) {
        self.runs.write().insert(handle.run_id().to_string(), handle);
    }

    pub fn get(&self, run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs.read().get(run_id).cloned()
    }

    pub fn remove(&self, run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs.write().remove(run_id)
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }

    /// Runs that have not reached a terminal status
    pub fn active_count(&self) -> usize {
        self.runs
            .read()
            .values()
            .filter(|h| !h.status().is_terminal())
            .count()
    }

    /// Snapshots of every run, newest first
    pub fn list(&self) -> Vec<RunSnapshot> {
        let handles: Vec<Arc<RunHandle>> = self.runs.read().values().cloned().collect();
        let mut snapshots: Vec<RunSnapshot> = handles.iter().map(|h| h.snapshot()).collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Drop terminal runs whose last update is older than `older_than`.
    /// Returns how many were removed.
    pub fn evict_terminal(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let mut runs = self.runs.write();
        let before = runs.len();
        runs.retain(|_, handle| {
            handle.read(|run| !(run.overall_status.is_terminal() && run.updated_at <= cutoff))
        });
        before - runs.len()
    }
}
