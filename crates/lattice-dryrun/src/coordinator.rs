//! The dry-run coordinator.
//!
//! One coordinator per cluster. It owns the overlay slot on top of the
//! cluster's status read model and a single async gate that serializes
//! dry runs and commits.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use lattice_graph::{ClusterStatus, ColocationData, OrderData, OverlayView, StatusOverlay};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::error::DryRunResult;
use crate::report::PreviewReport;

type OverlaySlot = Arc<RwLock<Option<StatusOverlay>>>;

/// What the coordinator is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    DryRunInFlight,
    CommitInFlight,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::DryRunInFlight => write!(f, "dry-run"),
            Self::CommitInFlight => write!(f, "commit"),
        }
    }
}

pub struct DryRunCoordinator<S: ClusterStatus + 'static> {
    status: Arc<S>,
    gate: AsyncMutex<()>,
    overlay: OverlaySlot,
    state: Arc<Mutex<CoordinatorState>>,
}

impl<S: ClusterStatus + 'static> DryRunCoordinator<S> {
    pub fn new(status: Arc<S>) -> Self {
        Self {
            status,
            gate: AsyncMutex::new(()),
            overlay: Arc::new(RwLock::new(None)),
            state: Arc::new(Mutex::new(CoordinatorState::Idle)),
        }
    }

    /// The real status read model.
    pub fn status(&self) -> Arc<S> {
        Arc::clone(&self.status)
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    /// Whether a preview overlay is currently installed.
    pub fn has_overlay(&self) -> bool {
        self.overlay.read().is_some()
    }

    /// Evaluate a hypothetical change against a fresh overlay.
    ///
    /// Waits for any other dry run or commit to finish first. The overlay
    /// is discarded before the gate is released, whatever the thunk does.
    pub async fn run_dry_run<F, Fut>(&self, thunk: F) -> DryRunResult<PreviewReport>
    where
        F: FnOnce(PreviewSession<S>) -> Fut,
        Fut: Future<Output = anyhow::Result<PreviewReport>>,
    {
        let _gate = self.gate.lock().await;
        let _in_flight = InFlight::enter(
            CoordinatorState::DryRunInFlight,
            Arc::clone(&self.state),
            Some(Arc::clone(&self.overlay)),
        );
        info!("dry run started");

        let session = PreviewSession {
            status: Arc::clone(&self.status),
            overlay: Arc::clone(&self.overlay),
        };
        match thunk(session).await {
            Ok(report) => {
                info!(available = report.available, lines = report.lines.len(), "dry run finished");
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, "dry run failed");
                Err(err.into())
            }
        }
    }

    /// Apply a change for real. Mutually exclusive with dry runs; no
    /// overlay is involved.
    pub async fn run_commit<F, Fut, T>(&self, thunk: F) -> DryRunResult<T>
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let _gate = self.gate.lock().await;
        let _in_flight = InFlight::enter(CoordinatorState::CommitInFlight, Arc::clone(&self.state), None);
        info!("commit started");

        match thunk(Arc::clone(&self.status)).await {
            Ok(value) => {
                info!("commit finished");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "commit failed");
                Err(err.into())
            }
        }
    }
}

/// Marks the coordinator busy and, for dry runs, owns the overlay
/// lifetime. Dropping it clears both.
struct InFlight {
    state: Arc<Mutex<CoordinatorState>>,
    overlay: Option<OverlaySlot>,
}

impl InFlight {
    fn enter(
        kind: CoordinatorState,
        state: Arc<Mutex<CoordinatorState>>,
        overlay: Option<OverlaySlot>,
    ) -> Self {
        *state.lock() = kind;
        if let Some(slot) = &overlay {
            let previous = slot.write().replace(StatusOverlay::new());
            if previous.is_some() {
                warn!("stale preview overlay replaced");
            }
        }
        Self { state, overlay }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(slot) = &self.overlay {
            let staged = slot.write().take().map_or(0, |o| o.len());
            debug!(staged, "preview overlay cleared");
        }
        *self.state.lock() = CoordinatorState::Idle;
    }
}

/// Handle a dry-run thunk uses to stage changes and read through them.
pub struct PreviewSession<S: ClusterStatus + 'static> {
    status: Arc<S>,
    overlay: OverlaySlot,
}

impl<S: ClusterStatus + 'static> PreviewSession<S> {
    pub fn stage_order(&self, order: OrderData) {
        self.with_overlay(|o| o.stage_order(order));
    }

    pub fn stage_colocation(&self, colocation: ColocationData) {
        self.with_overlay(|o| o.stage_colocation(colocation));
    }

    pub fn stage_removal(&self, id: &str) {
        self.with_overlay(|o| o.stage_removal(id));
    }

    /// Run `f` against the real status seen through the staged changes.
    /// `f` must not stage changes itself.
    pub fn with_view<R>(&self, f: impl FnOnce(&dyn ClusterStatus) -> R) -> R {
        let slot = self.overlay.read();
        match slot.as_ref() {
            Some(overlay) => f(&OverlayView::new(self.status.as_ref(), overlay)),
            None => f(self.status.as_ref()),
        }
    }

    /// Number of staged changes.
    pub fn staged(&self) -> usize {
        self.overlay.read().as_ref().map_or(0, StatusOverlay::len)
    }

    fn with_overlay(&self, f: impl FnOnce(&mut StatusOverlay)) {
        match self.overlay.write().as_mut() {
            Some(overlay) => f(overlay),
            None => warn!("change staged outside a dry run ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::Score;
    use lattice_graph::StatusSnapshot;

    fn order(id: &str, score: Score) -> OrderData {
        OrderData {
            id: id.to_string(),
            first: "db".to_string(),
            then: "web".to_string(),
            score,
            symmetrical: None,
            first_action: None,
            then_action: None,
        }
    }

    fn coordinator() -> DryRunCoordinator<StatusSnapshot> {
        let snapshot = StatusSnapshot::new().with_order(order("o1", Score::PlusInfinity));
        DryRunCoordinator::new(Arc::new(snapshot))
    }

    #[tokio::test]
    async fn dry_run_sees_staged_changes() {
        let coordinator = coordinator();
        let report = coordinator
            .run_dry_run(|session| async move {
                session.stage_order(order("o2", Score::Value(10)));
                session.stage_removal("o1");
                let ids = session.with_view(|view| view.order_ids());
                Ok(PreviewReport::new(ids))
            })
            .await
            .unwrap();
        assert_eq!(report.lines, vec!["o2".to_string()]);
        assert!(!coordinator.has_overlay());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn overlay_cleared_after_error() {
        let coordinator = coordinator();
        let result = coordinator
            .run_dry_run(|session| async move {
                session.stage_removal("o1");
                anyhow::bail!("resource manager rejected the change")
            })
            .await;
        assert!(result.is_err());
        assert!(!coordinator.has_overlay());
        assert_eq!(coordinator.status().order_ids(), vec!["o1".to_string()]);
    }

    #[tokio::test]
    async fn each_dry_run_starts_with_empty_overlay() {
        let coordinator = coordinator();
        coordinator
            .run_dry_run(|session| async move {
                session.stage_order(order("o2", Score::Value(1)));
                Ok(PreviewReport::new(Vec::new()))
            })
            .await
            .unwrap();
        let staged = coordinator
            .run_dry_run(|session| async move { Ok(PreviewReport::new(vec![session.staged().to_string()])) })
            .await
            .unwrap();
        assert_eq!(staged.lines, vec!["0".to_string()]);
    }

    #[tokio::test]
    async fn commit_reads_real_status_without_overlay() {
        let coordinator = coordinator();
        let ids = coordinator
            .run_commit(|status| async move { Ok(status.order_ids()) })
            .await
            .unwrap();
        assert_eq!(ids, vec!["o1".to_string()]);
        assert!(!coordinator.has_overlay());
    }

    #[test]
    fn staging_outside_dry_run_is_ignored() {
        let session = PreviewSession {
            status: Arc::new(StatusSnapshot::new()),
            overlay: Arc::new(RwLock::new(None)),
        };
        session.stage_removal("o1");
        assert_eq!(session.staged(), 0);
    }
}
