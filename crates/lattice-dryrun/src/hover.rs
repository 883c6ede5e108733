//! Hover-triggered previews.
//!
//! Entering a target arms the debounce timer; leaving it before the timer
//! fires cancels the preview without touching the coordinator. Reports
//! are published on a watch channel, where a failed dry run shows up as
//! an unavailable report. Every enter and exit starts a new hover
//! generation; a report finishing after its generation ended is dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lattice_core::config::PreviewConfig;
use lattice_graph::ClusterStatus;
use tokio::sync::watch;
use tracing::debug;

use crate::coordinator::{DryRunCoordinator, PreviewSession};
use crate::report::PreviewReport;
use crate::timer::CancellableTimer;

pub struct HoverPreview<S: ClusterStatus + 'static> {
    coordinator: Arc<DryRunCoordinator<S>>,
    debounce: Duration,
    timer: CancellableTimer,
    published: Arc<watch::Sender<Option<PreviewReport>>>,
    generation: Arc<AtomicU64>,
}

impl<S: ClusterStatus + 'static> HoverPreview<S> {
    pub fn new(coordinator: Arc<DryRunCoordinator<S>>, config: &PreviewConfig) -> Self {
        Self::with_debounce(coordinator, Duration::from_millis(config.debounce_ms))
    }

    pub fn with_debounce(coordinator: Arc<DryRunCoordinator<S>>, debounce: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            coordinator,
            debounce,
            timer: CancellableTimer::new(),
            published: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Latest preview, or `None` while nothing is hovered.
    pub fn subscribe(&self) -> watch::Receiver<Option<PreviewReport>> {
        self.published.subscribe()
    }

    /// Pointer entered `target`; preview it once the debounce elapses.
    pub fn hover_enter<F, Fut>(&self, target: &str, thunk: F)
    where
        F: FnOnce(PreviewSession<S>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<PreviewReport>> + Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        let published = Arc::clone(&self.published);
        let current = Arc::clone(&self.generation);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let target = target.to_string();
        debug!(%target, generation, debounce_ms = self.debounce.as_millis() as u64, "hover armed");
        self.timer.start(self.debounce, move || async move {
            let report = coordinator
                .run_dry_run(thunk)
                .await
                .unwrap_or_else(|e| PreviewReport::unavailable(e.to_string()));
            // Checked under the channel lock so an exit cannot slip between.
            let stored = published.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *slot = Some(report);
                true
            });
            if stored {
                debug!(%target, generation, "hover preview published");
            } else {
                debug!(%target, generation, "hover ended, preview dropped");
            }
        });
    }

    /// Pointer left. Returns true if a pending preview was cancelled.
    pub fn hover_exit(&self) -> bool {
        let cancelled = self.timer.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.published.send_replace(None);
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }
}
