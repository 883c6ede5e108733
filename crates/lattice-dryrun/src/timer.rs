//! Single-fire cancellable timer.
//!
//! `start` arms the timer; when the delay elapses the action runs once.
//! `cancel` stops it only while it is still waiting. An action that has
//! begun always runs to completion.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Fired,
    Cancelled,
}

struct Armed {
    phase: Arc<Mutex<Phase>>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct CancellableTimer {
    armed: Mutex<Option<Armed>>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, cancelling any earlier one that has not fired yet.
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let phase = Arc::new(Mutex::new(Phase::Waiting));
        let task_phase = Arc::clone(&phase);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut phase = task_phase.lock();
                if *phase != Phase::Waiting {
                    return;
                }
                *phase = Phase::Fired;
            }
            debug!(delay_ms = delay.as_millis() as u64, "timer fired");
            action().await;
        });

        let previous = self.armed.lock().replace(Armed { phase, handle });
        if let Some(previous) = previous {
            cancel_armed(previous);
        }
    }

    /// Stop the timer if it has not fired. Returns true if the action was
    /// prevented from running.
    pub fn cancel(&self) -> bool {
        match self.armed.lock().take() {
            Some(armed) => cancel_armed(armed),
            None => false,
        }
    }

    /// Armed and still waiting.
    pub fn is_pending(&self) -> bool {
        self.armed
            .lock()
            .as_ref()
            .is_some_and(|a| *a.phase.lock() == Phase::Waiting)
    }
}

fn cancel_armed(armed: Armed) -> bool {
    let mut phase = armed.phase.lock();
    if *phase == Phase::Waiting {
        *phase = Phase::Cancelled;
        armed.handle.abort();
        debug!("timer cancelled before firing");
        true
    } else {
        false
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        if let Some(armed) = self.armed.get_mut().take() {
            cancel_armed(armed);
        }
    }
}
