//! Mutual exclusion and cleanup laws of the dry-run coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lattice_core::Score;
use lattice_dryrun::{CoordinatorState, DryRunCoordinator, HoverPreview, PreviewReport};
use lattice_graph::{ClusterStatus, ColocationData, StatusSnapshot};

#[derive(Default)]
struct OverlapGauge {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

impl OverlapGauge {
    async fn occupy(&self, hold: Duration) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn colocation(id: &str, score: Score) -> ColocationData {
    ColocationData {
        id: id.to_string(),
        rsc: "web".to_string(),
        with_rsc: "db".to_string(),
        score,
        attributes: Default::default(),
    }
}

fn coordinator() -> Arc<DryRunCoordinator<StatusSnapshot>> {
    let snapshot = StatusSnapshot::new().with_colocation(colocation("c1", Score::PlusInfinity));
    Arc::new(DryRunCoordinator::new(Arc::new(snapshot)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dry_runs_never_overlap() {
    let coordinator = coordinator();
    let gauge = Arc::new(OverlapGauge::default());

    let mut handles = Vec::new();
    for i in 0..16 {
        let coordinator = Arc::clone(&coordinator);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            coordinator
                .run_dry_run(|session| async move {
                    session.stage_colocation(colocation(&format!("c-new-{i}"), Score::Value(i)));
                    gauge.occupy(Duration::from_millis(5)).await;
                    let staged = session.staged();
                    Ok(PreviewReport::new(vec![staged.to_string()]))
                })
                .await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.lines, vec!["1".to_string()], "overlay leaked between dry runs");
    }
    assert_eq!(gauge.max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commits_exclude_dry_runs() {
    let coordinator = coordinator();
    let gauge = Arc::new(OverlapGauge::default());

    let mut handles = Vec::new();
    for i in 0..12 {
        let coordinator = Arc::clone(&coordinator);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                coordinator
                    .run_commit(|status| async move {
                        gauge.occupy(Duration::from_millis(5)).await;
                        Ok(status.colocation_ids().len())
                    })
                    .await
                    .map(|_| ())
            } else {
                coordinator
                    .run_dry_run(|_session| async move {
                        gauge.occupy(Duration::from_millis(5)).await;
                        Ok(PreviewReport::new(Vec::new()))
                    })
                    .await
                    .map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(gauge.max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commit_after_dry_run_sees_cleared_overlay() {
    let coordinator = coordinator();
    coordinator
        .run_dry_run(|session| async move {
            session.stage_removal("c1");
            Ok(PreviewReport::new(Vec::new()))
        })
        .await
        .unwrap();
    let (ids, overlay) = {
        let handle = Arc::clone(&coordinator);
        coordinator
            .run_commit(|status| async move { Ok((status.colocation_ids(), handle.has_overlay())) })
            .await
            .unwrap()
    };
    assert_eq!(ids, vec!["c1".to_string()]);
    assert!(!overlay);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_thunk_still_clears_overlay_and_gate() {
    let coordinator = coordinator();
    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .run_dry_run(|session| async move {
                    session.stage_removal("c1");
                    if session.staged() > 0 {
                        panic!("evaluation blew up");
                    }
                    Ok(PreviewReport::new(Vec::new()))
                })
                .await
        })
    };
    assert!(task.await.unwrap_err().is_panic());
    assert!(!coordinator.has_overlay());
    assert_eq!(coordinator.state(), CoordinatorState::Idle);

    let report = tokio::time::timeout(
        Duration::from_secs(1),
        coordinator.run_dry_run(|_| async { Ok(PreviewReport::new(vec!["ok".into()])) }),
    )
    .await
    .expect("gate released")
    .unwrap();
    assert_eq!(report.lines, vec!["ok".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn hover_exit_before_debounce_skips_dry_run() {
    let coordinator = coordinator();
    let hover = HoverPreview::with_debounce(Arc::clone(&coordinator), Duration::from_millis(500));
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    hover.hover_enter("web~db", move |_session| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(PreviewReport::new(Vec::new()))
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(hover.hover_exit());
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(hover.subscribe().borrow().is_none());
}

#[tokio::test(start_paused = true)]
async fn hover_publishes_after_debounce() {
    let coordinator = coordinator();
    let hover = HoverPreview::with_debounce(Arc::clone(&coordinator), Duration::from_millis(500));
    let mut rx = hover.subscribe();

    hover.hover_enter("web~db", |session| async move {
        session.stage_colocation(colocation("c2", Score::MinusInfinity));
        let ids = session.with_view(|view| view.colocation_ids());
        Ok(PreviewReport::new(ids))
    });
    rx.changed().await.unwrap();
    let report = rx.borrow().clone().unwrap();
    assert_eq!(report.lines, vec!["c1".to_string(), "c2".to_string()]);
    assert!(!hover.is_pending());
}

#[tokio::test(start_paused = true)]
async fn failed_hover_preview_degrades_to_unavailable() {
    let coordinator = coordinator();
    let hover = HoverPreview::with_debounce(Arc::clone(&coordinator), Duration::from_millis(100));
    let mut rx = hover.subscribe();

    hover.hover_enter("web~db", |_session| async move {
        anyhow::bail!("crm_simulate not available")
    });
    rx.changed().await.unwrap();
    let report = rx.borrow().clone().unwrap();
    assert!(!report.available);
    assert!(report.reason.unwrap().contains("crm_simulate not available"));
}

#[tokio::test(start_paused = true)]
async fn report_finishing_after_exit_is_dropped() {
    let coordinator = coordinator();
    let hover = HoverPreview::with_debounce(Arc::clone(&coordinator), Duration::from_millis(100));

    hover.hover_enter("web~db", |_session| async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(PreviewReport::new(vec!["late".to_string()]))
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!hover.hover_exit());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(hover.subscribe().borrow().is_none());
}

#[tokio::test(start_paused = true)]
async fn only_latest_target_is_published() {
    let coordinator = coordinator();
    let hover = HoverPreview::with_debounce(Arc::clone(&coordinator), Duration::from_millis(100));
    let mut rx = hover.subscribe();

    hover.hover_enter("web~db", |_session| async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(PreviewReport::new(vec!["first".to_string()]))
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    hover.hover_enter("db~web", |_session| async move {
        Ok(PreviewReport::new(vec!["second".to_string()]))
    });

    rx.changed().await.unwrap();
    let report = rx.borrow_and_update().clone().unwrap();
    assert_eq!(report.lines, vec!["second".to_string()]);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!rx.has_changed().unwrap());
}
