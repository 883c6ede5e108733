//! lattice-dryrun — exclusive dry runs and commits for one cluster.
//!
//! ```text
//!  hover-enter ──▶ CancellableTimer ──(debounce)──▶ run_dry_run ─┐
//!  hover-exit  ──▶ cancel (before fire only)                      │
//!                                                                 ▼
//!  apply ───────────────────────────────────────▶ run_commit ──▶ gate (tokio Mutex)
//!                                                                 │
//!                       DryRunInFlight: install overlay, thunk, clear overlay
//!                       CommitInFlight: thunk against the real status
//! ```
//!
//! At most one dry run or commit holds the gate at a time. The overlay is
//! cleared on every exit path of a dry run, including errors, panics and
//! a dropped future.

pub mod coordinator;
pub mod error;
pub mod hover;
pub mod report;
pub mod timer;

pub use coordinator::{CoordinatorState, DryRunCoordinator, PreviewSession};
pub use error::{DryRunError, DryRunResult};
pub use hover::HoverPreview;
pub use report::PreviewReport;
pub use timer::CancellableTimer;
