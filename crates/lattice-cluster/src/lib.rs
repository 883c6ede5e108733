//! lattice-cluster — everything one cluster needs, in one place.
//!
//! ```text
//! Cluster
//!   ├── ResourceGraph            (shared with workers)
//!   ├── LiveStatus               (replaced by each status poll)
//!   ├── DryRunCoordinator        (gate + overlay slot over LiveStatus)
//!   │     └── HoverPreview       (debounced previews, watch channel)
//!   ├── ConfigSynthesizer        (built-in catalogs + host directory)
//!   ├── CheckEngines             (one FieldCheckEngine per object kind)
//!   └── volume resources         (ports and minors assigned on add)
//! ```
//!
//! Editable objects are the closed [`EditableInfo`] set; each variant
//! implements [`Renderable`] and [`Validatable`].

pub mod catalog;
pub mod cluster;
pub mod editable;
pub mod error;
pub mod status;

pub use catalog::BuiltinCatalogs;
pub use cluster::{CheckEngines, Cluster, CommitOutcome};
pub use editable::{ConstraintInfo, EditableInfo, Renderable, ServiceInfo, Validatable, VolumeInfo};
pub use error::{ClusterError, ClusterResult};
pub use status::LiveStatus;
