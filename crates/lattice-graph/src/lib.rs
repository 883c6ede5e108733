//! lattice-graph — the concurrently shared constraint graph.
//!
//! Resources live in an arena owned by [`ResourceGraph`]; every pair of
//! resources that has at least one constraint between it owns a
//! [`ConnectionAggregate`] holding the order and colocation edges for
//! that pair.
//!
//! # Architecture
//!
//! ```text
//! ResourceGraph (RwLock<GraphIndex>)
//!   ├── resources:  ResourceKey → Resource
//!   ├── names:      name → ResourceKey
//!   ├── aggregates: PairKey → Arc<ConnectionAggregate>
//!   │                  └── RwLock<{ orders, colocations }>
//!   ├── incident:   ResourceKey → {PairKey}
//!   └── edge_ids:   edge id → PairKey
//! ```
//!
//! Lock order is always graph index first, aggregate second. Aggregate
//! locks are never held while acquiring the graph lock.

pub mod aggregate;
pub mod edge;
pub mod error;
pub mod graph;
pub mod status;

pub use aggregate::{ColocationScoreClass, ConnectionAggregate};
pub use edge::{ConstraintEdge, attr};
pub use error::{GraphError, GraphResult};
pub use graph::{EdgesTouching, RefreshSummary, Resource, ResourceGraph};
pub use status::{ClusterStatus, ColocationData, OrderData, OverlayView, StatusOverlay, StatusSnapshot};
