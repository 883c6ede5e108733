//! The cluster's live status read model.

use lattice_graph::{ClusterStatus, ColocationData, OrderData, StatusSnapshot};
use parking_lot::RwLock;
use tracing::debug;

/// Latest snapshot reported by the status poller. Replaced whole on each
/// poll; readers always see one complete snapshot.
#[derive(Debug, Default)]
pub struct LiveStatus {
    snapshot: RwLock<StatusSnapshot>,
}

impl LiveStatus {
    pub fn new(snapshot: StatusSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn replace(&self, snapshot: StatusSnapshot) {
        debug!(
            orders = snapshot.orders.len(),
            colocations = snapshot.colocations.len(),
            "status snapshot replaced"
        );
        *self.snapshot.write() = snapshot;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().clone()
    }
}

impl ClusterStatus for LiveStatus {
    fn order_data_for(&self, id: &str) -> Option<OrderData> {
        self.snapshot.read().order_data_for(id)
    }

    fn colocation_data_for(&self, id: &str) -> Option<ColocationData> {
        self.snapshot.read().colocation_data_for(id)
    }

    fn order_ids(&self) -> Vec<String> {
        self.snapshot.read().order_ids()
    }

    fn colocation_ids(&self) -> Vec<String> {
        self.snapshot.read().colocation_ids()
    }
}
