//! Cluster status read model.
//!
//! [`ClusterStatus`] is the narrow interface through which the core sees
//! the last known remote configuration. It is refreshed by an external
//! poller and never written by the core, except through a
//! [`StatusOverlay`] that a dry run installs on top of it and discards
//! afterwards.

use std::collections::{BTreeMap, BTreeSet};

use lattice_core::{ResourceKey, Score};
use serde::{Deserialize, Serialize};

use crate::edge::{ConstraintEdge, attr};

/// Order constraint as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    pub id: String,
    pub first: String,
    pub then: String,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub symmetrical: Option<bool>,
    #[serde(default)]
    pub first_action: Option<String>,
    #[serde(default)]
    pub then_action: Option<String>,
}

impl OrderData {
    /// Build the graph edge for this order between resolved endpoints.
    pub fn to_edge(&self, first: ResourceKey, then: ResourceKey) -> ConstraintEdge {
        let mut edge = ConstraintEdge::order(first, then, self.score).with_id(self.id.clone());
        if let Some(symmetrical) = self.symmetrical {
            edge = edge.with_attr(attr::SYMMETRICAL, symmetrical.to_string());
        }
        if let Some(action) = &self.first_action {
            edge = edge.with_attr(attr::FIRST_ACTION, action.clone());
        }
        if let Some(action) = &self.then_action {
            edge = edge.with_attr(attr::THEN_ACTION, action.clone());
        }
        edge
    }
}

/// Colocation constraint as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColocationData {
    pub id: String,
    pub rsc: String,
    pub with_rsc: String,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ColocationData {
    pub fn to_edge(&self, rsc: ResourceKey, with_rsc: ResourceKey) -> ConstraintEdge {
        let mut edge =
            ConstraintEdge::colocation(rsc, with_rsc, self.score).with_id(self.id.clone());
        edge.attributes = self.attributes.clone();
        edge
    }
}

/// Read-only view of the cluster's live constraint configuration.
pub trait ClusterStatus: Send + Sync {
    fn order_data_for(&self, id: &str) -> Option<OrderData>;

    fn colocation_data_for(&self, id: &str) -> Option<ColocationData>;

    /// Ids of all order constraints, sorted.
    fn order_ids(&self) -> Vec<String>;

    /// Ids of all colocation constraints, sorted.
    fn colocation_ids(&self) -> Vec<String>;
}

/// Plain in-memory snapshot, as produced by a status poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub orders: BTreeMap<String, OrderData>,
    #[serde(default)]
    pub colocations: BTreeMap<String, ColocationData>,
}

impl StatusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: OrderData) -> Self {
        self.orders.insert(order.id.clone(), order);
        self
    }

    pub fn with_colocation(mut self, colocation: ColocationData) -> Self {
        self.colocations.insert(colocation.id.clone(), colocation);
        self
    }
}

impl ClusterStatus for StatusSnapshot {
    fn order_data_for(&self, id: &str) -> Option<OrderData> {
        self.orders.get(id).cloned()
    }

    fn colocation_data_for(&self, id: &str) -> Option<ColocationData> {
        self.colocations.get(id).cloned()
    }

    fn order_ids(&self) -> Vec<String> {
        self.orders.keys().cloned().collect()
    }

    fn colocation_ids(&self) -> Vec<String> {
        self.colocations.keys().cloned().collect()
    }
}

/// Hypothetical changes staged by a dry run on top of a real snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusOverlay {
    orders: BTreeMap<String, OrderData>,
    colocations: BTreeMap<String, ColocationData>,
    removed: BTreeSet<String>,
}

impl StatusOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_order(&mut self, order: OrderData) {
        self.removed.remove(&order.id);
        self.orders.insert(order.id.clone(), order);
    }

    pub fn stage_colocation(&mut self, colocation: ColocationData) {
        self.removed.remove(&colocation.id);
        self.colocations.insert(colocation.id.clone(), colocation);
    }

    /// Hide constraint `id` from the view, whatever its kind.
    pub fn stage_removal(&mut self, id: &str) {
        self.orders.remove(id);
        self.colocations.remove(id);
        self.removed.insert(id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.colocations.is_empty() && self.removed.is_empty()
    }

    /// Number of staged changes.
    pub fn len(&self) -> usize {
        self.orders.len() + self.colocations.len() + self.removed.len()
    }
}

/// A snapshot seen through an overlay.
pub struct OverlayView<'a, S: ClusterStatus + ?Sized> {
    base: &'a S,
    overlay: &'a StatusOverlay,
}

impl<'a, S: ClusterStatus + ?Sized> OverlayView<'a, S> {
    pub fn new(base: &'a S, overlay: &'a StatusOverlay) -> Self {
        Self { base, overlay }
    }
}

impl<S: ClusterStatus + ?Sized> ClusterStatus for OverlayView<'_, S> {
    fn order_data_for(&self, id: &str) -> Option<OrderData> {
        if self.overlay.removed.contains(id) {
            return None;
        }
        self.overlay
            .orders
            .get(id)
            .cloned()
            .or_else(|| self.base.order_data_for(id))
    }

    fn colocation_data_for(&self, id: &str) -> Option<ColocationData> {
        if self.overlay.removed.contains(id) {
            return None;
        }
        self.overlay
            .colocations
            .get(id)
            .cloned()
            .or_else(|| self.base.colocation_data_for(id))
    }

    fn order_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .base
            .order_ids()
            .into_iter()
            .chain(self.overlay.orders.keys().cloned())
            .filter(|id| !self.overlay.removed.contains(id))
            .collect();
        ids.into_iter().collect()
    }

    fn colocation_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .base
            .colocation_ids()
            .into_iter()
            .chain(self.overlay.colocations.keys().cloned())
            .filter(|id| !self.overlay.removed.contains(id))
            .collect();
        ids.into_iter().collect()
    }
}
