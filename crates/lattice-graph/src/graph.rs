//! ResourceGraph — arena of resources plus the connection index.
//!
//! The graph is the only owner of resource identity. Other components
//! hold [`ResourceKey`]s and go through the graph's API for every lookup
//! and mutation; nothing reaches into the indices directly.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use lattice_core::{ConstraintKind, PairKey, ResourceKey, ResourceKind};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::aggregate::ConnectionAggregate;
use crate::edge::ConstraintEdge;
use crate::error::{GraphError, GraphResult};
use crate::status::ClusterStatus;

/// A service, group or replicated volume known to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    /// Containing group, if any.
    pub group: Option<ResourceKey>,
    pub params: BTreeMap<String, String>,
    /// Added by the operator and not yet committed to the cluster.
    pub is_new: bool,
}

impl Resource {
    pub fn new(name: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            group: None,
            params: BTreeMap::new(),
            is_new: false,
        }
    }

    pub fn service(name: &str) -> Self {
        Self::new(name, ResourceKind::Service)
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, ResourceKind::Group)
    }

    pub fn volume(name: &str) -> Self {
        Self::new(name, ResourceKind::Volume)
    }

    pub fn in_group(mut self, group: ResourceKey) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn as_new(mut self) -> Self {
        self.is_new = true;
        self
    }
}

/// Outcome of [`ResourceGraph::refresh_from`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub upserted: usize,
    pub removed: usize,
    /// Reported constraints naming resources the graph does not know.
    pub dangling: usize,
}

#[derive(Debug, Default)]
struct GraphIndex {
    next_key: u64,
    resources: BTreeMap<ResourceKey, Resource>,
    names: HashMap<String, ResourceKey>,
    aggregates: BTreeMap<PairKey, Arc<ConnectionAggregate>>,
    incident: HashMap<ResourceKey, BTreeSet<PairKey>>,
    edge_ids: HashMap<String, PairKey>,
}

impl GraphIndex {
    fn name_of(&self, key: ResourceKey) -> String {
        self.resources
            .get(&key)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| key.to_string())
    }

    fn group_of(&self, key: ResourceKey) -> ResourceKey {
        self.resources
            .get(&key)
            .and_then(|r| r.group)
            .unwrap_or(key)
    }

    fn check_endpoints(&self, edge: &ConstraintEdge) -> GraphResult<()> {
        for endpoint in [edge.a, edge.b] {
            if !self.resources.contains_key(&endpoint) {
                warn!(edge = %edge, %endpoint, "dropping edge with dangling endpoint");
                return Err(GraphError::DanglingEdge {
                    edge: edge.label(),
                    endpoint,
                });
            }
        }
        Ok(())
    }

    /// Drop an aggregate and every index entry pointing at it.
    fn detach(&mut self, pair: PairKey) -> Option<Arc<ConnectionAggregate>> {
        let aggregate = self.aggregates.remove(&pair)?;
        for endpoint in [pair.lo(), pair.hi()] {
            if let Some(set) = self.incident.get_mut(&endpoint) {
                set.remove(&pair);
                if set.is_empty() {
                    self.incident.remove(&endpoint);
                }
            }
        }
        self.edge_ids.retain(|_, p| *p != pair);
        debug!(%pair, "connection removed");
        Some(aggregate)
    }

    fn aggregate_or_insert(&mut self, pair: PairKey) -> Arc<ConnectionAggregate> {
        if let Some(existing) = self.aggregates.get(&pair) {
            return Arc::clone(existing);
        }
        let aggregate = Arc::new(ConnectionAggregate::new(pair));
        self.aggregates.insert(pair, Arc::clone(&aggregate));
        self.incident.entry(pair.lo()).or_default().insert(pair);
        self.incident.entry(pair.hi()).or_default().insert(pair);
        debug!(%pair, "connection created");
        aggregate
    }
}

/// The full set of resources and the constraints between them.
///
/// `ResourceGraph` is `Send + Sync` and meant to be shared behind an
/// `Arc` by every worker task of one cluster.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    index: RwLock<GraphIndex>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Resources ──────────────────────────────────────────────────

    /// Add a resource. Names are unique within the graph.
    pub fn add_resource(&self, resource: Resource) -> GraphResult<ResourceKey> {
        let mut index = self.index.write();
        if index.names.contains_key(&resource.name) {
            return Err(GraphError::DuplicateName(resource.name));
        }
        if let Some(group) = resource.group {
            if !index.resources.contains_key(&group) {
                return Err(GraphError::UnknownResource(group.to_string()));
            }
        }
        let key = ResourceKey(index.next_key);
        index.next_key += 1;
        index.names.insert(resource.name.clone(), key);
        debug!(resource = %resource.name, %key, kind = ?resource.kind, "resource added");
        index.resources.insert(key, resource);
        Ok(key)
    }

    pub fn resource(&self, key: ResourceKey) -> Option<Resource> {
        self.index.read().resources.get(&key).cloned()
    }

    pub fn key_of(&self, name: &str) -> Option<ResourceKey> {
        self.index.read().names.get(name).copied()
    }

    pub fn name_of(&self, key: ResourceKey) -> Option<String> {
        self.index.read().resources.get(&key).map(|r| r.name.clone())
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.index.read().resources.contains_key(&key)
    }

    /// All resources, ordered by key.
    pub fn resources(&self) -> Vec<(ResourceKey, Resource)> {
        self.index
            .read()
            .resources
            .iter()
            .map(|(k, r)| (*k, r.clone()))
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.index.read().resources.len()
    }

    /// Rename a resource. Edges hold keys, so only the name index changes,
    /// atomically under the graph lock.
    pub fn rename_resource(&self, key: ResourceKey, new_name: &str) -> GraphResult<()> {
        let mut index = self.index.write();
        if index.names.get(new_name).is_some_and(|k| *k != key) {
            return Err(GraphError::DuplicateName(new_name.to_string()));
        }
        let old_name = match index.resources.get_mut(&key) {
            Some(resource) => std::mem::replace(&mut resource.name, new_name.to_string()),
            None => return Err(GraphError::UnknownResource(key.to_string())),
        };
        index.names.remove(&old_name);
        index.names.insert(new_name.to_string(), key);
        info!(%old_name, %new_name, "resource renamed");
        Ok(())
    }

    /// Set a parameter on a resource.
    pub fn set_param(&self, key: ResourceKey, name: &str, value: &str) -> GraphResult<()> {
        let mut index = self.index.write();
        let resource = index
            .resources
            .get_mut(&key)
            .ok_or_else(|| GraphError::UnknownResource(key.to_string()))?;
        resource.params.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Clear the `new` flag after a successful commit.
    pub fn mark_committed(&self, key: ResourceKey) -> GraphResult<()> {
        let mut index = self.index.write();
        let resource = index
            .resources
            .get_mut(&key)
            .ok_or_else(|| GraphError::UnknownResource(key.to_string()))?;
        resource.is_new = false;
        Ok(())
    }

    /// Remove a resource and every constraint touching it.
    ///
    /// Unknown keys are a no-op so teardown can race with refreshes.
    /// Returns the number of edges removed.
    pub fn remove_resource(&self, key: ResourceKey) -> usize {
        let mut index = self.index.write();
        let Some(resource) = index.resources.remove(&key) else {
            debug!(%key, "remove of unknown resource ignored");
            return 0;
        };
        index.names.remove(&resource.name);

        let pairs = index.incident.remove(&key).unwrap_or_default();
        let mut removed = 0;
        for pair in pairs {
            if let Some(aggregate) = index.detach(pair) {
                removed += aggregate.len();
                // Stale holders of the Arc must not see edges naming `key`.
                aggregate.clear();
            }
        }
        for member in index.resources.values_mut() {
            if member.group == Some(key) {
                member.group = None;
            }
        }
        info!(resource = %resource.name, edges_removed = removed, "resource removed");
        removed
    }

    // ── Edges ──────────────────────────────────────────────────────

    /// Insert or update an edge.
    ///
    /// An edge naming a resource the graph does not hold is logged and
    /// dropped, and the violation is returned to the caller.
    pub fn upsert_edge(&self, edge: ConstraintEdge) -> GraphResult<Arc<ConnectionAggregate>> {
        let mut index = self.index.write();
        index.check_endpoints(&edge)?;
        let pair = edge.pair();

        // An id that moved to another pair leaves its old connection.
        if let Some(id) = &edge.id {
            if let Some(old_pair) = index.edge_ids.get(id).copied() {
                if old_pair != pair {
                    let now_empty = index
                        .aggregates
                        .get(&old_pair)
                        .is_some_and(|agg| agg.remove_edge(id));
                    index.edge_ids.remove(id);
                    if now_empty {
                        index.detach(old_pair);
                    }
                }
            }
        }

        let id = edge.id.clone();
        let aggregate = index.aggregate_or_insert(pair);
        aggregate.add_edge(edge)?;
        if let Some(id) = id {
            index.edge_ids.insert(id, pair);
        }
        Ok(aggregate)
    }

    /// Remove the committed edge `id`. Returns whether it existed.
    pub fn remove_edge(&self, id: &str) -> bool {
        let mut index = self.index.write();
        let Some(pair) = index.edge_ids.remove(id) else {
            return false;
        };
        let now_empty = index
            .aggregates
            .get(&pair)
            .is_some_and(|agg| agg.remove_edge(id));
        if now_empty {
            index.detach(pair);
        }
        debug!(edge_id = id, %pair, "edge removed");
        true
    }

    /// Discard a pending edge the operator drew but did not commit.
    pub fn remove_pending(&self, kind: ConstraintKind, a: ResourceKey, b: ResourceKey) {
        let mut index = self.index.write();
        let pair = PairKey::new(a, b);
        let now_empty = index
            .aggregates
            .get(&pair)
            .is_some_and(|agg| agg.remove_pending(kind, a, b));
        if now_empty {
            index.detach(pair);
        }
    }

    pub fn aggregate_for(&self, a: ResourceKey, b: ResourceKey) -> Option<Arc<ConnectionAggregate>> {
        self.index
            .read()
            .aggregates
            .get(&PairKey::new(a, b))
            .map(Arc::clone)
    }

    /// All connections, ordered by pair.
    pub fn aggregates(&self) -> Vec<Arc<ConnectionAggregate>> {
        self.index.read().aggregates.values().map(Arc::clone).collect()
    }

    /// Lazily iterate the edges touching `key`.
    ///
    /// The set of connections is captured at call time; each connection's
    /// edges are read when the iterator reaches it. Edges removed
    /// concurrently may or may not be yielded, so callers re-validate
    /// anything they act on.
    pub fn edges_touching(&self, key: ResourceKey) -> EdgesTouching {
        let index = self.index.read();
        let aggregates: Vec<Arc<ConnectionAggregate>> = index
            .incident
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|pair| index.aggregates.get(pair).map(Arc::clone))
            .collect();
        EdgesTouching {
            key,
            aggregates: aggregates.into_iter(),
            current: Vec::new().into_iter(),
        }
    }

    /// Whether `key` takes part in any constraint. Unknown keys do not.
    pub fn participates(&self, key: ResourceKey) -> bool {
        let index = self.index.read();
        index
            .incident
            .get(&key)
            .is_some_and(|pairs| pairs.iter().any(|p| index.aggregates.get(p).is_some_and(|a| !a.is_empty())))
    }

    /// Whether edges of `kind` between `a` and `b` point both ways once
    /// group members are collapsed to their group.
    pub fn has_two_directions(&self, a: ResourceKey, b: ResourceKey, kind: ConstraintKind) -> bool {
        let index = self.index.read();
        match index.aggregates.get(&PairKey::new(a, b)) {
            Some(aggregate) => aggregate.has_two_directions(kind, |k| index.group_of(k)),
            None => false,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.index.read().aggregates.values().map(|a| a.len()).sum()
    }

    /// Drop every edge whose endpoint is missing from the arena.
    ///
    /// Cascading removal keeps this from ever finding anything; a non-zero
    /// result means a cascade was missed somewhere.
    pub fn prune_dangling(&self) -> usize {
        let mut index = self.index.write();
        let mut dropped = 0;
        let mut emptied = Vec::new();
        for (pair, aggregate) in &index.aggregates {
            let gone = aggregate.drop_edges_where(|e| {
                !index.resources.contains_key(&e.a) || !index.resources.contains_key(&e.b)
            });
            for edge in &gone {
                warn!(edge = %edge, %pair, "dangling edge dropped");
            }
            dropped += gone.len();
            if aggregate.is_empty() {
                emptied.push(*pair);
            }
        }
        for pair in emptied {
            index.detach(pair);
        }
        dropped
    }

    // ── Status refresh ─────────────────────────────────────────────

    /// Bring committed edges in line with a cluster status snapshot.
    ///
    /// Every reported constraint is upserted; committed edges whose id is
    /// no longer reported are removed. Pending edges are left alone.
    pub fn refresh_from(&self, status: &dyn ClusterStatus) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for id in status.order_ids() {
            let Some(data) = status.order_data_for(&id) else { continue };
            seen.insert(id);
            let endpoints = (self.key_of(&data.first), self.key_of(&data.then));
            match endpoints {
                (Some(first), Some(then)) => match self.upsert_edge(data.to_edge(first, then)) {
                    Ok(_) => summary.upserted += 1,
                    Err(e) => {
                        warn!(edge_id = %data.id, error = %e, "order not applied");
                        summary.dangling += 1;
                    }
                },
                _ => {
                    warn!(edge_id = %data.id, first = %data.first, then = %data.then, "order names unknown resource");
                    summary.dangling += 1;
                }
            }
        }

        for id in status.colocation_ids() {
            let Some(data) = status.colocation_data_for(&id) else { continue };
            seen.insert(id);
            let endpoints = (self.key_of(&data.rsc), self.key_of(&data.with_rsc));
            match endpoints {
                (Some(rsc), Some(with_rsc)) => match self.upsert_edge(data.to_edge(rsc, with_rsc)) {
                    Ok(_) => summary.upserted += 1,
                    Err(e) => {
                        warn!(edge_id = %data.id, error = %e, "colocation not applied");
                        summary.dangling += 1;
                    }
                },
                _ => {
                    warn!(edge_id = %data.id, rsc = %data.rsc, with_rsc = %data.with_rsc, "colocation names unknown resource");
                    summary.dangling += 1;
                }
            }
        }

        let stale: Vec<String> = {
            let index = self.index.read();
            index
                .edge_ids
                .keys()
                .filter(|id| !seen.contains(*id))
                .cloned()
                .collect()
        };
        for id in stale {
            if self.remove_edge(&id) {
                summary.removed += 1;
            }
        }

        info!(
            upserted = summary.upserted,
            removed = summary.removed,
            dangling = summary.dangling,
            "graph refreshed from cluster status"
        );
        summary
    }

    /// Name of `key` for display, falling back to the key itself.
    pub fn display_name(&self, key: ResourceKey) -> String {
        self.index.read().name_of(key)
    }
}

/// Iterator returned by [`ResourceGraph::edges_touching`].
pub struct EdgesTouching {
    key: ResourceKey,
    aggregates: std::vec::IntoIter<Arc<ConnectionAggregate>>,
    current: std::vec::IntoIter<ConstraintEdge>,
}

impl Iterator for EdgesTouching {
    type Item = ConstraintEdge;

    fn next(&mut self) -> Option<ConstraintEdge> {
        loop {
            if let Some(edge) = self.current.by_ref().find(|e| e.touches(self.key)) {
                return Some(edge);
            }
            let aggregate = self.aggregates.next()?;
            self.current = aggregate.edges().into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ColocationData, OrderData, StatusSnapshot};
    use lattice_core::Score;

    fn graph_with(names: &[&str]) -> (ResourceGraph, Vec<ResourceKey>) {
        let graph = ResourceGraph::new();
        let keys = names
            .iter()
            .map(|n| graph.add_resource(Resource::service(n)).unwrap())
            .collect();
        (graph, keys)
    }

    #[test]
    fn duplicate_names_rejected() {
        let (graph, _) = graph_with(&["web"]);
        let err = graph.add_resource(Resource::service("web")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateName("web".to_string()));
    }

    #[test]
    fn aggregate_lookup_is_unordered() {
        let (graph, k) = graph_with(&["a", "b"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::PlusInfinity).with_id("o1"))
            .unwrap();
        let forward = graph.aggregate_for(k[0], k[1]).unwrap();
        let backward = graph.aggregate_for(k[1], k[0]).unwrap();
        assert!(Arc::ptr_eq(&forward, &backward));
    }

    #[test]
    fn dangling_edge_is_dropped() {
        let (graph, k) = graph_with(&["a"]);
        let err = graph
            .upsert_edge(ConstraintEdge::order(k[0], ResourceKey(99), Score::Unset).with_id("o1"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { endpoint: ResourceKey(99), .. }));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.aggregates().is_empty());
    }

    #[test]
    fn remove_resource_cascades() {
        let (graph, k) = graph_with(&["a", "b", "c"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::Unset).with_id("o1"))
            .unwrap();
        graph
            .upsert_edge(ConstraintEdge::colocation(k[2], k[0], Score::PlusInfinity).with_id("c1"))
            .unwrap();
        graph
            .upsert_edge(ConstraintEdge::order(k[1], k[2], Score::Unset).with_id("o2"))
            .unwrap();

        let held = graph.aggregate_for(k[0], k[1]).unwrap();
        assert_eq!(graph.remove_resource(k[0]), 2);

        assert_eq!(graph.edges_touching(k[0]).count(), 0);
        assert!(held.is_empty());
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.remove_edge("o1"));
        assert!(graph.remove_edge("o2"));
    }

    #[test]
    fn remove_unknown_resource_is_noop() {
        let (graph, k) = graph_with(&["a"]);
        assert_eq!(graph.remove_resource(ResourceKey(42)), 0);
        assert_eq!(graph.remove_resource(k[0]), 0);
        assert_eq!(graph.remove_resource(k[0]), 0);
    }

    #[test]
    fn removing_last_edge_drops_connection() {
        let (graph, k) = graph_with(&["a", "b"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::Unset).with_id("o1"))
            .unwrap();
        assert!(graph.participates(k[0]));
        assert!(graph.remove_edge("o1"));
        assert!(graph.aggregate_for(k[0], k[1]).is_none());
        assert!(!graph.participates(k[0]));
    }

    #[test]
    fn pending_edge_lifecycle() {
        let (graph, k) = graph_with(&["a", "b"]);
        graph
            .upsert_edge(ConstraintEdge::pending(ConstraintKind::Colocation, k[0], k[1]))
            .unwrap();
        assert!(graph.participates(k[1]));
        graph.remove_pending(ConstraintKind::Colocation, k[0], k[1]);
        assert!(!graph.participates(k[1]));
    }

    #[test]
    fn rename_keeps_edges() {
        let (graph, k) = graph_with(&["a", "b"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::Unset).with_id("o1"))
            .unwrap();
        graph.rename_resource(k[0], "alpha").unwrap();
        assert_eq!(graph.key_of("alpha"), Some(k[0]));
        assert_eq!(graph.key_of("a"), None);
        assert_eq!(graph.edges_touching(k[0]).count(), 1);
        assert_eq!(
            graph.rename_resource(k[0], "b").unwrap_err(),
            GraphError::DuplicateName("b".to_string())
        );
    }

    #[test]
    fn edge_id_moving_pairs_leaves_old_connection() {
        let (graph, k) = graph_with(&["a", "b", "c"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::Unset).with_id("o1"))
            .unwrap();
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[2], Score::Unset).with_id("o1"))
            .unwrap();
        assert!(graph.aggregate_for(k[0], k[1]).is_none());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn two_directions_collapse_groups() {
        let graph = ResourceGraph::new();
        let group = graph.add_resource(Resource::group("grp")).unwrap();
        let a = graph.add_resource(Resource::service("a").in_group(group)).unwrap();
        let b = graph.add_resource(Resource::service("b")).unwrap();
        graph
            .upsert_edge(ConstraintEdge::order(a, b, Score::Unset).with_id("o1"))
            .unwrap();
        graph
            .upsert_edge(ConstraintEdge::order(b, a, Score::Unset).with_id("o2"))
            .unwrap();
        assert!(graph.has_two_directions(a, b, ConstraintKind::Order));
        assert!(!graph.has_two_directions(a, b, ConstraintKind::Colocation));
    }

    #[test]
    fn removing_group_ungroups_members() {
        let graph = ResourceGraph::new();
        let group = graph.add_resource(Resource::group("grp")).unwrap();
        let a = graph.add_resource(Resource::service("a").in_group(group)).unwrap();
        graph.remove_resource(group);
        assert_eq!(graph.resource(a).unwrap().group, None);
    }

    #[test]
    fn refresh_applies_and_retires_constraints() {
        let (graph, k) = graph_with(&["db", "web"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[1], k[0], Score::Unset).with_id("stale"))
            .unwrap();
        graph
            .upsert_edge(ConstraintEdge::pending(ConstraintKind::Colocation, k[1], k[0]))
            .unwrap();

        let snapshot = StatusSnapshot::new()
            .with_order(OrderData {
                id: "o1".to_string(),
                first: "db".to_string(),
                then: "web".to_string(),
                score: Score::PlusInfinity,
                symmetrical: None,
                first_action: None,
                then_action: None,
            })
            .with_colocation(ColocationData {
                id: "c1".to_string(),
                rsc: "web".to_string(),
                with_rsc: "ghost".to_string(),
                score: Score::PlusInfinity,
                attributes: BTreeMap::new(),
            });

        let summary = graph.refresh_from(&snapshot);
        assert_eq!(
            summary,
            RefreshSummary {
                upserted: 1,
                removed: 1,
                dangling: 1
            }
        );
        let aggregate = graph.aggregate_for(k[0], k[1]).unwrap();
        assert!(aggregate.edge("o1").is_some());
        assert!(aggregate.edge("stale").is_none());
        // The pending colocation survives the refresh.
        assert!(aggregate.has_colocation());
    }

    #[test]
    fn prune_finds_nothing_after_cascades() {
        let (graph, k) = graph_with(&["a", "b"]);
        graph
            .upsert_edge(ConstraintEdge::order(k[0], k[1], Score::Unset).with_id("o1"))
            .unwrap();
        graph.remove_resource(k[1]);
        assert_eq!(graph.prune_dangling(), 0);
    }
}
