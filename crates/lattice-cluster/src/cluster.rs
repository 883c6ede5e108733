//! Per-cluster context.
//!
//! A [`Cluster`] owns every piece of shared state for one cluster: the
//! resource graph, the live status read model, the dry-run coordinator,
//! the synthesizer, the check engines and the replicated-volume
//! resources. Nothing here is global; two clusters never share state.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use lattice_check::{Check, FieldCheckEngine, FieldSource};
use lattice_core::params::parse_bool;
use lattice_core::{ConstraintKind, LatticeConfig, ResourceKey};
use lattice_dryrun::{DryRunCoordinator, HoverPreview, PreviewReport, PreviewSession};
use lattice_graph::{
    ColocationData, ConnectionAggregate, ConstraintEdge, OrderData, RefreshSummary, Resource,
    ResourceGraph, StatusSnapshot, attr,
};
use lattice_synth::constraint::edge_id;
use lattice_synth::{ConfigSynthesizer, HostDirectory, PortAllocator, VolumeResource};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::catalog::BuiltinCatalogs;
use crate::editable::{EditableInfo, Renderable, Validatable};
use crate::error::{ClusterError, ClusterResult};
use crate::status::LiveStatus;

// ── Check engines ─────────────────────────────────────────────────

/// One field check engine per editable object kind.
pub struct CheckEngines {
    pub resource: FieldCheckEngine,
    pub volume: FieldCheckEngine,
    pub order: FieldCheckEngine,
    pub colocation: FieldCheckEngine,
    pub service: FieldCheckEngine,
}

impl CheckEngines {
    fn new(catalogs: &BuiltinCatalogs) -> Self {
        let resource = FieldCheckEngine::new(Arc::clone(&catalogs.synth.resource))
            .with_rule_reading("allow-two-primaries", &["protocol"], |value, source| {
                dual_primary_rule(parse_bool(value).unwrap_or(false), &live_or(source, "protocol", "C"))
            })
            .with_rule_reading("protocol", &["allow-two-primaries"], |value, source| {
                let dual = parse_bool(&live_or(source, "allow-two-primaries", "no")).unwrap_or(false);
                dual_primary_rule(dual, value)
            });
        Self {
            resource,
            volume: FieldCheckEngine::new(Arc::clone(&catalogs.synth.volume)),
            order: FieldCheckEngine::new(Arc::clone(&catalogs.synth.order)),
            colocation: FieldCheckEngine::new(Arc::clone(&catalogs.synth.colocation)),
            service: FieldCheckEngine::new(catalogs.service.clone()),
        }
    }

    pub fn for_kind(&self, kind: ConstraintKind) -> &FieldCheckEngine {
        match kind {
            ConstraintKind::Order => &self.order,
            ConstraintKind::Colocation => &self.colocation,
        }
    }

    /// Drop every cached verdict held for `object_id`.
    pub fn forget(&self, object_id: &str) {
        for engine in [&self.resource, &self.volume, &self.order, &self.colocation, &self.service] {
            engine.forget(object_id);
        }
    }
}

fn live_or(source: &dyn FieldSource, name: &str, fallback: &str) -> String {
    source
        .live_value(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn dual_primary_rule(dual: bool, protocol: &str) -> Result<(), String> {
    if dual && !protocol.trim().eq_ignore_ascii_case("C") {
        Err("dual-primary mode requires protocol C".to_string())
    } else {
        Ok(())
    }
}

// ── Cluster ───────────────────────────────────────────────────────

/// What a constraint commit sent downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    pub line: String,
}

pub struct Cluster {
    name: String,
    config: LatticeConfig,
    graph: Arc<ResourceGraph>,
    status: Arc<LiveStatus>,
    coordinator: Arc<DryRunCoordinator<LiveStatus>>,
    synth: Arc<ConfigSynthesizer>,
    engines: CheckEngines,
    allocator: PortAllocator,
    volumes: RwLock<BTreeMap<String, VolumeResource>>,
    hover: HoverPreview<LiveStatus>,
}

impl Cluster {
    pub fn new(name: &str, config: LatticeConfig, hosts: Arc<dyn HostDirectory>) -> ClusterResult<Self> {
        let catalogs = BuiltinCatalogs::load()?;
        let status = Arc::new(LiveStatus::default());
        let coordinator = Arc::new(DryRunCoordinator::new(Arc::clone(&status)));
        let hover = HoverPreview::new(Arc::clone(&coordinator), &config.preview);
        info!(cluster = %name, debounce_ms = config.preview.debounce_ms, "cluster context created");
        Ok(Self {
            name: name.to_string(),
            allocator: PortAllocator::new(&config.replication),
            config,
            graph: Arc::new(ResourceGraph::new()),
            status,
            coordinator,
            synth: Arc::new(ConfigSynthesizer::new(catalogs.synth.clone(), hosts)),
            engines: CheckEngines::new(&catalogs),
            volumes: RwLock::new(BTreeMap::new()),
            hover,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<ResourceGraph> {
        &self.graph
    }

    pub fn status(&self) -> &Arc<LiveStatus> {
        &self.status
    }

    pub fn coordinator(&self) -> &Arc<DryRunCoordinator<LiveStatus>> {
        &self.coordinator
    }

    pub fn synthesizer(&self) -> &ConfigSynthesizer {
        &self.synth
    }

    pub fn engines(&self) -> &CheckEngines {
        &self.engines
    }

    /// Install a new status snapshot and reconcile the graph with it.
    pub fn refresh(&self, snapshot: StatusSnapshot) -> RefreshSummary {
        self.status.replace(snapshot);
        let summary = self.graph.refresh_from(self.status.as_ref());
        info!(
            cluster = %self.name,
            upserted = summary.upserted,
            removed = summary.removed,
            dangling = summary.dangling,
            "status refreshed"
        );
        summary
    }

    // ── Volumes ───────────────────────────────────────────────────

    /// Register a replicated-volume resource, assigning any missing port
    /// and device minor. Returns the resource as stored.
    pub fn add_volume(&self, mut resource: VolumeResource, is_new: bool) -> ClusterResult<VolumeResource> {
        let mut volumes = self.volumes.write();
        if volumes.contains_key(&resource.name) {
            return Err(ClusterError::DuplicateVolume(resource.name));
        }
        let others: Vec<VolumeResource> = volumes.values().cloned().collect();
        self.allocator.assign(&mut resource, &others)?;

        let mut node = Resource::volume(&resource.name);
        if is_new {
            node = node.as_new();
        }
        self.graph.add_resource(node)?;
        volumes.insert(resource.name.clone(), resource.clone());
        info!(cluster = %self.name, volume = %resource.name, is_new, "volume resource added");
        Ok(resource)
    }

    pub fn volume(&self, name: &str) -> Option<VolumeResource> {
        self.volumes.read().get(name).cloned()
    }

    pub fn volumes(&self) -> Vec<VolumeResource> {
        self.volumes.read().values().cloned().collect()
    }

    pub fn render_volume(&self, name: &str) -> ClusterResult<String> {
        let resource = self
            .volume(name)
            .ok_or_else(|| ClusterError::UnknownVolume(name.to_string()))?;
        self.synth.render_volume(&resource).map_err(|e| {
            error!(cluster = %self.name, volume = %name, error = %e, "volume render failed");
            e.into()
        })
    }

    /// Remove a resource and everything attached to it. Returns the
    /// number of edges removed with it.
    pub fn remove_resource(&self, name: &str) -> usize {
        self.volumes.write().remove(name);
        self.engines.forget(name);
        match self.graph.key_of(name) {
            Some(key) => self.graph.remove_resource(key),
            None => 0,
        }
    }

    // ── Editable objects ──────────────────────────────────────────

    pub fn check(&self, info: &EditableInfo) -> Check {
        info.validate(self)
    }

    /// Check after the operator edited `field`. Volume fields are named
    /// as in the report, e.g. `alpha/volume 0/disk`.
    pub fn check_touched(&self, info: &EditableInfo, field: &str) -> Check {
        info.validate_touched(self, field)
    }

    pub fn render(&self, info: &EditableInfo) -> ClusterResult<String> {
        info.render(self)
    }

    // ── Constraints ───────────────────────────────────────────────

    /// Dry-run `edge` and report what it would do. Failures come back as
    /// an unavailable report.
    pub async fn preview_constraint(&self, edge: ConstraintEdge) -> PreviewReport {
        let graph = Arc::clone(&self.graph);
        let synth = Arc::clone(&self.synth);
        self.coordinator
            .run_dry_run(move |session| evaluate_preview(session, graph, synth, edge))
            .await
            .unwrap_or_else(|e| PreviewReport::unavailable(e.to_string()))
    }

    /// Pointer rests on a drawn constraint; preview it after the debounce.
    pub fn hover_constraint(&self, edge: ConstraintEdge) {
        let target = edge.label();
        let graph = Arc::clone(&self.graph);
        let synth = Arc::clone(&self.synth);
        self.hover
            .hover_enter(&target, move |session| evaluate_preview(session, graph, synth, edge));
    }

    pub fn hover_exit(&self) -> bool {
        self.hover.hover_exit()
    }

    pub fn subscribe_preview(&self) -> watch::Receiver<Option<PreviewReport>> {
        self.hover.subscribe()
    }

    /// Validate, render and apply a constraint.
    ///
    /// Nothing is applied unless the fields check clean, something changed
    /// and the whole definition renders.
    pub async fn commit_constraint(
        &self,
        edge: ConstraintEdge,
        saved: Option<ConstraintEdge>,
    ) -> ClusterResult<CommitOutcome> {
        let info = EditableInfo::constraint(edge.clone(), saved);
        let check = self.check(&info);
        if !check.is_correct() {
            return Err(ClusterError::Incorrect {
                object: info.subject(self),
                fields: check.incorrect,
            });
        }
        if !check.has_changes() {
            return Err(ClusterError::NothingToCommit(info.subject(self)));
        }

        let line = self.synth.render_constraint(&edge, &self.graph).inspect_err(|e| {
            error!(cluster = %self.name, edge = %edge.label(), error = %e, "constraint render failed");
        })?;
        let id = edge_id(
            &edge,
            &self.graph.display_name(edge.a),
            &self.graph.display_name(edge.b),
        );
        let attributes = self.synth.constraint_attributes(&edge);
        let committed = match edge.id {
            Some(_) => edge,
            None => edge.with_id(id.clone()),
        };

        let graph = Arc::clone(&self.graph);
        self.coordinator
            .run_commit(move |_status| async move {
                graph.upsert_edge(committed)?;
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        info!(cluster = %self.name, edge_id = %id, attrs = attributes.len(), "constraint committed");
        Ok(CommitOutcome { id, attributes, line })
    }
}

// ── Preview evaluation ────────────────────────────────────────────

async fn evaluate_preview(
    session: PreviewSession<LiveStatus>,
    graph: Arc<ResourceGraph>,
    synth: Arc<ConfigSynthesizer>,
    edge: ConstraintEdge,
) -> anyhow::Result<PreviewReport> {
    let first = graph
        .name_of(edge.a)
        .ok_or_else(|| anyhow!("unknown resource {}", edge.a))?;
    let second = graph
        .name_of(edge.b)
        .ok_or_else(|| anyhow!("unknown resource {}", edge.b))?;
    let id = edge_id(&edge, &first, &second);

    match edge.kind {
        ConstraintKind::Order => session.stage_order(OrderData {
            id,
            first: first.clone(),
            then: second.clone(),
            score: edge.score,
            symmetrical: edge.attr(attr::SYMMETRICAL).and_then(parse_bool),
            first_action: edge.attr(attr::FIRST_ACTION).map(str::to_string),
            then_action: edge.attr(attr::THEN_ACTION).map(str::to_string),
        }),
        ConstraintKind::Colocation => session.stage_colocation(ColocationData {
            id,
            rsc: first.clone(),
            with_rsc: second.clone(),
            score: edge.score,
            attributes: edge.attributes.clone(),
        }),
    }

    let mut report = PreviewReport::new(vec![synth.render_constraint(&edge, &graph)?]);

    let groups: BTreeMap<ResourceKey, ResourceKey> = [edge.a, edge.b]
        .into_iter()
        .map(|k| (k, graph.resource(k).and_then(|r| r.group).unwrap_or(k)))
        .collect();
    let scratch = ConnectionAggregate::new(edge.pair());
    if let Some(existing) = graph.aggregate_for(edge.a, edge.b) {
        for e in existing.edges() {
            scratch.add_edge(e)?;
        }
    }
    scratch.add_edge(edge.clone())?;

    match edge.kind {
        ConstraintKind::Colocation => {
            let class = scratch.net_colocation_score(Some(edge.a), Some(edge.b));
            report.push(format!("colocation of {first} with {second}: {class}"));
        }
        ConstraintKind::Order => {
            let state = if scratch.is_order_score_null(Some(edge.a), Some(edge.b)) {
                "not enforced"
            } else {
                "enforced"
            };
            report.push(format!("order {first} then {second}: {state}"));
        }
    }
    if scratch.has_two_directions(edge.kind, |k| groups.get(&k).copied().unwrap_or(k)) {
        warn!(%first, %second, kind = %edge.kind, "preview shows constraints in both directions");
        report.push(format!("warning: {} constraints point both ways between {first} and {second}", edge.kind));
    }

    let total = session.with_view(|view| view.order_ids().len() + view.colocation_ids().len());
    report.push(format!("{total} constraints in cluster after change"));
    Ok(report)
}
