//! Editable objects.
//!
//! The set of things an operator can edit is closed: two constraint kinds
//! and two resource kinds. Each renders to configuration text and checks
//! its fields against the matching catalog.

use std::collections::BTreeMap;

use lattice_check::{Check, FieldCheckEngine, FieldValues, Violation};
use lattice_core::{ConstraintKind, ParamProvider};
use lattice_graph::{ConstraintEdge, Resource, attr};
use lattice_synth::{HostSection, VolumeResource, VolumeSpec};

use crate::cluster::Cluster;
use crate::error::ClusterResult;

/// Produces the configuration text of an object.
pub trait Renderable {
    fn render(&self, cluster: &Cluster) -> ClusterResult<String>;
}

/// Produces the incorrect/changed report of an object.
pub trait Validatable {
    fn validate(&self, cluster: &Cluster) -> Check;

    /// Report after an edit to `field`, reusing verdicts the edit cannot
    /// have affected.
    fn validate_touched(&self, cluster: &Cluster, field: &str) -> Check;
}

// ── Variants ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConstraintInfo {
    pub edge: ConstraintEdge,
    /// The committed version, if the constraint has been committed.
    pub saved: Option<ConstraintEdge>,
}

#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub live: VolumeResource,
    /// The committed version, if the resource has been committed.
    pub saved: Option<VolumeResource>,
}

#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    /// Resource agent, e.g. `ocf:heartbeat:IPaddr2`.
    pub agent: Option<String>,
    pub values: FieldValues,
}

#[derive(Debug, Clone)]
pub enum EditableInfo {
    OrderConstraint(ConstraintInfo),
    ColocationConstraint(ConstraintInfo),
    VolumeResource(VolumeInfo),
    ServiceResource(ServiceInfo),
}

const AGENT_PARAM: &str = "agent";

impl EditableInfo {
    pub fn constraint(edge: ConstraintEdge, saved: Option<ConstraintEdge>) -> Self {
        let info = ConstraintInfo { edge, saved };
        match info.edge.kind {
            ConstraintKind::Order => Self::OrderConstraint(info),
            ConstraintKind::Colocation => Self::ColocationConstraint(info),
        }
    }

    pub fn volume(live: VolumeResource, saved: Option<VolumeResource>) -> Self {
        Self::VolumeResource(VolumeInfo { live, saved })
    }

    /// A service as held by the graph, against its committed parameters.
    pub fn service(resource: &Resource, saved: BTreeMap<String, String>) -> Self {
        let mut live = resource.params.clone();
        let agent = live.remove(AGENT_PARAM);
        let mut saved = saved;
        saved.remove(AGENT_PARAM);
        Self::ServiceResource(ServiceInfo {
            name: resource.name.clone(),
            agent,
            values: FieldValues {
                id: resource.name.clone(),
                live,
                saved,
                new: resource.is_new,
            },
        })
    }

    /// Human-readable name for reports.
    pub fn subject(&self, cluster: &Cluster) -> String {
        match self {
            Self::OrderConstraint(c) | Self::ColocationConstraint(c) => {
                let graph = cluster.graph();
                format!(
                    "{} {} -> {}",
                    c.edge.kind,
                    graph.display_name(c.edge.a),
                    graph.display_name(c.edge.b)
                )
            }
            Self::VolumeResource(v) => format!("volume resource {}", v.live.name),
            Self::ServiceResource(s) => format!("service {}", s.name),
        }
    }
}

impl Renderable for EditableInfo {
    fn render(&self, cluster: &Cluster) -> ClusterResult<String> {
        match self {
            Self::OrderConstraint(c) | Self::ColocationConstraint(c) => {
                Ok(cluster.synthesizer().render_constraint(&c.edge, cluster.graph())?)
            }
            Self::VolumeResource(v) => Ok(cluster.synthesizer().render_volume(&v.live)?),
            Self::ServiceResource(s) => Ok(render_service(s, cluster.engines().service.catalog())),
        }
    }
}

impl Validatable for EditableInfo {
    fn validate(&self, cluster: &Cluster) -> Check {
        validate_info(self, cluster, None)
    }

    fn validate_touched(&self, cluster: &Cluster, field: &str) -> Check {
        validate_info(self, cluster, Some(field))
    }
}

fn validate_info(info: &EditableInfo, cluster: &Cluster, touched: Option<&str>) -> Check {
    match info {
        EditableInfo::OrderConstraint(c) | EditableInfo::ColocationConstraint(c) => {
            validate_constraint(c, cluster, touched)
        }
        EditableInfo::VolumeResource(v) => validate_volume(v, cluster, touched),
        EditableInfo::ServiceResource(s) => run_engine(&cluster.engines().service, &s.values, touched),
    }
}

fn run_engine(engine: &FieldCheckEngine, values: &FieldValues, touched: Option<&str>) -> Check {
    match touched {
        Some(field) => engine.check_touched(values, field),
        None => engine.check(values),
    }
}

// ── Constraints ───────────────────────────────────────────────────

fn edge_fields(edge: &ConstraintEdge) -> BTreeMap<String, String> {
    let mut fields = edge.attributes.clone();
    fields.insert(attr::SCORE.to_string(), edge.score.to_string());
    fields
}

fn validate_constraint(info: &ConstraintInfo, cluster: &Cluster, touched: Option<&str>) -> Check {
    let values = FieldValues {
        id: info.edge.id.clone().unwrap_or_else(|| info.edge.label()),
        live: edge_fields(&info.edge),
        saved: info.saved.as_ref().map(edge_fields).unwrap_or_default(),
        new: info.saved.is_none(),
    };
    let mut check = run_engine(cluster.engines().for_kind(info.edge.kind), &values, touched);

    let (a_field, b_field) = match info.edge.kind {
        ConstraintKind::Order => ("first", "then"),
        ConstraintKind::Colocation => ("rsc", "with-rsc"),
    };
    let graph = cluster.graph();
    if !graph.contains(info.edge.a) {
        check.add_incorrect(a_field, Violation::Rule(format!("unknown resource {}", info.edge.a)));
    }
    if !graph.contains(info.edge.b) {
        check.add_incorrect(b_field, Violation::Rule(format!("unknown resource {}", info.edge.b)));
    }
    if info.edge.a == info.edge.b {
        check.add_incorrect(b_field, Violation::Rule("a resource cannot be constrained to itself".into()));
    }
    check
}

// ── Volumes ───────────────────────────────────────────────────────

fn validate_volume(info: &VolumeInfo, cluster: &Cluster, touched: Option<&str>) -> Check {
    let engines = cluster.engines();
    let saved = info.saved.as_ref();
    let values = FieldValues {
        id: info.live.name.clone(),
        live: info.live.params.clone(),
        saved: saved.map(|s| s.params.clone()).unwrap_or_default(),
        new: saved.is_none(),
    };
    let mut check = run_engine(&engines.resource, &values, touched);

    for (host, section) in &info.live.hosts {
        let saved_section = saved.and_then(|s| s.hosts.get(host));
        check_host_address(&mut check, host, section, saved_section);

        for volume in &section.volumes {
            let saved_volume = saved_section.and_then(|s| s.volumes.iter().find(|v| v.number == volume.number));
            let scope = format!("{host}/volume {}", volume.number);
            let values = volume_values(&format!("{}/{scope}", info.live.name), volume, saved_volume);
            // Touched names are reported as `host/volume n/field`.
            let touched = touched.map(|t| t.strip_prefix(&format!("{scope}/")).unwrap_or(t).to_string());
            let volume_check = run_engine(&engines.volume, &values, touched.as_deref());
            check.merge_scoped(&scope, volume_check);
        }
    }
    if let Some(saved) = saved {
        for host in saved.hosts.keys().filter(|h| !info.live.hosts.contains_key(*h)) {
            check.add_changed(host, "present", "removed");
        }
    }
    check
}

fn volume_values(id: &str, live: &VolumeSpec, saved: Option<&VolumeSpec>) -> FieldValues {
    FieldValues {
        id: id.to_string(),
        live: live.params.clone(),
        saved: saved.map(|v| v.params.clone()).unwrap_or_default(),
        new: saved.is_none(),
    }
}

fn check_host_address(check: &mut Check, host: &str, live: &HostSection, saved: Option<&HostSection>) {
    let field = format!("{host}/address");
    let render = |s: &HostSection| match (&s.address_selector, s.port) {
        (Some(selector), Some(port)) => format!("{selector}:{port}"),
        (Some(selector), None) => selector.clone(),
        (None, Some(port)) => format!(":{port}"),
        (None, None) => String::new(),
    };
    if !live.volumes.is_empty() && (live.address_selector.is_none() || live.port.is_none()) {
        check.add_incorrect(&field, Violation::Required);
    }
    let old = saved.map(render).unwrap_or_default();
    let new = render(live);
    if old != new {
        check.add_changed(&field, &old, &new);
    }
}

// ── Services ──────────────────────────────────────────────────────

/// `primitive name [agent] [params k=v …] [meta k=v …]`.
///
/// Catalog parameters are meta attributes and are written only when they
/// differ from their default; anything else is an instance parameter.
fn render_service(info: &ServiceInfo, catalog: &dyn ParamProvider) -> String {
    let mut line = format!("primitive {}", info.name);
    if let Some(agent) = &info.agent {
        line.push(' ');
        line.push_str(agent);
    }

    let params: Vec<String> = info
        .values
        .live
        .iter()
        .filter(|(name, _)| catalog.param(name).is_none())
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    if !params.is_empty() {
        line.push_str(" params ");
        line.push_str(&params.join(" "));
    }

    let meta: Vec<String> = catalog
        .param_names()
        .into_iter()
        .filter_map(|name| {
            let value = info.values.live.get(name)?;
            let meta = catalog.param(name)?;
            (!meta.is_default(value)).then(|| format!("{name}={value}"))
        })
        .collect();
    if !meta.is_empty() {
        line.push_str(" meta ");
        line.push_str(&meta.join(" "));
    }
    line
}
