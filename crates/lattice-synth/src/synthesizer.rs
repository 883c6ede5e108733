//! The synthesizer facade.
//!
//! Holds the four parameter catalogs and the host directory, and turns
//! graph and resource state into text. Stateless between calls: every
//! method reads its inputs fresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use lattice_core::{ConstraintKind, ParamProvider};
use lattice_graph::{ConstraintEdge, ResourceGraph};
use tracing::debug;

use crate::constraint;
use crate::error::SynthResult;
use crate::network::HostDirectory;
use crate::volume::{self, VolumeResource};

/// Parameter metadata for each renderable object kind.
#[derive(Clone)]
pub struct Catalogs {
    pub resource: Arc<dyn ParamProvider>,
    pub volume: Arc<dyn ParamProvider>,
    pub order: Arc<dyn ParamProvider>,
    pub colocation: Arc<dyn ParamProvider>,
}

impl Catalogs {
    pub fn for_kind(&self, kind: ConstraintKind) -> &dyn ParamProvider {
        match kind {
            ConstraintKind::Order => self.order.as_ref(),
            ConstraintKind::Colocation => self.colocation.as_ref(),
        }
    }
}

pub struct ConfigSynthesizer {
    catalogs: Catalogs,
    hosts: Arc<dyn HostDirectory>,
}

impl ConfigSynthesizer {
    pub fn new(catalogs: Catalogs, hosts: Arc<dyn HostDirectory>) -> Self {
        Self { catalogs, hosts }
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    /// Full `resource name { … }` block for a replicated volume.
    pub fn render_volume(&self, resource: &VolumeResource) -> SynthResult<String> {
        let text = volume::render_resource(
            resource,
            self.catalogs.resource.as_ref(),
            self.catalogs.volume.as_ref(),
            self.hosts.as_ref(),
        )?;
        debug!(resource = %resource.name, bytes = text.len(), "volume block rendered");
        Ok(text)
    }

    /// Attribute map sent to the resource manager when committing `edge`.
    pub fn constraint_attributes(&self, edge: &ConstraintEdge) -> BTreeMap<String, String> {
        constraint::attribute_map(edge, self.catalogs.for_kind(edge.kind))
    }

    /// Shell definition line of one edge.
    pub fn render_constraint(&self, edge: &ConstraintEdge, graph: &ResourceGraph) -> SynthResult<String> {
        constraint::render_line(edge, graph, self.catalogs.for_kind(edge.kind))
    }

    /// Every edge in the graph, orders first, each kind sorted by id.
    pub fn render_constraints(&self, graph: &ResourceGraph) -> SynthResult<Vec<String>> {
        let mut keyed = Vec::new();
        for aggregate in graph.aggregates() {
            for edge in aggregate.edges() {
                let id = constraint::edge_id(
                    &edge,
                    &graph.display_name(edge.a),
                    &graph.display_name(edge.b),
                );
                let rank = match edge.kind {
                    ConstraintKind::Order => 0u8,
                    ConstraintKind::Colocation => 1,
                };
                keyed.push(((rank, id), edge));
            }
        }
        keyed.sort_by(|(x, _), (y, _)| x.cmp(y));

        let mut lines = Vec::with_capacity(keyed.len());
        for (_, edge) in keyed {
            lines.push(self.render_constraint(&edge, graph)?);
        }
        Ok(lines)
    }
}
