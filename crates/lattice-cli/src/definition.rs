//! Cluster description files.
//!
//! A description is a TOML document standing in for what a live session
//! would learn from the cluster: hosts and their interfaces, services,
//! groups, replicated volumes, the constraints the status poll reports and
//! the committed values the operator is editing against.
//!
//! ```toml
//! name = "demo"
//!
//! [config.replication]
//! base_port = 7788
//!
//! [hosts.alpha]
//! eth1 = "10.0.0.1"
//!
//! [[services]]
//! name = "web"
//! agent = "ocf:heartbeat:apache"
//!
//! [[volumes]]
//! name = "r0"
//! [volumes.hosts.alpha]
//! address_selector = "eth1"
//! volumes = [{ number = 0, params = { disk = "/dev/sdb1" } }]
//!
//! [[orders]]
//! id = "ord-r0-web"
//! first = "r0"
//! then = "web"
//! score = "INFINITY"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use lattice_cluster::{Cluster, EditableInfo};
use lattice_core::{LatticeConfig, ResourceKind};
use lattice_graph::{ColocationData, OrderData, Resource, StatusSnapshot};
use lattice_synth::{HostSection, StaticHosts, VolumeResource};
use serde::Deserialize;
use tracing::{debug, info};

const DEFAULT_NAME: &str = "cluster";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterDefinition {
    pub name: String,
    pub config: LatticeConfig,
    /// host → interface → IP.
    pub hosts: StaticHosts,
    pub groups: Vec<GroupDef>,
    pub services: Vec<ServiceDef>,
    pub volumes: Vec<VolumeDef>,
    pub orders: Vec<OrderData>,
    pub colocations: Vec<ColocationData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub new: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Committed parameters. Defaults to `params` for committed services.
    #[serde(default)]
    pub saved: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeDef {
    pub name: String,
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostSection>,
    /// Committed resource-level parameters. Defaults to `params`.
    #[serde(default)]
    pub saved_params: Option<BTreeMap<String, String>>,
}

impl ClusterDefinition {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cluster description {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid cluster description {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let definition: ClusterDefinition = toml::from_str(content)?;
        definition.config.validate()?;
        Ok(definition)
    }

    /// Replace the embedded `[config]` table with a standalone lattice.toml.
    pub fn with_config_file(mut self, path: &Path) -> anyhow::Result<Self> {
        self.config = LatticeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Ok(self)
    }

    pub fn cluster_name(&self) -> &str {
        if self.name.is_empty() { DEFAULT_NAME } else { &self.name }
    }

    /// Assemble a cluster context: resources first, then the status
    /// snapshot, so every reported constraint resolves its endpoints.
    pub fn build(&self) -> anyhow::Result<Cluster> {
        let cluster = Cluster::new(self.cluster_name(), self.config.clone(), Arc::new(self.hosts.clone()))?;
        let graph = cluster.graph();

        for group in &self.groups {
            let mut node = Resource::group(&group.name);
            if group.new {
                node = node.as_new();
            }
            graph.add_resource(node)?;
        }

        for service in &self.services {
            let mut node = Resource::service(&service.name);
            if let Some(agent) = &service.agent {
                node = node.with_param("agent", agent);
            }
            for (name, value) in &service.params {
                node = node.with_param(name, value);
            }
            if let Some(group) = &service.group {
                let key = graph
                    .key_of(group)
                    .filter(|k| graph.resource(*k).is_some_and(|r| r.kind == ResourceKind::Group))
                    .ok_or_else(|| anyhow!("service {} names unknown group {group}", service.name))?;
                node = node.in_group(key);
            }
            if service.new {
                node = node.as_new();
            }
            graph.add_resource(node)?;
        }

        for volume in &self.volumes {
            let stored = cluster.add_volume(volume.live(), volume.new)?;
            debug!(volume = %stored.name, hosts = stored.hosts.len(), "volume loaded");
        }

        let snapshot = StatusSnapshot {
            orders: self.orders.iter().map(|o| (o.id.clone(), o.clone())).collect(),
            colocations: self.colocations.iter().map(|c| (c.id.clone(), c.clone())).collect(),
        };
        let summary = cluster.refresh(snapshot);
        info!(
            cluster = %cluster.name(),
            resources = graph.resource_count(),
            edges = graph.edge_count(),
            dangling = summary.dangling,
            "cluster description loaded"
        );
        Ok(cluster)
    }

    /// The editable object named `name`: a volume resource if one exists,
    /// otherwise a service.
    pub fn editable(&self, cluster: &Cluster, name: &str) -> anyhow::Result<EditableInfo> {
        if let Some(stored) = cluster.volume(name) {
            let saved = self
                .volumes
                .iter()
                .find(|v| v.name == name)
                .and_then(|def| def.saved(&stored));
            return Ok(EditableInfo::volume(stored, saved));
        }

        let graph = cluster.graph();
        let resource = graph
            .key_of(name)
            .and_then(|k| graph.resource(k))
            .filter(|r| r.kind == ResourceKind::Service)
            .ok_or_else(|| anyhow!("no volume resource or service named {name}"))?;
        let saved = self
            .services
            .iter()
            .find(|s| s.name == name)
            .map(ServiceDef::saved)
            .unwrap_or_default();
        Ok(EditableInfo::service(&resource, saved))
    }
}

impl ServiceDef {
    /// Committed parameters including the agent, empty for new services.
    fn saved(&self) -> BTreeMap<String, String> {
        if self.new {
            return BTreeMap::new();
        }
        let mut saved = self.saved.clone().unwrap_or_else(|| self.params.clone());
        if let Some(agent) = &self.agent {
            saved.insert("agent".to_string(), agent.clone());
        }
        saved
    }
}

impl VolumeDef {
    fn live(&self) -> VolumeResource {
        VolumeResource {
            name: self.name.clone(),
            params: self.params.clone(),
            hosts: self.hosts.clone(),
        }
    }

    /// The committed version of `stored`, which already carries its
    /// allocated ports and devices. `None` for new resources.
    fn saved(&self, stored: &VolumeResource) -> Option<VolumeResource> {
        if self.new {
            return None;
        }
        let mut saved = stored.clone();
        if let Some(params) = &self.saved_params {
            saved.params = params.clone();
        }
        Some(saved)
    }
}
