pub mod check;
pub mod ports;
pub mod preview;
pub mod render;

use std::path::Path;

use lattice_cluster::Cluster;

use crate::definition::ClusterDefinition;

/// Load a description, apply an optional lattice.toml over its
/// `[config]` table and build the cluster context.
pub fn load(file: &Path, config: Option<&Path>) -> anyhow::Result<(ClusterDefinition, Cluster)> {
    let mut definition = ClusterDefinition::from_file(file)?;
    if let Some(path) = config {
        definition = definition.with_config_file(path)?;
    }
    let cluster = definition.build()?;
    Ok((definition, cluster))
}
