//! Replicated-volume resource blocks.
//!
//! ```text
//! resource r0 {
//!     protocol C;
//!     net {
//!         allow-two-primaries yes;
//!     }
//!     on alpha {
//!         volume 0 {
//!             device /dev/drbd0;
//!             disk /dev/sdb1;
//!         }
//!         address 10.0.0.1:7788;
//!     }
//! }
//! ```
//!
//! Parameters equal to their default are never written. Parameters that
//! declare a section render inside `section { … }` and an empty section
//! is dropped. A host block is written when it has volume text or a
//! resolvable address; volume text without an address is an error.

use std::collections::BTreeMap;
use std::net::IpAddr;

use lattice_core::ParamProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::network::HostDirectory;

const INDENT: &str = "    ";

/// A replicated block-device resource and its per-host layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeResource {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostSection>,
}

/// One host's part of a volume resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSection {
    /// Interface name or IP the replication link binds to.
    #[serde(default)]
    pub address_selector: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

/// A single volume on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub number: u32,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl VolumeResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_host(mut self, host: &str, section: HostSection) -> Self {
        self.hosts.insert(host.to_string(), section);
        self
    }
}

impl HostSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, selector: &str, port: u16) -> Self {
        self.address_selector = Some(selector.to_string());
        self.port = Some(port);
        self
    }

    pub fn with_volume(mut self, volume: VolumeSpec) -> Self {
        self.volumes.push(volume);
        self
    }
}

impl VolumeSpec {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

/// Non-default `name value;` lines grouped by section, in declaration order.
///
/// The unsectioned group comes first, then sections in the order their
/// first parameter was declared.
fn param_lines(
    owner: &str,
    values: &BTreeMap<String, String>,
    catalog: &dyn ParamProvider,
) -> SynthResult<Vec<(Option<String>, Vec<String>)>> {
    let mut groups: Vec<(Option<String>, Vec<String>)> = vec![(None, Vec::new())];
    for name in catalog.param_names() {
        let Some(meta) = catalog.param(name) else { continue };
        let value = values.get(name).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            if meta.required && meta.default.is_none() {
                return Err(SynthError::MissingRequired {
                    resource: owner.to_string(),
                    param: name.to_string(),
                });
            }
            continue;
        }
        if meta.is_default(value) {
            continue;
        }
        let line = format!("{name} {value};");
        match groups.iter_mut().find(|(section, _)| *section == meta.section) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((meta.section.clone(), vec![line])),
        }
    }
    for name in values.keys() {
        if catalog.param(name).is_none() {
            debug!(%owner, param = %name, "undeclared parameter not rendered");
        }
    }
    Ok(groups)
}

fn write_groups(out: &mut String, depth: usize, groups: &[(Option<String>, Vec<String>)]) {
    let pad = INDENT.repeat(depth);
    for (section, lines) in groups {
        if lines.is_empty() {
            continue;
        }
        match section {
            None => {
                for line in lines {
                    out.push_str(&format!("{pad}{line}\n"));
                }
            }
            Some(section) => {
                out.push_str(&format!("{pad}{section} {{\n"));
                for line in lines {
                    out.push_str(&format!("{pad}{INDENT}{line}\n"));
                }
                out.push_str(&format!("{pad}}}\n"));
            }
        }
    }
}

fn format_address(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("address {v4}:{port};"),
        IpAddr::V6(v6) => format!("address ipv6 [{v6}]:{port};"),
    }
}

/// Text of one volume sub-block, or empty if the volume has nothing to say.
fn render_volume(
    resource: &str,
    volume: &VolumeSpec,
    catalog: &dyn ParamProvider,
    depth: usize,
) -> SynthResult<String> {
    let owner = format!("{resource}/volume {}", volume.number);
    let groups = param_lines(&owner, &volume.params, catalog)?;
    if groups.iter().all(|(_, lines)| lines.is_empty()) {
        return Ok(String::new());
    }
    let pad = INDENT.repeat(depth);
    let mut out = format!("{pad}volume {} {{\n", volume.number);
    write_groups(&mut out, depth + 1, &groups);
    out.push_str(&format!("{pad}}}\n"));
    Ok(out)
}

/// Render a whole resource block.
pub(crate) fn render_resource(
    resource: &VolumeResource,
    resource_catalog: &dyn ParamProvider,
    volume_catalog: &dyn ParamProvider,
    hosts: &dyn HostDirectory,
) -> SynthResult<String> {
    let mut out = format!("resource {} {{\n", resource.name);
    let groups = param_lines(&resource.name, &resource.params, resource_catalog)?;
    write_groups(&mut out, 1, &groups);

    for (host, section) in &resource.hosts {
        let mut volumes_text = String::new();
        let mut volumes: Vec<&VolumeSpec> = section.volumes.iter().collect();
        volumes.sort_by_key(|v| v.number);
        for volume in volumes {
            volumes_text.push_str(&render_volume(&resource.name, volume, volume_catalog, 2)?);
        }

        let address = match (&section.address_selector, section.port) {
            (Some(selector), Some(port)) => hosts
                .resolve(host, selector)
                .map(|ip| format_address(ip, port)),
            _ => None,
        };

        match (volumes_text.is_empty(), address) {
            (false, None) => {
                return Err(SynthError::MissingAddress {
                    resource: resource.name.clone(),
                    host: host.clone(),
                });
            }
            (true, None) => {
                debug!(resource = %resource.name, %host, "host block has nothing to render");
            }
            (_, Some(address)) => {
                out.push_str(&format!("{INDENT}on {host} {{\n"));
                out.push_str(&volumes_text);
                out.push_str(&format!("{INDENT}{INDENT}{address}\n"));
                out.push_str(&format!("{INDENT}}}\n"));
            }
        }
    }

    out.push_str("}\n");
    Ok(out)
}
