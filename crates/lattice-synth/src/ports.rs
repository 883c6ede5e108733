//! Port and device-minor assignment for new volume resources.
//!
//! Every host of one resource listens on the same port, and every volume
//! gets its own `/dev/drbdN` minor. The allocator hands out the lowest
//! values not already taken by other resources.

use std::collections::BTreeSet;

use lattice_core::config::ReplicationConfig;
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::volume::VolumeResource;

const DEVICE_PREFIX: &str = "/dev/drbd";

#[derive(Debug, Clone)]
pub struct PortAllocator {
    base_port: u16,
    max_port: u16,
    base_minor: u32,
}

impl PortAllocator {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            base_port: config.base_port,
            max_port: config.max_port,
            base_minor: config.base_minor,
        }
    }

    /// Lowest port in range not in `used`.
    pub fn next_port(&self, used: &BTreeSet<u16>) -> SynthResult<u16> {
        (self.base_port..=self.max_port)
            .find(|p| !used.contains(p))
            .ok_or(SynthError::PortsExhausted {
                base: self.base_port,
                max: self.max_port,
            })
    }

    /// Lowest minor at or above the base not in `used`.
    pub fn next_minor(&self, used: &BTreeSet<u32>) -> u32 {
        let mut minor = self.base_minor;
        while used.contains(&minor) {
            minor += 1;
        }
        minor
    }

    /// Fill in missing host ports and volume devices of `resource`.
    ///
    /// Hosts that already carry a port keep it; the rest share one newly
    /// allocated port. Each volume number without a device gets a fresh
    /// minor, shared by every host carrying that volume number.
    pub fn assign(&self, resource: &mut VolumeResource, others: &[VolumeResource]) -> SynthResult<()> {
        let mut taken_ports = used_ports(others);
        let mut taken_minors = used_minors(others);
        taken_ports.extend(used_ports(std::slice::from_ref(resource)));
        taken_minors.extend(used_minors(std::slice::from_ref(resource)));

        if resource.hosts.values().any(|h| h.port.is_none()) {
            let port = resource
                .hosts
                .values()
                .find_map(|h| h.port)
                .map_or_else(|| self.next_port(&taken_ports), Ok)?;
            for section in resource.hosts.values_mut() {
                section.port.get_or_insert(port);
            }
            debug!(resource = %resource.name, port, "replication port assigned");
        }

        let mut numbers: BTreeSet<u32> = BTreeSet::new();
        for section in resource.hosts.values() {
            numbers.extend(
                section
                    .volumes
                    .iter()
                    .filter(|v| !v.params.contains_key("device"))
                    .map(|v| v.number),
            );
        }
        for number in numbers {
            let existing = resource
                .hosts
                .values()
                .flat_map(|h| h.volumes.iter())
                .filter(|v| v.number == number)
                .find_map(|v| v.params.get("device").and_then(|d| parse_minor(d)));
            let minor = match existing {
                Some(minor) => minor,
                None => {
                    let minor = self.next_minor(&taken_minors);
                    taken_minors.insert(minor);
                    minor
                }
            };
            for volume in resource
                .hosts
                .values_mut()
                .flat_map(|h| h.volumes.iter_mut())
                .filter(|v| v.number == number)
            {
                volume
                    .params
                    .entry("device".to_string())
                    .or_insert_with(|| format!("{DEVICE_PREFIX}{minor}"));
            }
            debug!(resource = %resource.name, volume = number, minor, "device minor assigned");
        }
        Ok(())
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(&ReplicationConfig::default())
    }
}

/// Ports configured on any host of `resources`.
pub fn used_ports(resources: &[VolumeResource]) -> BTreeSet<u16> {
    resources
        .iter()
        .flat_map(|r| r.hosts.values())
        .filter_map(|h| h.port)
        .collect()
}

/// Device minors configured on any volume of `resources`.
pub fn used_minors(resources: &[VolumeResource]) -> BTreeSet<u32> {
    resources
        .iter()
        .flat_map(|r| r.hosts.values())
        .flat_map(|h| h.volumes.iter())
        .filter_map(|v| v.params.get("device").and_then(|d| parse_minor(d)))
        .collect()
}

fn parse_minor(device: &str) -> Option<u32> {
    device.trim().strip_prefix(DEVICE_PREFIX)?.parse().ok()
}
