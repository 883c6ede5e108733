use std::path::Path;

use lattice_synth::VolumeResource;

use super::load;

/// One line per host of each volume resource: port and devices, as
/// assigned by the allocator.
pub fn ports(file: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let (_, cluster) = load(file, config)?;
    for resource in cluster.volumes() {
        for line in port_lines(&resource) {
            println!("{line}");
        }
    }
    Ok(())
}

fn port_lines(resource: &VolumeResource) -> Vec<String> {
    resource
        .hosts
        .iter()
        .map(|(host, section)| {
            let port = section.port.map_or_else(|| "-".to_string(), |p| p.to_string());
            let devices: Vec<&str> = section
                .volumes
                .iter()
                .filter_map(|v| v.params.get("device").map(String::as_str))
                .collect();
            format!("{}\t{host}\t{port}\t{}", resource.name, devices.join(","))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_synth::{HostSection, VolumeSpec};

    #[test]
    fn test_port_lines() {
        let resource = VolumeResource::new("r0")
            .with_host(
                "alpha",
                HostSection::new()
                    .with_address("eth1", 7788)
                    .with_volume(VolumeSpec::new(0).with_param("device", "/dev/drbd0"))
                    .with_volume(VolumeSpec::new(1).with_param("device", "/dev/drbd1")),
            )
            .with_host("beta", HostSection::new());
        assert_eq!(
            port_lines(&resource),
            vec!["r0\talpha\t7788\t/dev/drbd0,/dev/drbd1".to_string(), "r0\tbeta\t-\t".to_string()]
        );
    }
}
