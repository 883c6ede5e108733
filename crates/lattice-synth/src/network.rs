//! Host network lookup for `address` lines.
//!
//! A volume resource names, per host, an address selector: normally a
//! network interface such as `eth1`, or a literal IP. The directory turns
//! `(host, selector)` into the IP the replication link binds to.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Resolves address selectors to IPs.
pub trait HostDirectory: Send + Sync {
    fn resolve(&self, host: &str, selector: &str) -> Option<IpAddr>;
}

/// Fixed host → interface → IP table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticHosts {
    hosts: BTreeMap<String, BTreeMap<String, IpAddr>>,
}

impl StaticHosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, host: &str, interface: &str, ip: IpAddr) -> Self {
        self.add_interface(host, interface, ip);
        self
    }

    pub fn add_interface(&mut self, host: &str, interface: &str, ip: IpAddr) {
        self.hosts
            .entry(host.to_string())
            .or_default()
            .insert(interface.to_string(), ip);
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }
}

impl HostDirectory for StaticHosts {
    /// Interface names win; a selector that is itself an IP is accepted
    /// only if the host owns it.
    fn resolve(&self, host: &str, selector: &str) -> Option<IpAddr> {
        let interfaces = self.hosts.get(host)?;
        if let Some(ip) = interfaces.get(selector) {
            return Some(*ip);
        }
        let literal: IpAddr = selector.parse().ok()?;
        interfaces.values().any(|ip| *ip == literal).then_some(literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> StaticHosts {
        StaticHosts::new()
            .with_interface("alpha", "eth0", "10.0.0.1".parse().unwrap())
            .with_interface("alpha", "eth1", "192.168.1.1".parse().unwrap())
    }

    #[test]
    fn resolves_interface_names() {
        assert_eq!(hosts().resolve("alpha", "eth1"), Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn accepts_owned_literal_ip() {
        assert_eq!(hosts().resolve("alpha", "10.0.0.1"), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(hosts().resolve("alpha", "10.9.9.9"), None);
    }

    #[test]
    fn unknown_host_or_interface_is_none() {
        assert_eq!(hosts().resolve("beta", "eth0"), None);
        assert_eq!(hosts().resolve("alpha", "eth7"), None);
    }

    #[test]
    fn reads_host_table_from_toml() {
        let parsed: StaticHosts = toml::from_str(
            r#"
            [alpha]
            eth0 = "10.0.0.1"
            eth1 = "192.168.1.1"
            "#,
        )
        .unwrap();
        assert_eq!(parsed, hosts());
        assert_eq!(parsed.hosts().collect::<Vec<_>>(), vec!["alpha"]);
    }
}
