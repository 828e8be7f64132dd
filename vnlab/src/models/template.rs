//! Declarative deployment templates

use std::net::Ipv4Addr;
use std::path::Path;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::errors::{LabError, ResultExt};
use crate::filesys::file::File;

/// Linux caps interface names (and so bridge names) at 15 bytes
const MAX_BRIDGE_NAME_LEN: usize = 15;

/// A deployment template as written by the user (YAML or JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub deployment: DeploymentDef,

    #[serde(default)]
    pub networks: Vec<NetworkDef>,

    #[serde(default)]
    pub hosts: Vec<HostDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDef {
    #[serde(default)]
    pub name: String,
}

/// A virtual network declared in a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDef {
    pub name: String,
    pub netaddr: String,
    pub dhcplower: String,
    pub dhcpupper: String,
    pub netmask: String,

    /// Forward mode (nat, route, open, ...)
    #[serde(rename = "type")]
    pub forward: String,
}

/// A virtual host declared in a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostDef {
    pub name: String,
    pub image: String,

    /// Memory in MB (libvirt unit "MB", 10^6 bytes)
    pub ram: u32,
    pub cpus: u32,
    pub username: String,
    pub password: String,

    /// Names of the networks the host attaches to
    pub networks: Vec<String>,

    /// Disk size as understood by qemu-img (e.g. "10G")
    pub hd: String,
}

impl Template {
    /// Parse a template from JSON or YAML bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LabError> {
        let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
        let template = if first == Some(&b'{') {
            serde_json::from_slice(bytes)?
        } else {
            serde_yaml::from_slice(bytes)?
        };
        Ok(template)
    }

    /// Read and parse a template file
    pub async fn from_file(path: &Path) -> Result<Self, LabError> {
        let bytes = File::new(path)
            .read_bytes()
            .await
            .with_context(|| format!("failed to read template {}", path.display()))?;
        Self::from_slice(&bytes).with_context(|| format!("in file {}", path.display()))
    }

    pub fn name(&self) -> &str {
        &self.deployment.name
    }

    /// Structural validation. Uniqueness against the catalog happens during the build.
    pub fn validate(&self) -> Result<(), LabError> {
        let mut problems = Vec::new();

        if self.deployment.name.trim().is_empty() {
            problems.push("deployment name is required".to_string());
        }

        for (idx, network) in self.networks.iter().enumerate() {
            network.collect_problems(idx, &mut problems);
        }
        for (idx, host) in self.hosts.iter().enumerate() {
            host.collect_problems(idx, &mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LabError::Validation(problems.join("; ")))
        }
    }
}

impl NetworkDef {
    fn label(&self, idx: usize) -> String {
        if self.name.is_empty() {
            format!("networks[{idx}]")
        } else {
            format!("network {}", self.name)
        }
    }

    fn collect_problems(&self, idx: usize, problems: &mut Vec<String>) {
        let label = self.label(idx);
        let required = [
            ("name", &self.name),
            ("netaddr", &self.netaddr),
            ("dhcplower", &self.dhcplower),
            ("dhcpupper", &self.dhcpupper),
            ("netmask", &self.netmask),
            ("type", &self.forward),
        ];
        let mut missing = false;
        for (field, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{label}: {field} is required"));
                missing = true;
            }
        }
        if self.name.len() > MAX_BRIDGE_NAME_LEN {
            problems.push(format!(
                "{label}: name must be at most {MAX_BRIDGE_NAME_LEN} characters"
            ));
        }
        if missing {
            return;
        }

        if let Err(problem) = self.check_addresses() {
            problems.push(format!("{label}: {problem}"));
        }
    }

    fn check_addresses(&self) -> Result<(), String> {
        let parse = |field: &str, value: &str| {
            value
                .parse::<Ipv4Addr>()
                .map_err(|_| format!("{field} {value} is not an IPv4 address"))
        };
        let addr = parse("netaddr", &self.netaddr)?;
        let lower = parse("dhcplower", &self.dhcplower)?;
        let upper = parse("dhcpupper", &self.dhcpupper)?;
        let mask = parse("netmask", &self.netmask)?;

        let bits = u32::from(mask);
        if bits.leading_ones() + bits.trailing_zeros() != 32 {
            return Err(format!("netmask {mask} is not contiguous"));
        }
        let prefix = bits.leading_ones() as u8;
        let net = Ipv4Net::new(addr, prefix)
            .map_err(|e| format!("invalid prefix for {addr}: {e}"))?
            .trunc();

        if !net.contains(&lower) || !net.contains(&upper) {
            return Err(format!("dhcp range {lower} - {upper} lies outside {net}"));
        }
        if lower > upper {
            return Err(format!("dhcp range {lower} - {upper} is inverted"));
        }
        Ok(())
    }
}

impl HostDef {
    fn collect_problems(&self, idx: usize, problems: &mut Vec<String>) {
        let label = if self.name.is_empty() {
            format!("hosts[{idx}]")
        } else {
            format!("host {}", self.name)
        };
        let required = [
            ("name", &self.name),
            ("image", &self.image),
            ("username", &self.username),
            ("password", &self.password),
            ("hd", &self.hd),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{label}: {field} is required"));
            }
        }
        if self.ram == 0 {
            problems.push(format!("{label}: ram must be greater than zero"));
        }
        if self.cpus == 0 {
            problems.push(format!("{label}: cpus must be greater than zero"));
        }
        if self.networks.iter().any(|n| n.trim().is_empty()) {
            problems.push(format!("{label}: network references must not be empty"));
        }
    }
}
