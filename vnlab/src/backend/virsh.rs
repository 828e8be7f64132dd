//! libvirt backend driven through the `virsh` binary

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::{HostHandle, NetworkHandle, VirtBackend};
use crate::descriptor::xml::{render_domain, render_network};
use crate::descriptor::{HostDescriptor, NetworkDescriptor};
use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::state::{GuestInterface, HostState, InterfaceMap};

/// Talks to one libvirt connection URI
#[derive(Debug, Clone)]
pub struct VirshBackend {
    bin: String,
    uri: String,
}

impl VirshBackend {
    pub fn new(bin: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            uri: uri.into(),
        }
    }

    /// Run a virsh subcommand and return its stdout
    async fn virsh(&self, args: &[&str]) -> Result<String, VirshFailure> {
        debug!("{} -c {} {}", self.bin, self.uri, args.join(" "));
        let output = Command::new(&self.bin)
            .arg("-c")
            .arg(&self.uri)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VirshFailure::Spawn(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VirshFailure::Exit(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Define an object from XML staged in a temporary file
    async fn define_from_xml(&self, subcommand: &str, xml: &str) -> Result<(), LabError> {
        let staged = tempfile::Builder::new()
            .prefix("vnlab-")
            .suffix(".xml")
            .tempfile()?;
        tokio::fs::write(staged.path(), xml).await?;

        let path = staged.path().to_string_lossy().into_owned();
        self.virsh(&[subcommand, &path])
            .await
            .map_err(|f| f.into_backend_error())?;
        Ok(())
    }

    async fn object_call(
        &self,
        kind: ResourceKind,
        name: &str,
        args: &[&str],
    ) -> Result<String, LabError> {
        self.virsh(args).await.map_err(|f| f.into_error(kind, name))
    }

    /// Like `object_call` but an "already inactive" refusal counts as success
    async fn deactivate(&self, kind: ResourceKind, name: &str, args: &[&str]) -> Result<(), LabError> {
        match self.virsh(args).await {
            Ok(_) => Ok(()),
            Err(VirshFailure::Exit(stderr)) if is_inactive_refusal(&stderr) => {
                debug!("{} {} already inactive", kind, name);
                Ok(())
            }
            Err(failure) => Err(failure.into_error(kind, name)),
        }
    }
}

enum VirshFailure {
    Spawn(String),
    Exit(String),
}

impl VirshFailure {
    fn into_backend_error(self) -> LabError {
        match self {
            VirshFailure::Spawn(msg) | VirshFailure::Exit(msg) => LabError::Backend(msg),
        }
    }

    fn into_error(self, kind: ResourceKind, name: &str) -> LabError {
        match self {
            VirshFailure::Exit(stderr) if is_missing_object(&stderr) => {
                LabError::not_found(kind, name)
            }
            other => other.into_backend_error(),
        }
    }
}

fn is_inactive_refusal(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("is not running") || stderr.contains("is not active")
}

fn is_missing_object(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("domain not found") || stderr.contains("network not found")
}

#[async_trait]
impl VirtBackend for VirshBackend {
    async fn define_network(&self, network: &NetworkDescriptor) -> Result<NetworkHandle, LabError> {
        self.define_from_xml("net-define", &render_network(network))
            .await?;
        info!("Defined network {}", network.name);
        Ok(NetworkHandle::new(&network.name))
    }

    async fn start_network(&self, handle: &NetworkHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.object_call(ResourceKind::Network, name, &["net-autostart", name])
            .await?;
        self.object_call(ResourceKind::Network, name, &["net-start", name])
            .await?;
        Ok(())
    }

    async fn destroy_network(&self, handle: &NetworkHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.deactivate(ResourceKind::Network, name, &["net-destroy", name])
            .await?;
        self.object_call(ResourceKind::Network, name, &["net-undefine", name])
            .await?;
        info!("Destroyed network {}", name);
        Ok(())
    }

    async fn define_host(&self, host: &HostDescriptor) -> Result<HostHandle, LabError> {
        self.define_from_xml("define", &render_domain(host)).await?;
        info!("Defined host {}", host.name);
        Ok(HostHandle::new(&host.name))
    }

    async fn start_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.object_call(ResourceKind::Host, name, &["start", name])
            .await?;
        Ok(())
    }

    async fn stop_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.object_call(ResourceKind::Host, name, &["shutdown", name])
            .await?;
        Ok(())
    }

    async fn restart_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.object_call(ResourceKind::Host, name, &["reboot", name])
            .await?;
        Ok(())
    }

    async fn destroy_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let name = handle.name.as_str();
        self.deactivate(ResourceKind::Host, name, &["destroy", name])
            .await?;
        self.object_call(ResourceKind::Host, name, &["undefine", name])
            .await?;
        info!("Destroyed host {}", name);
        Ok(())
    }

    async fn host_state(&self, handle: &HostHandle) -> Result<String, LabError> {
        let name = handle.name.as_str();
        let stdout = self
            .object_call(ResourceKind::Host, name, &["domstate", name])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn list_interfaces(&self, handle: &HostHandle) -> Result<InterfaceMap, LabError> {
        let state = HostState::from_backend_code(&self.host_state(handle).await?);
        if !state.is_running() {
            return Ok(InterfaceMap::new());
        }
        let name = handle.name.as_str();
        let stdout = self
            .object_call(ResourceKind::Host, name, &["domifaddr", name])
            .await?;
        Ok(parse_domifaddr(&stdout))
    }
}

/// Parse `virsh domifaddr` output.
///
/// Interfaces with several addresses list the extra ones on lines whose name
/// and MAC columns are `-`. Prefix lengths are dropped.
pub fn parse_domifaddr(output: &str) -> InterfaceMap {
    let mut interfaces = InterfaceMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0] == "Name" || fields[0].starts_with("---") {
            continue;
        }
        let (name, mac, address) = (fields[0], fields[1], fields[3]);
        let address = address.split('/').next().unwrap_or(address).to_string();

        if name == "-" {
            if let Some(entry) = current.as_ref().and_then(|n| interfaces.get_mut(n)) {
                entry.addresses.push(address);
            }
            continue;
        }

        let entry = interfaces
            .entry(name.to_string())
            .or_insert_with(|| GuestInterface {
                mac: mac.to_string(),
                addresses: Vec::new(),
            });
        entry.addresses.push(address);
        current = Some(name.to_string());
    }
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMIFADDR: &str = " Name       MAC address          Protocol     Address
-------------------------------------------------------------------------------
 vnet0      52:54:00:1e:4a:0b    ipv4         10.0.0.12/24
 -          -                    ipv6         fe80::5054:ff:fe1e:4a0b/64
 vnet1      52:54:00:7c:21:9d    ipv4         10.0.1.40/24

";

    #[test]
    fn test_parse_domifaddr_groups_continuation_lines() {
        let interfaces = parse_domifaddr(DOMIFADDR);
        assert_eq!(interfaces.len(), 2);

        let vnet0 = &interfaces["vnet0"];
        assert_eq!(vnet0.mac, "52:54:00:1e:4a:0b");
        assert_eq!(vnet0.addresses, vec!["10.0.0.12", "fe80::5054:ff:fe1e:4a0b"]);
        assert_eq!(interfaces["vnet1"].addresses, vec!["10.0.1.40"]);
    }

    #[test]
    fn test_parse_domifaddr_empty_output() {
        assert!(parse_domifaddr("").is_empty());
    }

    #[test]
    fn test_stderr_classification() {
        assert!(is_inactive_refusal(
            "error: Failed to destroy domain 'vm1'\nerror: Requested operation is not valid: domain is not running"
        ));
        assert!(is_inactive_refusal("error: network is not active"));
        assert!(is_missing_object(
            "error: failed to get domain 'vm9'\nerror: Domain not found: no domain with matching name 'vm9'"
        ));
        assert!(!is_missing_object("error: internal error"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_backend_error() {
        let backend = VirshBackend::new("/nonexistent/virsh", "qemu:///system");
        let err = backend
            .start_host(&HostHandle::new("vm1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LabError::Backend(_)));
    }
}
