//! In-process backend used for dry runs and the test suite

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{HostHandle, NetworkHandle, VirtBackend};
use crate::descriptor::{HostDescriptor, NetworkDescriptor};
use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::state::{GuestInterface, InterfaceMap};

const RUNNING: &str = "running";
const SHUT_OFF: &str = "shut off";

/// Backend operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    DefineNetwork,
    StartNetwork,
    DestroyNetwork,
    DefineHost,
    StartHost,
    StopHost,
    RestartHost,
    DestroyHost,
    HostState,
    ListInterfaces,
}

impl SimOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimOp::DefineNetwork => "define_network",
            SimOp::StartNetwork => "start_network",
            SimOp::DestroyNetwork => "destroy_network",
            SimOp::DefineHost => "define_host",
            SimOp::StartHost => "start_host",
            SimOp::StopHost => "stop_host",
            SimOp::RestartHost => "restart_host",
            SimOp::DestroyHost => "destroy_host",
            SimOp::HostState => "host_state",
            SimOp::ListInterfaces => "list_interfaces",
        }
    }
}

impl fmt::Display for SimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct SimNetwork {
    descriptor: NetworkDescriptor,
    active: bool,
    autostart: bool,
}

#[derive(Debug)]
struct SimHost {
    descriptor: HostDescriptor,
    state: String,
}

#[derive(Debug, Default)]
struct SimState {
    networks: BTreeMap<String, SimNetwork>,
    hosts: BTreeMap<String, SimHost>,
    failures: HashSet<(SimOp, String)>,
    journal: Vec<String>,
}

/// A backend that keeps every object in memory.
///
/// Mirrors the libvirt rules the orchestrator depends on: names are unique
/// per kind, a network referenced by a defined host cannot be destroyed, and
/// a host only starts when its networks are active.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every future `op` on `name` fail
    pub fn fail_on(&self, op: SimOp, name: impl Into<String>) {
        self.lock().failures.insert((op, name.into()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Force a raw state code onto a defined host
    pub fn set_host_state(&self, name: &str, code: impl Into<String>) {
        if let Some(host) = self.lock().hosts.get_mut(name) {
            host.state = code.into();
        }
    }

    /// Every call made so far as `"<op> <name>"`, failed ones included
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.lock().networks.keys().cloned().collect()
    }

    pub fn host_names(&self) -> Vec<String> {
        self.lock().hosts.keys().cloned().collect()
    }

    pub fn network_active(&self, name: &str) -> bool {
        self.lock()
            .networks
            .get(name)
            .map(|n| n.active && n.autostart)
            .unwrap_or(false)
    }

    /// Journal the call and apply any injected failure
    fn enter(&self, op: SimOp, name: &str) -> Result<MutexGuard<'_, SimState>, LabError> {
        let mut state = self.lock();
        state.journal.push(format!("{} {}", op, name));
        debug!("simulated backend: {} {}", op, name);
        if state.failures.contains(&(op, name.to_string())) {
            return Err(LabError::Backend(format!("injected failure: {} {}", op, name)));
        }
        Ok(state)
    }
}

fn host_mut<'a>(state: &'a mut SimState, name: &str) -> Result<&'a mut SimHost, LabError> {
    state
        .hosts
        .get_mut(name)
        .ok_or_else(|| LabError::not_found(ResourceKind::Host, name))
}

/// Stable locally administered MAC for a host interface
fn simulated_mac(host: &str, index: usize) -> String {
    let seed = host
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    format!(
        "52:54:00:{:02x}:{:02x}:{:02x}",
        (seed >> 8) & 0xff,
        seed & 0xff,
        index & 0xff
    )
}

#[async_trait]
impl VirtBackend for SimulatedBackend {
    async fn define_network(&self, network: &NetworkDescriptor) -> Result<NetworkHandle, LabError> {
        let mut state = self.enter(SimOp::DefineNetwork, &network.name)?;
        if state.networks.contains_key(&network.name) {
            return Err(LabError::Backend(format!(
                "network '{}' already exists",
                network.name
            )));
        }
        state.networks.insert(
            network.name.clone(),
            SimNetwork {
                descriptor: network.clone(),
                active: false,
                autostart: false,
            },
        );
        Ok(NetworkHandle::new(&network.name))
    }

    async fn start_network(&self, handle: &NetworkHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::StartNetwork, &handle.name)?;
        let network = state
            .networks
            .get_mut(&handle.name)
            .ok_or_else(|| LabError::not_found(ResourceKind::Network, &handle.name))?;
        network.autostart = true;
        network.active = true;
        Ok(())
    }

    async fn destroy_network(&self, handle: &NetworkHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::DestroyNetwork, &handle.name)?;
        if !state.networks.contains_key(&handle.name) {
            return Err(LabError::not_found(ResourceKind::Network, &handle.name));
        }
        let user = state
            .hosts
            .values()
            .find(|h| h.descriptor.network_names().any(|n| n == handle.name));
        if let Some(user) = user {
            return Err(LabError::Backend(format!(
                "network '{}' is in use by domain '{}'",
                handle.name, user.descriptor.name
            )));
        }
        state.networks.remove(&handle.name);
        Ok(())
    }

    async fn define_host(&self, host: &HostDescriptor) -> Result<HostHandle, LabError> {
        let mut state = self.enter(SimOp::DefineHost, &host.name)?;
        if state.hosts.contains_key(&host.name) {
            return Err(LabError::Backend(format!(
                "domain '{}' already exists",
                host.name
            )));
        }
        state.hosts.insert(
            host.name.clone(),
            SimHost {
                descriptor: host.clone(),
                state: SHUT_OFF.to_string(),
            },
        );
        Ok(HostHandle::new(&host.name))
    }

    async fn start_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::StartHost, &handle.name)?;
        let inactive = {
            let host = host_mut(&mut state, &handle.name)?;
            if host.state == RUNNING {
                return Err(LabError::Backend(format!(
                    "domain '{}' is already active",
                    handle.name
                )));
            }
            host.descriptor
                .network_names()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        let down = inactive
            .iter()
            .find(|n| !state.networks.get(*n).map(|net| net.active).unwrap_or(false));
        if let Some(down) = down {
            return Err(LabError::Backend(format!("network '{}' is not active", down)));
        }
        host_mut(&mut state, &handle.name)?.state = RUNNING.to_string();
        Ok(())
    }

    async fn stop_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::StopHost, &handle.name)?;
        let host = host_mut(&mut state, &handle.name)?;
        if host.state != RUNNING {
            return Err(LabError::Backend(format!(
                "domain '{}' is not running",
                handle.name
            )));
        }
        host.state = SHUT_OFF.to_string();
        Ok(())
    }

    async fn restart_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::RestartHost, &handle.name)?;
        let host = host_mut(&mut state, &handle.name)?;
        if host.state != RUNNING {
            return Err(LabError::Backend(format!(
                "domain '{}' is not running",
                handle.name
            )));
        }
        Ok(())
    }

    async fn destroy_host(&self, handle: &HostHandle) -> Result<(), LabError> {
        let mut state = self.enter(SimOp::DestroyHost, &handle.name)?;
        state
            .hosts
            .remove(&handle.name)
            .map(|_| ())
            .ok_or_else(|| LabError::not_found(ResourceKind::Host, &handle.name))
    }

    async fn host_state(&self, handle: &HostHandle) -> Result<String, LabError> {
        let mut state = self.enter(SimOp::HostState, &handle.name)?;
        Ok(host_mut(&mut state, &handle.name)?.state.clone())
    }

    async fn list_interfaces(&self, handle: &HostHandle) -> Result<InterfaceMap, LabError> {
        let mut state = self.enter(SimOp::ListInterfaces, &handle.name)?;
        let host = host_mut(&mut state, &handle.name)?;
        if host.state != RUNNING {
            return Ok(InterfaceMap::new());
        }
        let attached: Vec<String> = host
            .descriptor
            .network_names()
            .map(str::to_string)
            .collect();

        let mut interfaces = InterfaceMap::new();
        for (index, network) in attached.iter().enumerate() {
            let addresses = state
                .networks
                .get(network)
                .map(|n| vec![n.descriptor.dhcp.start.clone()])
                .unwrap_or_default();
            interfaces.insert(
                format!("vnet{}", index),
                GuestInterface {
                    mac: simulated_mac(&handle.name, index),
                    addresses,
                },
            );
        }
        Ok(interfaces)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::descriptor::{host_descriptor, network_descriptor};
    use crate::models::template::{HostDef, NetworkDef};
    use crate::provision::DiskSet;

    fn net(name: &str) -> NetworkDescriptor {
        network_descriptor(&NetworkDef {
            name: name.into(),
            netaddr: "10.0.0.1".into(),
            dhcplower: "10.0.0.10".into(),
            dhcpupper: "10.0.0.100".into(),
            netmask: "255.255.255.0".into(),
            forward: "nat".into(),
        })
    }

    fn host(name: &str, networks: &[&str]) -> HostDescriptor {
        let def = HostDef {
            name: name.into(),
            image: "ubuntu".into(),
            ram: 512,
            cpus: 1,
            username: "u".into(),
            password: "p".into(),
            networks: networks.iter().map(|n| n.to_string()).collect(),
            hd: "5G".into(),
        };
        host_descriptor(&def, &DiskSet::for_host(Path::new("/tmp"), name), "qemu")
    }

    #[tokio::test]
    async fn test_network_in_use_cannot_be_destroyed() {
        let backend = SimulatedBackend::new();
        let handle = backend.define_network(&net("net1")).await.unwrap();
        backend.start_network(&handle).await.unwrap();
        let vm = backend.define_host(&host("vm1", &["net1"])).await.unwrap();

        assert!(backend.destroy_network(&handle).await.is_err());
        backend.destroy_host(&vm).await.unwrap();
        backend.destroy_network(&handle).await.unwrap();
        assert!(backend.network_names().is_empty());
    }

    #[tokio::test]
    async fn test_host_lifecycle_and_interfaces() {
        let backend = SimulatedBackend::new();
        let handle = backend.define_network(&net("net1")).await.unwrap();
        backend.start_network(&handle).await.unwrap();
        let vm = backend.define_host(&host("vm1", &["net1"])).await.unwrap();

        assert_eq!(backend.host_state(&vm).await.unwrap(), "shut off");
        assert!(backend.list_interfaces(&vm).await.unwrap().is_empty());

        backend.start_host(&vm).await.unwrap();
        assert_eq!(backend.host_state(&vm).await.unwrap(), "running");
        let interfaces = backend.list_interfaces(&vm).await.unwrap();
        assert_eq!(interfaces["vnet0"].addresses, vec!["10.0.0.10"]);
        assert_eq!(interfaces["vnet0"].mac, simulated_mac("vm1", 0));

        assert!(backend.start_host(&vm).await.is_err());
        backend.stop_host(&vm).await.unwrap();
        assert!(backend.restart_host(&vm).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_is_journaled() {
        let backend = SimulatedBackend::new();
        backend.fail_on(SimOp::DefineNetwork, "net1");

        let err = backend.define_network(&net("net1")).await.unwrap_err();
        assert!(matches!(err, LabError::Backend(_)));
        assert_eq!(backend.journal(), vec!["define_network net1"]);
        assert!(backend.network_names().is_empty());
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let backend = SimulatedBackend::new();
        let err = backend
            .destroy_host(&HostHandle::new("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
