//! Virtualization backend capability surface

pub mod simulated;
pub mod virsh;

use async_trait::async_trait;

use crate::descriptor::{HostDescriptor, NetworkDescriptor};
use crate::errors::LabError;
use crate::models::state::InterfaceMap;

pub use simulated::SimulatedBackend;
pub use virsh::VirshBackend;

/// A network object known to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub name: String,
}

impl NetworkHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A host (domain) object known to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHandle {
    pub name: String,
}

impl HostHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Operations the orchestrator needs from a hypervisor
#[async_trait]
pub trait VirtBackend: Send + Sync {
    async fn define_network(&self, network: &NetworkDescriptor) -> Result<NetworkHandle, LabError>;

    /// Mark the network autostart and bring it up
    async fn start_network(&self, handle: &NetworkHandle) -> Result<(), LabError>;

    /// Stop the network if active and remove its definition
    async fn destroy_network(&self, handle: &NetworkHandle) -> Result<(), LabError>;

    async fn define_host(&self, host: &HostDescriptor) -> Result<HostHandle, LabError>;

    async fn start_host(&self, handle: &HostHandle) -> Result<(), LabError>;

    async fn stop_host(&self, handle: &HostHandle) -> Result<(), LabError>;

    async fn restart_host(&self, handle: &HostHandle) -> Result<(), LabError>;

    /// Power off the host if running and remove its definition
    async fn destroy_host(&self, handle: &HostHandle) -> Result<(), LabError>;

    /// Raw backend state code, e.g. `running` or `shut off`
    async fn host_state(&self, handle: &HostHandle) -> Result<String, LabError>;

    async fn list_interfaces(&self, handle: &HostHandle) -> Result<InterfaceMap, LabError>;
}
