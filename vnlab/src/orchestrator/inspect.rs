//! Catalog views joined with live backend state

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::warn;

use crate::backend::{HostHandle, VirtBackend};
use crate::catalog::Catalog;
use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::records::{DeploymentRecord, HostRecord, NetworkRecord, RecordId};
use crate::models::state::{HostState, InterfaceMap};

/// A host record with its live state and owning deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostView {
    pub record: HostRecord,
    pub state: HostState,
    pub deployment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkView {
    pub record: NetworkRecord,
    pub deployment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentView {
    pub record: DeploymentRecord,
    pub hosts: Vec<String>,
    pub networks: Vec<String>,
}

/// Live interfaces of one cataloged host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInterfacesView {
    pub host: String,
    pub deployment: String,
    pub interfaces: InterfaceMap,
}

/// Read-only queries. Live values are fetched from the backend on every call.
pub struct Inspector {
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn VirtBackend>,
}

impl Inspector {
    pub fn new(catalog: Arc<dyn Catalog>, backend: Arc<dyn VirtBackend>) -> Self {
        Self { catalog, backend }
    }

    pub async fn host_state(&self, name: &str) -> Result<HostState, LabError> {
        let code = self.backend.host_state(&HostHandle::new(name)).await?;
        Ok(HostState::from_backend_code(&code))
    }

    pub async fn host_interfaces(&self, name: &str) -> Result<InterfaceMap, LabError> {
        self.backend.list_interfaces(&HostHandle::new(name)).await
    }

    /// Interfaces with only their IPv4 addresses, interfaces without one dropped
    pub async fn host_ipv4(&self, name: &str) -> Result<InterfaceMap, LabError> {
        Ok(ipv4_only(self.host_interfaces(name).await?))
    }

    pub async fn host_details(&self, name: &str) -> Result<HostView, LabError> {
        let record = self
            .catalog
            .find_host_by_name(name)
            .await?
            .ok_or_else(|| LabError::not_found(ResourceKind::Host, name))?;
        let state = self.host_state(name).await?;
        let deployment = self.deployment_name(record.deployment_id).await?;
        Ok(HostView {
            record,
            state,
            deployment,
        })
    }

    /// Every cataloged host; a host the backend cannot report on shows as unknown
    pub async fn all_host_details(&self) -> Result<Vec<HostView>, LabError> {
        let names = self.deployment_names().await?;
        let mut views = Vec::new();
        for record in self.catalog.list_hosts().await? {
            let state = self.host_state(&record.name).await.unwrap_or_else(|e| {
                warn!("Failed to query state of host {}: {}", record.name, e);
                HostState::Unknown(String::new())
            });
            views.push(HostView {
                deployment: lookup(&names, record.deployment_id),
                record,
                state,
            });
        }
        Ok(views)
    }

    /// Interfaces of every cataloged host; unreachable hosts list none
    pub async fn all_host_interfaces(&self) -> Result<Vec<HostInterfacesView>, LabError> {
        let names = self.deployment_names().await?;
        let mut views = Vec::new();
        for record in self.catalog.list_hosts().await? {
            let interfaces = self
                .host_interfaces(&record.name)
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to list interfaces of host {}: {}", record.name, e);
                    InterfaceMap::new()
                });
            views.push(HostInterfacesView {
                deployment: lookup(&names, record.deployment_id),
                host: record.name,
                interfaces,
            });
        }
        Ok(views)
    }

    pub async fn networks(&self) -> Result<Vec<NetworkView>, LabError> {
        let names = self.deployment_names().await?;
        Ok(self
            .catalog
            .list_networks()
            .await?
            .into_iter()
            .map(|record| NetworkView {
                deployment: lookup(&names, record.deployment_id),
                record,
            })
            .collect())
    }

    pub async fn deployments(&self) -> Result<Vec<DeploymentView>, LabError> {
        let mut views = Vec::new();
        for record in self.catalog.list_deployments().await? {
            let hosts = self.catalog.hosts_by_deployment(record.id).await?;
            let networks = self.catalog.networks_by_deployment(record.id).await?;
            views.push(DeploymentView {
                record,
                hosts: hosts.into_iter().map(|h| h.name).collect(),
                networks: networks.into_iter().map(|n| n.name).collect(),
            });
        }
        Ok(views)
    }

    async fn deployment_name(&self, id: RecordId) -> Result<String, LabError> {
        Ok(self
            .catalog
            .find_deployment_by_id(id)
            .await?
            .map(|d| d.name)
            .unwrap_or_default())
    }

    async fn deployment_names(&self) -> Result<HashMap<RecordId, String>, LabError> {
        Ok(self
            .catalog
            .list_deployments()
            .await?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect())
    }
}

fn lookup(names: &HashMap<RecordId, String>, id: RecordId) -> String {
    names.get(&id).cloned().unwrap_or_default()
}

pub fn ipv4_only(interfaces: InterfaceMap) -> InterfaceMap {
    interfaces
        .into_iter()
        .filter_map(|(name, mut iface)| {
            iface.addresses.retain(|a| a.parse::<Ipv4Addr>().is_ok());
            (!iface.addresses.is_empty()).then_some((name, iface))
        })
        .collect()
}
