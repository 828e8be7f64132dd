//! Durable record store of deployments, hosts and networks

pub mod file;
pub mod memory;
pub mod tables;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::LabError;
use crate::models::records::{
    BuildIntent, Deployment, DeploymentRecord, HostRecord, NetworkRecord, NewDeployment, RecordId,
};

pub use file::FileCatalog;
pub use memory::MemoryCatalog;
use tables::TableStore;

/// Catalog operations used by the orchestrator and the outer surfaces.
///
/// Lookups return `None` for unknown names; deletes of unknown names fail
/// with `NotFound`.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Idempotent schema check, safe to call before every build
    async fn migrate(&self) -> Result<(), LabError>;

    async fn find_deployment_by_name(&self, name: &str)
        -> Result<Option<DeploymentRecord>, LabError>;

    async fn find_deployment_by_id(&self, id: RecordId)
        -> Result<Option<DeploymentRecord>, LabError>;

    async fn find_host_by_name(&self, name: &str) -> Result<Option<HostRecord>, LabError>;

    async fn find_network_by_name(&self, name: &str) -> Result<Option<NetworkRecord>, LabError>;

    async fn find_network_by_address(&self, address: &str)
        -> Result<Option<NetworkRecord>, LabError>;

    async fn hosts_by_deployment(&self, id: RecordId) -> Result<Vec<HostRecord>, LabError>;

    async fn networks_by_deployment(&self, id: RecordId) -> Result<Vec<NetworkRecord>, LabError>;

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, LabError>;

    async fn list_hosts(&self) -> Result<Vec<HostRecord>, LabError>;

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>, LabError>;

    /// Write a deployment and all its members in one step.
    ///
    /// Fails with `NameConflict` or `AddressConflict` without writing
    /// anything when a uniqueness constraint would be violated.
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, LabError>;

    async fn delete_host(&self, name: &str) -> Result<HostRecord, LabError>;

    async fn delete_network(&self, name: &str) -> Result<NetworkRecord, LabError>;

    /// Remove the deployment row once its members are gone
    async fn delete_deployment(&self, name: &str) -> Result<DeploymentRecord, LabError>;

    async fn put_intent(&self, intent: BuildIntent) -> Result<(), LabError>;

    /// Returns whether the intent existed
    async fn clear_intent(&self, id: Uuid) -> Result<bool, LabError>;

    async fn list_intents(&self) -> Result<Vec<BuildIntent>, LabError>;
}

#[async_trait]
impl<S: TableStore> Catalog for S {
    async fn migrate(&self) -> Result<(), LabError> {
        self.prepare().await
    }

    async fn find_deployment_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DeploymentRecord>, LabError> {
        self.read(|t| t.find_deployment_by_name(name).cloned()).await
    }

    async fn find_deployment_by_id(
        &self,
        id: RecordId,
    ) -> Result<Option<DeploymentRecord>, LabError> {
        self.read(|t| t.find_deployment_by_id(id).cloned()).await
    }

    async fn find_host_by_name(&self, name: &str) -> Result<Option<HostRecord>, LabError> {
        self.read(|t| t.find_host_by_name(name).cloned()).await
    }

    async fn find_network_by_name(&self, name: &str) -> Result<Option<NetworkRecord>, LabError> {
        self.read(|t| t.find_network_by_name(name).cloned()).await
    }

    async fn find_network_by_address(
        &self,
        address: &str,
    ) -> Result<Option<NetworkRecord>, LabError> {
        self.read(|t| t.find_network_by_address(address).cloned())
            .await
    }

    async fn hosts_by_deployment(&self, id: RecordId) -> Result<Vec<HostRecord>, LabError> {
        self.read(|t| t.hosts_by_deployment(id)).await
    }

    async fn networks_by_deployment(&self, id: RecordId) -> Result<Vec<NetworkRecord>, LabError> {
        self.read(|t| t.networks_by_deployment(id)).await
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, LabError> {
        self.read(|t| t.deployments.clone()).await
    }

    async fn list_hosts(&self) -> Result<Vec<HostRecord>, LabError> {
        self.read(|t| t.hosts.clone()).await
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>, LabError> {
        self.read(|t| t.networks.clone()).await
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, LabError> {
        self.write(move |t| t.insert_deployment(new)).await
    }

    async fn delete_host(&self, name: &str) -> Result<HostRecord, LabError> {
        self.write(|t| t.delete_host(name)).await
    }

    async fn delete_network(&self, name: &str) -> Result<NetworkRecord, LabError> {
        self.write(|t| t.delete_network(name)).await
    }

    async fn delete_deployment(&self, name: &str) -> Result<DeploymentRecord, LabError> {
        self.write(|t| t.delete_deployment(name)).await
    }

    async fn put_intent(&self, intent: BuildIntent) -> Result<(), LabError> {
        self.write(move |t| {
            t.put_intent(intent);
            Ok(())
        })
        .await
    }

    async fn clear_intent(&self, id: Uuid) -> Result<bool, LabError> {
        self.write(|t| Ok(t.clear_intent(id))).await
    }

    async fn list_intents(&self) -> Result<Vec<BuildIntent>, LabError> {
        self.read(|t| t.intents.clone()).await
    }
}
