//! Catalog tables shared by every store

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::records::{
    BuildIntent, Deployment, DeploymentRecord, HostRecord, NetworkRecord, NewDeployment, RecordId,
};

/// Bumped whenever the serialized table layout changes
pub const SCHEMA_VERSION: u32 = 1;

/// All catalog rows, each table in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTables {
    pub schema_version: u32,
    pub next_id: RecordId,

    #[serde(default)]
    pub deployments: Vec<DeploymentRecord>,

    #[serde(default)]
    pub hosts: Vec<HostRecord>,

    #[serde(default)]
    pub networks: Vec<NetworkRecord>,

    #[serde(default)]
    pub intents: Vec<BuildIntent>,
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogTables {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            next_id: 1,
            deployments: Vec::new(),
            hosts: Vec::new(),
            networks: Vec::new(),
            intents: Vec::new(),
        }
    }

    pub fn check_version(&self) -> Result<(), LabError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(LabError::Persistence(format!(
                "catalog schema version {} is not supported (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn find_deployment_by_name(&self, name: &str) -> Option<&DeploymentRecord> {
        self.deployments.iter().find(|d| d.name == name)
    }

    pub fn find_deployment_by_id(&self, id: RecordId) -> Option<&DeploymentRecord> {
        self.deployments.iter().find(|d| d.id == id)
    }

    pub fn find_host_by_name(&self, name: &str) -> Option<&HostRecord> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn find_network_by_name(&self, name: &str) -> Option<&NetworkRecord> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn find_network_by_address(&self, address: &str) -> Option<&NetworkRecord> {
        self.networks.iter().find(|n| n.ip == address)
    }

    pub fn hosts_by_deployment(&self, id: RecordId) -> Vec<HostRecord> {
        self.hosts
            .iter()
            .filter(|h| h.deployment_id == id)
            .cloned()
            .collect()
    }

    pub fn networks_by_deployment(&self, id: RecordId) -> Vec<NetworkRecord> {
        self.networks
            .iter()
            .filter(|n| n.deployment_id == id)
            .cloned()
            .collect()
    }

    /// Insert a deployment with its members.
    ///
    /// Every uniqueness constraint is checked before the first row is
    /// written, so a violation leaves the tables untouched.
    pub fn insert_deployment(&mut self, new: NewDeployment) -> Result<Deployment, LabError> {
        self.check_new_deployment(&new)?;

        let deployment_id = self.allocate_id();
        let record = DeploymentRecord {
            id: deployment_id,
            name: new.name,
            created_at: Utc::now(),
        };
        self.deployments.push(record.clone());

        let mut networks = Vec::with_capacity(new.networks.len());
        for network in new.networks {
            let row = NetworkRecord {
                id: self.allocate_id(),
                name: network.name,
                ip: network.ip,
                dhcp_lower: network.dhcp_lower,
                dhcp_upper: network.dhcp_upper,
                netmask: network.netmask,
                net_type: network.net_type,
                deployment_id,
            };
            self.networks.push(row.clone());
            networks.push(row);
        }

        let mut hosts = Vec::with_capacity(new.hosts.len());
        for host in new.hosts {
            let row = HostRecord {
                id: self.allocate_id(),
                name: host.name,
                image: host.image,
                ram: host.ram,
                cpus: host.cpus,
                username: host.username,
                password: host.password,
                hd_space: host.hd_space,
                deployment_id,
            };
            self.hosts.push(row.clone());
            hosts.push(row);
        }

        Ok(Deployment {
            record,
            hosts,
            networks,
        })
    }

    fn check_new_deployment(&self, new: &NewDeployment) -> Result<(), LabError> {
        if self.find_deployment_by_name(&new.name).is_some() {
            return Err(LabError::name_conflict(ResourceKind::Deployment, &new.name));
        }

        for (i, network) in new.networks.iter().enumerate() {
            let earlier = &new.networks[..i];
            if self.find_network_by_name(&network.name).is_some()
                || earlier.iter().any(|n| n.name == network.name)
            {
                return Err(LabError::name_conflict(ResourceKind::Network, &network.name));
            }
            if let Some(holder) = self.find_network_by_address(&network.ip) {
                return Err(LabError::AddressConflict {
                    address: network.ip.clone(),
                    holder: holder.name.clone(),
                });
            }
            if let Some(holder) = earlier.iter().find(|n| n.ip == network.ip) {
                return Err(LabError::AddressConflict {
                    address: network.ip.clone(),
                    holder: holder.name.clone(),
                });
            }
        }

        for (i, host) in new.hosts.iter().enumerate() {
            if self.find_host_by_name(&host.name).is_some()
                || new.hosts[..i].iter().any(|h| h.name == host.name)
            {
                return Err(LabError::name_conflict(ResourceKind::Host, &host.name));
            }
        }
        Ok(())
    }

    pub fn delete_host(&mut self, name: &str) -> Result<HostRecord, LabError> {
        let index = self
            .hosts
            .iter()
            .position(|h| h.name == name)
            .ok_or_else(|| LabError::not_found(ResourceKind::Host, name))?;
        Ok(self.hosts.remove(index))
    }

    pub fn delete_network(&mut self, name: &str) -> Result<NetworkRecord, LabError> {
        let index = self
            .networks
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| LabError::not_found(ResourceKind::Network, name))?;
        Ok(self.networks.remove(index))
    }

    /// Remove a deployment row; its members must already be gone
    pub fn delete_deployment(&mut self, name: &str) -> Result<DeploymentRecord, LabError> {
        let index = self
            .deployments
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| LabError::not_found(ResourceKind::Deployment, name))?;
        let id = self.deployments[index].id;
        let members = self.hosts.iter().filter(|h| h.deployment_id == id).count()
            + self.networks.iter().filter(|n| n.deployment_id == id).count();
        if members > 0 {
            return Err(LabError::Persistence(format!(
                "deployment {} still has {} members",
                name, members
            )));
        }
        Ok(self.deployments.remove(index))
    }

    pub fn put_intent(&mut self, intent: BuildIntent) {
        self.intents.retain(|i| i.id != intent.id);
        self.intents.push(intent);
    }

    /// Returns whether an intent was removed
    pub fn clear_intent(&mut self, id: Uuid) -> bool {
        let before = self.intents.len();
        self.intents.retain(|i| i.id != id);
        self.intents.len() != before
    }
}

/// Storage that can lend out the tables for reading and transactional writes
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create or verify the backing storage
    async fn prepare(&self) -> Result<(), LabError>;

    async fn read<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&CatalogTables) -> R + Send;

    /// Apply `f`; the change is kept only when `f` succeeds
    async fn write<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&mut CatalogTables) -> Result<R, LabError> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::{NewHost, NewNetwork};

    fn network(name: &str, ip: &str) -> NewNetwork {
        NewNetwork {
            name: name.into(),
            ip: ip.into(),
            dhcp_lower: "x".into(),
            dhcp_upper: "y".into(),
            netmask: "255.255.255.0".into(),
            net_type: "nat".into(),
        }
    }

    fn host(name: &str) -> NewHost {
        NewHost {
            name: name.into(),
            image: "ubuntu".into(),
            ram: 1024,
            cpus: 1,
            username: "u".into(),
            password: "p".into(),
            hd_space: "10G".into(),
        }
    }

    fn lab(name: &str, net: NewNetwork, vm: NewHost) -> NewDeployment {
        NewDeployment {
            name: name.into(),
            networks: vec![net],
            hosts: vec![vm],
        }
    }

    #[test]
    fn test_insert_assigns_ids_and_membership() {
        let mut tables = CatalogTables::new();
        let deployment = tables
            .insert_deployment(lab("lab1", network("net1", "10.0.0.0"), host("vm1")))
            .unwrap();

        assert_eq!(deployment.name(), "lab1");
        assert_eq!(deployment.hosts[0].deployment_id, deployment.record.id);
        assert_eq!(tables.hosts_by_deployment(deployment.record.id).len(), 1);
        assert_eq!(tables.networks_by_deployment(deployment.record.id).len(), 1);
        assert_ne!(deployment.hosts[0].id, deployment.networks[0].id);
    }

    #[test]
    fn test_address_conflict_across_deployments_writes_nothing() {
        let mut tables = CatalogTables::new();
        tables
            .insert_deployment(lab("lab1", network("net1", "10.0.0.0"), host("vm1")))
            .unwrap();
        let snapshot = tables.clone();

        let err = tables
            .insert_deployment(lab("lab2", network("net2", "10.0.0.0"), host("vm2")))
            .unwrap_err();
        assert_eq!(err.to_string(), "network address 10.0.0.0 already used by net1");
        assert_eq!(tables, snapshot);
    }

    #[test]
    fn test_host_name_conflict() {
        let mut tables = CatalogTables::new();
        tables
            .insert_deployment(lab("lab1", network("net1", "10.0.0.0"), host("vm1")))
            .unwrap();

        let err = tables
            .insert_deployment(lab("lab2", network("net2", "10.0.1.0"), host("vm1")))
            .unwrap_err();
        assert!(matches!(
            err,
            LabError::NameConflict {
                kind: ResourceKind::Host,
                ..
            }
        ));
    }

    #[test]
    fn test_delete_deployment_requires_empty_membership() {
        let mut tables = CatalogTables::new();
        tables
            .insert_deployment(lab("lab1", network("net1", "10.0.0.0"), host("vm1")))
            .unwrap();

        assert!(tables.delete_deployment("lab1").is_err());
        tables.delete_host("vm1").unwrap();
        tables.delete_network("net1").unwrap();
        tables.delete_deployment("lab1").unwrap();
        assert!(tables.find_deployment_by_name("lab1").is_none());
        assert!(tables.delete_host("vm1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_schema_version_mismatch() {
        let mut tables = CatalogTables::new();
        tables.schema_version = 99;
        assert!(matches!(
            tables.check_version(),
            Err(LabError::Persistence(_))
        ));
    }
}
