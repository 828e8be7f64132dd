//! Name and address checks against the catalog

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::template::{HostDef, NetworkDef, Template};

/// Checks one proposed resource at a time, right before it is created
#[derive(Clone)]
pub struct UniquenessValidator {
    catalog: Arc<dyn Catalog>,
}

impl UniquenessValidator {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn check_deployment(&self, name: &str) -> Result<(), LabError> {
        if self.catalog.find_deployment_by_name(name).await?.is_some() {
            return Err(LabError::name_conflict(ResourceKind::Deployment, name));
        }
        Ok(())
    }

    /// Name first, then address
    pub async fn check_network(&self, network: &NetworkDef) -> Result<(), LabError> {
        if self
            .catalog
            .find_network_by_name(&network.name)
            .await?
            .is_some()
        {
            return Err(LabError::name_conflict(ResourceKind::Network, &network.name));
        }
        if let Some(holder) = self
            .catalog
            .find_network_by_address(&network.netaddr)
            .await?
        {
            return Err(LabError::AddressConflict {
                address: network.netaddr.clone(),
                holder: holder.name,
            });
        }
        Ok(())
    }

    pub async fn check_host(&self, host: &HostDef) -> Result<(), LabError> {
        if self.catalog.find_host_by_name(&host.name).await?.is_some() {
            return Err(LabError::name_conflict(ResourceKind::Host, &host.name));
        }
        Ok(())
    }

    /// Conflicts between the template's own declarations, found before the
    /// backend is touched. The earlier declaration holds the name or address.
    pub fn check_template(&self, template: &Template) -> Result<(), LabError> {
        let mut names = HashSet::new();
        let mut addresses: HashMap<&str, &str> = HashMap::new();
        for network in &template.networks {
            if !names.insert(network.name.as_str()) {
                return Err(LabError::name_conflict(ResourceKind::Network, &network.name));
            }
            if let Some(holder) = addresses.get(network.netaddr.as_str()) {
                return Err(LabError::AddressConflict {
                    address: network.netaddr.clone(),
                    holder: holder.to_string(),
                });
            }
            addresses.insert(&network.netaddr, &network.name);
        }

        let mut hosts = HashSet::new();
        for host in &template.hosts {
            if !hosts.insert(host.name.as_str()) {
                return Err(LabError::name_conflict(ResourceKind::Host, &host.name));
            }
        }
        Ok(())
    }
}
