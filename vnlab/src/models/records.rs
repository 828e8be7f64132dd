//! Catalog record shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::template::Template;

/// Surrogate id assigned by the catalog
pub type RecordId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: RecordId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: RecordId,
    pub name: String,
    pub image: String,
    pub ram: u32,
    pub cpus: u32,
    pub username: String,
    pub password: String,
    pub hd_space: String,
    pub deployment_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: RecordId,
    pub name: String,
    pub ip: String,
    pub dhcp_lower: String,
    pub dhcp_upper: String,
    pub netmask: String,
    #[serde(rename = "type")]
    pub net_type: String,
    pub deployment_id: RecordId,
}

/// A host realized in the backend, waiting for the deployment commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHost {
    pub name: String,
    pub image: String,
    pub ram: u32,
    pub cpus: u32,
    pub username: String,
    pub password: String,
    pub hd_space: String,
}

/// A network realized in the backend, waiting for the deployment commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNetwork {
    pub name: String,
    pub ip: String,
    pub dhcp_lower: String,
    pub dhcp_upper: String,
    pub netmask: String,
    pub net_type: String,
}

/// Everything the catalog writes in one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub name: String,
    pub hosts: Vec<NewHost>,
    pub networks: Vec<NewNetwork>,
}

/// A committed deployment with its members in declared order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub record: DeploymentRecord,
    pub hosts: Vec<HostRecord>,
    pub networks: Vec<NetworkRecord>,
}

impl Deployment {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// Declares which backend objects a build is about to create.
///
/// Written before the first backend call and cleared once the deployment is
/// committed or fully rolled back. An intent left behind marks a build that
/// died in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIntent {
    pub id: Uuid,
    pub deployment: String,
    pub networks: Vec<String>,
    pub hosts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl BuildIntent {
    pub fn for_template(template: &Template) -> Self {
        Self {
            id: Uuid::new_v4(),
            deployment: template.deployment.name.clone(),
            networks: template.networks.iter().map(|n| n.name.clone()).collect(),
            hosts: template.hosts.iter().map(|h| h.name.clone()).collect(),
            created_at: Utc::now(),
        }
    }
}
