//! vnlab daemon API models
//!
//! JSON bodies exchanged with the REST surface of the vnlab daemon.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Outcome of a build or lifecycle action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResponse {
    pub success: bool,
    pub deployment: String,
    pub hosts: Vec<String>,
    pub networks: Vec<String>,
}

/// Host details, catalog fields plus live state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDetails {
    pub name: String,
    pub image: String,
    pub state: String,
    pub ram: u32,
    pub cpus: u32,
    pub username: String,
    pub password: String,
    pub hd_space: String,
    pub deployment: String,
}

/// Network summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub net_type: String,
    pub ip: String,
    pub netmask: String,
    pub dhcp_lower: String,
    pub dhcp_upper: String,
    pub deployment: String,
}

/// Deployment summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub hosts: Vec<String>,
    pub networks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Addresses bound to one guest interface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceAddresses {
    pub mac: String,
    pub addresses: Vec<String>,
}

/// Interfaces of a host keyed by interface name
pub type HostInterfaces = BTreeMap<String, InterfaceAddresses>;
