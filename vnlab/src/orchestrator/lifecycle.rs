//! Lifecycle verbs applied to a host or to every member of a deployment

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{HostHandle, NetworkHandle, VirtBackend};
use crate::catalog::Catalog;
use crate::errors::{LabError, ResultExt};
use crate::models::kind::ResourceKind;
use crate::models::records::{HostRecord, NetworkRecord, RecordId};
use crate::provision::Provisioner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Destroy,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Destroy => "destroy",
        }
    }

    /// Past tense for messages
    pub fn done(&self) -> &'static str {
        match self {
            Verb::Start => "started",
            Verb::Stop => "stopped",
            Verb::Restart => "restarted",
            Verb::Destroy => "destroyed",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Verb::Start),
            "stop" => Ok(Verb::Stop),
            "restart" => Ok(Verb::Restart),
            "destroy" => Ok(Verb::Destroy),
            _ => Err(LabError::Validation(format!("unknown action {}", s))),
        }
    }
}

/// What a lifecycle verb is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub kind: ResourceKind,
    pub name: String,
}

impl Target {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Resources a fan-out went through
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub hosts: Vec<String>,
    pub networks: Vec<String>,

    /// The deployment row itself was deleted
    pub deployment_removed: bool,
}

impl FanoutReport {
    pub fn summary(&self, verb: Verb, target: &Target) -> String {
        match target.kind {
            ResourceKind::Deployment => format!(
                "{} {} ({} hosts, {} networks)",
                target,
                verb.done(),
                self.hosts.len(),
                self.networks.len()
            ),
            _ => format!("{} {}", target, verb.done()),
        }
    }
}

/// Resolves names through the catalog and drives the backend for each member.
///
/// Hosts are handled one at a time in catalog order. The first failure stops
/// the fan-out; transitions already applied stay in place.
pub struct LifecycleFanout {
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn VirtBackend>,
    provisioner: Arc<dyn Provisioner>,
}

impl LifecycleFanout {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn VirtBackend>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            catalog,
            backend,
            provisioner,
        }
    }

    pub async fn apply(&self, verb: Verb, target: &Target) -> Result<FanoutReport, LabError> {
        info!("{} {}", verb, target);
        match (verb, target.kind) {
            (Verb::Destroy, ResourceKind::Deployment) => self.destroy_deployment(&target.name).await,
            (Verb::Destroy, ResourceKind::Host) => {
                let host = self.find_host(&target.name).await?;
                self.destroy_host(&host).await?;
                Ok(FanoutReport {
                    hosts: vec![host.name],
                    ..Default::default()
                })
            }
            (Verb::Destroy, ResourceKind::Network) => {
                let network = self.find_network(&target.name).await?;
                self.destroy_network(&network).await?;
                Ok(FanoutReport {
                    networks: vec![network.name],
                    ..Default::default()
                })
            }
            (_, ResourceKind::Network) => Err(LabError::Validation(format!(
                "networks only support destroy, not {}",
                verb
            ))),
            (_, ResourceKind::Host) => {
                let host = self.find_host(&target.name).await?;
                self.transition(verb, std::slice::from_ref(&host)).await?;
                Ok(FanoutReport {
                    hosts: vec![host.name],
                    ..Default::default()
                })
            }
            (_, ResourceKind::Deployment) => {
                let deployment = self.find_deployment_id(&target.name).await?;
                let hosts = self.catalog.hosts_by_deployment(deployment).await?;
                self.transition(verb, &hosts).await?;
                Ok(FanoutReport {
                    hosts: hosts.into_iter().map(|h| h.name).collect(),
                    ..Default::default()
                })
            }
        }
    }

    async fn find_host(&self, name: &str) -> Result<HostRecord, LabError> {
        self.catalog
            .find_host_by_name(name)
            .await?
            .ok_or_else(|| LabError::not_found(ResourceKind::Host, name))
    }

    async fn find_network(&self, name: &str) -> Result<NetworkRecord, LabError> {
        self.catalog
            .find_network_by_name(name)
            .await?
            .ok_or_else(|| LabError::not_found(ResourceKind::Network, name))
    }

    async fn find_deployment_id(&self, name: &str) -> Result<RecordId, LabError> {
        self.catalog
            .find_deployment_by_name(name)
            .await?
            .map(|d| d.id)
            .ok_or_else(|| LabError::not_found(ResourceKind::Deployment, name))
    }

    async fn transition(&self, verb: Verb, hosts: &[HostRecord]) -> Result<(), LabError> {
        for (done, host) in hosts.iter().enumerate() {
            let handle = HostHandle::new(&host.name);
            let result = match verb {
                Verb::Start => self.backend.start_host(&handle).await,
                Verb::Stop => self.backend.stop_host(&handle).await,
                Verb::Restart => self.backend.restart_host(&handle).await,
                Verb::Destroy => self.destroy_host(host).await,
            };
            result.with_context(|| {
                format!(
                    "failed to {} host {} ({} of {} hosts already {})",
                    verb,
                    host.name,
                    done,
                    hosts.len(),
                    verb.done()
                )
            })?;
            info!("Host {} {}", host.name, verb.done());
        }
        Ok(())
    }

    /// Members first, then the deployment row
    async fn destroy_deployment(&self, name: &str) -> Result<FanoutReport, LabError> {
        let id = self.find_deployment_id(name).await?;
        let hosts = self.catalog.hosts_by_deployment(id).await?;
        let networks = self.catalog.networks_by_deployment(id).await?;

        self.transition(Verb::Destroy, &hosts).await?;
        for network in &networks {
            self.destroy_network(network)
                .await
                .with_context(|| format!("failed to destroy network {}", network.name))?;
        }
        self.catalog
            .delete_deployment(name)
            .await
            .with_context(|| format!("failed to remove deployment {}", name))?;

        info!("Deployment {} destroyed", name);
        Ok(FanoutReport {
            hosts: hosts.into_iter().map(|h| h.name).collect(),
            networks: networks.into_iter().map(|n| n.name).collect(),
            deployment_removed: true,
        })
    }

    /// Backend object, catalog row, then working directory
    async fn destroy_host(&self, host: &HostRecord) -> Result<(), LabError> {
        match self.backend.destroy_host(&HostHandle::new(&host.name)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("Host {} was already gone from the backend", host.name);
            }
            Err(e) => return Err(e),
        }
        self.catalog.delete_host(&host.name).await?;
        self.provisioner.cleanup(&host.name).await
    }

    async fn destroy_network(&self, network: &NetworkRecord) -> Result<(), LabError> {
        match self
            .backend
            .destroy_network(&NetworkHandle::new(&network.name))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("Network {} was already gone from the backend", network.name);
            }
            Err(e) => return Err(e),
        }
        self.catalog.delete_network(&network.name).await?;
        info!("Network {} destroyed", network.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parsing() {
        assert_eq!("Start".parse::<Verb>().unwrap(), Verb::Start);
        assert_eq!("destroy".parse::<Verb>().unwrap(), Verb::Destroy);
        assert!("pause".parse::<Verb>().unwrap_err().is_validation());
    }

    #[test]
    fn test_report_summary() {
        let report = FanoutReport {
            hosts: vec!["vm1".into(), "vm2".into()],
            networks: vec!["net1".into()],
            deployment_removed: true,
        };
        let target = Target::new(ResourceKind::Deployment, "lab1");
        assert_eq!(
            report.summary(Verb::Destroy, &target),
            "deployment lab1 destroyed (2 hosts, 1 networks)"
        );
        let host = Target::new(ResourceKind::Host, "vm1");
        assert_eq!(report.summary(Verb::Stop, &host), "host vm1 stopped");
    }
}
