//! Cleanup of builds that died between backend work and catalog commit

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{HostHandle, NetworkHandle, VirtBackend};
use crate::catalog::Catalog;
use crate::errors::LabError;
use crate::models::records::BuildIntent;
use crate::provision::Provisioner;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Intents resolved and removed
    pub intents_cleared: usize,

    /// Intents kept because some teardown failed
    pub intents_kept: usize,
    pub hosts_removed: Vec<String>,
    pub networks_removed: Vec<String>,
    pub failures: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walks outstanding build intents and removes backend objects that never
/// made it into the catalog.
///
/// Must not run concurrently with a build; the daemon holds its build lock.
pub struct Reconciler {
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn VirtBackend>,
    provisioner: Arc<dyn Provisioner>,
}

impl Reconciler {
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

    pub async fn run(&self) -> Result<ReconcileReport, LabError> {
        self.catalog.migrate().await?;
        let mut report = ReconcileReport::default();

        for intent in self.catalog.list_intents().await? {
            if self.is_committed(&intent).await? {
                info!(
                    "Build intent {} for {} was committed, clearing",
                    intent.id, intent.deployment
                );
            } else {
                warn!(
                    "Build intent {} for {} never committed, removing its backend objects",
                    intent.id, intent.deployment
                );
                let failures_before = report.failures.len();
                self.sweep(&intent, &mut report).await?;
                if report.failures.len() > failures_before {
                    report.intents_kept += 1;
                    continue;
                }
            }
            self.catalog.clear_intent(intent.id).await?;
            report.intents_cleared += 1;
        }
        Ok(report)
    }

    async fn is_committed(&self, intent: &BuildIntent) -> Result<bool, LabError> {
        Ok(self
            .catalog
            .find_deployment_by_name(&intent.deployment)
            .await?
            .map(|d| d.created_at >= intent.created_at)
            .unwrap_or(false))
    }

    /// Hosts before networks, each in reverse declared order. Objects that
    /// have a catalog record belong to someone else and are left alone.
    async fn sweep(&self, intent: &BuildIntent, report: &mut ReconcileReport) -> Result<(), LabError> {
        for name in intent.hosts.iter().rev() {
            if self.catalog.find_host_by_name(name).await?.is_some() {
                continue;
            }
            match self.backend.destroy_host(&HostHandle::new(name)).await {
                Ok(()) => report.hosts_removed.push(name.clone()),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    report.failures.push(format!("host {}: {}", name, e));
                    continue;
                }
            }
            if let Err(e) = self.provisioner.cleanup(name).await {
                report
                    .failures
                    .push(format!("host {} working directory: {}", name, e));
            }
        }

        for name in intent.networks.iter().rev() {
            if self.catalog.find_network_by_name(name).await?.is_some() {
                continue;
            }
            match self.backend.destroy_network(&NetworkHandle::new(name)).await {
                Ok(()) => report.networks_removed.push(name.clone()),
                Err(e) if e.is_not_found() => {}
                Err(e) => report.failures.push(format!("network {}: {}", name, e)),
            }
        }
        Ok(())
    }
}
