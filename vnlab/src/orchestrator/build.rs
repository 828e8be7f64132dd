//! Deployment build with compensating teardown

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backend::{HostHandle, NetworkHandle, VirtBackend};
use crate::catalog::Catalog;
use crate::descriptor::{host_descriptor, host_record, network_descriptor, network_record};
use crate::errors::{LabError, ResultExt};
use crate::models::records::{BuildIntent, Deployment, NewDeployment, NewHost, NewNetwork};
use crate::models::template::{HostDef, NetworkDef, Template};
use crate::orchestrator::fsm::{BuildEvent, BuildFsm};
use crate::orchestrator::uniqueness::UniquenessValidator;
use crate::provision::Provisioner;

/// Backend objects created so far by one build attempt, in creation order
#[derive(Debug, Default)]
struct Realized {
    networks: Vec<(NetworkHandle, NewNetwork)>,
    hosts: Vec<(HostHandle, NewHost)>,
}

/// Turns templates into committed deployments
pub struct Orchestrator {
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn VirtBackend>,
    provisioner: Arc<dyn Provisioner>,
    validator: UniquenessValidator,
    emulator: String,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn VirtBackend>,
        provisioner: Arc<dyn Provisioner>,
        emulator: impl Into<String>,
    ) -> Self {
        Self {
            validator: UniquenessValidator::new(catalog.clone()),
            catalog,
            backend,
            provisioner,
            emulator: emulator.into(),
        }
    }

    /// Realize every network then every host of `template` and commit the
    /// deployment.
    ///
    /// On failure everything this attempt created is torn down, hosts before
    /// networks, each in reverse creation order, and nothing is written to
    /// the catalog.
    pub async fn build(&self, template: &Template) -> Result<Deployment, LabError> {
        let mut fsm = BuildFsm::new();
        let name = template.name();

        if let Err(e) = self.preflight(template).await {
            advance(&mut fsm, BuildEvent::Fail(e.to_string()));
            return Err(e);
        }

        let intent = BuildIntent::for_template(template);
        self.catalog
            .put_intent(intent.clone())
            .await
            .context("failed to record build intent")?;

        info!(
            "Building deployment {} ({} networks, {} hosts)",
            name,
            template.networks.len(),
            template.hosts.len()
        );
        let mut realized = Realized::default();

        advance(&mut fsm, BuildEvent::ProvisionNetworks);
        for def in &template.networks {
            match self.create_network(def).await {
                Ok(entry) => realized.networks.push(entry),
                Err(e) => {
                    let e = e
                        .context(format!("network {}", def.name))
                        .context("failed to create networks");
                    return Err(self.abort(&mut fsm, &intent, realized, e).await);
                }
            }
        }

        advance(&mut fsm, BuildEvent::ProvisionHosts);
        for def in &template.hosts {
            match self.create_host(def).await {
                Ok(entry) => realized.hosts.push(entry),
                Err(e) => {
                    let e = e
                        .context(format!("host {}", def.name))
                        .context("failed to create hosts");
                    return Err(self.abort(&mut fsm, &intent, realized, e).await);
                }
            }
        }

        let new = NewDeployment {
            name: name.to_string(),
            hosts: realized.hosts.iter().map(|(_, r)| r.clone()).collect(),
            networks: realized.networks.iter().map(|(_, r)| r.clone()).collect(),
        };
        match self.catalog.create_deployment(new).await {
            Ok(deployment) => {
                advance(&mut fsm, BuildEvent::Commit);
                self.clear_intent(&intent).await;
                info!("Deployment {} committed", name);
                Ok(deployment)
            }
            // Someone else took a name or address since the pre-checks; the
            // backend objects are ours and the catalog is unchanged
            Err(e) if e.is_conflict() => {
                let e = e.context("failed to commit deployment");
                Err(self.abort(&mut fsm, &intent, realized, e).await)
            }
            Err(e) => {
                advance(&mut fsm, BuildEvent::CommitFailed(e.to_string()));
                error!(
                    "Deployment {} is realized in the backend but not in the catalog, build intent {} kept for reconciliation",
                    name, intent.id
                );
                Err(e.context("failed to commit deployment"))
            }
        }
    }

    async fn preflight(&self, template: &Template) -> Result<(), LabError> {
        template.validate().context("invalid template")?;
        self.validator.check_template(template)?;
        self.catalog
            .migrate()
            .await
            .context("failed to prepare catalog")?;
        self.validator.check_deployment(template.name()).await
    }

    async fn create_network(
        &self,
        def: &NetworkDef,
    ) -> Result<(NetworkHandle, NewNetwork), LabError> {
        self.validator.check_network(def).await?;

        let descriptor = network_descriptor(def);
        let handle = self.backend.define_network(&descriptor).await?;
        if let Err(e) = self.backend.start_network(&handle).await {
            // Defined but never started, not yet part of the rollback set
            if let Err(undo) = self.backend.destroy_network(&handle).await {
                warn!("Failed to undefine network {}: {}", handle.name, undo);
            }
            return Err(e);
        }

        info!("Created network {}", def.name);
        Ok((handle, network_record(def)))
    }

    async fn create_host(&self, def: &HostDef) -> Result<(HostHandle, NewHost), LabError> {
        self.validator.check_host(def).await?;

        let disks = self.provisioner.prepare(def).await?;
        let descriptor = host_descriptor(def, &disks, &self.emulator);
        match self.backend.define_host(&descriptor).await {
            Ok(handle) => {
                info!("Created host {}", def.name);
                Ok((handle, host_record(def)))
            }
            Err(e) => {
                if let Err(undo) = self.provisioner.cleanup(&def.name).await {
                    warn!("Failed to remove working directory of {}: {}", def.name, undo);
                }
                Err(e)
            }
        }
    }

    /// Roll back and hand `err` back to the caller
    async fn abort(
        &self,
        fsm: &mut BuildFsm,
        intent: &BuildIntent,
        realized: Realized,
        err: LabError,
    ) -> LabError {
        warn!("Build of {} failed: {}", intent.deployment, err);
        advance(fsm, BuildEvent::Fail(err.to_string()));
        let leftovers = self.rollback(realized).await;
        advance(fsm, BuildEvent::RollbackComplete);
        if leftovers == 0 {
            self.clear_intent(intent).await;
        } else {
            warn!(
                "Rollback of {} left {} objects behind, build intent {} kept for reconciliation",
                intent.deployment, leftovers, intent.id
            );
        }
        err
    }

    /// Best-effort teardown; failures are logged and counted, never raised
    async fn rollback(&self, realized: Realized) -> usize {
        let Realized { networks, hosts } = realized;
        let mut leftovers = 0;

        for (handle, _) in hosts.iter().rev() {
            warn!("Rolling back host {}", handle.name);
            if let Err(e) = self.backend.destroy_host(handle).await {
                warn!("Failed to destroy host {} during rollback: {}", handle.name, e);
                leftovers += 1;
            }
            if let Err(e) = self.provisioner.cleanup(&handle.name).await {
                warn!("Failed to remove working directory of {}: {}", handle.name, e);
                leftovers += 1;
            }
        }

        for (handle, _) in networks.iter().rev() {
            warn!("Rolling back network {}", handle.name);
            if let Err(e) = self.backend.destroy_network(handle).await {
                warn!("Failed to destroy network {} during rollback: {}", handle.name, e);
                leftovers += 1;
            }
        }
        leftovers
    }

    async fn clear_intent(&self, intent: &BuildIntent) {
        if let Err(e) = self.catalog.clear_intent(intent.id).await {
            warn!("Failed to clear build intent {}: {}", intent.id, e);
        }
    }
}

fn advance(fsm: &mut BuildFsm, event: BuildEvent) {
    if let Err(e) = fsm.process(event) {
        error!("Build state machine: {}", e);
    }
}
