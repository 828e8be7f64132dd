//! Application state management

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::backend::{SimulatedBackend, VirshBackend, VirtBackend};
use crate::catalog::{Catalog, FileCatalog};
use crate::errors::{LabError, ResultExt};
use crate::models::records::Deployment;
use crate::models::template::Template;
use crate::orchestrator::{
    FanoutReport, Inspector, LifecycleFanout, Orchestrator, ReconcileReport, Reconciler, Target,
    Verb,
};
use crate::provision::{ImageProvisioner, Provisioner};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{BackendDriver, Settings};

/// Collaborators shared by the CLI, the REST handlers and the workers
pub struct AppState {
    pub settings: Settings,
    pub layout: StorageLayout,
    pub catalog: Arc<dyn Catalog>,
    pub backend: Arc<dyn VirtBackend>,
    pub provisioner: Arc<dyn Provisioner>,

    /// Single writer: builds, lifecycle changes and reconciliation take turns
    write_lock: Mutex<()>,
}

impl AppState {
    /// Wire the collaborators selected by `settings` and prepare storage
    pub async fn init(settings: Settings, layout: StorageLayout) -> Result<Self, LabError> {
        layout
            .setup()
            .await
            .with_context(|| format!("failed to prepare {}", layout.base_dir.display()))?;

        let catalog: Arc<dyn Catalog> = Arc::new(FileCatalog::new(layout.catalog_file()));
        catalog.migrate().await?;

        let backend: Arc<dyn VirtBackend> = match settings.backend.driver {
            BackendDriver::Virsh => Arc::new(VirshBackend::new(
                &settings.backend.virsh_bin,
                &settings.backend.uri,
            )),
            BackendDriver::Simulated => {
                info!("Using the simulated backend, nothing touches the hypervisor");
                Arc::new(SimulatedBackend::new())
            }
        };
        let provisioner: Arc<dyn Provisioner> = Arc::new(ImageProvisioner::new(
            layout.clone(),
            settings.tools.clone(),
        ));

        Ok(Self::from_parts(settings, layout, catalog, backend, provisioner))
    }

    pub fn from_parts(
        settings: Settings,
        layout: StorageLayout,
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn VirtBackend>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            settings,
            layout,
            catalog,
            backend,
            provisioner,
            write_lock: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
            &self.settings.backend.emulator,
        )
    }

    pub fn fanout(&self) -> LifecycleFanout {
        LifecycleFanout::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
        )
    }

    pub fn inspector(&self) -> Inspector {
        Inspector::new(self.catalog.clone(), self.backend.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
        )
    }

    pub async fn build(&self, template: &Template) -> Result<Deployment, LabError> {
        let _guard = self.write_lock.lock().await;
        self.orchestrator().build(template).await
    }

    pub async fn apply(&self, verb: Verb, target: &Target) -> Result<FanoutReport, LabError> {
        let _guard = self.write_lock.lock().await;
        self.fanout().apply(verb, target).await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, LabError> {
        let _guard = self.write_lock.lock().await;
        self.reconciler().run().await
    }
}
