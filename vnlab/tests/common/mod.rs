//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use vnlab::app::state::AppState;
use vnlab::backend::SimulatedBackend;
use vnlab::catalog::{Catalog, MemoryCatalog};
use vnlab::errors::LabError;
use vnlab::models::records::NewDeployment;
use vnlab::models::template::{DeploymentDef, HostDef, NetworkDef, Template};
use vnlab::orchestrator::{LifecycleFanout, Orchestrator, Reconciler};
use vnlab::provision::{DiskSet, Provisioner};
use vnlab::storage::layout::StorageLayout;
use vnlab::storage::settings::Settings;

pub const EMULATOR: &str = "/usr/bin/qemu-system-x86_64";

pub fn network(name: &str, third_octet: u8) -> NetworkDef {
    NetworkDef {
        name: name.into(),
        netaddr: format!("10.0.{third_octet}.0"),
        dhcplower: format!("10.0.{third_octet}.10"),
        dhcpupper: format!("10.0.{third_octet}.100"),
        netmask: "255.255.255.0".into(),
        forward: "nat".into(),
    }
}

pub fn host(name: &str, networks: &[&str]) -> HostDef {
    HostDef {
        name: name.into(),
        image: "ubuntu".into(),
        ram: 1024,
        cpus: 1,
        username: "u".into(),
        password: "p".into(),
        networks: networks.iter().map(|n| n.to_string()).collect(),
        hd: "10G".into(),
    }
}

pub fn template(name: &str, networks: Vec<NetworkDef>, hosts: Vec<HostDef>) -> Template {
    Template {
        deployment: DeploymentDef { name: name.into() },
        networks,
        hosts,
    }
}

/// One network, one host
pub fn lab1() -> Template {
    template("lab1", vec![network("net1", 0)], vec![host("vm1", &["net1"])])
}

/// Two networks, two hosts
pub fn lab2() -> Template {
    template(
        "lab2",
        vec![network("net1", 1), network("net2", 2)],
        vec![host("vm1", &["net1"]), host("vm2", &["net1", "net2"])],
    )
}

pub const LAB1_YAML: &str = r#"
deployment:
  name: lab1
networks:
  - name: net1
    netaddr: 10.0.0.0
    dhcplower: 10.0.0.10
    dhcpupper: 10.0.0.100
    netmask: 255.255.255.0
    type: nat
hosts:
  - name: vm1
    image: ubuntu
    ram: 1024
    cpus: 1
    username: u
    password: p
    networks: [net1]
    hd: 10G
"#;

#[derive(Default)]
struct Recorded {
    prepared: Vec<String>,
    cleaned: Vec<String>,
    failing: HashSet<String>,
    intruder: Option<(Arc<MemoryCatalog>, NewDeployment)>,
}

/// Provisioner that touches no disk and records what it was asked to do
pub struct RecordingProvisioner {
    machines_dir: PathBuf,
    recorded: Mutex<Recorded>,
}

impl RecordingProvisioner {
    pub fn new(machines_dir: &Path) -> Self {
        Self {
            machines_dir: machines_dir.to_path_buf(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn fail_for(&self, host: &str) {
        self.recorded.lock().unwrap().failing.insert(host.to_string());
    }

    /// Commit `new` into `catalog` during the next prepare, like a concurrent writer would
    pub fn intrude_with(&self, catalog: Arc<MemoryCatalog>, new: NewDeployment) {
        self.recorded.lock().unwrap().intruder = Some((catalog, new));
    }

    pub fn prepared(&self) -> Vec<String> {
        self.recorded.lock().unwrap().prepared.clone()
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.recorded.lock().unwrap().cleaned.clone()
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn prepare(&self, host: &HostDef) -> Result<DiskSet, LabError> {
        let intruder = {
            let mut recorded = self.recorded.lock().unwrap();
            if recorded.failing.contains(&host.name) {
                return Err(LabError::Provisioning(format!(
                    "no base image for {}",
                    host.name
                )));
            }
            recorded.prepared.push(host.name.clone());
            recorded.intruder.take()
        };
        if let Some((catalog, new)) = intruder {
            catalog.create_deployment(new).await?;
        }
        Ok(DiskSet::for_host(&self.machines_dir, &host.name))
    }

    async fn cleanup(&self, host_name: &str) -> Result<(), LabError> {
        self.recorded
            .lock()
            .unwrap()
            .cleaned
            .push(host_name.to_string());
        Ok(())
    }
}

/// Catalog, backend and provisioner wired together in memory
pub struct Lab {
    pub dir: TempDir,
    pub catalog: Arc<MemoryCatalog>,
    pub backend: Arc<SimulatedBackend>,
    pub provisioner: Arc<RecordingProvisioner>,
}

impl Lab {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let provisioner = Arc::new(RecordingProvisioner::new(&dir.path().join("machines")));
        Self {
            dir,
            catalog: Arc::new(MemoryCatalog::new()),
            backend: Arc::new(SimulatedBackend::new()),
            provisioner,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
            EMULATOR,
        )
    }

    pub fn fanout(&self) -> LifecycleFanout {
        LifecycleFanout::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
        )
    }

    pub fn app_state(&self) -> Arc<AppState> {
        let settings = Settings {
            require_root: false,
            ..Settings::default()
        };
        Arc::new(AppState::from_parts(
            settings,
            StorageLayout::new(self.dir.path()),
            self.catalog.clone(),
            self.backend.clone(),
            self.provisioner.clone(),
        ))
    }
}
