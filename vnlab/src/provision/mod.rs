//! Disk and seed materialization for hosts

pub mod cloud_init;
pub mod image;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::LabError;
use crate::models::template::HostDef;

pub use image::ImageProvisioner;

/// The files a host boots from, all inside its working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSet {
    pub working_dir: PathBuf,
    pub main_disk: PathBuf,
    pub seed_disk: PathBuf,
}

impl DiskSet {
    /// `<machines>/<name>/<name>.qcow2` and `<machines>/<name>/<name>-seed.qcow2`
    pub fn for_host(machines_dir: &Path, name: &str) -> Self {
        let working_dir = machines_dir.join(name);
        Self {
            main_disk: working_dir.join(format!("{name}.qcow2")),
            seed_disk: working_dir.join(format!("{name}-seed.qcow2")),
            working_dir,
        }
    }
}

/// Produces ready-to-attach disks for a host and removes them again
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn prepare(&self, host: &HostDef) -> Result<DiskSet, LabError>;

    /// Remove the host working directory; a missing directory is not an error
    async fn cleanup(&self, host_name: &str) -> Result<(), LabError>;
}
