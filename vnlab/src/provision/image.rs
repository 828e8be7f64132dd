//! Backing-file disks and cloud-init seeds through qemu-img and cloud-localds

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{LabError, ResultExt};
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::template::HostDef;
use crate::provision::cloud_init::{render_meta_data, render_user_data};
use crate::provision::{DiskSet, Provisioner};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::ToolSettings;

/// Provisioner backed by the host's image tooling
#[derive(Debug, Clone)]
pub struct ImageProvisioner {
    layout: StorageLayout,
    tools: ToolSettings,
}

impl ImageProvisioner {
    pub fn new(layout: StorageLayout, tools: ToolSettings) -> Self {
        Self { layout, tools }
    }

    async fn run_tool(&self, bin: &str, args: &[&str], cwd: &Path) -> Result<(), LabError> {
        debug!("Running {} {}", bin, args.join(" "));
        let output = Command::new(bin)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LabError::Provisioning(format!("failed to run {}: {}", bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LabError::Provisioning(format!(
                "{} exited with {}: {}",
                bin,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Create the backing-file disk and the seed image inside `working_dir`
    async fn materialize(
        &self,
        host: &HostDef,
        base_image: &File,
        disks: &DiskSet,
        working_dir: &Dir,
    ) -> Result<(), LabError> {
        let base = base_image.path().to_string_lossy().into_owned();
        let main = disks.main_disk.to_string_lossy().into_owned();
        self.run_tool(
            &self.tools.qemu_img_bin,
            &["create", "-F", "qcow2", "-b", &base, "-f", "qcow2", &main, &host.hd],
            working_dir.path(),
        )
        .await?;

        working_dir
            .file("user-data")
            .write_string(&render_user_data(&host.name, &host.username, &host.password))
            .await?;
        working_dir
            .file("meta-data")
            .write_string(&render_meta_data())
            .await?;

        let seed = disks.seed_disk.to_string_lossy().into_owned();
        self.run_tool(
            &self.tools.cloud_localds_bin,
            &["-v", &seed, "user-data", "meta-data"],
            working_dir.path(),
        )
        .await
    }
}

#[async_trait]
impl Provisioner for ImageProvisioner {
    async fn prepare(&self, host: &HostDef) -> Result<DiskSet, LabError> {
        let base_image = self.layout.images_dir().file(&format!("{}.img", host.image));
        if !base_image.exists().await {
            return Err(LabError::Provisioning(format!(
                "base image {} not found",
                base_image.path().display()
            )));
        }

        let disks = DiskSet::for_host(self.layout.machines_dir().path(), &host.name);
        let working_dir = self.layout.machine_dir(&host.name);
        if working_dir.exists().await {
            return Err(LabError::Provisioning(format!(
                "working directory {} already exists",
                disks.working_dir.display()
            )));
        }
        working_dir
            .create()
            .await
            .with_context(|| format!("failed to create {}", disks.working_dir.display()))?;

        if let Err(e) = self.materialize(host, &base_image, &disks, &working_dir).await {
            if let Err(cleanup) = working_dir.delete().await {
                warn!("Failed to remove {}: {}", disks.working_dir.display(), cleanup);
            }
            return Err(e);
        }

        info!("Provisioned disks for host {}", host.name);
        Ok(disks)
    }

    async fn cleanup(&self, host_name: &str) -> Result<(), LabError> {
        self.layout.machine_dir(host_name).delete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostDef {
        HostDef {
            name: "vm1".into(),
            image: "ubuntu".into(),
            ram: 1024,
            cpus: 1,
            username: "u".into(),
            password: "p".into(),
            networks: vec![],
            hd: "10G".into(),
        }
    }

    #[tokio::test]
    async fn test_missing_base_image_is_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            ImageProvisioner::new(StorageLayout::new(dir.path()), ToolSettings::default());

        let err = provisioner.prepare(&host()).await.unwrap_err();
        assert!(matches!(err, LabError::Provisioning(_)));
        assert!(!dir.path().join("machines/vm1").exists());
    }

    #[tokio::test]
    async fn test_existing_working_dir_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.setup().await.unwrap();
        layout.images_dir().file("ubuntu.img").write_string("").await.unwrap();
        layout.machine_dir("vm1").file("vm1.qcow2").write_string("disk").await.unwrap();

        let provisioner = ImageProvisioner::new(layout, ToolSettings::default());
        let err = provisioner.prepare(&host()).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(dir.path().join("machines/vm1/vm1.qcow2").exists());
    }

    #[tokio::test]
    async fn test_failing_tool_reports_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.setup().await.unwrap();
        layout.images_dir().file("ubuntu.img").write_string("").await.unwrap();

        let tools = ToolSettings {
            qemu_img_bin: "false".into(),
            cloud_localds_bin: "true".into(),
        };
        let provisioner = ImageProvisioner::new(layout, tools);

        let err = provisioner.prepare(&host()).await.unwrap_err();
        assert!(err.to_string().contains("false exited with"));
        assert!(!dir.path().join("machines/vm1").exists());

        provisioner.cleanup("vm1").await.unwrap();
    }
}
