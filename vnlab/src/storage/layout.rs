//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::LabError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Default state directory on the hypervisor host
pub const DEFAULT_BASE_DIR: &str = "/var/lib/vnlab";

/// Storage layout for vnlab, every path derived from one base directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the catalog file path
    pub fn catalog_file(&self) -> File {
        File::new(self.base_dir.join("catalog.json"))
    }

    /// Base images, looked up as `<image>.img`
    pub fn images_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("images"))
    }

    /// Per-host working directories
    pub fn machines_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("machines"))
    }

    /// Working directory of a single host
    pub fn machine_dir(&self, host_name: &str) -> Dir {
        self.machines_dir().subdir(host_name)
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), LabError> {
        Dir::new(&self.base_dir).create().await?;
        self.images_dir().create().await?;
        self.machines_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}
