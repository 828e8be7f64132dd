//! Settings file management

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{LabError, ResultExt};
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// vnlab settings, read from `settings.json` in the state directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rotated log files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Virtualization backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// External image tooling
    #[serde(default)]
    pub tools: ToolSettings,

    /// REST daemon configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Refuse to run unless invoked as root
    #[serde(default = "default_true")]
    pub require_root: bool,

    /// Seconds between background reconciliation passes, 0 disables the worker
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            backend: BackendSettings::default(),
            tools: ToolSettings::default(),
            server: ServerSettings::default(),
            require_root: true,
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub async fn load_or_default(file: &File) -> Result<Self, LabError> {
        if !file.exists().await {
            debug!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json()
            .await
            .map_err(|e| LabError::Config(e.to_string()))
            .with_context(|| format!("failed to read settings {}", file.path().display()))
    }
}

/// Which backend driver to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendDriver {
    /// libvirt through the virsh binary
    #[default]
    Virsh,

    /// In-process simulation, nothing touches the hypervisor
    Simulated,
}

/// Virtualization backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub driver: BackendDriver,

    /// libvirt connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_virsh_bin")]
    pub virsh_bin: String,

    /// Emulator binary referenced by host descriptors
    #[serde(default = "default_emulator")]
    pub emulator: String,
}

fn default_uri() -> String {
    "qemu:///system".to_string()
}

fn default_virsh_bin() -> String {
    "virsh".to_string()
}

fn default_emulator() -> String {
    "/usr/bin/qemu-system-x86_64".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            driver: BackendDriver::default(),
            uri: default_uri(),
            virsh_bin: default_virsh_bin(),
            emulator: default_emulator(),
        }
    }
}

/// Image tooling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_qemu_img")]
    pub qemu_img_bin: String,

    #[serde(default = "default_cloud_localds")]
    pub cloud_localds_bin: String,
}

fn default_qemu_img() -> String {
    "qemu-img".to_string()
}

fn default_cloud_localds() -> String {
    "cloud-localds".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            qemu_img_bin: default_qemu_img(),
            cloud_localds_bin: default_cloud_localds(),
        }
    }
}

/// REST daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"log_level":"debug","backend":{"driver":"simulated"}}"#)
                .unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.backend.driver, BackendDriver::Simulated);
        assert_eq!(settings.backend.uri, "qemu:///system");
        assert_eq!(settings.server.port, 8000);
        assert!(settings.require_root);
        assert_eq!(settings.reconcile_interval_secs, 300);
    }
}
