//! Utility functions

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::errors::LabError;

/// Version information for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Fail unless the effective user is root
pub async fn assert_root() -> Result<(), LabError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .await
        .map_err(|e| LabError::Permission(format!("failed to run id -u: {}", e)))?;

    let uid = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() || uid.trim() != "0" {
        return Err(LabError::Permission(
            "vnlab must be run as root".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_has_package_version() {
        let version = version_info();
        assert_eq!(version.version, env!("CARGO_PKG_VERSION"));
        assert!(!version.git_hash.is_empty());
    }
}
