//! Live host state as reported by the backend

use std::collections::BTreeMap;
use std::fmt;

/// Reduced run-state of a host.
///
/// Always fetched from the backend on demand, never stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostState {
    Running,
    Off,

    /// Any other backend state code, kept verbatim
    Unknown(String),
}

impl HostState {
    /// Map a libvirt `domstate` code to the reduced state
    pub fn from_backend_code(code: &str) -> Self {
        match code.trim() {
            "running" => HostState::Running,
            "shut off" => HostState::Off,
            other => HostState::Unknown(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, HostState::Running)
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostState::Running => f.write_str("running"),
            HostState::Off => f.write_str("off"),
            HostState::Unknown(code) if code.is_empty() => f.write_str("unknown"),
            HostState::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

impl serde::Serialize for HostState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One guest interface as seen by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestInterface {
    pub mac: String,
    pub addresses: Vec<String>,
}

/// Guest interfaces keyed by interface name
pub type InterfaceMap = BTreeMap<String, GuestInterface>;
