//! Build state machine

use serde::{Deserialize, Serialize};

/// Phase of a single build attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Validated, nothing touched yet
    Pending,

    ProvisioningNetworks,

    ProvisioningHosts,

    /// Deployment written to the catalog
    Committed,

    /// Tearing down what this attempt created
    RollingBack,

    Failed,
}

#[derive(Debug, Clone)]
pub enum BuildEvent {
    ProvisionNetworks,
    ProvisionHosts,
    Commit,

    /// A provisioning step failed
    Fail(String),

    /// The catalog write failed after the backend work succeeded
    CommitFailed(String),

    RollbackComplete,
}

/// Tracks a build through its phases
#[derive(Debug, Clone)]
pub struct BuildFsm {
    state: BuildState,
    error: Option<String>,
}

impl BuildFsm {
    pub fn new() -> Self {
        Self {
            state: BuildState::Pending,
            error: None,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: BuildEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (BuildState::Pending, BuildEvent::ProvisionNetworks) => {
                BuildState::ProvisioningNetworks
            }
            (BuildState::Pending, BuildEvent::Fail(err)) => {
                self.error = Some(err.clone());
                BuildState::Failed
            }

            (BuildState::ProvisioningNetworks, BuildEvent::ProvisionHosts) => {
                BuildState::ProvisioningHosts
            }
            (BuildState::ProvisioningHosts, BuildEvent::Commit) => BuildState::Committed,

            (
                BuildState::ProvisioningNetworks | BuildState::ProvisioningHosts,
                BuildEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                BuildState::RollingBack
            }

            // A conflicting commit is rolled back like a provisioning failure;
            // any other commit failure leaves the backend objects in place
            (BuildState::ProvisioningHosts, BuildEvent::CommitFailed(err)) => {
                self.error = Some(err.clone());
                BuildState::Failed
            }

            (BuildState::RollingBack, BuildEvent::RollbackComplete) => BuildState::Failed,

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, BuildState::Committed | BuildState::Failed)
    }
}

impl Default for BuildFsm {
    fn default() -> Self {
        Self::new()
    }
}
