//! Error types for vnlab

use thiserror::Error;

use crate::models::kind::ResourceKind;

/// Main error type for vnlab
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} name {name} already used")]
    NameConflict { kind: ResourceKind, name: String },

    #[error("network address {address} already used by {holder}")]
    AddressConflict { address: String, holder: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{kind} {name} not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<LabError>,
    },
}

impl LabError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        LabError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn name_conflict(kind: ResourceKind, name: impl Into<String>) -> Self {
        LabError::NameConflict {
            kind,
            name: name.into(),
        }
    }

    /// Wrap the error with a prefix describing the failed phase
    pub fn context(self, context: impl Into<String>) -> Self {
        LabError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error with every context layer removed
    pub fn root(&self) -> &LabError {
        let mut current = self;
        while let LabError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), LabError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self.root(),
            LabError::NameConflict { .. } | LabError::AddressConflict { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), LabError::Validation(_))
    }
}

/// Context helpers for results carrying a [`LabError`]
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, LabError>;

    fn with_context<C, F>(self, f: F) -> Result<T, LabError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<LabError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, LabError> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, LabError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
