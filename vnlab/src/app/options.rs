//! Daemon configuration options

use std::time::Duration;

use crate::storage::settings::Settings;
use crate::workers::reconciler;

/// Options for `vnlab serve`
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// REST server configuration
    pub server: ServerOptions,

    /// Run the background reconciler
    pub enable_reconciler: bool,

    pub reconciler: reconciler::Options,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            enable_reconciler: true,
            reconciler: reconciler::Options::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let interval = settings.reconcile_interval_secs;
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            enable_reconciler: interval > 0,
            reconciler: reconciler::Options {
                interval: Duration::from_secs(interval.max(1)),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// REST server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_disables_reconciler() {
        let settings = Settings {
            reconcile_interval_secs: 0,
            ..Default::default()
        };
        let options = AppOptions::from_settings(&settings);
        assert!(!options.enable_reconciler);
        assert_eq!(options.server.port, 8000);
    }
}
