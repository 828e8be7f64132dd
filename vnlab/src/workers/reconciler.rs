//! Periodic reconciliation of stale build intents

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::app::state::AppState;

/// Reconciler worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between passes
    pub interval: Duration,

    /// Delay before the first pass
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the reconciler worker until `shutdown_signal` resolves
pub async fn run<S, F>(
    options: &Options,
    app_state: &AppState,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Reconciler worker starting...");
    let mut wait = options.initial_delay;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Reconciler worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }
        wait = options.interval;

        debug!("Reconciling build intents...");
        match app_state.reconcile().await {
            Ok(report) if report.intents_cleared + report.intents_kept == 0 => {
                debug!("No outstanding build intents");
            }
            Ok(report) => {
                info!(
                    "Reconciled {} build intents, removed {} hosts and {} networks",
                    report.intents_cleared,
                    report.hosts_removed.len(),
                    report.networks_removed.len()
                );
                for failure in &report.failures {
                    warn!("Reconciliation incomplete: {}", failure);
                }
            }
            Err(e) => {
                error!("Reconciliation failed: {}", e);
            }
        }
    }
}
