use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use vnlab::app::options::AppOptions;
use vnlab::app::run::run as run_daemon;
use vnlab::app::state::AppState;

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let options = AppOptions::from_settings(&state.settings);
    info!("Running vnlab daemon with options: {:?}", options);
    run_daemon(options, state, await_shutdown_signal()).await?;
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
