use anyhow::Result;
use vnlab::app::state::AppState;

use crate::commands::output;

pub async fn run(state: &AppState) -> Result<()> {
    let report = state.reconcile().await?;

    for host in &report.hosts_removed {
        println!("  removed host {}", host);
    }
    for network in &report.networks_removed {
        println!("  removed network {}", network);
    }
    for failure in &report.failures {
        output::warning(failure);
    }

    if report.is_clean() {
        output::success(&format!(
            "Reconciled {} build intents",
            report.intents_cleared
        ));
        Ok(())
    } else {
        anyhow::bail!(
            "{} build intents could not be fully cleaned up",
            report.intents_kept
        )
    }
}
