use anyhow::Result;
use clap::ValueEnum;
use vnlab::app::state::AppState;

use crate::commands::output;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Listing {
    Hosts,
    Networks,
    Ips,
    Deployments,
}

pub async fn run(state: &AppState, listing: Listing) -> Result<()> {
    let inspector = state.inspector();
    let table = match listing {
        Listing::Hosts => output::hosts_table(&inspector.all_host_details().await?),
        Listing::Networks => output::networks_table(&inspector.networks().await?),
        Listing::Ips => output::ips_table(&inspector.all_host_interfaces().await?),
        Listing::Deployments => output::deployments_table(&inspector.deployments().await?),
    };
    println!("{}", table);
    Ok(())
}
