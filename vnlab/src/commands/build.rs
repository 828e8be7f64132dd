use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use vnlab::app::state::AppState;
use vnlab::models::template::Template;

use crate::commands::output;

pub async fn run(state: &AppState, template_path: &Path) -> Result<()> {
    let template = Template::from_file(template_path).await?;

    println!("Building deployment {}...", template.name().bold());
    let deployment = state.build(&template).await?;

    for network in &deployment.networks {
        println!("  network {} ({})", network.name, network.ip);
    }
    for host in &deployment.hosts {
        println!("  host {} ({})", host.name, host.image);
    }
    output::success(&format!(
        "Deployment {} created with {} hosts and {} networks",
        deployment.name(),
        deployment.hosts.len(),
        deployment.networks.len()
    ));
    Ok(())
}
