use anyhow::Result;
use vnlab::app::state::AppState;
use vnlab::orchestrator::{Target, Verb};

use crate::commands::output;

pub async fn run(state: &AppState, verb: Verb, target: Target) -> Result<()> {
    let report = state.apply(verb, &target).await?;
    output::success(&report.summary(verb, &target));
    Ok(())
}
