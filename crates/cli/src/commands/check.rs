//! `crewloop check`: validate a team file without calling any model.

use std::path::Path;
use std::sync::Arc;

use crewloop_agent::{InputFn, TeamBuilder};
use crewloop_config::{AppConfig, TeamConfig};

pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let team_config = TeamConfig::load_from(path)?;

    // Building never calls the provider or the input source.
    let provider = super::build_provider(&config)?;
    let input: InputFn = Arc::new(|_| Box::pin(async { Err("not interactive".to_string()) }));
    let team = TeamBuilder::new(config, provider)
        .with_input(input)
        .build(&team_config)
        .await?;

    println!("Team file OK: {}", path.display());
    println!("  Topology:   {:?}", team_config.topology);
    println!("  Max turns:  {}", team.max_turns());
    for (agent, spec) in team.participants().iter().zip(&team_config.agents) {
        let tools = agent.tools().map(|t| t.names().join(", ")).unwrap_or_default();
        println!(
            "  - {} ({:?}){}{}",
            agent.name(),
            spec.kind,
            if tools.is_empty() {
                String::new()
            } else {
                format!(" tools: {tools}")
            },
            if agent.handoffs().is_empty() {
                String::new()
            } else {
                format!(" handoffs: {}", agent.handoffs().join(", "))
            },
        );
    }
    Ok(())
}
