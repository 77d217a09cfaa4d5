//! `crewloop init`: first-time setup.

use crewloop_config::AppConfig;

/// Written to `./team.toml` when absent.
pub const SAMPLE_TEAM: &str = r#"# Two agents take turns until the critic approves.
topology = "round_robin"

[[agents]]
name = "primary"
description = "Writes and revises"
system_message = "You are a helpful AI assistant."

[[agents]]
name = "critic"
description = "Reviews the latest draft"
system_message = "Provide constructive feedback. Respond with 'APPROVE' when your feedback is addressed."

[termination]
type = "any"

[[termination.conditions]]
type = "text_mention"
text = "APPROVE"

[[termination.conditions]]
type = "max_messages"
max_messages = 6
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("crewloop setup");
    println!("==============\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Wrote {}", config_path.display());
    }

    let team_path = std::path::Path::new("team.toml");
    if team_path.exists() {
        println!("  team.toml exists, leaving it alone");
    } else {
        std::fs::write(team_path, SAMPLE_TEAM)?;
        println!("  Wrote team.toml");
    }

    println!();
    println!("  Next: export GITHUB_TOKEN=... and run");
    println!("    crewloop run team.toml --task \"Write a short poem about the fall season.\"");
    Ok(())
}
