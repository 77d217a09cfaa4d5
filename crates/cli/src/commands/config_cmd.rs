//! `crewloop config`: configuration management commands.

use crewloop_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set CREWLOOP_API_KEY or GITHUB_TOKEN)");
            }
            if config.team.tool_timeout_secs.is_none() {
                warnings.push("No tool timeout: a hung tool blocks the run");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Endpoint:   {}", config.base_url);
            println!("   Model:      {}", config.default_model);
            println!("   Max turns:  {}", config.team.max_turns);

            if config.has_api_key() {
                let provider = super::build_provider(&config)?;
                match provider.health_check().await {
                    Ok(true) => println!("   Endpoint reachable"),
                    Ok(false) => println!("   warning: endpoint rejected the credentials"),
                    Err(e) => println!("   warning: endpoint unreachable: {e}"),
                }
            }
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("***".into());
    }
    toml::to_string_pretty(&shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_never_prints_the_key() {
        let config = AppConfig {
            api_key: Some("ghp_secret".into()),
            ..AppConfig::default()
        };
        let shown = redacted_toml(&config).unwrap();
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains("***"));
    }
}
