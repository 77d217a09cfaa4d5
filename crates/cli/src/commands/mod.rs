pub mod check;
pub mod config_cmd;
pub mod init;
pub mod run;

use std::sync::Arc;
use std::time::Duration;

use crewloop_config::AppConfig;
use crewloop_core::provider::Provider;
use crewloop_providers::{DeadlineProvider, OpenAiCompatProvider};

/// The configured backend, bounded by the request timeout.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let inner = OpenAiCompatProvider::new("crewloop", &config.base_url, api_key)?;
    Ok(Arc::new(DeadlineProvider::new(
        Arc::new(inner),
        Duration::from_secs(config.request_timeout_secs),
    )))
}

/// Print setup help when no API key is configured.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    CREWLOOP_API_KEY   (generic)");
    eprintln!("    GITHUB_TOKEN       (GitHub Models, the default endpoint)");
    eprintln!("    OPENAI_API_KEY     (with CREWLOOP_BASE_URL=https://api.openai.com/v1)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
