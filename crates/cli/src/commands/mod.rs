pub mod chat;
pub mod config_cmd;
pub mod extract;
pub mod onboard;

use std::sync::Arc;

use toolwright_agent::{LoopSettings, ToolLoop, reply};
use toolwright_config::AppConfig;
use toolwright_core::tool::ToolRegistry;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build a loop over the configured gateway, or explain how to set a key.
pub(crate) fn build_loop(
    config: &AppConfig,
    tools: ToolRegistry,
    settings: LoopSettings,
) -> Result<ToolLoop, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export ANTHROPIC_API_KEY='sk-ant-...'");
        eprintln!("    export TOOLWRIGHT_API_KEY='sk-ant-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let gateway = toolwright_providers::build_from_config(config)?;
    Ok(ToolLoop::new(gateway, Arc::new(tools), settings)
        .with_extractor(reply::for_tag(&config.agent.reply_tag)))
}
