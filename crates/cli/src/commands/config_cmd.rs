//! `toolwright config`: configuration management commands.

use toolwright_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set ANTHROPIC_API_KEY or TOOLWRIGHT_API_KEY)");
            }
            if config.retry.max_retries == 0 {
                warnings.push("Retries disabled: transient gateway errors will fail the turn");
            }
            if config.agent.tool_timeout_secs >= config.agent.gateway_timeout_secs {
                warnings.push("agent.tool_timeout_secs is not shorter than agent.gateway_timeout_secs");
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
            println!("   Model:           {}", config.model);
            println!("   Max tokens:      {}", config.max_tokens);
            println!("   Max iterations:  {}", config.agent.max_iterations);
            println!("   Reply tag:       {:?}", config.agent.reply_tag);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    redact(&mut config);
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redact(config: &mut AppConfig) {
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
}
