//! `actionwire config`: configuration management commands.

use actionwire_config::AppConfig;
use anyhow::Context;

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn init() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let path = config_path();

    if path.exists() {
        println!("Config already exists at: {}", path.display());
        println!("   Edit it manually or delete it and re-run `actionwire config init`.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created config.toml at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("   1. Set OPENAI_API_KEY (or api_key in the file)");
    println!("   2. Set COMPOSIO_API_KEY (or tools.api_key) for your connected integrations");
    println!("   3. Run `actionwire doctor`");
    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub fn validate() -> anyhow::Result<()> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_llm_key() {
        warnings.push("No LLM API key set (set OPENAI_API_KEY or ACTIONWIRE_API_KEY)");
    }
    if !config.has_tools_key() {
        warnings.push("No tools API key set (set COMPOSIO_API_KEY or ACTIONWIRE_TOOLS_API_KEY)");
    }
    if config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway bound to 0.0.0.0; the chat API has no authentication");
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
    println!("   Provider:    {}", config.default_provider);
    println!("   Model:       {}", config.default_model);
    println!("   Iterations:  {}", config.agent.max_tool_iterations);
    println!("   Tools API:   {}", config.tools.base_url);
    println!(
        "   Gateway:     {}:{}",
        config.gateway.host, config.gateway.port
    );
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = super::config_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }
}
