//! `actionwire doctor`: diagnose configuration and connectivity.

use actionwire_config::AppConfig;
use actionwire_core::provider::Provider;

pub async fn run() -> anyhow::Result<()> {
    println!("ActionWire Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  [ok]   Config file found at {}", config_path.display());
    } else {
        println!("  [warn] No config file; using defaults (run `actionwire config init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    if config.has_llm_key() {
        println!("  [ok]   LLM API key configured");
    } else {
        println!("  [fail] No LLM API key (set OPENAI_API_KEY)");
        issues += 1;
    }

    if config.has_tools_key() {
        println!("  [ok]   Tools API key configured");
    } else {
        println!("  [fail] No tools API key (set COMPOSIO_API_KEY)");
        issues += 1;
    }

    if config.has_llm_key() {
        let router = actionwire_providers::router::build_from_config(&config);
        match router.default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  [ok]   Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!("  [fail] Provider '{}' answered unhealthy", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  [fail] No default provider '{}'", config.default_provider);
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
