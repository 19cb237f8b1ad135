//! `actionwire chat`: single-message or interactive mode.
//!
//! Each line is handled on its own, exactly like one `/api/chat` request;
//! nothing carries over between lines.

use std::io::Write;
use std::path::{Path, PathBuf};

use actionwire_agent::Pipeline;
use actionwire_config::AppConfig;
use actionwire_core::alias::IntegrationAliasMap;
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read an alias snapshot in the same JSON shape the HTTP API accepts.
pub fn load_aliases(path: &Path) -> anyhow::Result<IntegrationAliasMap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read aliases file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse aliases file {}", path.display()))
}

async fn answer(pipeline: &Pipeline, message: &str, aliases: &IntegrationAliasMap) -> String {
    match pipeline.handle(message, aliases).await {
        Ok(reply) => reply.content,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline failed");
            format!("Sorry, I encountered an error: {e}")
        }
    }
}

pub async fn run(message: Option<String>, aliases_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    if let Err(e) = config.require_credentials() {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Set these environment variables:");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'   (or ACTIONWIRE_API_KEY)");
        eprintln!("    COMPOSIO_API_KEY  = '...'      (or ACTIONWIRE_TOOLS_API_KEY)");
        eprintln!();
        eprintln!("  Or add them to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        anyhow::bail!("Missing credentials. See above for setup instructions.");
    }

    let aliases = match &aliases_path {
        Some(path) => load_aliases(path)?,
        None => IntegrationAliasMap::new(),
    };
    let pipeline =
        actionwire_gateway::pipeline_from_config(&config).map_err(|e| anyhow::anyhow!(e))?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = answer(&pipeline, &msg, &aliases).await;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  ActionWire, interactive mode");
    println!();
    println!("  Model:         {}", config.default_model);
    println!("  Integrations:  {}", display_integrations(&aliases));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if !line.is_empty() {
            eprint!("  ...");
            let response = answer(&pipeline, line, &aliases).await;
            eprint!("\r     \r");
            println!();
            for text in response.lines() {
                println!("  Assistant > {text}");
            }
            println!();
        }
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    Ok(())
}

fn display_integrations(aliases: &IntegrationAliasMap) -> String {
    if aliases.is_empty() {
        "none (pass --aliases <file.json>)".into()
    } else {
        aliases.integrations().join(", ")
    }
}
