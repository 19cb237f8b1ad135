//! Configuration loading, validation, and management for ActionWire.
//!
//! Loads configuration from `~/.actionwire/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.actionwire/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used for every pipeline stage
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Max tokens per LLM response (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Orchestration settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool-execution backend
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Speech settings consumed by the chat front end
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .field("voice", &self.voice)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model invocations allowed in the tool-calling loop
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Transcript entries handed to the summarizer when the loop runs out
    #[serde(default = "default_summary_prefix_len")]
    pub summary_prefix_len: usize,
}

fn default_max_tool_iterations() -> u32 {
    10
}
fn default_summary_prefix_len() -> usize {
    4
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            summary_prefix_len: default_summary_prefix_len(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL of the actions API
    #[serde(default = "default_tools_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout for listing and executing actions
    #[serde(default = "default_tools_timeout")]
    pub timeout_secs: u64,

    /// Account on whose behalf actions execute
    #[serde(default = "default_entity_id")]
    pub entity_id: String,
}

fn default_tools_url() -> String {
    "https://backend.composio.dev/api/v2".into()
}
fn default_tools_timeout() -> u64 {
    60
}
fn default_entity_id() -> String {
    "default".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tools_url(),
            api_key: None,
            timeout_secs: default_tools_timeout(),
            entity_id: default_entity_id(),
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("entity_id", &self.entity_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Upper bound on a whole /api/chat request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Browser origins allowed to call the API
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            request_timeout_secs: default_request_timeout(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Carried for the front end; the pipeline never reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Silence before a dictated utterance is submitted
    #[serde(default = "default_debounce")]
    pub speech_debounce_ms: u64,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
}

fn default_debounce() -> u64 {
    1500
}
fn default_tts_model() -> String {
    "tts-1".into()
}
fn default_tts_voice() -> String {
    "echo".into()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            speech_debounce_ms: default_debounce(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.actionwire/config.toml).
    ///
    /// Environment overrides:
    /// - `ACTIONWIRE_API_KEY`, then `OPENAI_API_KEY` for the LLM key
    /// - `ACTIONWIRE_PROVIDER`, `ACTIONWIRE_MODEL`
    /// - `ACTIONWIRE_MAX_TOOL_ITERATIONS`
    /// - `ACTIONWIRE_TOOLS_URL`
    /// - `ACTIONWIRE_TOOLS_API_KEY`, then `COMPOSIO_API_KEY` for the tools key
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("ACTIONWIRE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("ACTIONWIRE_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("ACTIONWIRE_MODEL") {
            self.default_model = model;
        }
        if let Some(raw) = lookup("ACTIONWIRE_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "ACTIONWIRE_MAX_TOOL_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(url) = lookup("ACTIONWIRE_TOOLS_URL") {
            self.tools.base_url = url;
        }
        if self.tools.api_key.is_none() {
            self.tools.api_key =
                lookup("ACTIONWIRE_TOOLS_API_KEY").or_else(|| lookup("COMPOSIO_API_KEY"));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".actionwire")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }
        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.agent.summary_prefix_len < 2 {
            return Err(ConfigError::ValidationError(
                "agent.summary_prefix_len must be at least 2".into(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether a language model key is set, globally or for the default
    /// provider.
    pub fn has_llm_key(&self) -> bool {
        let provider_key = self
            .providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.as_deref());
        is_set(self.api_key.as_deref()) || is_set(provider_key)
    }

    pub fn has_tools_key(&self) -> bool {
        is_set(self.tools.api_key.as_deref())
    }

    /// Fail unless the credentials needed to serve requests are present.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if !self.has_llm_key() {
            return Err(ConfigError::MissingCredential(
                "LLM API key (set ACTIONWIRE_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
        if !self.has_tools_key() {
            return Err(ConfigError::MissingCredential(
                "tools API key (set COMPOSIO_API_KEY or ACTIONWIRE_TOOLS_API_KEY)".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// A copy safe to print: every secret is masked.
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "***".to_string());
        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        copy.tools.api_key = mask(&self.tools.api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: 0.0,
            max_tokens: None,
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
            voice: VoiceConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn is_set(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}
