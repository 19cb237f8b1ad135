//! Remote actions backend.
//!
//! Speaks the REST dialect of hosted action services:
//!
//! - `GET  {base}/actions?apps=SLACK,GITHUB` lists the actions an app exposes
//! - `POST {base}/actions/{name}/execute` runs one action for an entity
//!
//! Both requests authenticate with an `x-api-key` header. Action names and
//! integration ids are encoded as a single path segment and a single query
//! value, so neither can move a request off those two endpoints.

use std::time::{Duration, Instant};

use actionwire_core::error::ToolError;
use actionwire_core::provider::ToolDefinition;
use actionwire_core::tool::{ToolBackend, ToolCall};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A [`ToolBackend`] backed by a hosted actions API.
pub struct HttpToolBackend {
    base_url: Url,
    api_key: String,
    entity_id: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpToolBackend {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ToolError> {
        Self::with_timeout(base_url, api_key, 60)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ToolError> {
        let mut parsed = Url::parse(base_url)
            .map_err(|e| ToolError::Backend(format!("Invalid tools base URL '{base_url}': {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ToolError::Backend(format!(
                "Invalid tools base URL '{base_url}': not a hierarchical URL"
            )));
        }
        parsed.set_query(None);
        parsed.set_fragment(None);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ToolError::Backend(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: parsed,
            api_key: api_key.into(),
            entity_id: "default".into(),
            timeout_secs,
            client,
        })
    }

    /// Build a backend from the `[tools]` config table.
    pub fn from_config(config: &actionwire_config::ToolsConfig) -> Result<Self, ToolError> {
        Ok(Self::with_timeout(
            &config.base_url,
            config.api_key.clone().unwrap_or_default(),
            config.timeout_secs,
        )?
        .with_entity(&config.entity_id))
    }

    /// Execute actions on behalf of a different connected account.
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }

    /// The base URL with `segments` appended, each encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked hierarchical in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn list_url(&self, integrations: &[String]) -> Url {
        let mut url = self.endpoint(&["actions"]);
        url.query_pairs_mut()
            .append_pair("apps", &integrations.join(","));
        url
    }

    fn execute_url(&self, action: &str) -> Result<Url, ToolError> {
        if matches!(action.trim(), "" | "." | "..") {
            return Err(ToolError::NotFound(action.to_string()));
        }
        Ok(self.endpoint(&["actions", action, "execute"]))
    }

    fn map_send_error(&self, tool_name: &str, e: reqwest::Error) -> ToolError {
        if e.is_timeout() {
            ToolError::Timeout {
                tool_name: tool_name.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            ToolError::Backend(e.to_string())
        }
    }
}

#[async_trait]
impl ToolBackend for HttpToolBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_tools(&self, integrations: &[String]) -> Result<Vec<ToolDefinition>, ToolError> {
        if integrations.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.list_url(integrations);
        debug!(url = %url, "Listing actions");

        let response = self
            .client
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error("list_actions", e))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ToolError::Backend(
                "Invalid tools API key or insufficient permissions".into(),
            ));
        }
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Actions listing failed");
            return Err(ToolError::Backend(format!("HTTP {status}: {body}")));
        }

        let body = response.text().await.map_err(|e| ToolError::Backend(e.to_string()))?;
        let tools = parse_action_list(&body)?;
        info!(
            integrations = %integrations.join(","),
            count = tools.len(),
            "Fetched actions"
        );
        Ok(tools)
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let url = self.execute_url(&call.name)?;
        let body = ExecuteRequest {
            entity_id: &self.entity_id,
            input: &call.arguments,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&call.name, e))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ToolError::NotFound(call.name.clone()));
        }
        let text = response.text().await.map_err(|e| ToolError::Backend(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        debug!(
            tool = %call.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Action executed"
        );
        interpret_execution(&call.name, text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    entity_id: &'a str,
    input: &'a serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActionList {
    Wrapped { items: Vec<ApiAction> },
    Bare(Vec<ApiAction>),
}

#[derive(Deserialize)]
struct ApiAction {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct ExecutionEnvelope {
    // The service has shipped both spellings
    #[serde(alias = "successfull")]
    successful: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn parse_action_list(body: &str) -> Result<Vec<ToolDefinition>, ToolError> {
    let list: ActionList = serde_json::from_str(body)
        .map_err(|e| ToolError::Backend(format!("Unreadable action list: {e}")))?;
    let actions = match list {
        ActionList::Wrapped { items } => items,
        ActionList::Bare(items) => items,
    };
    Ok(actions
        .into_iter()
        .map(|a| ToolDefinition {
            name: a.name,
            description: a.description,
            parameters: a.parameters,
        })
        .collect())
}

/// The raw body is the tool output unless the envelope reports failure.
fn interpret_execution(tool_name: &str, body: String) -> Result<String, ToolError> {
    let Ok(envelope) = serde_json::from_str::<ExecutionEnvelope>(&body) else {
        return Ok(body);
    };
    if envelope.successful == Some(false) {
        let reason = match envelope.error {
            Some(serde_json::Value::String(s)) => s,
            Some(other) if !other.is_null() => other.to_string(),
            _ => "action reported failure".to_string(),
        };
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        });
    }
    Ok(body)
}
