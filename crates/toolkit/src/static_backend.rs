//! In-process tool backend.
//!
//! Tools are registered under an integration identifier and listed per
//! integration, mirroring what a hosted actions service would return.
//!
//! Nothing in the configuration selects this backend. A program embedding
//! the pipeline builds one with its own tools and hands it to
//! `Pipeline::new` directly; the end-to-end tests do the same.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use actionwire_core::alias::IntegrationAliasMap;
use actionwire_core::error::ToolError;
use actionwire_core::provider::ToolDefinition;
use actionwire_core::tool::{ToolBackend, ToolCall};
use async_trait::async_trait;
use tracing::debug;

/// A single action that runs inside the process.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. `SLACK_SEND_MESSAGE`).
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of tools grouped by integration.
#[derive(Default)]
pub struct StaticToolBackend {
    by_integration: BTreeMap<String, Vec<Arc<dyn Tool>>>,
    by_name: HashMap<String, Arc<dyn Tool>>,
}

impl StaticToolBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under an integration. A tool with the same name
    /// replaces the previous one everywhere.
    pub fn register(&mut self, integration: &str, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.by_name.remove(&name).is_some() {
            for tools in self.by_integration.values_mut() {
                tools.retain(|t| t.name() != name);
            }
        }
        self.by_integration
            .entry(IntegrationAliasMap::canonical(integration))
            .or_default()
            .push(Arc::clone(&tool));
        self.by_name.insert(name, tool);
    }

    pub fn with(mut self, integration: &str, tool: Arc<dyn Tool>) -> Self {
        self.register(integration, tool);
        self
    }

    /// Integrations that have at least one tool.
    pub fn integrations(&self) -> Vec<&str> {
        self.by_integration
            .iter()
            .filter(|(_, tools)| !tools.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

#[async_trait]
impl ToolBackend for StaticToolBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn list_tools(&self, integrations: &[String]) -> Result<Vec<ToolDefinition>, ToolError> {
        let mut defs = Vec::new();
        for integration in integrations {
            let key = IntegrationAliasMap::canonical(integration);
            if let Some(tools) = self.by_integration.get(&key) {
                defs.extend(tools.iter().map(|t| t.to_definition()));
            }
        }
        debug!(count = defs.len(), "Listed in-process tools");
        Ok(defs)
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .by_name
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }
}
