//! Scripted collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use actionwire_core::error::{ProviderError, ToolError};
use actionwire_core::message::{Message, MessageToolCall};
use actionwire_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
use actionwire_core::tool::{ToolBackend, ToolCall};

/// A provider that replays a queue of scripted replies and records every
/// request it receives.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            panic!(
                "ScriptedProvider: no more replies (call #{})",
                requests.len() + 1
            );
        }
        requests.push(request);
        replies.remove(0)
    }
}

/// A tool backend with fixed listings whose executions are recorded.
#[derive(Default)]
pub struct RecordingBackend {
    tools: Vec<(String, ToolDefinition)>,
    failures: HashMap<String, ToolError>,
    listing_error: Option<ToolError>,
    listed: Mutex<Vec<Vec<String>>>,
    executed: Mutex<Vec<ToolCall>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, integration: &str, name: &str) -> Self {
        self.tools.push((
            integration.to_string(),
            ToolDefinition {
                name: name.to_string(),
                description: format!("{name} action"),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
        ));
        self
    }

    /// Make every execution of `name` fail with `error`.
    pub fn failing(mut self, name: &str, error: ToolError) -> Self {
        self.failures.insert(name.to_string(), error);
        self
    }

    pub fn with_listing_error(mut self, error: ToolError) -> Self {
        self.listing_error = Some(error);
        self
    }

    pub fn executed(&self) -> Vec<ToolCall> {
        self.executed.lock().unwrap().clone()
    }

    pub fn listed(&self) -> Vec<Vec<String>> {
        self.listed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToolBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn list_tools(&self, integrations: &[String]) -> Result<Vec<ToolDefinition>, ToolError> {
        self.listed.lock().unwrap().push(integrations.to_vec());
        if let Some(e) = &self.listing_error {
            return Err(e.clone());
        }
        Ok(self
            .tools
            .iter()
            .filter(|(app, _)| integrations.contains(app))
            .map(|(_, def)| def.clone())
            .collect())
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        self.executed.lock().unwrap().push(call.clone());
        match self.failures.get(&call.name) {
            Some(e) => Err(e.clone()),
            None => Ok(format!("{{\"successful\":true,\"action\":\"{}\"}}", call.name)),
        }
    }
}

/// A plain text reply (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A structured reply carrying `value` as its JSON content.
pub fn json_response(value: serde_json::Value) -> ProviderResponse {
    text_response(&value.to_string())
}

/// A reply that requests the given tool calls.
pub fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools("", tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
