//! ToolBackend trait: the abstraction over the tool-execution service.
//!
//! A backend knows which actions each integration exposes (Slack, GitHub,
//! Notion, ...) and executes invocations of them against the live service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool, with its arguments already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its result; never empty at dispatch time
    pub id: String,

    pub name: String,

    pub arguments: serde_json::Value,
}

impl TryFrom<&MessageToolCall> for ToolCall {
    type Error = ToolError;

    /// Decode the model's argument string. An empty string means "no
    /// arguments".
    fn try_from(tc: &MessageToolCall) -> Result<Self, Self::Error> {
        let arguments = if tc.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&tc.arguments).map_err(|e| {
                ToolError::InvalidArguments(format!("{}: {e}", tc.name))
            })?
        };
        Ok(Self {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        })
    }
}

/// The core ToolBackend trait.
///
/// Implementations must be reentrant: one instance is shared by every
/// concurrent request.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Tool descriptors for the given integrations (upper-case identifiers).
    async fn list_tools(&self, integrations: &[String]) -> Result<Vec<ToolDefinition>, ToolError>;

    /// Execute one tool call and return its textual output.
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtc(arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: "call_1".into(),
            name: "SLACK_SEND_MESSAGE".into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn decodes_json_arguments() {
        let call = ToolCall::try_from(&mtc(r#"{"channel":"C123","text":"hi"}"#)).unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.arguments["channel"], "C123");
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let call = ToolCall::try_from(&mtc("  ")).unwrap();
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let err = ToolCall::try_from(&mtc("{channel:")).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("SLACK_SEND_MESSAGE"));
    }
}
