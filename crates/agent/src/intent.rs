//! Intent classification: does this utterance need a tool, or is it chat?

use std::sync::Arc;

use actionwire_core::error::Result;
use actionwire_core::message::Message;
use actionwire_core::provider::{Provider, ResponseFormat, complete_structured};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::settings::ModelSettings;

const SYSTEM_PROMPT: &str = "You are an intent classification expert. Your job is to \
determine if a user's request requires executing an action with a tool (like sending an \
email, fetching data, creating a task) or if it's a general conversational question (like \
'hello', 'what is the capital of France?').

- If it's an action, classify as 'TOOL_USE'.
- If it's a general question or greeting, classify as 'GENERAL_CHAT'.";

/// How an utterance should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    ToolUse,
    GeneralChat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ToolUse => "TOOL_USE",
            Intent::GeneralChat => "GENERAL_CHAT",
        }
    }
}

#[derive(Deserialize)]
struct IntentReply {
    intent: Intent,
}

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "intent": {
                "type": "string",
                "enum": ["TOOL_USE", "GENERAL_CHAT"],
                "description": "Classify the user's intent."
            }
        },
        "required": ["intent"],
        "additionalProperties": false
    })
}

/// Classifies an utterance with one structured model call.
pub struct IntentClassifier {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    /// No retries: a failed or malformed reply is an error.
    pub async fn classify(&self, utterance: &str) -> Result<Intent> {
        let request = self
            .settings
            .request(vec![Message::system(SYSTEM_PROMPT), Message::user(utterance)])
            .with_response_format(ResponseFormat::json_schema("intent", schema()));

        let reply: IntentReply =
            complete_structured(self.provider.as_ref(), request, "intent").await?;
        debug!(intent = reply.intent.as_str(), "Classified utterance");
        Ok(reply.intent)
    }
}
