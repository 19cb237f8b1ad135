//! Fallback summary when the tool loop runs out of iterations.

use std::sync::Arc;

use actionwire_core::error::Result;
use actionwire_core::message::Message;
use actionwire_core::provider::Provider;
use tracing::debug;

use crate::settings::ModelSettings;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Your task is to create a brief, \
friendly, and conversational summary of the actions that were just completed for the user. \
Focus on what was accomplished. Start with a friendly confirmation like 'All set!', 'Done!', \
or 'Okay!'.";

/// Used when the model answers the summary request with nothing.
pub const FALLBACK_SUMMARY: &str = "Done! I've completed the requested actions.";

pub struct Summarizer {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    /// Summarize a transcript prefix with one free-text call. The result is
    /// never empty.
    pub async fn summarize(&self, prefix: &[Message]) -> Result<String> {
        let history = serde_json::to_string_pretty(prefix)?;
        let user = format!(
            "Based on this conversation history, provide a summary of what was done. \
The user's original request is in the first user message.\n\nConversation History:\n{history}"
        );

        let request = self
            .settings
            .request(vec![Message::system(SYSTEM_PROMPT), Message::user(user)]);
        let response = self.provider.complete(request).await?;

        let text = response.message.content.trim();
        if text.is_empty() {
            debug!("Empty summary reply, using fallback");
            return Ok(FALLBACK_SUMMARY.to_string());
        }
        Ok(text.to_string())
    }
}
