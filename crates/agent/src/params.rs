//! Parameter matching: which stored aliases does the utterance refer to?
//!
//! Best effort. A failed or malformed model reply degrades to "no relevant
//! parameters" instead of failing the request.

use std::sync::Arc;

use actionwire_core::alias::Alias;
use actionwire_core::message::Message;
use actionwire_core::provider::{Provider, ResponseFormat, complete_structured};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::settings::ModelSettings;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelevantAliasesReply {
    relevant_alias_names: Vec<String>,
}

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "relevantAliasNames": {
                "type": "array",
                "items": { "type": "string" },
                "description": "An array of alias names that are directly mentioned or semantically related to the user's message."
            }
        },
        "required": ["relevantAliasNames"],
        "additionalProperties": false
    })
}

fn system_prompt(candidates: &[Alias]) -> String {
    let names: Vec<&str> = candidates.iter().map(|a| a.name.as_str()).collect();
    format!(
        "You are a smart assistant that identifies relevant parameters. Based on the user's \
message, identify which of the available aliases are being referred to. Only return the \
names of the aliases that are relevant.\n\nAvailable alias names: {}",
        names.join(", ")
    )
}

pub struct ParameterMatcher {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
}

impl ParameterMatcher {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    /// Candidates the utterance refers to, in candidate order.
    ///
    /// Never fails; no model call is made when `candidates` is empty.
    pub async fn find(&self, utterance: &str, candidates: &[Alias]) -> Vec<Alias> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let request = self
            .settings
            .request(vec![
                Message::system(system_prompt(candidates)),
                Message::user(utterance),
            ])
            .with_response_format(ResponseFormat::json_schema("relevant_aliases", schema()));

        let reply: RelevantAliasesReply =
            match complete_structured(self.provider.as_ref(), request, "parameter matching").await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Could not determine relevant aliases");
                    return Vec::new();
                }
            };

        let relevant: Vec<Alias> = candidates
            .iter()
            .filter(|a| reply.relevant_alias_names.contains(&a.name))
            .cloned()
            .collect();
        debug!(
            candidates = candidates.len(),
            matched = relevant.len(),
            "Matched stored parameters"
        );
        relevant
    }
}
