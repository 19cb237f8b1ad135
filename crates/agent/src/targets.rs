//! Target resolution: which of the user's integrations does the utterance
//! address?

use std::sync::Arc;

use actionwire_core::alias::IntegrationAliasMap;
use actionwire_core::error::Result;
use actionwire_core::message::Message;
use actionwire_core::provider::{Provider, ResponseFormat, complete_structured};
use serde::Deserialize;
use tracing::debug;

use crate::settings::ModelSettings;

#[derive(Deserialize)]
struct AppsReply {
    apps: Vec<String>,
}

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "apps": {
                "type": "array",
                "items": { "type": "string" },
                "description": "A list of application names mentioned or implied in the user's message, from the available apps list."
            }
        },
        "required": ["apps"],
        "additionalProperties": false
    })
}

fn system_prompt(available: &[String]) -> String {
    format!(
        "You are an expert at identifying which software applications a user wants to \
interact with. Given a list of available applications, determine which ones are relevant \
to the user's request.\n\nAvailable applications: {}",
        available.join(", ")
    )
}

/// Keep the model's picks that name an available integration.
///
/// Names are compared case-insensitively and returned upper-cased, in the
/// model's order, without duplicates.
pub fn filter_targets(returned: Vec<String>, available: &[String]) -> Vec<String> {
    let available: Vec<String> = available
        .iter()
        .map(|a| IntegrationAliasMap::canonical(a))
        .collect();
    let mut targets: Vec<String> = Vec::new();
    for name in returned {
        let name = IntegrationAliasMap::canonical(&name);
        if available.contains(&name) && !targets.contains(&name) {
            targets.push(name);
        }
    }
    targets
}

/// Resolves target integrations with one structured model call.
pub struct TargetResolver {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
}

impl TargetResolver {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    /// The result is always a subset of `available`; it may be empty.
    pub async fn resolve(&self, utterance: &str, available: &[String]) -> Result<Vec<String>> {
        let request = self
            .settings
            .request(vec![
                Message::system(system_prompt(available)),
                Message::user(utterance),
            ])
            .with_response_format(ResponseFormat::json_schema("target_apps", schema()));

        let reply: AppsReply =
            complete_structured(self.provider.as_ref(), request, "target resolution").await?;
        let targets = filter_targets(reply.apps, available);
        debug!(?targets, "Resolved target integrations");
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use proptest::prelude::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn filter_uppercases_dedups_and_keeps_order() {
        let available = strings(&["SLACK", "GITHUB", "NOTION"]);
        let targets = filter_targets(
            strings(&["github", "Jira", "slack", "GITHUB"]),
            &available,
        );
        assert_eq!(targets, strings(&["GITHUB", "SLACK"]));
    }

    #[test]
    fn filter_of_nothing_is_empty() {
        assert!(filter_targets(vec![], &strings(&["SLACK"])).is_empty());
        assert!(filter_targets(strings(&["SLACK"]), &[]).is_empty());
    }

    #[tokio::test]
    async fn resolve_lists_available_apps_in_prompt() {
        let provider = Arc::new(ScriptedProvider::replying(vec![json_response(
            serde_json::json!({"apps": ["Slack", "Trello"]}),
        )]));
        let resolver = TargetResolver::new(provider.clone(), ModelSettings::default());
        let available = strings(&["SLACK", "GITHUB"]);

        let targets = resolver
            .resolve("post hi in general", &available)
            .await
            .unwrap();
        assert_eq!(targets, strings(&["SLACK"]));

        let req = &provider.requests()[0];
        assert!(req.messages[0].content.ends_with("Available applications: SLACK, GITHUB"));
    }

    #[tokio::test]
    async fn malformed_reply_is_an_error() {
        let provider = Arc::new(ScriptedProvider::replying(vec![text_response("Slack")]));
        let resolver = TargetResolver::new(provider, ModelSettings::default());
        assert!(resolver.resolve("x", &strings(&["SLACK"])).await.is_err());
    }

    proptest! {
        #[test]
        fn filtered_targets_are_a_subset_of_available(
            available in proptest::collection::vec("[A-Z]{1,6}", 0..6),
            returned in proptest::collection::vec("[A-Za-z]{1,6}", 0..12),
        ) {
            let targets = filter_targets(returned, &available);
            for t in &targets {
                prop_assert!(available.contains(t));
            }
            let mut deduped = targets.clone();
            deduped.dedup();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), targets.len());
        }
    }
}
