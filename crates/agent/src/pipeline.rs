//! The orchestrator: routes one utterance through the stages and shapes the
//! reply.

use std::sync::Arc;

use actionwire_core::alias::{Alias, IntegrationAliasMap};
use actionwire_core::error::Result;
use actionwire_core::event::{DomainEvent, EventBus};
use actionwire_core::message::Message;
use actionwire_core::provider::Provider;
use actionwire_core::tool::ToolBackend;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::compose::compose;
use crate::intent::{Intent, IntentClassifier};
use crate::loop_runner::{LoopOutcome, ToolCallingLoop};
use crate::params::ParameterMatcher;
use crate::settings::PipelineSettings;
use crate::targets::TargetResolver;

/// Returned when the user has no integrations, or none the utterance names.
pub const SETUP_REQUIRED_MESSAGE: &str =
    "I can't perform any actions yet. Please add some integration parameters in the settings first.";

pub fn missing_parameters_message(integration: &str) -> String {
    format!(
        "To work with {integration}, you first need to add its required parameters (like a channel ID or URL) in the settings."
    )
}

/// Where an utterance goes once the routing stages have run.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    GeneralChat,
    /// The request cannot proceed until the user configures something
    SetupRequired(String),
    ToolUse {
        targets: Vec<String>,
        /// Aliases of every target, in target order then alias order
        candidates: Vec<Alias>,
    },
}

/// Which branch produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyRoute {
    GeneralChat,
    SetupRequired,
    NoTools,
    Resolved,
    Summarized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReply {
    pub content: String,
    pub route: ReplyRoute,
}

impl PipelineReply {
    fn new(content: impl Into<String>, route: ReplyRoute) -> Self {
        Self {
            content: content.into(),
            route,
        }
    }
}

impl From<LoopOutcome> for PipelineReply {
    fn from(outcome: LoopOutcome) -> Self {
        match outcome {
            LoopOutcome::NoTools(t) => Self::new(t, ReplyRoute::NoTools),
            LoopOutcome::Resolved(t) => Self::new(t, ReplyRoute::Resolved),
            LoopOutcome::Summarized(t) => Self::new(t, ReplyRoute::Summarized),
        }
    }
}

/// Handles utterances end to end.
///
/// Holds only shared handles and immutable settings, so one instance serves
/// every concurrent request.
pub struct Pipeline {
    provider: Arc<dyn Provider>,
    settings: PipelineSettings,
    classifier: IntentClassifier,
    resolver: TargetResolver,
    matcher: ParameterMatcher,
    tool_loop: ToolCallingLoop,
    event_bus: Arc<EventBus>,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolBackend>,
        settings: PipelineSettings,
    ) -> Self {
        Self::with_event_bus(provider, tools, settings, Arc::new(EventBus::default()))
    }

    pub fn with_event_bus(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolBackend>,
        settings: PipelineSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let model = settings.model.clone();
        let tool_loop = ToolCallingLoop::new(
            Arc::clone(&provider),
            tools,
            model.clone(),
            Arc::clone(&event_bus),
        )
        .with_max_iterations(settings.max_tool_iterations)
        .with_summary_prefix_len(settings.summary_prefix_len);

        Self {
            classifier: IntentClassifier::new(Arc::clone(&provider), model.clone()),
            resolver: TargetResolver::new(Arc::clone(&provider), model.clone()),
            matcher: ParameterMatcher::new(Arc::clone(&provider), model),
            tool_loop,
            provider,
            settings,
            event_bus,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run the classification and resolution stages.
    pub async fn route(&self, utterance: &str, aliases: &IntegrationAliasMap) -> Result<Route> {
        let intent = self.classifier.classify(utterance).await?;
        self.event_bus.publish(DomainEvent::IntentClassified {
            intent: intent.as_str().to_string(),
            timestamp: Utc::now(),
        });
        if intent == Intent::GeneralChat {
            return Ok(Route::GeneralChat);
        }

        let available = aliases.integrations();
        if available.is_empty() {
            return Ok(Route::SetupRequired(SETUP_REQUIRED_MESSAGE.into()));
        }

        let targets = self.resolver.resolve(utterance, &available).await?;
        self.event_bus.publish(DomainEvent::TargetsResolved {
            targets: targets.clone(),
            timestamp: Utc::now(),
        });
        if targets.is_empty() {
            return Ok(Route::SetupRequired(SETUP_REQUIRED_MESSAGE.into()));
        }
        info!(?targets, "Identified target integrations");

        if let Some(app) = targets.iter().find(|t| aliases.aliases_for(t).is_empty()) {
            warn!(integration = %app, "Target integration has no configured parameters");
            return Ok(Route::SetupRequired(missing_parameters_message(app)));
        }

        let candidates = aliases.aliases_for_all(&targets);
        Ok(Route::ToolUse {
            targets,
            candidates,
        })
    }

    /// Handle one utterance against the caller's alias snapshot.
    pub async fn handle(
        &self,
        utterance: &str,
        aliases: &IntegrationAliasMap,
    ) -> Result<PipelineReply> {
        match self.route(utterance, aliases).await? {
            Route::GeneralChat => {
                info!("Handling as general chat");
                let text = self.general_chat(utterance).await?;
                Ok(PipelineReply::new(text, ReplyRoute::GeneralChat))
            }
            Route::SetupRequired(message) => {
                Ok(PipelineReply::new(message, ReplyRoute::SetupRequired))
            }
            Route::ToolUse {
                targets,
                candidates,
            } => {
                info!("Handling as tool use");
                let relevant = self.matcher.find(utterance, &candidates).await;
                self.event_bus.publish(DomainEvent::ParametersMatched {
                    candidates: candidates.len(),
                    matched: relevant.iter().map(|a| a.name.clone()).collect(),
                    timestamp: Utc::now(),
                });

                let contextualized = compose(utterance, &relevant);
                let outcome = self.tool_loop.run(&contextualized, &targets).await?;
                Ok(outcome.into())
            }
        }
    }

    /// One free-text completion over the bare utterance.
    async fn general_chat(&self, utterance: &str) -> Result<String> {
        let request = self.settings.model.request(vec![Message::user(utterance)]);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use actionwire_core::error::{Error, ProviderError};
    use actionwire_core::message::Role;
    use actionwire_core::provider::ProviderResponse;

    fn pipeline(provider: Arc<ScriptedProvider>, backend: Arc<RecordingBackend>) -> Pipeline {
        Pipeline::new(provider, backend, PipelineSettings::default())
    }

    fn slack_aliases() -> IntegrationAliasMap {
        IntegrationAliasMap::new().with("SLACK", vec![Alias::new("general", "C123")])
    }

    fn intent(label: &str) -> ProviderResponse {
        json_response(serde_json::json!({ "intent": label }))
    }

    #[tokio::test]
    async fn general_chat_skips_resolution_and_tools() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("GENERAL_CHAT"),
            text_response("Hi there!"),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));

        let reply = pipeline(provider.clone(), backend.clone())
            .handle("hello", &slack_aliases())
            .await
            .unwrap();

        assert_eq!(reply, PipelineReply::new("Hi there!", ReplyRoute::GeneralChat));
        assert_eq!(provider.call_count(), 2);
        assert!(backend.listed().is_empty());

        // The chat call sees only the user's message
        let chat = &provider.requests()[1];
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::User);
        assert_eq!(chat.messages[0].content, "hello");
    }

    #[tokio::test]
    async fn tool_use_posts_with_matched_parameters() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["slack"]})),
            json_response(serde_json::json!({"relevantAliasNames": ["general"]})),
            tool_response(vec![tool_call(
                "call_1",
                "SLACK_SEND_MESSAGE",
                serde_json::json!({"channel": "C123", "text": "hi"}),
            )]),
            text_response("I sent your message to #general."),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));

        let reply = pipeline(provider.clone(), backend.clone())
            .handle("send a message to #general on slack", &slack_aliases())
            .await
            .unwrap();

        assert_eq!(reply.content, "I sent your message to #general.");
        assert_eq!(reply.route, ReplyRoute::Resolved);
        assert_eq!(provider.call_count(), 5);
        assert_eq!(backend.listed(), vec![vec!["SLACK".to_string()]]);
        assert_eq!(backend.executed().len(), 1);

        let first_loop_call = &provider.requests()[3];
        assert!(first_loop_call.messages[1].content.contains("general = C123"));
    }

    #[tokio::test]
    async fn target_without_aliases_requires_setup() {
        let aliases = IntegrationAliasMap::new()
            .with("SLACK", vec![Alias::new("general", "C123")])
            .with("GITHUB", vec![]);
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["GITHUB"]})),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("GITHUB", "GITHUB_CREATE_ISSUE"));

        let reply = pipeline(provider.clone(), backend.clone())
            .handle("open an issue", &aliases)
            .await
            .unwrap();

        assert_eq!(reply.content, missing_parameters_message("GITHUB"));
        assert_eq!(reply.route, ReplyRoute::SetupRequired);
        assert_eq!(provider.call_count(), 2);
        assert!(backend.listed().is_empty());
    }

    #[tokio::test]
    async fn endless_tool_calls_return_the_summary() {
        let mut replies = vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["SLACK"]})),
            json_response(serde_json::json!({"relevantAliasNames": []})),
        ];
        for i in 0..10 {
            replies.push(tool_response(vec![tool_call(
                &format!("call_{i}"),
                "SLACK_SEND_MESSAGE",
                serde_json::json!({"channel": "C123"}),
            )]));
        }
        replies.push(text_response("All set! I posted to #general."));
        let provider = Arc::new(ScriptedProvider::replying(replies));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));

        let reply = pipeline(provider.clone(), backend.clone())
            .handle("keep posting", &slack_aliases())
            .await
            .unwrap();

        assert_eq!(reply.content, "All set! I posted to #general.");
        assert_eq!(reply.route, ReplyRoute::Summarized);
        assert_eq!(provider.call_count(), 3 + 10 + 1);
        assert_eq!(backend.executed().len(), 10);

        // The summary embeds system, user, first assistant turn, first result
        let summary = &provider.requests()[13].messages[1].content;
        assert!(summary.contains("\"role\": \"system\""));
        assert!(summary.contains("keep posting"));
        assert!(summary.contains("call_0"));
        assert!(!summary.contains("call_1"));
    }

    #[tokio::test]
    async fn no_integrations_requires_setup_without_resolving() {
        let provider = Arc::new(ScriptedProvider::replying(vec![intent("TOOL_USE")]));
        let backend = Arc::new(RecordingBackend::new());

        let reply = pipeline(provider.clone(), backend)
            .handle("post hi", &IntegrationAliasMap::new())
            .await
            .unwrap();

        assert_eq!(reply.content, SETUP_REQUIRED_MESSAGE);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unresolved_targets_require_setup() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["JIRA"]})),
        ]));
        let backend = Arc::new(RecordingBackend::new());

        let reply = pipeline(provider, backend)
            .handle("file a ticket", &slack_aliases())
            .await
            .unwrap();

        assert_eq!(reply.route, ReplyRoute::SetupRequired);
        assert_eq!(reply.content, SETUP_REQUIRED_MESSAGE);
    }

    #[tokio::test]
    async fn no_tools_for_targets_is_a_normal_reply() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["SLACK"]})),
            json_response(serde_json::json!({"relevantAliasNames": ["general"]})),
        ]));
        let backend = Arc::new(RecordingBackend::new());

        let reply = pipeline(provider, backend)
            .handle("post hi", &slack_aliases())
            .await
            .unwrap();

        assert_eq!(reply.route, ReplyRoute::NoTools);
        assert!(reply.content.contains("SLACK"));
    }

    #[tokio::test]
    async fn lower_case_integration_keys_are_matched() {
        let aliases: IntegrationAliasMap = serde_json::from_value(serde_json::json!({
            "slack": [{"name": "general", "value": "C123"}]
        }))
        .unwrap();
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["Slack"]})),
        ]));
        let route = pipeline(provider, Arc::new(RecordingBackend::new()))
            .route("post hi", &aliases)
            .await
            .unwrap();

        assert_eq!(
            route,
            Route::ToolUse {
                targets: vec!["SLACK".into()],
                candidates: vec![Alias::new("general", "C123")],
            }
        );
    }

    #[tokio::test]
    async fn classifier_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network(
            "dns".into(),
        ))]));
        let err = pipeline(provider, Arc::new(RecordingBackend::new()))
            .handle("hello", &slack_aliases())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn stages_publish_events() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            intent("TOOL_USE"),
            json_response(serde_json::json!({"apps": ["SLACK"]})),
            json_response(serde_json::json!({"relevantAliasNames": ["general"]})),
            text_response("Nothing needed."),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));
        let p = pipeline(provider, backend);
        let mut events = p.event_bus().subscribe();

        p.handle("post hi", &slack_aliases()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::IntentClassified { .. } => "intent",
                DomainEvent::TargetsResolved { .. } => "targets",
                DomainEvent::ParametersMatched { .. } => "params",
                DomainEvent::ResponseGenerated { .. } => "response",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["intent", "targets", "params", "response"]);
    }

    #[test]
    fn pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn reply_route_serializes_snake_case() {
        let json = serde_json::to_value(ReplyRoute::SetupRequired).unwrap();
        assert_eq!(json, "setup_required");
    }
}
