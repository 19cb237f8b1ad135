//! The bounded tool-calling loop.
//!
//! The model is offered the tools of the target integrations and invoked
//! repeatedly. Each requested call is executed in issue order and its result
//! appended before the next invocation. The loop ends when the model answers
//! without calling a tool, or after `max_iterations` invocations, in which
//! case a summary of the transcript prefix becomes the answer.

use std::sync::Arc;
use std::time::Instant;

use actionwire_core::error::{PipelineError, Result, ToolError};
use actionwire_core::event::{DomainEvent, EventBus};
use actionwire_core::message::{Conversation, Message, MessageToolCall};
use actionwire_core::provider::{Provider, ToolDefinition};
use actionwire_core::tool::{ToolBackend, ToolCall};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::settings::ModelSettings;
use crate::summarizer::Summarizer;

const SYSTEM_PROMPT: &str = "You are a powerful and helpful AI assistant. Your goal is to use \
the provided tools to fulfill the user's request completely. You can use multiple tools in \
sequence if needed. Once you have finished, provide a clear, concise summary of what you \
accomplished.";

/// Where the loop is.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    FetchingTools,
    /// About to make model invocation `k` (zero-based)
    Iterating(u32),
    Resolved(String),
    IterationsExhausted,
}

/// How the loop ended. Every variant carries the user-facing text.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The target integrations expose no tools
    NoTools(String),
    /// The model answered without requesting a tool
    Resolved(String),
    /// The iteration bound was hit and the transcript was summarized
    Summarized(String),
}

impl LoopOutcome {
    pub fn text(&self) -> &str {
        match self {
            LoopOutcome::NoTools(t) | LoopOutcome::Resolved(t) | LoopOutcome::Summarized(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            LoopOutcome::NoTools(t) | LoopOutcome::Resolved(t) | LoopOutcome::Summarized(t) => t,
        }
    }
}

/// Give every call without an id a fresh UUID. Returns how many were filled.
pub fn assign_missing_ids(calls: &mut [MessageToolCall]) -> usize {
    let mut assigned = 0;
    for call in calls.iter_mut().filter(|c| c.id.is_empty()) {
        call.id = uuid::Uuid::new_v4().to_string();
        assigned += 1;
    }
    assigned
}

pub fn no_tools_message(targets: &[String]) -> String {
    format!(
        "I couldn't find any actions for {}. Please check your tool integration connections.",
        targets.join(" and ")
    )
}

/// Runs the tool-calling loop for one request.
pub struct ToolCallingLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolBackend>,
    settings: ModelSettings,
    max_iterations: u32,
    summary_prefix_len: usize,
    summarizer: Summarizer,
    event_bus: Arc<EventBus>,
}

impl ToolCallingLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolBackend>,
        settings: ModelSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let summarizer = Summarizer::new(Arc::clone(&provider), settings.clone());
        Self {
            provider,
            tools,
            settings,
            max_iterations: 10,
            summary_prefix_len: 4,
            summarizer,
            event_bus,
        }
    }

    /// Set the maximum number of model invocations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set how many leading transcript messages the summarizer sees.
    pub fn with_summary_prefix_len(mut self, len: usize) -> Self {
        self.summary_prefix_len = len;
        self
    }

    pub async fn run(&self, contextualized: &str, targets: &[String]) -> Result<LoopOutcome> {
        let mut conversation = Conversation::seeded(SYSTEM_PROMPT, contextualized);
        let mut tools: Vec<ToolDefinition> = Vec::new();
        let mut state = LoopState::FetchingTools;

        loop {
            state = match state {
                LoopState::FetchingTools => {
                    let fetched = self
                        .tools
                        .list_tools(targets)
                        .await
                        .map_err(|e| PipelineError::ToolListing(e.to_string()))?;
                    if fetched.is_empty() {
                        warn!(?targets, "No tools available for target integrations");
                        return Ok(LoopOutcome::NoTools(no_tools_message(targets)));
                    }
                    info!(count = fetched.len(), ?targets, "Fetched tools");
                    tools.extend(fetched);
                    LoopState::Iterating(0)
                }
                LoopState::Iterating(k) if k >= self.max_iterations => {
                    LoopState::IterationsExhausted
                }
                LoopState::Iterating(k) => self.step(&mut conversation, &tools, k).await?,
                LoopState::Resolved(text) => return Ok(LoopOutcome::Resolved(text)),
                LoopState::IterationsExhausted => {
                    warn!(
                        iterations = self.max_iterations,
                        "Tool loop hit its iteration bound, summarizing"
                    );
                    self.event_bus.publish(DomainEvent::IterationsExhausted {
                        conversation_id: conversation.id.to_string(),
                        iterations: self.max_iterations,
                        timestamp: Utc::now(),
                    });
                    let summary = self
                        .summarizer
                        .summarize(conversation.prefix(self.summary_prefix_len))
                        .await?;
                    return Ok(LoopOutcome::Summarized(summary));
                }
            };
        }
    }

    /// One model invocation plus the tool calls it requests.
    async fn step(
        &self,
        conversation: &mut Conversation,
        tools: &[ToolDefinition],
        k: u32,
    ) -> Result<LoopState> {
        debug!(iteration = k + 1, tools = tools.len(), "Calling model with tools");

        debug_assert!(
            conversation.unanswered_tool_calls().is_empty(),
            "every tool call must have a result before the next invocation"
        );
        let request = self
            .settings
            .request(conversation.messages.clone())
            .with_tools(tools.to_vec());
        let response = self.provider.complete(request).await?;

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: conversation.id.to_string(),
            model: response.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            timestamp: Utc::now(),
        });

        let mut message = response.message;
        if !message.has_tool_calls() {
            let text = message.content.clone();
            conversation.push(message);
            return Ok(LoopState::Resolved(text));
        }

        let assigned = assign_missing_ids(&mut message.tool_calls);
        if assigned > 0 {
            debug!(assigned, "Assigned ids to tool calls");
        }
        let calls = message.tool_calls.clone();
        conversation.push(message);

        for call in &calls {
            let content = self.dispatch(call, tools).await;
            conversation.push(Message::tool_result(&call.id, content));
        }

        Ok(LoopState::Iterating(k + 1))
    }

    /// Execute one call. Failures become the result text. Only tools that
    /// were offered this turn reach the backend.
    async fn dispatch(&self, call: &MessageToolCall, offered: &[ToolDefinition]) -> String {
        let start = Instant::now();
        let result = if !offered.iter().any(|t| t.name == call.name) {
            Err(ToolError::NotFound(call.name.clone()))
        } else {
            match ToolCall::try_from(call) {
                Ok(tool_call) => self.tools.execute(&tool_call).await,
                Err(e) => Err(e),
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(output) => {
                debug!(tool = %call.name, duration_ms, "Tool executed");
                output
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("Error executing tool: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::FALLBACK_SUMMARY;
    use crate::test_helpers::*;
    use actionwire_core::error::{Error, ProviderError};
    use actionwire_core::message::Role;

    fn slack() -> Vec<String> {
        vec!["SLACK".to_string()]
    }

    fn run_loop(provider: Arc<ScriptedProvider>, backend: Arc<RecordingBackend>) -> ToolCallingLoop {
        ToolCallingLoop::new(
            provider,
            backend,
            ModelSettings::default(),
            Arc::new(EventBus::default()),
        )
    }

    #[test]
    fn assigns_only_missing_ids() {
        let mut calls = vec![
            tool_call("call_a", "X", serde_json::json!({})),
            tool_call("", "Y", serde_json::json!({})),
        ];
        assert_eq!(assign_missing_ids(&mut calls), 1);
        assert_eq!(calls[0].id, "call_a");
        assert!(uuid::Uuid::parse_str(&calls[1].id).is_ok());
    }

    #[test]
    fn no_tools_message_joins_with_and() {
        assert_eq!(
            no_tools_message(&["SLACK".into(), "GITHUB".into()]),
            "I couldn't find any actions for SLACK and GITHUB. Please check your tool integration connections."
        );
    }

    #[tokio::test]
    async fn no_tools_makes_no_model_call() {
        let provider = Arc::new(ScriptedProvider::replying(vec![]));
        let backend = Arc::new(RecordingBackend::new().with_tool("GITHUB", "GITHUB_CREATE_ISSUE"));
        let outcome = run_loop(provider.clone(), backend)
            .run("post hi", &slack())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::NoTools(
                "I couldn't find any actions for SLACK. Please check your tool integration connections."
                    .into()
            )
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::replying(vec![]));
        let backend = Arc::new(
            RecordingBackend::new().with_listing_error(ToolError::Backend("503".into())),
        );
        let err = run_loop(provider, backend).run("x", &slack()).await.unwrap_err();
        assert!(matches!(err, Error::Pipeline(PipelineError::ToolListing(_))));
    }

    #[tokio::test]
    async fn text_reply_exits_after_one_call() {
        let provider = Arc::new(ScriptedProvider::replying(vec![text_response(
            "Nothing to do here.",
        )]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));
        let outcome = run_loop(provider.clone(), backend.clone())
            .run("post hi", &slack())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Resolved("Nothing to do here.".into()));
        assert_eq!(provider.call_count(), 1);
        assert!(backend.executed().is_empty());

        let req = &provider.requests()[0];
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].content, "post hi");
    }

    #[tokio::test]
    async fn every_call_gets_one_result_before_the_next_invocation() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            tool_response(vec![
                tool_call("call_1", "SLACK_SEND_MESSAGE", serde_json::json!({"channel": "C1"})),
                tool_call("", "SLACK_SEND_MESSAGE", serde_json::json!({"channel": "C2"})),
                tool_call("call_3", "SLACK_PIN", serde_json::json!({})),
            ]),
            text_response("Posted twice and pinned."),
        ]));
        let backend = Arc::new(
            RecordingBackend::new()
                .with_tool("SLACK", "SLACK_SEND_MESSAGE")
                .with_tool("SLACK", "SLACK_PIN")
                .failing("SLACK_PIN", ToolError::NotFound("SLACK_PIN".into())),
        );

        let outcome = run_loop(provider.clone(), backend.clone())
            .run("post hi", &slack())
            .await
            .unwrap();
        assert_eq!(outcome.text(), "Posted twice and pinned.");

        // The second invocation sees: system, user, assistant, 3 tool results
        let second = &provider.requests()[1].messages;
        assert_eq!(second.len(), 6);
        let assistant = &second[2];
        let results = &second[3..];
        for (call, result) in assistant.tool_calls.iter().zip(results) {
            assert_eq!(result.role, Role::Tool);
            assert!(!call.id.is_empty());
            assert_eq!(result.tool_call_id.as_deref(), Some(call.id.as_str()));
        }
        assert!(results[2].content.starts_with("Error executing tool: "));

        let executed = backend.executed();
        assert_eq!(executed.len(), 3);
        assert_eq!(executed[1].arguments["channel"], "C2");
        assert_eq!(executed[1].id, assistant.tool_calls[1].id);
    }

    #[tokio::test]
    async fn calls_to_tools_that_were_not_offered_never_reach_the_backend() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            tool_response(vec![
                tool_call("call_1", "../../v1/admin/keys", serde_json::json!({})),
                tool_call("call_2", "GITHUB_DELETE_REPO", serde_json::json!({})),
                tool_call("call_3", "SLACK_SEND_MESSAGE", serde_json::json!({})),
            ]),
            text_response("Done."),
        ]));
        let backend = Arc::new(
            RecordingBackend::new()
                .with_tool("SLACK", "SLACK_SEND_MESSAGE")
                .with_tool("GITHUB", "GITHUB_DELETE_REPO"),
        );

        run_loop(provider.clone(), backend.clone())
            .run("post hi", &slack())
            .await
            .unwrap();

        let executed = backend.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].name, "SLACK_SEND_MESSAGE");

        let second = &provider.requests()[1].messages;
        assert_eq!(
            second[3].content,
            "Error executing tool: Tool not found: ../../v1/admin/keys"
        );
        assert_eq!(
            second[4].content,
            "Error executing tool: Tool not found: GITHUB_DELETE_REPO"
        );
        assert!(second[5].content.contains("successful"));
    }

    #[tokio::test]
    async fn malformed_arguments_fail_only_that_call() {
        let bad = MessageToolCall {
            id: "call_bad".into(),
            name: "SLACK_SEND_MESSAGE".into(),
            arguments: "{not json".into(),
        };
        let provider = Arc::new(ScriptedProvider::replying(vec![
            tool_response(vec![
                bad,
                tool_call("call_ok", "SLACK_SEND_MESSAGE", serde_json::json!({})),
            ]),
            text_response("Done."),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));

        run_loop(provider.clone(), backend.clone())
            .run("post hi", &slack())
            .await
            .unwrap();

        assert_eq!(backend.executed().len(), 1);
        let second = &provider.requests()[1].messages;
        assert!(second[3].content.starts_with("Error executing tool: Invalid tool arguments"));
        assert!(second[4].content.contains("successful"));
    }

    #[tokio::test]
    async fn endless_tool_calls_are_bounded_and_summarized() {
        let mut replies: Vec<_> = (0..3)
            .map(|i| {
                tool_response(vec![tool_call(
                    &format!("call_{i}"),
                    "SLACK_SEND_MESSAGE",
                    serde_json::json!({}),
                )])
            })
            .collect();
        replies.push(text_response("Okay! I sent the messages."));
        let provider = Arc::new(ScriptedProvider::replying(replies));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();

        let outcome = ToolCallingLoop::new(
            provider.clone(),
            backend.clone(),
            ModelSettings::default(),
            bus,
        )
        .with_max_iterations(3)
        .run("post hi", &slack())
        .await
        .unwrap();

        assert_eq!(outcome, LoopOutcome::Summarized("Okay! I sent the messages.".into()));
        assert_eq!(provider.call_count(), 4);
        assert_eq!(backend.executed().len(), 3);

        // The summary call carries no tools
        let summary_req = &provider.requests()[3];
        assert!(summary_req.tools.is_empty());

        let mut exhausted = false;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::IterationsExhausted { iterations, .. } = event.as_ref() {
                assert_eq!(*iterations, 3);
                exhausted = true;
            }
        }
        assert!(exhausted);
    }

    #[tokio::test]
    async fn empty_summary_uses_fallback() {
        let provider = Arc::new(ScriptedProvider::replying(vec![
            tool_response(vec![tool_call("c", "SLACK_SEND_MESSAGE", serde_json::json!({}))]),
            text_response(""),
        ]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));
        let outcome = run_loop(provider, backend)
            .with_max_iterations(1)
            .run("post hi", &slack())
            .await
            .unwrap();
        assert_eq!(outcome.into_text(), FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn model_failure_inside_the_loop_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        })]));
        let backend = Arc::new(RecordingBackend::new().with_tool("SLACK", "SLACK_SEND_MESSAGE"));
        let err = run_loop(provider, backend).run("x", &slack()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::RateLimited { .. })));
    }
}
