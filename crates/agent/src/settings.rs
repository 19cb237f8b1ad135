//! Model and loop settings shared by every pipeline stage.

use actionwire_config::AppConfig;
use actionwire_core::message::Message;
use actionwire_core::provider::ProviderRequest;

/// Which model every stage talks to, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Start a request for `messages` with these settings applied.
    pub fn request(&self, messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::new("gpt-4o-mini")
    }
}

/// Everything the [`Pipeline`](crate::Pipeline) needs besides its
/// collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub model: ModelSettings,

    /// Upper bound on model invocations inside the tool loop
    pub max_tool_iterations: u32,

    /// How many leading transcript messages the summarizer sees
    pub summary_prefix_len: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: ModelSettings {
                model: config.default_model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            max_tool_iterations: config.agent.max_tool_iterations,
            summary_prefix_len: config.agent.summary_prefix_len,
        }
    }

    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.model = model.into();
        self
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            max_tool_iterations: 10,
            summary_prefix_len: 4,
        }
    }
}
