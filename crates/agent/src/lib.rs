//! The ActionWire orchestration pipeline.
//!
//! One utterance moves through these stages:
//!
//! 1. **Classify** the intent: tool use or general chat
//! 2. **Resolve** which of the user's integrations it addresses
//! 3. **Match** the stored parameters it refers to
//! 4. **Compose** the utterance with those parameters
//! 5. **Loop**: offer the integrations' tools to the model, execute what it
//!    asks for, and feed results back until it answers in text or runs out
//!    of iterations (then **summarize**)
//!
//! Stages 2 to 5 only run for tool use. Every stage talks to the model
//! through [`actionwire_core::Provider`] and to tools through
//! [`actionwire_core::ToolBackend`].

pub mod compose;
pub mod intent;
pub mod loop_runner;
pub mod params;
pub mod pipeline;
pub mod settings;
pub mod summarizer;
pub mod targets;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compose::compose;
pub use intent::{Intent, IntentClassifier};
pub use loop_runner::{LoopOutcome, LoopState, ToolCallingLoop, assign_missing_ids};
pub use params::ParameterMatcher;
pub use pipeline::{Pipeline, PipelineReply, ReplyRoute, Route};
pub use settings::{ModelSettings, PipelineSettings};
pub use summarizer::Summarizer;
pub use targets::TargetResolver;
