//! # ActionWire Core
//!
//! Domain types, traits, and error definitions for the ActionWire agent.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here:
//! - [`Provider`]: the language model service
//! - [`ToolBackend`]: the tool-execution backend for integrations
//!
//! Implementations live in their respective crates.

pub mod alias;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use alias::{Alias, IntegrationAliasMap};
pub use error::{Error, PipelineError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition};
pub use tool::{ToolBackend, ToolCall};
