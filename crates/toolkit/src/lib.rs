//! Tool backends for ActionWire.
//!
//! - [`HttpToolBackend`] talks to a remote actions service that owns the
//!   user's connected accounts (Slack, GitHub, Notion, ...).
//! - [`StaticToolBackend`] serves in-process [`Tool`] implementations grouped
//!   by integration. No configuration selects it; it is for programs that
//!   embed the pipeline with their own tools, and for tests.

pub mod http_backend;
pub mod static_backend;

pub use http_backend::HttpToolBackend;
pub use static_backend::{StaticToolBackend, Tool};

use std::sync::Arc;

use actionwire_core::error::ToolError;
use actionwire_core::tool::ToolBackend;

/// Build the backend described by the configuration.
pub fn backend_from_config(
    config: &actionwire_config::ToolsConfig,
) -> Result<Arc<dyn ToolBackend>, ToolError> {
    Ok(Arc::new(HttpToolBackend::from_config(config)?))
}
