//! `POST /api/chat`: one utterance in, one reply out.

use actionwire_core::alias::IntegrationAliasMap;
use actionwire_core::error::{Error, PipelineError, ProviderError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    /// Integration → aliases snapshot from the caller's store
    #[serde(default)]
    pub aliases: IntegrationAliasMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    /// The request never reached the pipeline
    Validation(String),
    /// The pipeline failed mid-request
    Pipeline(Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::Pipeline(e) => {
                error!(error = %e, "Error in /api/chat");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ChatResponse {
                        content: format!("Sorry, I encountered an error: {}", describe(&e)),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// One line a caller can be shown. Upstream bodies only go to the log.
fn describe(e: &Error) -> String {
    match e {
        Error::Provider(p) => match p {
            ProviderError::ApiError { status_code, .. } => {
                format!("the language model service returned HTTP {status_code}")
            }
            ProviderError::RateLimited { retry_after_secs } => format!(
                "the language model service is rate limited, retry in {retry_after_secs}s"
            ),
            ProviderError::AuthenticationFailed(_) => {
                "the language model service rejected the credentials".into()
            }
            ProviderError::ModelNotFound(_) => "the configured model is not available".into(),
            ProviderError::NotConfigured(_) => {
                "the language model service is not configured".into()
            }
            ProviderError::Timeout(_) => "the language model service timed out".into(),
            ProviderError::Network(_) => "the language model service is unreachable".into(),
        },
        Error::Tool(_) => "the actions service failed".into(),
        Error::Pipeline(PipelineError::MalformedOutput { stage, .. }) => {
            format!("the model returned an unusable {stage} answer")
        }
        Error::Pipeline(PipelineError::ToolListing(_)) => {
            "could not list the actions for your integrations".into()
        }
        Error::Serialization(_) => "a message could not be encoded".into(),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Pipeline(e)
    }
}

impl ChatRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.message.trim().is_empty() {
            return Err(ApiError::Validation("message must not be empty".into()));
        }
        Ok(())
    }
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    info!(
        message_len = request.message.len(),
        integrations = request.aliases.len(),
        "Chat request received"
    );

    let reply = state
        .pipeline
        .handle(&request.message, &request.aliases)
        .await?;
    info!(route = ?reply.route, "Chat request handled");

    Ok(Json(ChatResponse {
        content: reply.content,
    }))
}
