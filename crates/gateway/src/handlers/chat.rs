//! Chat handler

use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::AppState;
use portfolio_common::{
    errors::{AppError, Result},
    metrics::RequestMetrics,
    Reply,
};

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    /// At most 4000 characters
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub message: Option<String>,

    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Used when the request does not name a conversation
pub const DEFAULT_CONVERSATION_ID: &str = "default";

impl ChatRequest {
    /// Parse a raw request body
    ///
    /// Bodies that are not JSON objects are rejected as malformed; the
    /// `Content-Type` header is not consulted.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?;

        if !value.is_object() {
            return Err(AppError::InvalidFormat {
                message: "expected a JSON object".to_string(),
            });
        }

        let request: ChatRequest =
            serde_json::from_value(value).map_err(|e| AppError::Validation {
                message: e.to_string(),
                field: None,
            })?;

        request.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("message".to_string()),
        })?;

        Ok(request)
    }

    /// The user message, if present and not blank
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }

    pub fn conversation_id(&self) -> &str {
        self.conversation_id
            .as_deref()
            .unwrap_or(DEFAULT_CONVERSATION_ID)
    }
}

/// Answer one chat message
///
/// Replies from the assistant, including `{"error": ...}` replies, are
/// returned with status 200.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<Reply>> {
    let metrics = RequestMetrics::start("POST", "/api/chat");

    let result = answer(&state, &body).await;

    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics.finish(status);

    result.map(Json)
}

async fn answer(state: &AppState, body: &[u8]) -> Result<Reply> {
    let request = ChatRequest::parse(body)?;
    let message = request.message().ok_or_else(AppError::missing_message)?;

    tracing::info!(
        conversation_id = request.conversation_id(),
        message_chars = message.chars().count(),
        "Chat request received"
    );

    Ok(state
        .assistant
        .respond(message, request.conversation_id())
        .await)
}
