//! Completion invoker
//!
//! Sends the composed messages to the chat-completion endpoint and turns
//! whatever comes back into a [`Reply`]. Transport failures become
//! `Reply::Error` values; they are never raised to the caller.

mod azure;

pub use azure::AzureChatClient;

use crate::context::Citation;
use crate::errors::Result;
use crate::metrics;
use crate::prompt::{ChatMessage, ComposedPrompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Default generation length cap
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Body of a chat-completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Common trait for chat-completion endpoints
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one request and return the parsed JSON response
    async fn complete(&self, request: &CompletionRequest) -> Result<Value>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// What a completion response turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionShape {
    /// `choices[0].message.content`, or `choices[0].text`
    RecognizedChoice(String),

    /// Anything else, passed on untouched
    RawPassthrough(Value),
}

impl CompletionShape {
    pub fn from_response(response: Value) -> Self {
        match first_choice_content(&response) {
            Some(content) => CompletionShape::RecognizedChoice(content.to_string()),
            None => CompletionShape::RawPassthrough(response),
        }
    }
}

fn first_choice_content(response: &Value) -> Option<&str> {
    let choice = response.as_object()?.get("choices")?.as_array()?.first()?;

    non_empty_str(choice.get("message").and_then(|m| m.get("content")))
        .or_else(|| non_empty_str(choice.get("text")))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Result of one chat turn
///
/// Serializes to exactly one of `{"reply", "citations"?}`, `{"error"}`, or the
/// endpoint's own JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Answer {
        reply: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        citations: Vec<Citation>,
    },
    Error {
        error: String,
    },
    Passthrough(Value),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    /// The answer text, if the endpoint produced one
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Answer { reply, .. } => Some(reply),
            Reply::Error { .. } | Reply::Passthrough(_) => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Reply::Answer { .. } => "reply",
            Reply::Error { .. } => "error",
            Reply::Passthrough(_) => "passthrough",
        }
    }
}

/// Calls the completion backend with a fixed generation cap
#[derive(Clone)]
pub struct CompletionInvoker {
    backend: Arc<dyn CompletionBackend>,
    max_tokens: u32,
}

impl CompletionInvoker {
    pub fn new(backend: Arc<dyn CompletionBackend>, max_tokens: u32) -> Self {
        Self {
            backend,
            max_tokens,
        }
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Send the prompt and normalize the response
    pub async fn invoke(&self, prompt: ComposedPrompt) -> Reply {
        let start = Instant::now();
        let request = CompletionRequest {
            messages: prompt.messages,
            max_tokens: self.max_tokens,
        };

        let reply = match self.backend.complete(&request).await {
            Ok(response) => match CompletionShape::from_response(response) {
                CompletionShape::RecognizedChoice(reply) => Reply::Answer {
                    reply,
                    citations: prompt.citations,
                },
                CompletionShape::RawPassthrough(raw) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        "Completion response has no choice content, passing it through"
                    );
                    Reply::Passthrough(raw)
                }
            },
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    "Request to completion endpoint failed"
                );
                Reply::Error {
                    error: e.to_string(),
                }
            }
        };

        let elapsed = start.elapsed();
        metrics::record_completion(elapsed.as_secs_f64(), reply.outcome());
        tracing::info!(
            backend = self.backend.name(),
            outcome = reply.outcome(),
            latency_ms = elapsed.as_millis() as u64,
            "Completion finished"
        );

        reply
    }
}
