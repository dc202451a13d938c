//! Azure AI Foundry / Azure OpenAI chat-completions client

use super::{CompletionBackend, CompletionRequest};
use crate::config::CompletionConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

/// Longest slice of an error body kept in error messages
const ERROR_SNIPPET_CHARS: usize = 300;

/// Chat-completions client authenticated with an `api-key` header
pub struct AzureChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AzureChatClient {
    /// Create a client from the `completion` configuration section
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        if !config.is_complete() {
            return Err(AppError::Configuration {
                message: "Azure chat agent endpoint and API key are required".to_string(),
            });
        }
        let endpoint = config.endpoint.clone().unwrap_or_default();
        let api_key = config.api_key.as_deref().unwrap_or_default();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key).map_err(|e| AppError::Configuration {
                message: format!("Invalid chat API key header: {}", e),
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        tracing::info!(
            max_tokens = config.max_tokens,
            timeout_secs = config.timeout_secs,
            "Azure chat client initialized"
        );

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for AzureChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        tracing::info!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "POSTing to completion endpoint"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Completion {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Completion {
                message: format!(
                    "API error {}: {}",
                    status,
                    body.chars().take(ERROR_SNIPPET_CHARS).collect::<String>()
                ),
            });
        }

        response.json().await.map_err(|e| AppError::Completion {
            message: format!("Failed to parse response: {}", e),
        })
    }

    fn name(&self) -> &str {
        "azure-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_init_with_settings() {
        let config = CompletionConfig {
            endpoint: Some("https://custom-endpoint".into()),
            api_key: Some("custom-key".into()),
            ..CompletionConfig::default()
        };
        let client = AzureChatClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "https://custom-endpoint");
    }

    #[test]
    fn test_init_missing_key() {
        let config = CompletionConfig {
            endpoint: Some("https://test-endpoint".into()),
            api_key: None,
            ..CompletionConfig::default()
        };
        assert!(matches!(
            AzureChatClient::new(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_request_body() {
        let request = CompletionRequest {
            messages: vec![ChatMessage::system("rules"), ChatMessage::user("Is anybody there?")],
            max_tokens: 256,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [
                    {"role": "system", "content": "rules"},
                    {"role": "user", "content": "Is anybody there?"}
                ],
                "max_tokens": 256
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_completion_error() {
        let config = CompletionConfig {
            // Port 9 (discard) on localhost is not expected to accept connections
            endpoint: Some("http://127.0.0.1:9/chat/completions".into()),
            api_key: Some("test-key".into()),
            timeout_secs: 2,
            ..CompletionConfig::default()
        };
        let client = AzureChatClient::new(&config).unwrap();
        let request = CompletionRequest {
            messages: vec![ChatMessage::user("Is anybody there?")],
            max_tokens: 16,
        };

        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Completion { .. }));
    }

    #[tokio::test]
    async fn test_server_error_becomes_error_reply() {
        use crate::completion::{CompletionInvoker, Reply};
        use crate::prompt::ComposedPrompt;
        use std::sync::Arc;

        let app = axum::Router::new().fallback(|| async {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "model overloaded")
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = CompletionConfig {
            endpoint: Some(format!("http://{}/chat/completions", addr)),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
            ..CompletionConfig::default()
        };
        let invoker = CompletionInvoker::new(Arc::new(AzureChatClient::new(&config).unwrap()), 16);

        let reply = invoker
            .invoke(ComposedPrompt {
                messages: vec![ChatMessage::user("Is anybody there?")],
                citations: Vec::new(),
            })
            .await;

        match reply {
            Reply::Error { error } => {
                assert!(error.contains("500"));
                assert!(error.contains("model overloaded"));
            }
            other => panic!("expected error reply, got {:?}", other),
        }
    }
}
