//! Azure AI Search REST client
//!
//! POST {endpoint}/indexes/{index}/docs/search?api-version={version}

use super::{Candidate, SearchBackend, SearchQuery};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

/// Longest slice of an error body kept in error messages
const ERROR_SNIPPET_CHARS: usize = 300;

/// Azure AI Search document search client
pub struct AzureSearchClient {
    client: reqwest::Client,
    url: String,
    index_name: String,
}

impl AzureSearchClient {
    /// Create a client from the `search` configuration section
    ///
    /// Endpoint, index name, API key and API version are all required.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let (Some(endpoint), Some(index_name), Some(api_key), Some(api_version)) = (
            config.endpoint.as_deref(),
            config.index_name.as_deref(),
            config.api_key.as_deref(),
            config.api_version.as_deref(),
        ) else {
            return Err(AppError::Configuration {
                message: "Azure AI Search endpoint, index name, API key, and API version are required"
                    .to_string(),
            });
        };
        if !config.is_complete() {
            return Err(AppError::Configuration {
                message: "Azure AI Search settings must not be blank".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key).map_err(|e| AppError::Configuration {
                message: format!("Invalid search API key header: {}", e),
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let url = format!(
            "{}/indexes/{}/docs/search?api-version={}",
            endpoint.trim_end_matches('/'),
            index_name,
            api_version
        );

        tracing::info!(
            index = index_name,
            timeout_secs = config.timeout_secs,
            "Azure AI Search client initialized"
        );

        Ok(Self {
            client,
            url,
            index_name: index_name.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SearchBackend for AzureSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>> {
        let body = build_request_body(query);
        tracing::debug!(index = %self.index_name, body = %body, "Search request body");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Search {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Search {
                message: format!(
                    "API error {}: {}",
                    status,
                    text.chars().take(ERROR_SNIPPET_CHARS).collect::<String>()
                ),
            });
        }

        let payload: Value = response.json().await.map_err(|e| AppError::Search {
            message: format!("Failed to parse response: {}", e),
        })?;

        parse_search_response(&payload)
    }

    fn name(&self) -> &str {
        "azure-search"
    }
}

/// JSON body for a `docs/search` call
pub fn build_request_body(query: &SearchQuery) -> Value {
    let mut body = json!({
        "search": query.effective_query(),
        "top": query.top_k,
    });

    if !query.select.is_empty() {
        body["select"] = Value::from(query.select.join(","));
    }
    if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
        body["filter"] = Value::from(filter);
    }
    if query.semantic {
        body["queryType"] = Value::from("semantic");
        if let Some(config) = query.semantic_config.as_deref().filter(|c| !c.is_empty()) {
            body["semanticConfiguration"] = Value::from(config);
        }
        body["captions"] = Value::from("extractive");
        body["answers"] = Value::from("extractive");
    }

    body
}

/// Turn a `docs/search` response into candidates, keeping index order
///
/// A response without `value` is an empty result; a `value` that is not an
/// array is malformed.
pub fn parse_search_response(payload: &Value) -> Result<Vec<Candidate>> {
    let Some(obj) = payload.as_object() else {
        return Err(AppError::Search {
            message: "Malformed search response: expected a JSON object".to_string(),
        });
    };

    match obj.get("value") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(hits)) => Ok(hits.iter().filter_map(Candidate::from_search_hit).collect()),
        Some(_) => Err(AppError::Search {
            message: "Malformed search response: `value` is not an array".to_string(),
        }),
    }
}
