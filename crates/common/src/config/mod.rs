//! Configuration management for the Portfolio Assistant
//!
//! Supports loading configuration from:
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Environment variables (prefixed with APP__)
//! - The Azure variable names used by the original deployment
//! - Default values

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Azure variable names mapped onto configuration keys. Applied last, so they
/// win over files and `APP__` variables.
pub const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("AZURE_CHAT_AGENT_ENDPOINT", "completion.endpoint"),
    ("AZURE_CHAT_API_KEY", "completion.api_key"),
    ("AZURE_SEARCH_ENDPOINT", "search.endpoint"),
    ("AZURE_SEARCH_API_KEY", "search.api_key"),
    ("AZURE_SEARCH_INDEX_NAME", "search.index_name"),
    ("AZURE_SEARCH_API_VERSION", "search.api_version"),
];

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Search index configuration (retrieval is disabled when incomplete)
    #[serde(default)]
    pub search: SearchConfig,

    /// Chat completion endpoint configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Prompt policy
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Service endpoint, e.g. https://my-search.search.windows.net
    pub endpoint: Option<String>,

    /// Index to query
    pub index_name: Option<String>,

    /// Query key for the index
    pub api_key: Option<String>,

    /// REST API version, e.g. 2023-11-01
    pub api_version: Option<String>,

    /// Result cap per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fields to return (empty = all retrievable fields)
    #[serde(default)]
    pub select: Vec<String>,

    /// OData filter expression
    pub filter: Option<String>,

    /// Request semantic ranking with extractive answers and captions
    #[serde(default)]
    pub semantic: bool,

    /// Semantic configuration name
    pub semantic_config: Option<String>,

    /// Fields scanned in order when no extractive fragment is present
    #[serde(default = "default_content_fields")]
    pub content_fields: Vec<String>,

    /// Context budget in characters
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Full chat-completions URL
    pub endpoint: Option<String>,

    /// API key sent in the `api-key` header
    pub api_key: Option<String>,

    /// Generation length cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    /// Person or subject the assistant speaks about
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Replaces the built-in system instruction; may contain `{context}`
    /// and `{subject}` placeholders
    pub system_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name attached to logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_top_k() -> usize { 5 }
fn default_content_fields() -> Vec<String> {
    vec!["topics".to_string(), "notes".to_string(), "content".to_string()]
}
fn default_max_context_chars() -> usize { 80_000 }
fn default_search_timeout() -> u64 { 15 }
fn default_max_tokens() -> u32 { 256 }
fn default_completion_timeout() -> u64 { 30 }
fn default_subject() -> String { "the portfolio owner".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "portfolio-assistant".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index_name: None,
            api_key: None,
            api_version: None,
            top_k: default_top_k(),
            select: Vec::new(),
            filter: None,
            semantic: false,
            semantic_config: None,
            content_fields: default_content_fields(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            system_template: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl SearchConfig {
    /// Endpoint, index name, API key and API version are all present
    pub fn is_complete(&self) -> bool {
        is_set(&self.endpoint)
            && is_set(&self.index_name)
            && is_set(&self.api_key)
            && is_set(&self.api_version)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CompletionConfig {
    /// Endpoint and API key are both present
    pub fn is_complete(&self) -> bool {
        is_set(&self.endpoint) && is_set(&self.api_key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from files, environment and legacy Azure variables
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__SEARCH__TOP_K=8
            .add_source(app_environment());

        Self::with_legacy_overrides(builder, |name| std::env::var(name).ok())?
            .build()?
            .try_deserialize()
    }

    /// Apply `LEGACY_ENV_OVERRIDES` using `lookup` to read variables
    pub fn with_legacy_overrides<F>(
        mut builder: ConfigBuilder<DefaultState>,
        lookup: F,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &(var, key) in LEGACY_ENV_OVERRIDES {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(key, value)?;
        }
        Ok(builder)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

fn app_environment() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("search.select")
        .with_list_parse_key("search.content_fields")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.max_context_chars, 80_000);
        assert_eq!(config.search.content_fields, vec!["topics", "notes", "content"]);
        assert_eq!(config.search.timeout(), Duration::from_secs(15));
        assert_eq!(config.completion.max_tokens, 256);
        assert_eq!(config.completion.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_incomplete_sections() {
        let config = AppConfig::default();
        assert!(!config.search.is_complete());
        assert!(!config.completion.is_complete());

        let search = SearchConfig {
            endpoint: Some("https://search.example".into()),
            index_name: Some("portfolio".into()),
            api_key: Some("   ".into()),
            api_version: Some("2023-11-01".into()),
            ..SearchConfig::default()
        };
        assert!(!search.is_complete());
    }

    #[test]
    fn test_empty_sources_deserialize_to_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.search.semantic);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_legacy_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AZURE_CHAT_AGENT_ENDPOINT", "https://chat.example/completions"),
            ("AZURE_CHAT_API_KEY", "chat-key"),
            ("AZURE_SEARCH_ENDPOINT", "https://search.example"),
            ("AZURE_SEARCH_API_KEY", "search-key"),
            ("AZURE_SEARCH_INDEX_NAME", "portfolio"),
            ("AZURE_SEARCH_API_VERSION", "2023-11-01"),
        ]);

        let builder = Config::builder().set_default("search.top_k", 3).unwrap();
        let config: AppConfig =
            AppConfig::with_legacy_overrides(builder, |name| vars.get(name).map(|v| v.to_string()))
                .unwrap()
                .build()
                .unwrap()
                .try_deserialize()
                .unwrap();

        assert!(config.search.is_complete());
        assert!(config.completion.is_complete());
        assert_eq!(config.search.index_name.as_deref(), Some("portfolio"));
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.completion.api_key.as_deref(), Some("chat-key"));
    }

    #[test]
    fn test_blank_legacy_values_are_ignored() {
        let builder = Config::builder()
            .set_default("completion.endpoint", "https://chat.example")
            .unwrap();
        let config: AppConfig = AppConfig::with_legacy_overrides(builder, |name| {
            (name == "AZURE_CHAT_AGENT_ENDPOINT").then(|| "  ".to_string())
        })
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

        assert_eq!(config.completion.endpoint.as_deref(), Some("https://chat.example"));
    }
}
