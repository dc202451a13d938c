//! Chat turn orchestration
//!
//! One turn is: retrieve (when an index is configured), assemble context,
//! compose the prompt, call the completion endpoint. Every collaborator
//! failure is absorbed along the way, so [`Assistant::respond`] always
//! produces a [`Reply`].

use crate::completion::{AzureChatClient, CompletionBackend, CompletionInvoker, Reply};
use crate::config::{AppConfig, SearchConfig};
use crate::context::{ContextBuilder, ContextBuilderConfig};
use crate::errors::Result;
use crate::prompt::{PromptComposer, DEFAULT_SYSTEM_TEMPLATE};
use crate::search::{self, AzureSearchClient, SearchBackend, SearchQuery};
use std::sync::Arc;

/// Query parameters applied to every retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub top_k: usize,
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub semantic: bool,
    pub semantic_config: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            top_k: config.top_k,
            select: config.select.clone(),
            filter: config.filter.clone(),
            semantic: config.semantic,
            semantic_config: config.semantic_config.clone(),
        }
    }
}

impl SearchSettings {
    fn query(&self, text: &str) -> SearchQuery {
        SearchQuery {
            query: text.to_string(),
            top_k: self.top_k,
            select: self.select.clone(),
            filter: self.filter.clone(),
            semantic: self.semantic,
            semantic_config: self.semantic_config.clone(),
        }
    }
}

/// Retrieval-augmented chat assistant
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct Assistant {
    search: Option<Arc<dyn SearchBackend>>,
    settings: SearchSettings,
    builder: ContextBuilder,
    composer: PromptComposer,
    invoker: CompletionInvoker,
}

impl Assistant {
    /// Assemble an assistant from its parts
    ///
    /// Pass `None` for `search` to answer without retrieval.
    pub fn new(
        search: Option<Arc<dyn SearchBackend>>,
        invoker: CompletionInvoker,
        builder: ContextBuilder,
        composer: PromptComposer,
    ) -> Self {
        Self {
            search,
            settings: SearchSettings::default(),
            builder,
            composer,
            invoker,
        }
    }

    pub fn with_search_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the Azure-backed assistant described by `config`
    ///
    /// Fails when the completion endpoint is not configured. An incomplete
    /// search section only disables retrieval.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let completion: Arc<dyn CompletionBackend> =
            Arc::new(AzureChatClient::new(&config.completion)?);
        let invoker = CompletionInvoker::new(completion, config.completion.max_tokens);

        let search: Option<Arc<dyn SearchBackend>> = if config.search.is_complete() {
            Some(Arc::new(AzureSearchClient::new(&config.search)?))
        } else {
            tracing::info!("Search settings incomplete, retrieval disabled");
            None
        };

        let builder = ContextBuilder::new(ContextBuilderConfig {
            content_fields: config.search.content_fields.clone(),
            max_chars: config.search.max_context_chars,
        });

        let template = config
            .assistant
            .system_template
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_TEMPLATE);
        let composer = PromptComposer::new(template, config.assistant.subject.as_str());

        Ok(Self::new(search, invoker, builder, composer)
            .with_search_settings(SearchSettings::from(&config.search)))
    }

    /// Whether answers are grounded in a document index
    pub fn retrieval_enabled(&self) -> bool {
        self.search.is_some()
    }

    /// Answer one user message
    ///
    /// `conversation_id` is recorded in logs only.
    #[tracing::instrument(skip(self, user_message), fields(query_len = user_message.len()))]
    pub async fn respond(&self, user_message: &str, conversation_id: &str) -> Reply {
        let retrieval = match &self.search {
            Some(backend) => {
                let query = self.settings.query(user_message);
                Some(search::retrieve(backend.as_ref(), &query).await)
            }
            None => None,
        };

        let prompt =
            self.composer
                .compose_from_retrieval(user_message, retrieval.as_ref(), &self.builder);

        tracing::debug!(
            grounded = prompt.is_grounded(),
            citations = prompt.citations.len(),
            "Prompt composed"
        );

        self.invoker.invoke(prompt).await
    }
}
