//! Prompt composition
//!
//! A system instruction is attached only when there is retrieval context to
//! ground it; otherwise the model sees the user's message alone.

use crate::context::{AssembledContext, Citation, ContextBuilder};
use crate::search::Retrieval;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the assembled context
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced by the configured subject
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// Built-in system instruction
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "\
You are a helpful assistant that answers questions about {subject}.
Answer using only the information in the context below. Each context entry \
starts with a bracketed label and its source.
If a question is highly ambiguous, you may ask a short clarifying question \
instead of answering.
If a question about {subject} cannot be answered from the context, say that \
you are not certain and suggest contacting {subject} directly.
Basic or general-knowledge questions may be answered directly, even when the \
context does not cover them.

Context:
{context}";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Messages ready for the completion call, with the citations they rely on
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub messages: Vec<ChatMessage>,
    pub citations: Vec<Citation>,
}

impl ComposedPrompt {
    /// Whether a context-bearing system message was attached
    pub fn is_grounded(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }
}

/// Builds the message sequence for one chat turn
#[derive(Debug, Clone)]
pub struct PromptComposer {
    template: String,
    subject: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_TEMPLATE, "the portfolio owner")
    }
}

impl PromptComposer {
    pub fn new(template: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subject: subject.into(),
        }
    }

    /// System instruction with `context` embedded
    pub fn system_instruction(&self, context: &str) -> String {
        self.template
            .replace(SUBJECT_PLACEHOLDER, &self.subject)
            .replace(CONTEXT_PLACEHOLDER, context)
    }

    /// Compose messages for `query`, grounding them in `context` when it has text
    pub fn compose(&self, query: &str, context: Option<&AssembledContext>) -> ComposedPrompt {
        match context {
            Some(context) if !context.is_empty() => ComposedPrompt {
                messages: vec![
                    ChatMessage::system(self.system_instruction(&context.text)),
                    ChatMessage::user(query),
                ],
                citations: context.citations.clone(),
            },
            _ => ComposedPrompt {
                messages: vec![ChatMessage::user(query)],
                citations: Vec::new(),
            },
        }
    }

    /// Compose from a retrieval outcome
    ///
    /// `None` means no search backend is configured. Empty and unavailable
    /// retrievals degrade to the bare user message.
    pub fn compose_from_retrieval(
        &self,
        query: &str,
        retrieval: Option<&Retrieval>,
        builder: &ContextBuilder,
    ) -> ComposedPrompt {
        match retrieval {
            Some(Retrieval::Candidates(candidates)) => {
                let context = builder.build(candidates);
                if context.is_empty() {
                    tracing::info!(
                        candidates = candidates.len(),
                        "No usable text in search results, sending query without context"
                    );
                }
                self.compose(query, Some(&context))
            }
            Some(Retrieval::Unavailable { reason }) => {
                tracing::warn!(reason = %reason, "Retrieval unavailable, sending query without context");
                self.compose(query, None)
            }
            Some(Retrieval::Empty) | None => self.compose(query, None),
        }
    }
}
