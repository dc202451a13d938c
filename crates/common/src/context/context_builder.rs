//! Context Builder - Assembles the retrieval context sent to the model
//!
//! Provides:
//! - Stable re-ranking by score
//! - Best-text selection (extractive answer, caption, then content fields)
//! - Whitespace normalization
//! - Character budget enforcement with a truncation marker
//! - Citations parallel to the emitted context blocks

use crate::metrics;
use crate::search::{Candidate, Fragment};
use serde::{Deserialize, Serialize};

/// Appended to a snippet cut short by the budget
pub const TRUNCATION_MARKER: &str = "...";

/// Separator between an extractive answer and caption
const FRAGMENT_SEPARATOR: &str = " | ";

/// Provenance of one block of context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based label matching the `[n]` prefix in the context
    pub label: usize,

    /// Document identifier
    pub id: Option<String>,

    /// Source locator
    pub source: Option<String>,

    /// Relevance score reported by the index
    pub score: Option<f64>,
}

/// Context text plus the citations for each of its blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Blocks joined by newlines
    pub text: String,

    /// One citation per block, in block order
    pub citations: Vec<Citation>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters, the unit the budget is measured in
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Context builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBuilderConfig {
    /// Fields scanned in order when a candidate has no extractive fragment
    pub content_fields: Vec<String>,

    /// Maximum characters of context
    pub max_chars: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            content_fields: vec!["topics".to_string(), "notes".to_string(), "content".to_string()],
            max_chars: 80_000,
        }
    }
}

/// Builds a budgeted, cited context from search candidates
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextBuilderConfig,
}

impl ContextBuilder {
    /// Create a new context builder
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextBuilderConfig {
        &self.config
    }

    /// Rank candidates and assemble the context within the budget
    pub fn build(&self, candidates: &[Candidate]) -> AssembledContext {
        let ranked = rank(candidates);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let top: Vec<_> = ranked
                .iter()
                .take(3)
                .map(|c| (c.id.as_deref().unwrap_or(""), c.rank_score()))
                .collect();
            tracing::debug!(top = ?top, candidates = ranked.len(), "Top search results");
        }

        let budget = self.config.max_chars;
        let mut blocks: Vec<String> = Vec::new();
        let mut citations = Vec::new();
        let mut total = 0usize;

        for candidate in ranked {
            if total >= budget {
                break;
            }

            let Some(text) = self.select_text(candidate) else {
                continue;
            };

            let label = citations.len() + 1;
            let separator = usize::from(!blocks.is_empty());
            let prefix = format!("[{}] ", label);
            let snippet = format!(
                "Source: {}\n{}",
                candidate.source.as_deref().unwrap_or(""),
                text
            );

            let overhead = separator + prefix.chars().count();
            let snippet_len = snippet.chars().count();

            // Label and separator count too, so the joined text stays within
            // the budget (plus the marker) rather than only each snippet
            let (snippet, used) = if total + overhead + snippet_len > budget {
                let remaining = budget.saturating_sub(total + overhead);
                if remaining == 0 {
                    break;
                }
                let mut cut: String = snippet.chars().take(remaining).collect();
                cut.push_str(TRUNCATION_MARKER);
                // The marker may overrun the budget; nothing follows it
                (cut, budget)
            } else {
                (snippet, total + overhead + snippet_len)
            };

            blocks.push(format!("{}{}", prefix, snippet));
            citations.push(Citation {
                label,
                id: candidate.id.clone(),
                source: candidate.source.clone(),
                score: candidate.score,
            });
            total = used;
        }

        let context = AssembledContext {
            text: blocks.join("\n"),
            citations,
        };
        metrics::record_context(context.char_len(), context.citations.len());
        context
    }

    /// Best text for a candidate, normalized; `None` means skip it
    fn select_text(&self, candidate: &Candidate) -> Option<String> {
        let answer = first_fragment_text(&candidate.answers);
        let caption = first_fragment_text(&candidate.captions);

        let raw = match (answer, caption) {
            (Some(a), Some(c)) => format!("{}{}{}", a, FRAGMENT_SEPARATOR, c),
            (Some(a), None) => a.to_string(),
            (None, Some(c)) => c.to_string(),
            (None, None) => candidate.first_text_field(&self.config.content_fields)?.to_string(),
        };

        let normalized = normalize_whitespace(&raw);
        (!normalized.is_empty()).then_some(normalized)
    }
}

/// Stable sort by score, highest first; equal scores keep input order
pub fn rank(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
    ranked
}

/// Collapse whitespace runs (newlines included) to one space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_fragment_text(fragments: &[Fragment]) -> Option<&str> {
    fragments
        .first()
        .map(|f| f.text.as_str())
        .filter(|t| !t.trim().is_empty())
}
