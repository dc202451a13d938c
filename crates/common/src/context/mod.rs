//! Retrieval context assembly
//!
//! Turns ranked search candidates into the labelled context block embedded
//! in the system prompt, plus the citations returned with the reply.

mod context_builder;

pub use context_builder::{
    normalize_whitespace, rank, AssembledContext, Citation, ContextBuilder, ContextBuilderConfig,
    TRUNCATION_MARKER,
};
