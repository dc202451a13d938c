//! Portfolio Assistant Common Library
//!
//! Core of the portfolio chat assistant, shared by the HTTP gateway:
//! - Search gateway over the document index
//! - Context assembly with citations
//! - Prompt composition and completion calls
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod assistant;
pub mod completion;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics;
pub mod prompt;
pub mod search;

// Re-export commonly used types
pub use assistant::Assistant;
pub use completion::{CompletionBackend, Reply};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use search::SearchBackend;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
