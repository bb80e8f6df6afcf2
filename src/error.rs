use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NovelscanError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// The user query could not be turned into a matcher.
    #[error("Invalid search pattern '{query}': {reason}")]
    Pattern { query: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to read document '{path}': {source}")]
    FileProcessing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Search task {0} was cancelled")]
    Cancelled(u64),

    #[error("An unexpected error occurred: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl NovelscanError {
    pub fn pattern(query: &str, reason: impl Into<String>) -> Self {
        NovelscanError::Pattern {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NovelscanError>;
