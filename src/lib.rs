//! Lemmex: a self-hosted site search engine
//!
//! This crate crawls a configured set of websites, lemmatizes their textual
//! content into an inverted index stored in SQLite, and answers ranked search
//! queries over that index with highlighted snippets.

pub mod config;
pub mod crawler;
pub mod indexer;
pub mod morphology;
pub mod search;
pub mod service;
pub mod stats;
pub mod storage;

use thiserror::Error;

/// Main error type for Lemmex operations
#[derive(Debug, Error)]
pub enum LemmexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Site {url} is not indexed yet")]
    SiteNotIndexed { url: String },

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Lemmex operations
pub type Result<T> = std::result::Result<T, LemmexError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use morphology::{DictionaryMorphology, Lemmatizer, Morphology};
pub use search::{SearchEngine, SearchOutcome, SearchResult};
pub use service::{IndexingService, RunState, ServiceError};
pub use storage::{PageRecord, SiteRecord, SiteStatus};
