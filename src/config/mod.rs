//! Configuration module for Lemmex
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lemmex::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lemmex.toml")).unwrap();
//! println!("Indexing {} sites", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, IndexConfig, SearchConfig, SiteEntry, StorageConfig};

// Re-export parser functions
pub use parser::load_config;
