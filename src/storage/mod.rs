//! Storage module for persisting the search index
//!
//! This module handles all database operations for the engine, including:
//! - SQLite database initialization and schema management
//! - Site status tracking across indexing runs
//! - Page, lemma, and inverted-index persistence
//! - Frequency bookkeeping for page removal

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::LemmexError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(LemmexError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, LemmexError> {
    SqliteStorage::new(path)
}

/// Represents an indexed site in the database
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub last_error: Option<String>,
}

/// Represents a crawled page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// A page ready to be persisted for a site
#[derive(Debug, Clone)]
pub struct NewPage {
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// Represents a lemma row scoped to one site
#[derive(Debug, Clone)]
pub struct LemmaRecord {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// Represents one inverted-index row (lemma occurrence weight on a page)
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: f64,
}

/// An inverted-index row ready to be persisted
#[derive(Debug, Clone)]
pub struct NewIndexEntry {
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: f64,
}

/// Lifecycle status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl SiteStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}
