//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    IndexRecord, LemmaRecord, NewIndexEntry, NewPage, PageRecord, SiteRecord, SiteStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler,
/// the indexing pipeline, and the search engine. Implementations should
/// provide consistent visibility: a site's pages, lemmas, and index rows
/// are always read and written through the same connection.
pub trait Storage {
    // ===== Site Management =====

    /// Inserts a new site in the `Indexing` status
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized root URL of the site
    /// * `name` - Human-readable site name
    ///
    /// # Returns
    ///
    /// The ID of the newly created site
    fn insert_site(&mut self, url: &str, name: &str) -> StorageResult<i64>;

    /// Gets a site by ID
    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord>;

    /// Gets a site by its root URL
    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Gets all sites
    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Deletes a site by URL, cascading to its pages, lemmas, and index rows
    fn delete_site_by_url(&mut self, url: &str) -> StorageResult<()>;

    /// Updates a site's status and error message, refreshing its status time
    fn set_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes a site's status time without changing its status
    fn touch_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Page Management =====

    /// Inserts a batch of pages for a site in one transaction
    ///
    /// # Returns
    ///
    /// The new page IDs, in the same order as `pages`
    fn insert_pages(&mut self, site_id: i64, pages: &[NewPage]) -> StorageResult<Vec<i64>>;

    /// Inserts a single page and returns its ID
    fn insert_page(&mut self, site_id: i64, page: &NewPage) -> StorageResult<i64>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by its site-relative path
    fn find_page_by_path(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets all pages belonging to a site
    fn list_pages_by_site(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Deletes a page row
    ///
    /// Callers are expected to run the index-row and lemma-frequency
    /// cleanup first; this only removes the page itself.
    fn delete_page(&mut self, page_id: i64) -> StorageResult<()>;

    /// Counts pages belonging to a site
    fn count_pages_by_site(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Lemma Management =====

    /// Inserts a batch of `(lemma, frequency)` rows for a site in one transaction
    ///
    /// # Returns
    ///
    /// The new lemma IDs, in the same order as `lemmas`
    fn insert_lemmas(&mut self, site_id: i64, lemmas: &[(String, i64)]) -> StorageResult<Vec<i64>>;

    /// Increments a lemma's page frequency for a site, inserting it at
    /// frequency 1 when it does not exist yet
    ///
    /// # Returns
    ///
    /// The lemma ID
    fn upsert_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<i64>;

    /// Gets all lemma rows belonging to a site
    fn find_lemmas_by_site(&self, site_id: i64) -> StorageResult<Vec<LemmaRecord>>;

    /// Finds lemma rows (across all sites) matching any of the given
    /// normal forms with frequency below `threshold`, ordered by
    /// ascending frequency
    fn find_lemmas_below_threshold(
        &self,
        lemmas: &[String],
        threshold: i64,
    ) -> StorageResult<Vec<LemmaRecord>>;

    /// Decrements the frequency of each given lemma by one
    fn decrement_lemma_frequencies(&mut self, lemma_ids: &[i64]) -> StorageResult<()>;

    /// Deletes lemma rows whose frequency has dropped to zero or below
    fn delete_zero_frequency_lemmas(&mut self) -> StorageResult<()>;

    /// Counts lemmas belonging to a site
    fn count_lemmas_by_site(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Index Management =====

    /// Inserts a batch of inverted-index rows in one transaction
    fn insert_index_entries(&mut self, entries: &[NewIndexEntry]) -> StorageResult<()>;

    /// Gets all index rows for a page
    fn find_index_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexRecord>>;

    /// Gets all index rows for a lemma
    fn find_index_by_lemma(&self, lemma_id: i64) -> StorageResult<Vec<IndexRecord>>;

    /// Deletes all index rows for a page
    fn delete_index_by_page(&mut self, page_id: i64) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total site count
    fn count_sites(&self) -> StorageResult<u64>;

    /// Gets total page count across all sites
    fn count_all_pages(&self) -> StorageResult<u64>;

    /// Gets total lemma count across all sites
    fn count_all_lemmas(&self) -> StorageResult<u64>;
}
