//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    IndexRecord, LemmaRecord, NewIndexEntry, NewPage, PageRecord, SiteRecord, SiteStatus,
};
use crate::LemmexError;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(LemmexError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, LemmexError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, LemmexError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Site Management =====

    fn insert_site(&mut self, url: &str, name: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO site (url, name, status, status_time) VALUES (?1, ?2, ?3, ?4)",
            params![url, name, SiteStatus::Indexing.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, name, status, status_time, last_error FROM site WHERE id = ?1",
        )?;

        let site = stmt
            .query_row(params![site_id], |row| {
                Ok(SiteRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    name: row.get(2)?,
                    status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(SiteStatus::Failed),
                    status_time: row.get(4)?,
                    last_error: row.get(5)?,
                })
            })
            .map_err(|_| StorageError::SiteNotFound(format!("site ID {}", site_id)))?;

        Ok(site)
    }

    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, name, status, status_time, last_error FROM site WHERE url = ?1",
        )?;

        let site = stmt
            .query_row(params![url], |row| {
                Ok(SiteRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    name: row.get(2)?,
                    status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(SiteStatus::Failed),
                    status_time: row.get(4)?,
                    last_error: row.get(5)?,
                })
            })
            .optional()?;

        Ok(site)
    }

    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, name, status, status_time, last_error FROM site ORDER BY id ASC",
        )?;

        let sites = stmt
            .query_map([], |row| {
                Ok(SiteRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    name: row.get(2)?,
                    status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(SiteStatus::Failed),
                    status_time: row.get(4)?,
                    last_error: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    fn delete_site_by_url(&mut self, url: &str) -> StorageResult<()> {
        // ON DELETE CASCADE removes pages, lemmas, and index rows
        self.conn
            .execute("DELETE FROM site WHERE url = ?1", params![url])?;
        Ok(())
    }

    fn set_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE site SET status = ?1, status_time = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, last_error, site_id],
        )?;
        Ok(())
    }

    fn touch_site(&mut self, site_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE site SET status_time = ?1 WHERE id = ?2",
            params![now, site_id],
        )?;
        Ok(())
    }

    // ===== Page Management =====

    fn insert_pages(&mut self, site_id: i64, pages: &[NewPage]) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(pages.len());
        {
            let mut stmt = tx
                .prepare("INSERT INTO page (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)")?;
            for page in pages {
                stmt.execute(params![site_id, page.path, page.code, page.content])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn insert_page(&mut self, site_id: i64, page: &NewPage) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO page (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)",
            params![site_id, page.path, page.code, page.content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, site_id, path, code, content FROM page WHERE id = ?1")?;

        let page = stmt
            .query_row(params![page_id], |row| {
                Ok(PageRecord {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    path: row.get(2)?,
                    code: row.get(3)?,
                    content: row.get(4)?,
                })
            })
            .map_err(|_| StorageError::PageNotFound(page_id))?;

        Ok(page)
    }

    fn find_page_by_path(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, site_id, path, code, content FROM page WHERE site_id = ?1 AND path = ?2",
        )?;

        let page = stmt
            .query_row(params![site_id, path], |row| {
                Ok(PageRecord {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    path: row.get(2)?,
                    code: row.get(3)?,
                    content: row.get(4)?,
                })
            })
            .optional()?;

        Ok(page)
    }

    fn list_pages_by_site(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, site_id, path, code, content FROM page WHERE site_id = ?1 ORDER BY id ASC",
        )?;

        let pages = stmt
            .query_map(params![site_id], |row| {
                Ok(PageRecord {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    path: row.get(2)?,
                    code: row.get(3)?,
                    content: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn delete_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM page WHERE id = ?1", params![page_id])?;
        Ok(())
    }

    fn count_pages_by_site(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM page WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Lemma Management =====

    fn insert_lemmas(&mut self, site_id: i64, lemmas: &[(String, i64)]) -> StorageResult<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(lemmas.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO lemma (site_id, lemma, frequency) VALUES (?1, ?2, ?3)")?;
            for (lemma, frequency) in lemmas {
                stmt.execute(params![site_id, lemma, frequency])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn upsert_lemma(&mut self, site_id: i64, lemma: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO lemma (site_id, lemma, frequency) VALUES (?1, ?2, 1)
             ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1",
            params![site_id, lemma],
        )?;

        // last_insert_rowid is not meaningful on the update arm
        let id: i64 = self.conn.query_row(
            "SELECT id FROM lemma WHERE site_id = ?1 AND lemma = ?2",
            params![site_id, lemma],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn find_lemmas_by_site(&self, site_id: i64) -> StorageResult<Vec<LemmaRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, site_id, lemma, frequency FROM lemma WHERE site_id = ?1 ORDER BY lemma ASC",
        )?;

        let rows = stmt
            .query_map(params![site_id], |row| {
                Ok(LemmaRecord {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    lemma: row.get(2)?,
                    frequency: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn find_lemmas_below_threshold(
        &self,
        lemmas: &[String],
        threshold: i64,
    ) -> StorageResult<Vec<LemmaRecord>> {
        if lemmas.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; lemmas.len()].join(", ");
        let sql = format!(
            "SELECT id, site_id, lemma, frequency FROM lemma
             WHERE lemma IN ({}) AND frequency < ?
             ORDER BY frequency ASC, id ASC",
            placeholders
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut sql_params: Vec<&dyn ToSql> = lemmas.iter().map(|l| l as &dyn ToSql).collect();
        sql_params.push(&threshold);

        let rows = stmt
            .query_map(params_from_iter(sql_params), |row| {
                Ok(LemmaRecord {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    lemma: row.get(2)?,
                    frequency: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn decrement_lemma_frequencies(&mut self, lemma_ids: &[i64]) -> StorageResult<()> {
        if lemma_ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; lemma_ids.len()].join(", ");
        let sql = format!(
            "UPDATE lemma SET frequency = frequency - 1 WHERE id IN ({}) AND frequency > 0",
            placeholders
        );
        self.conn
            .execute(&sql, params_from_iter(lemma_ids.iter()))?;
        Ok(())
    }

    fn delete_zero_frequency_lemmas(&mut self) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM lemma WHERE frequency <= 0", [])?;
        Ok(())
    }

    fn count_lemmas_by_site(&self, site_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM lemma WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Index Management =====

    fn insert_index_entries(&mut self, entries: &[NewIndexEntry]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_lemma (page_id, lemma_id, rank_count) VALUES (?1, ?2, ?3)",
            )?;
            for entry in entries {
                stmt.execute(params![entry.page_id, entry.lemma_id, entry.rank])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn find_index_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, lemma_id, rank_count FROM page_lemma WHERE page_id = ?1",
        )?;

        let rows = stmt
            .query_map(params![page_id], |row| {
                Ok(IndexRecord {
                    id: row.get(0)?,
                    page_id: row.get(1)?,
                    lemma_id: row.get(2)?,
                    rank: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn find_index_by_lemma(&self, lemma_id: i64) -> StorageResult<Vec<IndexRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, lemma_id, rank_count FROM page_lemma
             WHERE lemma_id = ?1 ORDER BY page_id ASC",
        )?;

        let rows = stmt
            .query_map(params![lemma_id], |row| {
                Ok(IndexRecord {
                    id: row.get(0)?,
                    page_id: row.get(1)?,
                    lemma_id: row.get(2)?,
                    rank: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn delete_index_by_page(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM page_lemma WHERE page_id = ?1", params![page_id])?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_sites(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM site", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_all_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_all_lemmas(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lemma", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
