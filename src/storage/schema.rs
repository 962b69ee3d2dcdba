//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Lemmex database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Indexed websites
CREATE TABLE IF NOT EXISTS site (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    status_time TEXT NOT NULL,
    last_error TEXT
);

-- Crawled pages, keyed by site-relative path
CREATE TABLE IF NOT EXISTS page (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES site(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    code INTEGER NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(site_id, path)
);

CREATE INDEX IF NOT EXISTS idx_page_site ON page(site_id);

-- Normal forms seen per site; frequency counts distinct pages
CREATE TABLE IF NOT EXISTS lemma (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES site(id) ON DELETE CASCADE,
    lemma TEXT NOT NULL,
    frequency INTEGER NOT NULL,
    UNIQUE(site_id, lemma)
);

CREATE INDEX IF NOT EXISTS idx_lemma_site ON lemma(site_id);
CREATE INDEX IF NOT EXISTS idx_lemma_lemma ON lemma(lemma);

-- Inverted index: occurrence weight of a lemma on a page
CREATE TABLE IF NOT EXISTS page_lemma (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES page(id) ON DELETE CASCADE,
    lemma_id INTEGER NOT NULL REFERENCES lemma(id) ON DELETE CASCADE,
    rank_count REAL NOT NULL,
    UNIQUE(page_id, lemma_id)
);

CREATE INDEX IF NOT EXISTS idx_page_lemma_page ON page_lemma(page_id);
CREATE INDEX IF NOT EXISTS idx_page_lemma_lemma ON page_lemma(lemma_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
