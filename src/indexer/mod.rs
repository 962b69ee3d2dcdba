//! Indexing pipeline
//!
//! Turns crawled pages into rows of the inverted index:
//! - Persists page rows in bounded transactions
//! - Lemmatizes page text concurrently across worker tasks
//! - Aggregates per-site lemma frequencies (number of pages containing
//!   each lemma, not total occurrences)
//! - Writes lemma and index rows in bounded transactions
//!
//! Removal reverses the same bookkeeping: index rows go first, then each
//! affected lemma's frequency drops by one, zero-frequency lemmas are
//! garbage collected, and only then does the page row disappear.

use crate::crawler::{html_to_text, site_path, FetchedPage};
use crate::morphology::Lemmatizer;
use crate::storage::{
    NewIndexEntry, NewPage, PageRecord, SiteRecord, SiteStatus, SqliteStorage, Storage,
};
use crate::LemmexError;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use url::Url;

/// Page rows are inserted in transactions of this many rows
pub const PAGE_BATCH: usize = 100;

/// Lemma and index rows are inserted in transactions of this many rows
pub const WRITE_BATCH: usize = 1000;

/// Builds the inverted index for crawled content
pub struct Indexer {
    storage: Arc<Mutex<SqliteStorage>>,
    lemmatizer: Arc<Lemmatizer>,
}

impl Indexer {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self {
            storage,
            lemmatizer,
        }
    }

    /// Indexes a freshly crawled site: page rows, then lemmas, then index rows
    ///
    /// Pages that did not return HTTP 200 are recorded but contribute
    /// nothing to the index. On success the site is marked INDEXED.
    pub async fn index_site(
        &self,
        site: &SiteRecord,
        pages: Vec<FetchedPage>,
    ) -> Result<(), LemmexError> {
        let unique = dedupe_by_path(pages);
        tracing::info!("Indexing {} pages for {}", unique.len(), site.url);

        // Persist page rows, pairing each with its new ID
        let mut stored: Vec<(i64, FetchedPage)> = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(PAGE_BATCH) {
            let rows: Vec<NewPage> = chunk.iter().map(to_new_page).collect();
            let ids = {
                let mut storage = self.storage.lock().unwrap();
                storage.insert_pages(site.id, &rows)?
            };
            stored.extend(ids.into_iter().zip(chunk.iter().cloned()));
        }

        // Lemmatize successful pages concurrently; each lemma's site
        // frequency counts the pages it appears on
        let frequencies: Arc<DashMap<String, i64>> = Arc::new(DashMap::new());
        let mut tasks = JoinSet::new();
        for (page_id, page) in stored {
            if page.code != 200 {
                continue;
            }
            let lemmatizer = Arc::clone(&self.lemmatizer);
            let frequencies = Arc::clone(&frequencies);
            tasks.spawn(async move {
                let text = html_to_text(&page.content);
                let counts = lemmatizer.collect_lemmas(&text);
                for lemma in counts.keys() {
                    *frequencies.entry(lemma.clone()).or_insert(0) += 1;
                }
                (page_id, counts)
            });
        }

        let mut page_counts: Vec<(i64, HashMap<String, u32>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            page_counts.push(joined.map_err(|e| LemmexError::Task(e.to_string()))?);
        }

        // Persist lemma rows in deterministic order and map them to IDs
        let mut lemma_rows: Vec<(String, i64)> = frequencies
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        lemma_rows.sort();

        let mut lemma_ids: HashMap<String, i64> = HashMap::with_capacity(lemma_rows.len());
        for chunk in lemma_rows.chunks(WRITE_BATCH) {
            let ids = {
                let mut storage = self.storage.lock().unwrap();
                storage.insert_lemmas(site.id, chunk)?
            };
            for ((lemma, _), id) in chunk.iter().zip(ids) {
                lemma_ids.insert(lemma.clone(), id);
            }
        }

        // Index rows carry the occurrence count as the rank
        let mut entries = Vec::new();
        for (page_id, counts) in page_counts {
            for (lemma, count) in counts {
                if let Some(&lemma_id) = lemma_ids.get(&lemma) {
                    entries.push(NewIndexEntry {
                        page_id,
                        lemma_id,
                        rank: f64::from(count),
                    });
                }
            }
        }
        for chunk in entries.chunks(WRITE_BATCH) {
            let mut storage = self.storage.lock().unwrap();
            storage.insert_index_entries(chunk)?;
        }

        {
            let mut storage = self.storage.lock().unwrap();
            storage.set_site_status(site.id, SiteStatus::Indexed, None)?;
        }
        tracing::info!(
            "Site {} indexed: {} lemmas, {} index rows",
            site.url,
            lemma_ids.len(),
            entries.len()
        );
        Ok(())
    }

    /// Indexes a single page on an existing site
    ///
    /// Lemma frequencies are incremented in place so the rest of the
    /// site's index stays consistent. Non-200 pages are recorded as
    /// page rows only.
    pub fn index_page(&self, site: &SiteRecord, page: &FetchedPage) -> Result<(), LemmexError> {
        let row = to_new_page(page);
        let mut storage = self.storage.lock().unwrap();
        let page_id = storage.insert_page(site.id, &row)?;

        if page.code != 200 {
            tracing::debug!("Page {} returned {}, stored without indexing", row.path, page.code);
            return Ok(());
        }

        let text = html_to_text(&page.content);
        let counts = self.lemmatizer.collect_lemmas(&text);

        let mut ordered: Vec<(String, u32)> = counts.into_iter().collect();
        ordered.sort();

        let mut entries = Vec::with_capacity(ordered.len());
        for (lemma, count) in ordered {
            let lemma_id = storage.upsert_lemma(site.id, &lemma)?;
            entries.push(NewIndexEntry {
                page_id,
                lemma_id,
                rank: f64::from(count),
            });
        }
        for chunk in entries.chunks(WRITE_BATCH) {
            storage.insert_index_entries(chunk)?;
        }

        tracing::debug!("Indexed page {} with {} lemmas", row.path, entries.len());
        Ok(())
    }

    /// Removes a page and unwinds its contribution to the index
    ///
    /// Each lemma the page referenced loses one point of frequency, and
    /// lemmas that drop to zero are deleted outright.
    pub fn remove_page(&self, page: &PageRecord) -> Result<(), LemmexError> {
        let mut storage = self.storage.lock().unwrap();
        let rows = storage.find_index_by_page(page.id)?;
        let lemma_ids: Vec<i64> = rows.iter().map(|row| row.lemma_id).collect();

        storage.delete_index_by_page(page.id)?;
        storage.decrement_lemma_frequencies(&lemma_ids)?;
        storage.delete_zero_frequency_lemmas()?;
        storage.delete_page(page.id)?;

        tracing::debug!("Removed page {} and {} index rows", page.path, rows.len());
        Ok(())
    }
}

/// Converts a fetched page to a storable row with a site-relative path
fn to_new_page(page: &FetchedPage) -> NewPage {
    let path = match Url::parse(&page.url) {
        Ok(url) => site_path(&url),
        Err(_) => page.url.clone(),
    };
    NewPage {
        path,
        code: page.code,
        content: page.content.clone(),
    }
}

/// Drops pages whose site-relative path was already seen, keeping the first
///
/// Distinct URLs can normalize to the same path (a trailing slash on the
/// seed, a dropped query string), and the page table is unique per path.
fn dedupe_by_path(pages: Vec<FetchedPage>) -> Vec<FetchedPage> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(pages.len());
    for page in pages {
        let path = match Url::parse(&page.url) {
            Ok(url) => site_path(&url),
            Err(_) => page.url.clone(),
        };
        if seen.insert(path) {
            unique.push(page);
        }
    }
    unique
}
