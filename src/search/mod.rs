//! Search and ranking engine
//!
//! Answers free-text queries over the accumulated index:
//! 1. Lemmatize the query with the same pipeline used for indexing
//! 2. Drop lemmas at or above the configured frequency threshold
//! 3. Intersect per-lemma page sets rarest-first, per site
//! 4. Optionally require query-word proximity in the page text
//! 5. Score by summed rank, normalize against the best candidate
//! 6. Paginate and render title/snippet output
//!
//! The engine is stateless per call; only the Site status is consulted
//! when a site scope is given.

mod snippet;

pub use snippet::{build_snippet, words_in_proximity};

use crate::config::SearchConfig;
use crate::crawler::{extract_title, html_to_text};
use crate::morphology::Lemmatizer;
use crate::storage::{
    LemmaRecord, PageRecord, SiteRecord, SiteStatus, SqliteStorage, Storage,
};
use crate::LemmexError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One ranked search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub site: String,
    #[serde(rename = "siteName")]
    pub site_name: String,
    pub uri: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f64,
}

/// One page of ranked hits plus the total match count
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub count: usize,
    pub results: Vec<SearchResult>,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}

/// Ranked search over the inverted index
pub struct SearchEngine {
    storage: Arc<Mutex<SqliteStorage>>,
    lemmatizer: Arc<Lemmatizer>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        lemmatizer: Arc<Lemmatizer>,
        config: SearchConfig,
    ) -> Self {
        Self {
            storage,
            lemmatizer,
            config,
        }
    }

    /// Runs a query and returns one page of ranked results
    ///
    /// # Arguments
    ///
    /// * `query` - Free-text query, lemmatized like page content
    /// * `site` - Optional root URL restricting the search to one site,
    ///   which must be fully indexed
    /// * `offset` / `limit` - Pagination inputs, clamped rather than
    ///   rejected
    pub fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<SearchOutcome, LemmexError> {
        let scope = match site {
            Some(url) => Some(self.resolve_scope(url)?),
            None => None,
        };

        let mut query_lemmas: Vec<String> =
            self.lemmatizer.collect_lemmas(query).into_keys().collect();
        query_lemmas.sort();
        if query_lemmas.is_empty() {
            tracing::debug!("Query '{}' produced no lemmas", query);
            return Ok(SearchOutcome::empty());
        }

        let filtered = {
            let storage = self.storage.lock().unwrap();
            storage.find_lemmas_below_threshold(&query_lemmas, self.config.frequency_threshold)?
        };
        if filtered.is_empty() {
            return Ok(SearchOutcome::empty());
        }

        // Group by site; each group keeps the ascending-frequency order
        // the storage query produced
        let mut groups: BTreeMap<i64, Vec<LemmaRecord>> = BTreeMap::new();
        for lemma in filtered {
            groups.entry(lemma.site_id).or_default().push(lemma);
        }
        if let Some(scope_site) = &scope {
            groups.retain(|site_id, _| *site_id == scope_site.id);
        }

        let query_words: Vec<String> = query
            .split_whitespace()
            .map(|word| word.to_lowercase())
            .collect();

        // Candidate pages with absolute relevance, accumulated per site
        let mut scored: Vec<(PageRecord, f64)> = Vec::new();
        let mut sites: HashMap<i64, SiteRecord> = HashMap::new();
        for (site_id, lemmas) in groups {
            let hits = self.match_site(site_id, &lemmas, &query_words)?;
            if !hits.is_empty() && !sites.contains_key(&site_id) {
                let site = {
                    let storage = self.storage.lock().unwrap();
                    storage.get_site(site_id)?
                };
                sites.insert(site_id, site);
            }
            scored.extend(hits);
        }
        if scored.is_empty() {
            return Ok(SearchOutcome::empty());
        }

        // Normalize against the best page; ties keep candidate order
        let max = scored.iter().map(|(_, abs)| *abs).fold(0.0_f64, f64::max);
        let mut ranked: Vec<(PageRecord, f64)> = scored
            .into_iter()
            .map(|(page, abs)| {
                let relevance = if max > 0.0 { round4(abs / max) } else { 0.0 };
                (page, relevance)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let total = ranked.len();
        let (start, end) = page_bounds(offset, limit, total);

        let mut results = Vec::with_capacity(end - start);
        for (page, relevance) in ranked.into_iter().skip(start).take(end - start) {
            let site = match sites.get(&page.site_id) {
                Some(site) => site,
                None => continue,
            };
            let text = html_to_text(&page.content);
            results.push(SearchResult {
                site: site.url.clone(),
                site_name: site.name.clone(),
                uri: page.path.clone(),
                title: extract_title(&page.content),
                snippet: build_snippet(&text, &query_words),
                relevance,
            });
        }

        tracing::debug!("Query '{}' matched {} pages", query, total);
        Ok(SearchOutcome {
            count: total,
            results,
        })
    }

    /// Intersects per-lemma page sets rarest-first and scores survivors
    ///
    /// `lemmas` must be in ascending frequency order. Returns candidate
    /// pages in ascending page-ID order with their absolute relevance.
    fn match_site(
        &self,
        site_id: i64,
        lemmas: &[LemmaRecord],
        query_words: &[String],
    ) -> Result<Vec<(PageRecord, f64)>, LemmexError> {
        let storage = self.storage.lock().unwrap();

        let mut rows_per_lemma = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            rows_per_lemma.push(storage.find_index_by_lemma(lemma.id)?);
        }

        // Seed with the rarest lemma's pages, then narrow
        let mut candidates: HashSet<i64> = match rows_per_lemma.first() {
            Some(rows) => rows.iter().map(|row| row.page_id).collect(),
            None => return Ok(Vec::new()),
        };
        for rows in rows_per_lemma.iter().skip(1) {
            let pages: HashSet<i64> = rows.iter().map(|row| row.page_id).collect();
            candidates.retain(|page_id| pages.contains(page_id));
            if candidates.is_empty() {
                tracing::debug!("No page on site {} holds all query lemmas", site_id);
                return Ok(Vec::new());
            }
        }

        // Absolute relevance: summed rank over the surviving lemmas
        let mut rank_sums: HashMap<i64, f64> = HashMap::new();
        for rows in &rows_per_lemma {
            for row in rows {
                if candidates.contains(&row.page_id) {
                    *rank_sums.entry(row.page_id).or_insert(0.0) += row.rank;
                }
            }
        }

        let mut page_ids: Vec<i64> = candidates.into_iter().collect();
        page_ids.sort_unstable();

        let mut hits = Vec::with_capacity(page_ids.len());
        for page_id in page_ids {
            let page = storage.get_page(page_id)?;
            if self.config.proximity_filter {
                let text = html_to_text(&page.content);
                if !words_in_proximity(&text, query_words, self.config.proximity_window) {
                    continue;
                }
            }
            let abs = rank_sums.get(&page_id).copied().unwrap_or(0.0);
            hits.push((page, abs));
        }

        Ok(hits)
    }

    /// Resolves a site-scoped query; the site must exist and be indexed
    fn resolve_scope(&self, url: &str) -> Result<SiteRecord, LemmexError> {
        let normalized = url.trim().trim_end_matches('/');
        let storage = self.storage.lock().unwrap();
        let site = storage
            .find_site_by_url(normalized)?
            .ok_or_else(|| LemmexError::SiteNotIndexed {
                url: url.to_string(),
            })?;
        if site.status != SiteStatus::Indexed {
            return Err(LemmexError::SiteNotIndexed {
                url: url.to_string(),
            });
        }
        Ok(site)
    }
}

/// Rounds to four decimal places, half away from zero
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Clamps pagination inputs and returns `[start, end)` slice bounds
fn page_bounds(offset: i64, limit: i64, total: usize) -> (usize, usize) {
    let offset = offset.max(0) as usize;
    let limit = limit.max(1) as usize;
    let start = offset.min(total);
    let end = (start + limit).min(total);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchedPage;
    use crate::indexer::Indexer;
    use crate::morphology::DictionaryMorphology;

    fn test_lemmatizer() -> Arc<Lemmatizer> {
        let morphology = DictionaryMorphology::from_entries([
            ("кот", "кот", "С мр"),
            ("кота", "кот", "С мр"),
            ("коты", "кот", "С мр"),
            ("собака", "собака", "С жр"),
            ("собаки", "собака", "С жр"),
            ("спит", "спать", "Г"),
            ("и", "и", "СОЮЗ"),
        ]);
        Arc::new(Lemmatizer::new(Arc::new(morphology)))
    }

    fn new_engine(config: SearchConfig) -> (SearchEngine, Arc<Mutex<SqliteStorage>>) {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let engine = SearchEngine::new(Arc::clone(&storage), test_lemmatizer(), config);
        (engine, storage)
    }

    fn add_site(
        storage: &Arc<Mutex<SqliteStorage>>,
        url: &str,
        name: &str,
        pages: &[(&str, &str)],
    ) -> SiteRecord {
        let indexer = Indexer::new(Arc::clone(storage), test_lemmatizer());
        let site = {
            let mut guard = storage.lock().unwrap();
            let site_id = guard.insert_site(url, name).unwrap();
            guard.get_site(site_id).unwrap()
        };
        for (path, html) in pages {
            let page = FetchedPage {
                url: format!("{}{}", url, path),
                code: 200,
                content: html.to_string(),
            };
            indexer.index_page(&site, &page).unwrap();
        }
        let mut guard = storage.lock().unwrap();
        guard
            .set_site_status(site.id, SiteStatus::Indexed, None)
            .unwrap();
        guard.get_site(site.id).unwrap()
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(1.0 / 3.0), 0.3333);
        assert_eq!(round4(0.66666), 0.6667);
        assert_eq!(round4(0.0), 0.0);
    }

    #[test]
    fn test_page_bounds_clamps() {
        // Normal slice
        assert_eq!(page_bounds(0, 20, 5), (0, 5));
        assert_eq!(page_bounds(2, 2, 5), (2, 4));
        // Negative offset and zero limit are clamped, not rejected
        assert_eq!(page_bounds(-5, 0, 5), (0, 1));
        // Offset past the end yields an empty slice
        assert_eq!(page_bounds(10, 20, 5), (5, 5));
    }

    #[test]
    fn test_search_ranks_and_normalizes() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[
                ("/a", "<html><body>кот кота коты</body></html>"),
                ("/b", "<html><body>кот и собака</body></html>"),
            ],
        );

        let outcome = engine.search("кот", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.results[0].uri, "/a");
        assert_eq!(outcome.results[0].relevance, 1.0);
        assert_eq!(outcome.results[1].uri, "/b");
        assert_eq!(outcome.results[1].relevance, 0.3333);
    }

    #[test]
    fn test_search_intersects_all_query_lemmas() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[
                ("/a", "<html><body>кот кота коты</body></html>"),
                ("/b", "<html><body>кот и собака</body></html>"),
            ],
        );

        let outcome = engine.search("кот собака", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].uri, "/b");
        assert_eq!(outcome.results[0].relevance, 1.0);
    }

    #[test]
    fn test_search_function_words_only_is_empty() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[("/", "<html><body>кот</body></html>")],
        );

        let outcome = engine.search("и", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 0);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_search_threshold_excludes_common_lemmas() {
        let config = SearchConfig {
            frequency_threshold: 2,
            ..SearchConfig::default()
        };
        let (engine, storage) = new_engine(config);
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[
                ("/a", "<html><body>кот</body></html>"),
                ("/b", "<html><body>кота</body></html>"),
            ],
        );

        // "кот" sits on two pages, meeting the threshold of 2 exactly
        let outcome = engine.search("кот", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 0);
    }

    #[test]
    fn test_search_scoped_site_must_be_indexed() {
        let (engine, storage) = new_engine(SearchConfig::default());
        {
            let mut guard = storage.lock().unwrap();
            guard.insert_site("http://example.com", "Example").unwrap();
        }

        let result = engine.search("кот", Some("http://example.com"), 0, 20);
        assert!(matches!(result, Err(LemmexError::SiteNotIndexed { .. })));
    }

    #[test]
    fn test_search_unknown_scope_is_rejected() {
        let (engine, _storage) = new_engine(SearchConfig::default());
        let result = engine.search("кот", Some("http://nowhere.example"), 0, 20);
        assert!(matches!(result, Err(LemmexError::SiteNotIndexed { .. })));
    }

    #[test]
    fn test_search_scope_limits_results() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://one.example",
            "One",
            &[("/", "<html><body>кот</body></html>")],
        );
        add_site(
            &storage,
            "http://two.example",
            "Two",
            &[("/", "<html><body>кота</body></html>")],
        );

        let all = engine.search("кот", None, 0, 20).unwrap();
        assert_eq!(all.count, 2);

        let scoped = engine.search("кот", Some("http://one.example"), 0, 20).unwrap();
        assert_eq!(scoped.count, 1);
        assert_eq!(scoped.results[0].site, "http://one.example");
        assert_eq!(scoped.results[0].site_name, "One");
    }

    #[test]
    fn test_search_proximity_policy_on_and_off() {
        let filler = "слово ".repeat(300);
        let html = format!("<html><body>кот {}собака</body></html>", filler);

        let strict = SearchConfig::default();
        let (engine, storage) = new_engine(strict);
        add_site(&storage, "http://example.com", "Example", &[("/", &html)]);

        // Both lemmas match, but the words sit far apart
        let outcome = engine.search("кот собака", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 0);

        let relaxed = SearchConfig {
            proximity_filter: false,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(Arc::clone(&storage), test_lemmatizer(), relaxed);
        let outcome = engine.search("кот собака", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 1);
    }

    #[test]
    fn test_search_paginates_with_full_count() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[
                ("/a", "<html><body>кот кота коты</body></html>"),
                ("/b", "<html><body>кот кота</body></html>"),
                ("/c", "<html><body>кот</body></html>"),
            ],
        );

        let page = engine.search("кот", None, 1, 1).unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].uri, "/b");

        // Offset past the end still reports the total
        let tail = engine.search("кот", None, 10, 5).unwrap();
        assert_eq!(tail.count, 3);
        assert!(tail.results.is_empty());

        // Negative offset and zero limit fall back to the first result
        let clamped = engine.search("кот", None, -3, 0).unwrap();
        assert_eq!(clamped.results.len(), 1);
        assert_eq!(clamped.results[0].uri, "/a");
    }

    #[test]
    fn test_search_results_carry_title_and_snippet() {
        let (engine, storage) = new_engine(SearchConfig::default());
        add_site(
            &storage,
            "http://example.com",
            "Example",
            &[(
                "/",
                "<html><head><title>Главная</title></head>\
                 <body>кот спит на крыше</body></html>",
            )],
        );

        let outcome = engine.search("кот", None, 0, 20).unwrap();
        assert_eq!(outcome.count, 1);

        let hit = &outcome.results[0];
        assert_eq!(hit.title, "Главная");
        assert!(hit.snippet.contains("<b>кот</b>"));
        assert_eq!(hit.site, "http://example.com");
        assert_eq!(hit.uri, "/");
        assert_eq!(hit.relevance, 1.0);
    }
}
