//! Integration tests for search over a crawled corpus
//!
//! These tests run the full pipeline on mock sites: crawl and index
//! with the service, then query through the search engine against the
//! same database.

use lemmex::config::{Config, FetchConfig, IndexConfig, SearchConfig, SiteEntry, StorageConfig};
use lemmex::morphology::{DictionaryMorphology, Lemmatizer};
use lemmex::search::SearchEngine;
use lemmex::service::{IndexingService, RunState};
use lemmex::storage::SqliteStorage;
use lemmex::LemmexError;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(sites: Vec<SiteEntry>, db_path: &str) -> Arc<Config> {
    Arc::new(Config {
        sites,
        fetch: FetchConfig {
            user_agent: "TestBot/1.0".to_string(),
            referrer: "http://localhost/".to_string(),
            timeout_ms: 5_000,
            politeness_delay_ms: 10, // Very short for testing
            max_concurrent_fetches: 2,
        },
        index: IndexConfig {
            dictionary_path: None,
        },
        search: SearchConfig::default(),
        storage: StorageConfig {
            database_path: db_path.to_string(),
        },
    })
}

fn site_entry(url: &str, name: &str) -> SiteEntry {
    SiteEntry {
        url: url.to_string(),
        name: name.to_string(),
    }
}

fn test_lemmatizer() -> Arc<Lemmatizer> {
    let morphology = DictionaryMorphology::from_entries([
        ("кот", "кот", "С мр"),
        ("кота", "кот", "С мр"),
        ("коты", "кот", "С мр"),
        ("собака", "собака", "С жр"),
        ("собаки", "собака", "С жр"),
        ("дом", "дом", "С мр"),
        ("и", "и", "СОЮЗ"),
    ]);
    Arc::new(Lemmatizer::new(Arc::new(morphology)))
}

fn open_storage(dir: &TempDir) -> Arc<Mutex<SqliteStorage>> {
    let db_path = dir.path().join("lemmex.db");
    let storage = SqliteStorage::new(&db_path).expect("Failed to open test database");
    Arc::new(Mutex::new(storage))
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
        .insert_header("content-type", "text/html")
}

/// Mounts a three-page site: the root mentions cats heavily, one page
/// mentions both cats and dogs, one page only dogs and houses
async fn mount_cat_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            "Главная",
            r#"кот кота коты <a href="/p1">Первая</a> <a href="/p2">Вторая</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p1"))
        .respond_with(html_page("Первая", "кот и собака"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(html_page("Вторая", "собака собаки дом"))
        .mount(server)
        .await;
}

/// Crawls and indexes every configured site, then hands back an engine
/// over the same storage
async fn index_and_build_engine(
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
) -> SearchEngine {
    let service = IndexingService::new(Arc::clone(&config), Arc::clone(&storage), test_lemmatizer())
        .expect("Failed to build service");
    service.start_full_indexing().expect("Failed to start");
    service.wait().await;
    assert_eq!(service.run_state(), RunState::Completed);

    SearchEngine::new(storage, test_lemmatizer(), config.search.clone())
}

#[tokio::test]
async fn test_search_ranks_crawled_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_cat_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("lemmex.db");
    let config = create_test_config(
        vec![site_entry(&base_url, "Cats")],
        db_path.to_str().expect("db path"),
    );
    let storage = open_storage(&dir);
    let engine = index_and_build_engine(config, storage).await;

    let outcome = engine.search("кот", None, 0, 20).expect("Search failed");
    assert_eq!(outcome.count, 2);

    // The root mentions the lemma three times, /p1 once
    assert_eq!(outcome.results[0].uri, "/");
    assert_eq!(outcome.results[0].relevance, 1.0);
    assert_eq!(outcome.results[0].title, "Главная");
    assert_eq!(outcome.results[1].uri, "/p1");
    assert_eq!(outcome.results[1].relevance, 0.3333);

    assert_eq!(outcome.results[0].site, base_url);
    assert_eq!(outcome.results[0].site_name, "Cats");
}

#[tokio::test]
async fn test_search_requires_every_query_lemma() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_cat_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("lemmex.db");
    let config = create_test_config(
        vec![site_entry(&base_url, "Cats")],
        db_path.to_str().expect("db path"),
    );
    let storage = open_storage(&dir);
    let engine = index_and_build_engine(config, storage).await;

    // Only /p1 carries both lemmas
    let outcome = engine
        .search("кот собака", None, 0, 20)
        .expect("Search failed");
    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.results[0].uri, "/p1");
    assert_eq!(outcome.results[0].relevance, 1.0);
    assert!(outcome.results[0].snippet.contains("<b>кот</b>"));
    assert!(outcome.results[0].snippet.contains("<b>собака</b>"));
}

#[tokio::test]
async fn test_search_scopes_to_one_site() {
    let cats = MockServer::start().await;
    let dogs = MockServer::start().await;
    mount_cat_site(&cats).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Собаки", "собака и кот"))
        .mount(&dogs)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("lemmex.db");
    let config = create_test_config(
        vec![
            site_entry(&cats.uri(), "Cats"),
            site_entry(&dogs.uri(), "Dogs"),
        ],
        db_path.to_str().expect("db path"),
    );
    let storage = open_storage(&dir);
    let engine = index_and_build_engine(config, storage).await;

    let everywhere = engine.search("кот", None, 0, 20).expect("Search failed");
    assert_eq!(everywhere.count, 3);

    let scoped = engine
        .search("кот", Some(&dogs.uri()), 0, 20)
        .expect("Search failed");
    assert_eq!(scoped.count, 1);
    assert_eq!(scoped.results[0].site, dogs.uri());
    assert_eq!(scoped.results[0].site_name, "Dogs");

    // A scope that was never configured or crawled is rejected
    let unknown = engine.search("кот", Some("http://unknown.example"), 0, 20);
    assert!(matches!(unknown, Err(LemmexError::SiteNotIndexed { .. })));
}

#[tokio::test]
async fn test_search_pagination_over_crawled_corpus() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_cat_site(&mock_server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("lemmex.db");
    let config = create_test_config(
        vec![site_entry(&base_url, "Cats")],
        db_path.to_str().expect("db path"),
    );
    let storage = open_storage(&dir);
    let engine = index_and_build_engine(config, storage).await;

    // Both matching pages exist; the slice carries one but the count
    // stays at the full total
    let page = engine.search("кот", None, 1, 1).expect("Search failed");
    assert_eq!(page.count, 2);
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].uri, "/p1");

    let beyond = engine.search("кот", None, 50, 10).expect("Search failed");
    assert_eq!(beyond.count, 2);
    assert!(beyond.results.is_empty());
}
