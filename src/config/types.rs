use serde::Deserialize;

/// Main configuration structure for Lemmex
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Websites to crawl and index
    #[serde(default)]
    pub sites: Vec<SiteEntry>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub search: SearchConfig,

    pub storage: StorageConfig,
}

/// One website to crawl and index
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Root URL the crawl starts from; doubles as the traversal boundary
    pub url: String,

    /// Human-readable site name shown in search results and statistics
    pub name: String,
}

impl SiteEntry {
    /// Root URL without a trailing slash, as stored in the database
    pub fn normalized_url(&self) -> String {
        self.url.trim().trim_end_matches('/').to_string()
    }
}

/// HTTP fetching behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Referer header sent with every request
    pub referrer: String,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Pause before each fetch (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// Maximum number of pages fetched concurrently across all sites
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; LemmexBot/1.0)".to_string(),
            referrer: "https://www.google.com".to_string(),
            timeout_ms: 10_000,
            politeness_delay_ms: 500,
            max_concurrent_fetches: default_parallelism(),
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Indexing pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path to the morphological dictionary (TSV)
    #[serde(rename = "dictionary-path")]
    pub dictionary_path: Option<String>,
}

/// Search and ranking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lemmas occurring on at least this many pages are dropped from queries
    #[serde(rename = "frequency-threshold")]
    pub frequency_threshold: i64,

    /// Whether candidate pages must contain the query words near each other
    #[serde(rename = "proximity-filter")]
    pub proximity_filter: bool,

    /// Maximum character gap between query words for the proximity filter
    #[serde(rename = "proximity-window")]
    pub proximity_window: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frequency_threshold: 200,
            proximity_filter: true,
            proximity_window: 200,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
