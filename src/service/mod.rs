//! Run control for indexing
//!
//! The service owns the process-wide run state machine: at most one full
//! run or one single-page run is active at a time, guarded by a single
//! mutex. States move `Idle -> Running -> {Completed, Failed, Cancelled}`
//! and a new run may start from any inactive state.
//!
//! Control calls return quickly; crawling and indexing happen on spawned
//! tasks that report back through Site statuses and the run slot. Errors
//! on those tasks mark the affected site FAILED, never the process.

use crate::config::Config;
use crate::crawler::{
    build_http_client, site_path, site_root, CrawlMode, SiteWalker,
};
use crate::indexer::Indexer;
use crate::morphology::Lemmatizer;
use crate::storage::{SiteRecord, SiteStatus, SqliteStorage, Storage};
use crate::LemmexError;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use url::Url;

/// Error message recorded on sites interrupted by a stop request
const CANCELLED_ERROR: &str = "indexing cancelled";

/// Lifecycle of an indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    /// Whether a run is currently in flight
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

/// Errors surfaced by the control calls
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Indexing is already running")]
    AlreadyRunning,

    #[error("Indexing is not running")]
    NotRunning,

    #[error("Page {0} is outside the configured sites")]
    OutOfScope(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Lemmex(#[from] LemmexError),
}

/// Handles held for the duration of one run
struct ActiveRun {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

/// The single mutable cell behind the run state machine
struct RunSlot {
    state: RunState,
    active: Option<ActiveRun>,
}

impl Default for RunSlot {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            active: None,
        }
    }
}

/// Serializes indexing runs and exposes the control surface
pub struct IndexingService {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    lemmatizer: Arc<Lemmatizer>,
    client: Client,
    run: Arc<Mutex<RunSlot>>,
}

impl IndexingService {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<Mutex<SqliteStorage>>,
        lemmatizer: Arc<Lemmatizer>,
    ) -> Result<Self, ServiceError> {
        let client = build_http_client(&config.fetch).map_err(LemmexError::from)?;
        Ok(Self {
            config,
            storage,
            lemmatizer,
            client,
            run: Arc::new(Mutex::new(RunSlot::default())),
        })
    }

    /// Current position in the run state machine
    pub fn run_state(&self) -> RunState {
        self.run.lock().unwrap().state
    }

    /// Starts a full crawl-and-index cycle over every configured site
    ///
    /// Each site's previous rows are deleted and a fresh INDEXING row
    /// inserted before its crawl begins. Returns as soon as the run is
    /// spawned.
    pub fn start_full_indexing(&self) -> Result<(), ServiceError> {
        let mut slot = self.run.lock().unwrap();
        if slot.state.is_active() {
            return Err(ServiceError::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_full(
            Arc::clone(&self.config),
            Arc::clone(&self.storage),
            Arc::clone(&self.lemmatizer),
            self.client.clone(),
            Arc::clone(&self.run),
            cancel_rx,
        ));

        slot.state = RunState::Running;
        slot.active = Some(ActiveRun {
            cancel: cancel_tx,
            handle: Some(handle),
        });
        tracing::info!("Full indexing started for {} sites", self.config.sites.len());
        Ok(())
    }

    /// Requests cancellation of the active run
    ///
    /// The run winds down asynchronously: in-flight fetches are abandoned,
    /// no new ones start, and interrupted sites end FAILED with a
    /// cancellation message. Already-persisted rows stay.
    pub fn stop_indexing(&self) -> Result<(), ServiceError> {
        let slot = self.run.lock().unwrap();
        if !slot.state.is_active() {
            return Err(ServiceError::NotRunning);
        }
        if let Some(active) = &slot.active {
            // Send only fails when the run already wound down
            let _ = active.cancel.send(true);
        }
        tracing::info!("Indexing stop requested");
        Ok(())
    }

    /// Crawls and reindexes a single page
    ///
    /// The URL must live under one of the configured site roots. Any
    /// previously stored version of the page is removed first, with its
    /// lemma frequencies decremented.
    pub fn reindex_page(&self, url: &str) -> Result<(), ServiceError> {
        let target = Url::parse(url.trim())
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", url, e)))?;
        let root = site_root(&target);
        let entry = self
            .config
            .sites
            .iter()
            .find(|site| site.normalized_url() == root)
            .ok_or_else(|| ServiceError::OutOfScope(url.to_string()))?;

        let mut slot = self.run.lock().unwrap();
        if slot.state.is_active() {
            return Err(ServiceError::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_single_page(
            entry.name.clone(),
            root,
            target.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.storage),
            Arc::clone(&self.lemmatizer),
            self.client.clone(),
            Arc::clone(&self.run),
            cancel_rx,
        ));

        slot.state = RunState::Running;
        slot.active = Some(ActiveRun {
            cancel: cancel_tx,
            handle: Some(handle),
        });
        tracing::info!("Single-page reindex started for {}", target);
        Ok(())
    }

    /// Blocks until the active run finishes, if one is in flight
    pub async fn wait(&self) {
        let handle = {
            let mut slot = self.run.lock().unwrap();
            slot.active.as_mut().and_then(|active| active.handle.take())
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Indexing task panicked: {}", e);
            }
            return;
        }
        // Handle already claimed elsewhere; poll the state instead
        while self.run.lock().unwrap().state.is_active() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Supervisor for a full run: resets sites, fans out one task per site,
/// then sweeps up anything a cancellation left behind
async fn run_full(
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    lemmatizer: Arc<Lemmatizer>,
    client: Client,
    run: Arc<Mutex<RunSlot>>,
    cancel: watch::Receiver<bool>,
) {
    let sites = match reset_sites(&config, &storage) {
        Ok(sites) => sites,
        Err(e) => {
            tracing::error!("Failed to prepare sites for indexing: {}", e);
            finish(&run, RunState::Failed);
            return;
        }
    };

    // One politeness-bounded fetch pool shared by every site
    let limiter = Arc::new(Semaphore::new(config.fetch.max_concurrent_fetches));
    let mut tasks = JoinSet::new();
    for (site, seed) in sites {
        let walker = Arc::new(SiteWalker::new(
            client.clone(),
            Arc::clone(&storage),
            site.id,
            site.url.clone(),
            &config.fetch,
            Arc::clone(&limiter),
            cancel.clone(),
        ));
        let indexer = Indexer::new(Arc::clone(&storage), Arc::clone(&lemmatizer));
        let storage = Arc::clone(&storage);
        let cancel = cancel.clone();
        tasks.spawn(crawl_and_index(walker, indexer, storage, site, seed, cancel));
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Site task failed: {}", e);
        }
    }

    finalize_interrupted(&config, &storage);

    let state = if *cancel.borrow() {
        RunState::Cancelled
    } else {
        RunState::Completed
    };
    finish(&run, state);
}

/// Crawls one site and hands the result to the indexer
async fn crawl_and_index(
    walker: Arc<SiteWalker>,
    indexer: Indexer,
    storage: Arc<Mutex<SqliteStorage>>,
    site: SiteRecord,
    seed: Url,
    cancel: watch::Receiver<bool>,
) {
    tracing::info!("Crawling {}", site.url);
    match walker.crawl(seed, CrawlMode::FullSite).await {
        Ok(pages) => {
            if *cancel.borrow() {
                // The post-run sweep marks this site as interrupted
                tracing::info!("Crawl of {} cancelled before indexing", site.url);
                return;
            }
            if let Err(e) = indexer.index_site(&site, pages).await {
                tracing::error!("Indexing {} failed: {}", site.url, e);
                mark_failed(&storage, site.id, &e.to_string());
            }
        }
        Err(LemmexError::Cancelled) => {
            tracing::info!("Crawl of {} cancelled", site.url);
        }
        Err(e) => {
            tracing::error!("Crawl of {} failed: {}", site.url, e);
            mark_failed(&storage, site.id, &e.to_string());
        }
    }
}

/// Single-page run: remove the stored page, refetch, reindex
#[allow(clippy::too_many_arguments)]
async fn run_single_page(
    site_name: String,
    root: String,
    target: Url,
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    lemmatizer: Arc<Lemmatizer>,
    client: Client,
    run: Arc<Mutex<RunSlot>>,
    cancel: watch::Receiver<bool>,
) {
    let state = match reindex_one(
        &site_name, &root, target, &config, &storage, &lemmatizer, client, cancel,
    )
    .await
    {
        Ok(()) => RunState::Completed,
        Err(LemmexError::Cancelled) => RunState::Cancelled,
        Err(e) => {
            tracing::error!("Page reindex failed: {}", e);
            RunState::Failed
        }
    };
    finish(&run, state);
}

#[allow(clippy::too_many_arguments)]
async fn reindex_one(
    site_name: &str,
    root: &str,
    target: Url,
    config: &Arc<Config>,
    storage: &Arc<Mutex<SqliteStorage>>,
    lemmatizer: &Arc<Lemmatizer>,
    client: Client,
    cancel: watch::Receiver<bool>,
) -> Result<(), LemmexError> {
    let site = {
        let mut guard = storage.lock().unwrap();
        match guard.find_site_by_url(root)? {
            Some(site) => site,
            None => {
                let site_id = guard.insert_site(root, site_name)?;
                guard.get_site(site_id)?
            }
        }
    };

    let indexer = Indexer::new(Arc::clone(storage), Arc::clone(lemmatizer));

    // Drop the stored version before refetching so its lemma counts
    // unwind even if the page has since changed
    let path = site_path(&target);
    let existing = {
        let guard = storage.lock().unwrap();
        guard.find_page_by_path(site.id, &path)?
    };
    if let Some(page) = existing {
        indexer.remove_page(&page)?;
    }

    let limiter = Arc::new(Semaphore::new(1));
    let walker = Arc::new(SiteWalker::new(
        client,
        Arc::clone(storage),
        site.id,
        site.url.clone(),
        &config.fetch,
        limiter,
        cancel,
    ));

    match walker.crawl(target, CrawlMode::SinglePage).await {
        Ok(pages) => {
            for page in &pages {
                indexer.index_page(&site, page)?;
            }
            let mut guard = storage.lock().unwrap();
            guard.set_site_status(site.id, SiteStatus::Indexed, None)?;
            Ok(())
        }
        Err(e) => {
            mark_failed(storage, site.id, &e.to_string());
            Err(e)
        }
    }
}

/// Deletes and recreates every configured site with INDEXING status
fn reset_sites(
    config: &Config,
    storage: &Arc<Mutex<SqliteStorage>>,
) -> Result<Vec<(SiteRecord, Url)>, LemmexError> {
    let mut sites = Vec::with_capacity(config.sites.len());
    let mut guard = storage.lock().unwrap();
    for entry in &config.sites {
        let url = entry.normalized_url();
        let seed = Url::parse(&url)?;
        guard.delete_site_by_url(&url)?;
        let site_id = guard.insert_site(&url, &entry.name)?;
        let site = guard.get_site(site_id)?;
        sites.push((site, seed));
    }
    Ok(sites)
}

/// Marks configured sites a cancellation left in INDEXING as failed
fn finalize_interrupted(config: &Config, storage: &Arc<Mutex<SqliteStorage>>) {
    let mut guard = storage.lock().unwrap();
    for entry in &config.sites {
        let url = entry.normalized_url();
        match guard.find_site_by_url(&url) {
            Ok(Some(site)) if site.status == SiteStatus::Indexing => {
                if let Err(e) =
                    guard.set_site_status(site.id, SiteStatus::Failed, Some(CANCELLED_ERROR))
                {
                    tracing::error!("Failed to finalize site {}: {}", url, e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to inspect site {}: {}", url, e),
        }
    }
}

fn mark_failed(storage: &Arc<Mutex<SqliteStorage>>, site_id: i64, error: &str) {
    let mut guard = storage.lock().unwrap();
    if let Err(e) = guard.set_site_status(site_id, SiteStatus::Failed, Some(error)) {
        tracing::error!("Failed to mark site {} as failed: {}", site_id, e);
    }
}

/// Records the terminal state and releases the run slot
fn finish(run: &Arc<Mutex<RunSlot>>, state: RunState) {
    let mut slot = run.lock().unwrap();
    slot.state = state;
    slot.active = None;
    tracing::info!("Indexing run finished: {:?}", state);
}
