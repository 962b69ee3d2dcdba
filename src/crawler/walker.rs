//! Concurrent site traversal
//!
//! Walks a site by spawning one task per admitted link: every page fetch
//! fans out into child tasks for its links, and each node waits for its
//! children before returning. Admission goes through a shared visited set
//! with atomic insert semantics, so a URL is fetched at most once per run
//! no matter how many pages link to it.

use crate::config::FetchConfig;
use crate::crawler::{extract_links, fetch_page, is_file_resource, FetchedPage};
use crate::storage::{SqliteStorage, Storage};
use crate::LemmexError;
use dashmap::DashSet;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use url::Url;

/// How far a crawl is allowed to traverse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Follow links within the site boundary until exhausted
    FullSite,
    /// Fetch exactly the seed URL, for single-page reindexing
    SinglePage,
}

/// Concurrent crawler for one site
///
/// The walker holds everything the traversal tasks share: the HTTP
/// client, the visited set, the politeness delay, the global fetch
/// limiter, and the cancellation signal.
pub struct SiteWalker {
    client: Client,
    storage: Arc<Mutex<SqliteStorage>>,
    site_id: i64,
    boundary: String,
    delay: Duration,
    limiter: Arc<Semaphore>,
    cancel: watch::Receiver<bool>,
    visited: DashSet<String>,
    pages: Mutex<Vec<FetchedPage>>,
}

impl SiteWalker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Client,
        storage: Arc<Mutex<SqliteStorage>>,
        site_id: i64,
        boundary: String,
        fetch: &FetchConfig,
        limiter: Arc<Semaphore>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            storage,
            site_id,
            boundary,
            delay: Duration::from_millis(fetch.politeness_delay_ms),
            limiter,
            cancel,
            visited: DashSet::new(),
            pages: Mutex::new(Vec::new()),
        }
    }

    /// Crawls from the seed and returns every page fetched
    ///
    /// The seed is always fetched, even when its URL would fail admission.
    /// A seed fetch failure fails the whole crawl; failures further down
    /// skip the affected link and its subtree. Cancellation stops new
    /// fetches and returns the pages gathered so far.
    pub async fn crawl(
        self: Arc<Self>,
        seed: Url,
        mode: CrawlMode,
    ) -> Result<Vec<FetchedPage>, LemmexError> {
        self.visited.insert(seed.to_string());

        let page = self.fetch_polite(&seed).await?;
        let links = match mode {
            CrawlMode::FullSite => extract_links(&page.content, &seed),
            CrawlMode::SinglePage => Vec::new(),
        };
        self.record(page)?;
        Self::walk_children(&self, links).await;

        let mut pages = self.pages.lock().unwrap();
        Ok(std::mem::take(&mut *pages))
    }

    /// Recursive step: fetch one page, record it, fan out into its links
    async fn walk(self: Arc<Self>, url: Url) {
        let page = match self.fetch_polite(&url).await {
            Ok(page) => page,
            Err(LemmexError::Cancelled) => return,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                return;
            }
        };

        let links = extract_links(&page.content, &url);
        if let Err(e) = self.record(page) {
            tracing::error!("Failed to record {}: {}", url, e);
            return;
        }
        Self::walk_children(&self, links).await;
    }

    /// Boxed form of [`walk`], needed because the traversal recurses
    fn walk_boxed(self: Arc<Self>, url: Url) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(self.walk(url))
    }

    /// Spawns a child task per admitted link and waits for all of them
    async fn walk_children(walker: &Arc<Self>, links: Vec<Url>) {
        let mut children = JoinSet::new();
        for link in links {
            if *walker.cancel.borrow() {
                break;
            }
            if !walker.admit(&link) {
                continue;
            }
            children.spawn(Arc::clone(walker).walk_boxed(link));
        }
        while children.join_next().await.is_some() {}
    }

    /// Decides whether a link enters the traversal; returns true at most
    /// once per URL across all tasks
    fn admit(&self, link: &Url) -> bool {
        let link_str = link.as_str();
        admissible(link_str, &self.boundary) && self.visited.insert(link_str.to_string())
    }

    /// Waits for a fetch slot and the politeness delay, then fetches
    ///
    /// The delay and the fetch itself race against cancellation so stop
    /// requests take effect promptly rather than after the next response.
    async fn fetch_polite(&self, url: &Url) -> Result<FetchedPage, LemmexError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| LemmexError::Cancelled)?;

        let mut cancel = self.cancel.clone();
        if *cancel.borrow() {
            return Err(LemmexError::Cancelled);
        }

        tokio::select! {
            _ = cancel.changed() => return Err(LemmexError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        tokio::select! {
            _ = cancel.changed() => Err(LemmexError::Cancelled),
            result = fetch_page(&self.client, url) => result,
        }
    }

    /// Stores a fetched page in memory and refreshes the site's status time
    fn record(&self, page: FetchedPage) -> Result<(), LemmexError> {
        {
            let mut storage = self.storage.lock().unwrap();
            storage.touch_site(self.site_id)?;
        }
        tracing::debug!("Fetched {} ({})", page.url, page.code);
        let mut pages = self.pages.lock().unwrap();
        pages.push(page);
        Ok(())
    }
}

/// Link admission rules, visited set aside: stay inside the boundary,
/// skip anchors, skip file downloads and tracking links
fn admissible(link: &str, boundary: &str) -> bool {
    link.starts_with(boundary) && !link.contains('#') && !is_file_resource(link)
}
