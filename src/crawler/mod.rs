//! Crawler module for site traversal and page fetching
//!
//! This module contains the crawling half of the engine, including:
//! - HTTP fetching with politeness delays and a shared concurrency bound
//! - HTML parsing for links, titles, and visible text
//! - Concurrent recursive traversal within a site boundary

mod fetcher;
mod parser;
mod walker;

pub use fetcher::{build_http_client, fetch_page};
pub use parser::{extract_links, extract_title, html_to_text, is_file_resource};
pub use walker::{CrawlMode, SiteWalker};

use url::Url;

/// A page fetched during a crawl, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Absolute URL the page was fetched from
    pub url: String,

    /// Raw response body
    pub content: String,

    /// HTTP status code
    pub code: u16,
}

/// Returns the `scheme://host[:port]` prefix of a URL
///
/// Used to decide which configured site a page URL belongs to.
pub fn site_root(url: &Url) -> String {
    let mut root = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        root.push_str(&format!(":{}", port));
    }
    root
}

/// Returns the site-relative path of a URL
///
/// The query string and fragment are dropped; the site root maps to `/`.
pub fn site_path(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_root_strips_path_and_query() {
        let url = Url::parse("https://example.com/a/b?x=1#frag").unwrap();
        assert_eq!(site_root(&url), "https://example.com");
    }

    #[test]
    fn test_site_root_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(site_root(&url), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_site_root_drops_default_port() {
        let url = Url::parse("https://example.com:443/page").unwrap();
        assert_eq!(site_root(&url), "https://example.com");
    }

    #[test]
    fn test_site_path_of_root_is_slash() {
        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(site_path(&url), "/");
    }

    #[test]
    fn test_site_path_drops_query() {
        let url = Url::parse("https://example.com/news/item?id=7").unwrap();
        assert_eq!(site_path(&url), "/news/item");
    }
}
