//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with identification headers
//! - Fetching pages while recording whatever status the server returns

use crate::config::FetchConfig;
use crate::crawler::FetchedPage;
use crate::LemmexError;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds the shared HTTP client
///
/// Every request carries the configured user-agent and referrer so site
/// operators can identify the bot. Redirects are followed automatically.
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(referrer) = HeaderValue::from_str(&config.referrer) {
        headers.insert(REFERER, referrer);
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single page
///
/// HTTP error statuses are not failures here: the page is returned with
/// its status code and whatever body came back, and the caller decides
/// what to do with it. Only transport-level problems (DNS, connect,
/// timeout) surface as errors.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// * `Ok(FetchedPage)` - The page body and status code
/// * `Err(LemmexError)` - A transport-level failure
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, LemmexError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| LemmexError::Http {
            url: url.to_string(),
            source,
        })?;

    let code = response.status().as_u16();
    let content = response.text().await.map_err(|source| LemmexError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok(FetchedPage {
        url: url.to_string(),
        content,
        code,
    })
}
