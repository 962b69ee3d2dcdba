//! HTML parsing for link discovery and text extraction
//!
//! This module extracts the pieces of a fetched page the engine cares about:
//! - Outbound links for traversal
//! - The page title for search results
//! - Visible text for lemmatization and snippets

use scraper::{Html, Node, Selector};
use url::Url;

/// Link suffixes and query markers that are never worth fetching
const SKIPPED_RESOURCES: [&str; 17] = [
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".pdf", ".eps", ".xlsx", ".doc", ".pptx", ".docx",
    ".sql", ".yaml", ".zip", ".7z", ".rar", "?_ga",
];

/// Extracts candidate links from an HTML page
///
/// Relative hrefs are resolved against `base`; only http(s) results are
/// returned. Whether a link is actually crawled is decided later by the
/// walker's admission rules.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base` - The URL the page was fetched from
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if href.is_empty() {
                    continue;
                }
                if let Ok(resolved) = base.join(href) {
                    if resolved.scheme() == "http" || resolved.scheme() == "https" {
                        links.push(resolved);
                    }
                }
            }
        }
    }

    links
}

/// Extracts the trimmed `<title>` text, empty when missing
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    match Selector::parse("title") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Extracts the visible text of an HTML page
///
/// Script, style, and noscript contents are skipped; the remaining text
/// nodes are joined and whitespace-normalized.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut pieces = Vec::new();

    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .map(|parent| match parent.value() {
                    Node::Element(element) => {
                        matches!(element.name(), "script" | "style" | "noscript")
                    }
                    _ => false,
                })
                .unwrap_or(false);
            if !hidden {
                pieces.push(&**text);
            }
        }
    }

    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns true when a link points at a binary or tracking resource
/// rather than a crawlable HTML page
pub fn is_file_resource(link: &str) -> bool {
    let lowered = link.to_lowercase();
    SKIPPED_RESOURCES
        .iter()
        .any(|marker| lowered.contains(marker))
}
