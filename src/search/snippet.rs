//! Snippet building and query-word proximity checks
//!
//! Both operate on plain page text and the original (unlemmatized) query
//! words. Offsets are measured in characters, not bytes, so Cyrillic text
//! windows cleanly.

use regex::{Regex, RegexBuilder};

/// Characters of context kept on each side of the first query-word match
const SNIPPET_RADIUS: usize = 100;

/// Builds a highlighted snippet for a search result
///
/// The snippet is the window of text around the first case-insensitive
/// occurrence of any query word, with every query-word occurrence inside
/// the window wrapped in `<b>` tags and an ellipsis appended. Falls back
/// to the start of the text when no word matches.
pub fn build_snippet(text: &str, query_words: &[String]) -> String {
    let matcher = match word_matcher(query_words) {
        Some(re) => re,
        None => return String::new(),
    };

    let first = matcher
        .find(text)
        .map(|m| text[..m.start()].chars().count())
        .unwrap_or(0);

    let chars: Vec<char> = text.chars().collect();
    let start = first.saturating_sub(SNIPPET_RADIUS);
    let end = (first + SNIPPET_RADIUS).min(chars.len());
    let window: String = chars[start..end].iter().collect();

    let mut snippet = matcher.replace_all(&window, "<b>${0}</b>").into_owned();
    snippet.push_str("...");
    snippet
}

/// Checks that every query word occurs in the text and that consecutive
/// first occurrences sit within `window` characters of each other
///
/// The allowed gap between two neighbouring positions is `window` plus the
/// character length of the earlier word. A single present word always
/// passes; any absent word fails the whole check.
pub fn words_in_proximity(text: &str, query_words: &[String], window: usize) -> bool {
    if query_words.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();

    let mut positions = Vec::with_capacity(query_words.len());
    for word in query_words {
        let needle = word.to_lowercase();
        match lowered.find(&needle) {
            Some(byte_pos) => {
                let char_pos = lowered[..byte_pos].chars().count();
                positions.push((char_pos, needle.chars().count()));
            }
            None => return false,
        }
    }

    positions.sort_unstable();
    for pair in positions.windows(2) {
        let (pos, len) = pair[0];
        let (next, _) = pair[1];
        if next - pos > window + len {
            return false;
        }
    }
    true
}

/// Compiles a case-insensitive alternation over the query words
fn word_matcher(query_words: &[String]) -> Option<Regex> {
    if query_words.is_empty() {
        return None;
    }
    let pattern = query_words
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}
