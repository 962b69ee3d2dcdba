//! Morphology module for reducing words to their normal forms
//!
//! This module handles the lexical half of indexing and searching:
//! - Tokenizing raw text into Russian words
//! - Reducing each word to its normal forms via a [`Morphology`] backend
//! - Filtering out function words (prepositions, conjunctions, particles)
//! - Counting normal-form occurrences for ranking

mod dictionary;

pub use dictionary::DictionaryMorphology;

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Grammar tags that mark Russian function words
const FUNCTION_WORD_TAGS: [&str; 5] = ["ПРЕДЛ", "СОЮЗ", "МЕЖД", "МС", "ЧАСТ"];

/// Tokens with fewer characters than this are discarded outright
const MIN_TOKEN_CHARS: usize = 3;

/// A word-level morphological analyzer
///
/// Implementations map a lowercase surface form to its normal forms and
/// grammar descriptions. Unknown words yield empty vectors; the caller
/// skips them rather than failing the page.
pub trait Morphology: Send + Sync {
    /// Returns the normal forms of a surface word
    fn normal_forms(&self, word: &str) -> Vec<String>;

    /// Returns grammar tag strings for a surface word
    fn morph_info(&self, word: &str) -> Vec<String>;
}

/// Splits raw text into Russian tokens and reduces them to counted normal forms
pub struct Lemmatizer {
    morphology: Arc<dyn Morphology>,
    noise: Regex,
}

impl Lemmatizer {
    /// Creates a new lemmatizer over the given morphology backend
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        // Everything that is not a Cyrillic letter or whitespace is noise.
        // The explicit `ё` matters: it sits outside the `а-я` range.
        let noise = Regex::new(r"[^а-яё\s]+").expect("valid noise pattern");
        Self { morphology, noise }
    }

    /// Collects normal forms and their occurrence counts from raw text
    ///
    /// # Arguments
    ///
    /// * `text` - Plain text (markup already stripped)
    ///
    /// # Returns
    ///
    /// A map of normal form to the number of occurrences in `text`
    pub fn collect_lemmas(&self, text: &str) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for token in self.tokenize(text) {
            for normal in self.normalize_token(&token) {
                *counts.entry(normal).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Lowercases text, strips non-Cyrillic noise, and splits into tokens
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = self.noise.replace_all(&lowered, " ");
        cleaned.split_whitespace().map(|t| t.to_string()).collect()
    }

    /// Reduces one token to its normal forms, or to nothing if the token
    /// is too short, a function word, or unknown to the morphology
    fn normalize_token(&self, token: &str) -> Vec<String> {
        if token.chars().count() < MIN_TOKEN_CHARS {
            return Vec::new();
        }
        if self.is_function_word(token) {
            return Vec::new();
        }
        let forms = self.morphology.normal_forms(token);
        if forms.is_empty() {
            tracing::debug!("No normal form for token '{}', skipping", token);
        }
        forms
    }

    fn is_function_word(&self, token: &str) -> bool {
        self.morphology
            .morph_info(token)
            .iter()
            .any(|info| FUNCTION_WORD_TAGS.iter().any(|tag| info.contains(tag)))
    }
}
