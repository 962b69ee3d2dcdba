//! Dictionary-backed morphology
//!
//! Loads a tab-separated morphological dictionary into memory. Each line
//! maps one surface form to one normal form with its grammar tags:
//!
//! ```text
//! кота	кот	С мр ед рд
//! или	или	СОЮЗ
//! ```
//!
//! A surface form with several readings (e.g. noun and verb) appears on
//! several lines. Blank lines and lines starting with `#` are ignored.

use crate::morphology::Morphology;
use crate::LemmexError;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
struct DictEntry {
    normal: String,
    tags: String,
}

/// In-memory morphological dictionary keyed by lowercase surface form
pub struct DictionaryMorphology {
    entries: HashMap<String, Vec<DictEntry>>,
}

impl DictionaryMorphology {
    /// Loads a dictionary from a TSV file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the dictionary file
    ///
    /// # Returns
    ///
    /// * `Ok(DictionaryMorphology)` - Successfully loaded dictionary
    /// * `Err(LemmexError)` - Failed to read the file
    pub fn from_path(path: &Path) -> Result<Self, LemmexError> {
        let contents = std::fs::read_to_string(path)?;
        let dictionary = Self::parse(&contents);
        tracing::info!(
            "Loaded {} surface forms from {}",
            dictionary.entries.len(),
            path.display()
        );
        Ok(dictionary)
    }

    /// Builds a dictionary from `(surface, normal, tags)` triples
    ///
    /// Mainly useful in tests and small embedded setups.
    pub fn from_entries<'a, I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    {
        let mut entries: HashMap<String, Vec<DictEntry>> = HashMap::new();
        for (surface, normal, tags) in triples {
            entries
                .entry(surface.to_lowercase())
                .or_default()
                .push(DictEntry {
                    normal: normal.to_lowercase(),
                    tags: tags.to_string(),
                });
        }
        Self { entries }
    }

    fn parse(contents: &str) -> Self {
        let mut entries: HashMap<String, Vec<DictEntry>> = HashMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(surface), Some(normal)) if !surface.is_empty() && !normal.is_empty() => {
                    let tags = fields.next().unwrap_or("").to_string();
                    entries
                        .entry(surface.to_lowercase())
                        .or_default()
                        .push(DictEntry {
                            normal: normal.to_lowercase(),
                            tags,
                        });
                }
                _ => {
                    tracing::warn!("Malformed dictionary line {} skipped", line_no + 1);
                }
            }
        }
        Self { entries }
    }
}

impl Morphology for DictionaryMorphology {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        self.entries
            .get(word)
            .map(|list| list.iter().map(|e| e.normal.clone()).collect())
            .unwrap_or_default()
    }

    fn morph_info(&self, word: &str) -> Vec<String> {
        self.entries
            .get(word)
            .map(|list| list.iter().map(|e| e.tags.clone()).collect())
            .unwrap_or_default()
    }
}
